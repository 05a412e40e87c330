//! Fixed size worker pool for building diagrams in parallel
//!
//! Tasks are opaque closures pulled from a shared FIFO queue. Shutdown lets
//! workers drain whatever is still queued before they exit, so every
//! submitted task runs to completion.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, trace};

use super::DiagramError;

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct Queue {
    tasks: VecDeque<Task>,
    shutdown: bool,
}

#[derive(Default)]
struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
}

/// Handle to the result of a submitted task
pub struct TaskHandle<T> {
    receiver: Receiver<Result<T, DiagramError>>,
}

impl<T> TaskHandle<T> {
    /// Block until the task finishes
    ///
    /// A panic inside the task is reported as `TaskPanicked`.
    pub fn wait(self) -> Result<T, DiagramError> {
        self.receiver.recv().unwrap_or_else(|_| {
            Err(DiagramError::TaskPanicked {
                message: "task was dropped before completion".to_string(),
            })
        })
    }
}

/// Fixed size thread pool
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Create a pool with `size` workers, or one per available core if `size` is 0
    pub fn new(size: usize) -> Result<Self, DiagramError> {
        let size = if size == 0 {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            size
        };

        let shared = Arc::new(Shared::default());
        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let shared = Arc::clone(&shared);
            let worker = thread::Builder::new()
                .name(format!("cxxuml-worker-{}", index))
                .spawn(move || worker_loop(index, &shared))?;
            workers.push(worker);
        }

        debug!(workers = size, "Started thread pool");
        Ok(Self { shared, workers })
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a task and return a handle to its result
    pub fn submit<T, F>(&self, task: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let job: Task = Box::new(move || {
            let result = catch_unwind(AssertUnwindSafe(task)).map_err(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                DiagramError::TaskPanicked { message }
            });
            // The handle may have been dropped; nobody is waiting then
            let _ = sender.send(result);
        });

        {
            let mut queue = self
                .shared
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            queue.tasks.push_back(job);
        }
        self.shared.available.notify_one();
        TaskHandle { receiver }
    }

    /// Stop accepting work, run the remaining tasks and join all workers
    pub fn shutdown(&mut self) {
        {
            let mut queue = self
                .shared
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            queue.shutdown = true;
        }
        self.shared.available.notify_all();

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                debug!("Worker thread exited with a panic");
            }
        }
    }
}

fn worker_loop(index: usize, shared: &Shared) {
    loop {
        let task = {
            let mut queue = shared.queue.lock().unwrap_or_else(PoisonError::into_inner);
            loop {
                if let Some(task) = queue.tasks.pop_front() {
                    break Some(task);
                }
                if queue.shutdown {
                    break None;
                }
                queue = shared
                    .available
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        match task {
            Some(task) => {
                trace!(worker = index, "Running task");
                task();
            }
            None => break,
        }
    }
    trace!(worker = index, "Worker stopped");
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_submit_returns_result() {
        let pool = ThreadPool::new(2).unwrap();
        let handle = pool.submit(|| 6 * 7);
        assert_eq!(handle.wait().unwrap(), 42);
    }

    #[test]
    fn test_zero_size_uses_available_cores() {
        let pool = ThreadPool::new(0).unwrap();
        assert!(pool.size() >= 1);
    }

    #[test]
    fn test_panic_becomes_error() {
        let pool = ThreadPool::new(1).unwrap();
        let handle = pool.submit(|| -> usize { panic!("boom") });
        let err = handle.wait().unwrap_err();
        assert!(matches!(err, DiagramError::TaskPanicked { ref message } if message == "boom"));

        // The worker survives the panic
        assert_eq!(pool.submit(|| 1).wait().unwrap(), 1);
    }

    #[test]
    fn test_shutdown_drains_pending_tasks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pool = ThreadPool::new(2).unwrap();
        for _ in 0..32 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 32);
        assert_eq!(pool.size(), 0);
    }
}
