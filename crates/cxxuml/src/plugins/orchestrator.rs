//! Generation pipeline
//!
//! The orchestrator drives every configured diagram through
//! trace loading → model building → rendering → file output. Diagrams
//! are built in parallel on a [`ThreadPool`]; each event trace is loaded once
//! and shared between the diagrams that read it.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, span, warn, Level};

use crate::core::config::{Config, DiagramConfig};
use crate::core::{
    load_event_trace, AstEvent, Diagram, DiagramError, DiagramKind, ModelBuilder, OutputFormat,
    TaskHandle, ThreadPool,
};
use crate::plugins::sequence::{SequenceDatabase, SequenceDiagram};

/// Rendered documents of one diagram, one per generator
type RenderedDiagram = Vec<(OutputFormat, String)>;

/// Outcome of a generation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    /// Files written
    pub generated: Vec<PathBuf>,
    /// Diagrams skipped because of a per-diagram error, with the error text
    pub failed: Vec<(String, String)>,
}

impl GenerationReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn fail(&mut self, name: &str, error: impl ToString) {
        self.failed.push((name.to_string(), error.to_string()));
    }
}

/// Build a model of diagram type `D` from an event trace
fn build_model<D: Diagram>(
    name: &str,
    config: &DiagramConfig,
    events: &[AstEvent],
) -> Result<D::Database> {
    let mut database = D::create_database(name, config);
    let builder = D::create_builder(name, config);
    builder.build(events, &mut database)?;
    Ok(database)
}

/// Build and render one diagram in every requested format
fn render_diagram<D: Diagram>(
    name: &str,
    config: &DiagramConfig,
    events: &[AstEvent],
    generators: &[OutputFormat],
) -> Result<RenderedDiagram> {
    let diagram_span = span!(Level::INFO, "generate_diagram", diagram = name, kind = D::name());
    let _enter = diagram_span.enter();

    let database = build_model::<D>(name, config, events)?;
    let mut rendered = Vec::with_capacity(generators.len());
    for format in generators {
        let renderer = D::create_renderer(*format, config);
        debug!(renderer = renderer.name(), version = renderer.version(), "Rendering");
        rendered.push((*format, renderer.render(&database)?));
    }
    Ok(rendered)
}

/// True if `error` must abort the whole run
fn is_fatal(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<DiagramError>()
        .is_some_and(DiagramError::is_fatal)
}

/// Coordinates trace loading, model building and rendering
pub struct Orchestrator {
    config: Config,
    traces: Mutex<HashMap<PathBuf, Arc<Vec<AstEvent>>>>,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            traces: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load an event trace, reusing an earlier load of the same path
    pub fn load_trace(&self, path: &Path) -> Result<Arc<Vec<AstEvent>>> {
        let mut traces = self.traces.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(events) = traces.get(path) {
            debug!(path = %path.display(), "Reusing loaded event trace");
            return Ok(Arc::clone(events));
        }
        let events = Arc::new(load_event_trace(path)?);
        info!(path = %path.display(), events = events.len(), "Loaded event trace");
        traces.insert(path.to_path_buf(), Arc::clone(&events));
        Ok(events)
    }

    fn diagram(&self, name: &str) -> Result<&DiagramConfig> {
        self.config.diagrams.get(name).ok_or_else(|| {
            DiagramError::config_error(format!("Unknown diagram '{}'", name)).into()
        })
    }

    fn events(&self, name: &str, config: &DiagramConfig) -> Result<Arc<Vec<AstEvent>>> {
        config.validate(name)?;
        let path = config.events.as_ref().ok_or_else(|| {
            DiagramError::config_error(format!("Diagram '{}' has no 'events' trace", name))
        })?;
        self.load_trace(path)
    }

    /// Build the finalized sequence model of one diagram
    pub fn build_model(&self, name: &str) -> Result<SequenceDatabase> {
        let config = self.diagram(name)?;
        if config.kind != DiagramKind::Sequence {
            return Err(DiagramError::UnsupportedDiagramType {
                diagram_type: config.kind.to_string(),
            }
            .into());
        }
        let events = self.events(name, config)?;
        build_model::<SequenceDiagram>(name, config, &events)
    }

    /// Generate the named diagrams, or all configured diagrams if `names` is empty
    ///
    /// Per-diagram errors are logged and reported; fatal errors abort the run.
    pub fn generate(&self, names: &[String]) -> Result<GenerationReport> {
        let generate_span = span!(Level::INFO, "generate", requested = names.len());
        let _enter = generate_span.enter();

        let selected: Vec<String> = if names.is_empty() {
            self.config.diagrams.keys().cloned().collect()
        } else {
            for name in names {
                self.diagram(name)?;
            }
            names.to_vec()
        };

        let mut report = GenerationReport::default();
        let pool = ThreadPool::new(self.config.jobs)?;
        let mut pending: Vec<(String, TaskHandle<Result<RenderedDiagram>>)> = Vec::new();

        for name in selected {
            let config = self.diagram(&name)?.clone();
            if config.kind != DiagramKind::Sequence {
                let err = DiagramError::UnsupportedDiagramType {
                    diagram_type: config.kind.to_string(),
                };
                warn!(diagram = %name, error = %err, "Skipping diagram");
                report.fail(&name, err);
                continue;
            }
            let events = match self.events(&name, &config) {
                Ok(events) => events,
                Err(err) => {
                    warn!(diagram = %name, error = %err, "Skipping diagram");
                    report.fail(&name, err);
                    continue;
                }
            };

            let generators = self.config.generators.clone();
            let task_name = name.clone();
            let handle = pool.submit(move || {
                render_diagram::<SequenceDiagram>(&task_name, &config, &events, &generators)
            });
            pending.push((name, handle));
        }

        for (name, handle) in pending {
            let rendered = match handle.wait() {
                Ok(Ok(rendered)) => rendered,
                Ok(Err(err)) if is_fatal(&err) => {
                    error!(diagram = %name, error = %err, "Aborting generation");
                    return Err(err);
                }
                Ok(Err(err)) => {
                    warn!(diagram = %name, error = %err, "Diagram generation failed");
                    report.fail(&name, err);
                    continue;
                }
                Err(err) => {
                    error!(diagram = %name, error = %err, "Diagram task panicked");
                    report.fail(&name, err);
                    continue;
                }
            };
            for (format, content) in rendered {
                let path = self.write(&name, format, &content)?;
                report.generated.push(path);
            }
        }

        info!(
            generated = report.generated.len(),
            failed = report.failed.len(),
            "Generation finished"
        );
        Ok(report)
    }

    fn write(&self, name: &str, format: OutputFormat, content: &str) -> Result<PathBuf> {
        let directory = &self.config.output_directory;
        std::fs::create_dir_all(directory)
            .with_context(|| format!("Failed to create '{}'", directory.display()))?;
        let path = directory.join(format!("{}.{}", name, format.extension()));
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write '{}'", path.display()))?;
        debug!(path = %path.display(), "Wrote diagram");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_diagram_is_an_error() {
        let orchestrator = Orchestrator::new(Config::default());
        assert!(orchestrator.generate(&["missing".to_string()]).is_err());
        assert!(orchestrator.build_model("missing").is_err());
    }

    #[test]
    fn test_missing_trace_fails_only_its_diagram() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config {
            output_directory: dir.path().join("out"),
            jobs: 1,
            ..Default::default()
        };
        config.diagrams.insert(
            "broken".to_string(),
            DiagramConfig::sequence(dir.path().join("missing.jsonl")),
        );

        let report = Orchestrator::new(config).generate(&[]).unwrap();
        assert!(report.generated.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "broken");
    }

    #[test]
    fn test_traces_are_loaded_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        std::fs::write(&path, "{\"event\":\"function_leave\"}\n").unwrap();

        let orchestrator = Orchestrator::new(Config::default());
        let first = orchestrator.load_trace(&path).unwrap();
        let second = orchestrator.load_trace(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
