//! Call context of the visitor
//!
//! Holds everything the visitor needs to know about where traversal
//! currently is: the enclosing function, the lambdas nested in it, the open
//! control-flow statements and the call expressions still being visited.

use std::collections::HashSet;
use tracing::{debug, trace};

use crate::core::{DiagramError, MessageKind, ParticipantId};

use super::message::Message;

/// An open control-flow statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlFrame {
    /// Opening marker kind
    pub kind: MessageKind,
    /// Statement identity supplied by the event source, 0 if unknown
    pub token: u64,
    /// Participant whose activity holds the block
    pub caller: ParticipantId,
}

/// A call expression whose arguments are still being visited
#[derive(Debug, Clone)]
pub struct PendingCall {
    /// `None` when the call is not recorded, e.g. outside any function or skipped
    pub message: Option<Message>,
    /// Return type text for non-void callees
    pub returns: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CallContext {
    caller: Option<ParticipantId>,
    lambdas: Vec<ParticipantId>,
    frames: Vec<ControlFrame>,
    pending_calls: Vec<PendingCall>,
    condition_depth: usize,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_caller(&mut self, id: ParticipantId) {
        trace!(caller = %id, "Entering function");
        self.caller = Some(id);
    }

    /// Leave the current function, dropping whatever state it left open
    pub fn clear_caller(&mut self) {
        if !self.frames.is_empty() {
            debug!(open = self.frames.len(), "Function left with open control frames");
        }
        if !self.pending_calls.is_empty() {
            debug!(pending = self.pending_calls.len(), "Function left with pending calls");
        }
        self.caller = None;
        self.lambdas.clear();
        self.frames.clear();
        self.pending_calls.clear();
        self.condition_depth = 0;
    }

    pub fn enter_lambda(&mut self, id: ParticipantId) {
        trace!(lambda = %id, "Entering lambda");
        self.lambdas.push(id);
    }

    /// Leave the innermost lambda
    ///
    /// Control frames opened inside the lambda body are discarded with it.
    pub fn leave_lambda(&mut self) -> Result<ParticipantId, DiagramError> {
        let id = self.lambdas.pop().ok_or_else(|| {
            DiagramError::contract_violation("Lambda caller stack underflow")
        })?;
        let before = self.frames.len();
        self.frames.retain(|frame| frame.caller != id);
        if self.frames.len() != before {
            debug!(lambda = %id, "Lambda left with open control frames");
        }
        Ok(id)
    }

    /// Innermost lambda if any, else the enclosing function
    pub fn current_caller(&self) -> Option<ParticipantId> {
        self.lambdas.last().copied().or(self.caller)
    }

    pub fn lambda_depth(&self) -> usize {
        self.lambdas.len()
    }

    pub fn enter_control_frame(&mut self, frame: ControlFrame) {
        trace!(kind = %frame.kind, token = frame.token, "Entering control frame");
        self.frames.push(frame);
    }

    /// Pop the innermost frame if it was opened by `kind`
    ///
    /// A mismatched leave is ignored. So is leaving an `else if`, which
    /// shares the frame of its `if`.
    pub fn leave_control_frame(&mut self, kind: MessageKind, token: u64) -> Option<ControlFrame> {
        if kind == MessageKind::ElseIf {
            return None;
        }
        let matches = self.frames.last().is_some_and(|top| {
            top.kind == kind && (token == 0 || top.token == 0 || top.token == token)
        });
        if !matches {
            debug!(%kind, token, top = ?self.frames.last(), "Mismatched control frame leave");
            return None;
        }
        self.frames.pop()
    }

    pub fn current_frame(&self) -> Option<&ControlFrame> {
        self.frames.last()
    }

    pub fn push_call(&mut self, call: PendingCall) {
        self.pending_calls.push(call);
    }

    pub fn pop_call(&mut self) -> Option<PendingCall> {
        let call = self.pending_calls.pop();
        if call.is_none() {
            debug!("Call expression stack underflow");
        }
        call
    }

    pub fn enter_condition(&mut self) {
        self.condition_depth += 1;
    }

    pub fn leave_condition(&mut self) {
        if self.condition_depth == 0 {
            debug!("Condition scope underflow");
            return;
        }
        self.condition_depth -= 1;
    }

    pub fn in_condition(&self) -> bool {
        self.condition_depth > 0
    }
}

/// Callees being expanded while an activity is rendered
///
/// An id can appear only once on the path, which bounds recursion.
#[derive(Debug, Clone, Default)]
pub struct ExpansionPath {
    path: Vec<ParticipantId>,
    members: HashSet<ParticipantId>,
}

impl ExpansionPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `id` unless it is already an ancestor
    pub fn enter(&mut self, id: ParticipantId) -> bool {
        if !self.members.insert(id) {
            return false;
        }
        self.path.push(id);
        true
    }

    pub fn leave(&mut self) {
        if let Some(id) = self.path.pop() {
            self.members.remove(&id);
        }
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.members.contains(&id)
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }
}
