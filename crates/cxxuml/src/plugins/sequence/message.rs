//! Sequence diagram messages

use serde::Serialize;
use std::fmt;

use crate::core::decorators::NotePosition;
use crate::core::{MessageKind, MessageScope, ParticipantId, SourceLocation};

/// Note attached to a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageNote {
    pub position: NotePosition,
    pub text: String,
}

impl MessageNote {
    pub fn new(position: NotePosition, text: impl Into<String>) -> Self {
        Self {
            position,
            text: text.into(),
        }
    }
}

/// One event in the temporal sequence of an activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub kind: MessageKind,
    pub from: ParticipantId,
    /// Callee for calls, caller for returns, `NONE` for markers
    pub to: ParticipantId,
    /// Call signature, condition text, case label or caught type
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    pub is_static: bool,
    pub scope: MessageScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<MessageNote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl Message {
    pub fn new(kind: MessageKind, from: ParticipantId, to: ParticipantId) -> Self {
        Self {
            kind,
            from,
            to,
            text: String::new(),
            return_type: None,
            is_static: false,
            scope: MessageScope::Normal,
            comment: None,
            location: None,
        }
    }

    pub fn call(from: ParticipantId, to: ParticipantId) -> Self {
        Self::new(MessageKind::Call, from, to)
    }

    /// Return from `from` (the callee) back to `to` (the caller)
    pub fn response(from: ParticipantId, to: ParticipantId) -> Self {
        Self::new(MessageKind::Return, from, to)
    }

    /// Control-flow or coroutine marker emitted by `from`
    pub fn marker(kind: MessageKind, from: ParticipantId) -> Self {
        Self::new(kind, from, ParticipantId::NONE)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_scope(mut self, scope: MessageScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    pub fn with_comment(mut self, comment: Option<MessageNote>) -> Self {
        self.comment = comment;
        self
    }

    pub fn with_location(mut self, location: Option<SourceLocation>) -> Self {
        self.location = location;
        self
    }

    pub fn with_return_type(mut self, return_type: Option<String>) -> Self {
        self.return_type = return_type;
        self
    }

    pub fn is_call(&self) -> bool {
        self.kind == MessageKind::Call
    }

    pub fn is_return(&self) -> bool {
        self.kind == MessageKind::Return
    }

    /// Condition or label text, if any
    pub fn text(&self) -> Option<&str> {
        if self.text.is_empty() {
            None
        } else {
            Some(&self.text)
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.kind, self.from)?;
        if !self.to.is_none() {
            write!(f, " -> [{}]", self.to)?;
        }
        if !self.text.is_empty() {
            write!(f, " : {}", self.text)?;
        }
        Ok(())
    }
}
