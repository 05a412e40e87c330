//! Core error types for diagram generation
//!
//! Model operations return [`DiagramError`] directly. Pipeline seams use
//! `anyhow::Result` and callers recover the typed error with
//! `downcast_ref::<DiagramError>()`.

use thiserror::Error;

use super::ParticipantId;

/// Core error types for diagram generation
#[derive(Error, Debug)]
pub enum DiagramError {
    #[error(
        "Invalid sequence diagram 'from' condition in {diagram_type} diagram \
         '{diagram_name}': {detail}"
    )]
    InvalidSequenceFromCondition {
        diagram_type: String,
        diagram_name: String,
        detail: String,
    },

    #[error(
        "Invalid sequence diagram 'to' condition in {diagram_type} diagram \
         '{diagram_name}': {detail}"
    )]
    InvalidSequenceToCondition {
        diagram_type: String,
        diagram_name: String,
        detail: String,
    },

    #[error("Diagram {diagram_type} '{diagram_name}' is empty")]
    EmptyDiagram {
        diagram_type: String,
        diagram_name: String,
    },

    #[error("Duplicate participant id {id}: '{existing}' collides with '{incoming}'")]
    DuplicateIdentifier {
        id: ParticipantId,
        existing: String,
        incoming: String,
    },

    #[error("Contract violation: {message}")]
    ContractViolation { message: String },

    #[error("Parse error: {message} at line {line}, column {column}")]
    ParseError {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Config error: {message}")]
    ConfigError { message: String },

    #[error("Render error: {message}")]
    RenderError { message: String },

    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Unsupported diagram type: {diagram_type}")]
    UnsupportedDiagramType { diagram_type: String },

    #[error("Task panicked: {message}")]
    TaskPanicked { message: String },
}

impl DiagramError {
    /// Create a new 'from' condition error
    pub fn invalid_from_condition(diagram_name: &str, detail: String) -> Self {
        Self::InvalidSequenceFromCondition {
            diagram_type: "sequence".to_string(),
            diagram_name: diagram_name.to_string(),
            detail,
        }
    }

    /// Create a new 'to' condition error
    pub fn invalid_to_condition(diagram_name: &str, detail: String) -> Self {
        Self::InvalidSequenceToCondition {
            diagram_type: "sequence".to_string(),
            diagram_name: diagram_name.to_string(),
            detail,
        }
    }

    /// Create a new empty diagram error
    pub fn empty_diagram(diagram_name: &str) -> Self {
        Self::EmptyDiagram {
            diagram_type: "sequence".to_string(),
            diagram_name: diagram_name.to_string(),
        }
    }

    pub fn contract_violation(message: impl Into<String>) -> Self {
        Self::ContractViolation {
            message: message.into(),
        }
    }

    /// Create a new parse error
    pub fn parse_error(message: String, line: usize, column: usize) -> Self {
        Self::ParseError {
            message,
            line,
            column,
        }
    }

    /// Create a new config error
    pub fn config_error(message: String) -> Self {
        Self::ConfigError { message }
    }

    /// Create a new render error
    pub fn render_error(message: String) -> Self {
        Self::RenderError { message }
    }

    /// Returns true for structural errors that abort the whole generation run.
    ///
    /// Everything else is scoped to the diagram that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DuplicateIdentifier { .. } | Self::ContractViolation { .. }
        )
    }

    /// Name of the diagram this error belongs to, if it is diagram scoped
    pub fn diagram_name(&self) -> Option<&str> {
        match self {
            Self::InvalidSequenceFromCondition { diagram_name, .. }
            | Self::InvalidSequenceToCondition { diagram_name, .. }
            | Self::EmptyDiagram { diagram_name, .. } => Some(diagram_name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_condition_error() {
        let error = DiagramError::invalid_from_condition(
            "main_sequence",
            "Failed to find participant matching 'nonexistent::fn()' for 'from' condition"
                .to_string(),
        );
        let error_msg = format!("{}", error);
        assert!(error_msg.contains("'from' condition"));
        assert!(error_msg.contains("main_sequence"));
        assert!(error_msg.contains("nonexistent::fn()"));
        assert!(!error.is_fatal());
        assert_eq!(error.diagram_name(), Some("main_sequence"));
    }

    #[test]
    fn test_to_condition_error() {
        let error = DiagramError::invalid_to_condition("d", "missing".to_string());
        let error_msg = format!("{}", error);
        assert!(error_msg.contains("'to' condition"));
        assert!(error_msg.contains("sequence diagram 'd'"));
    }

    #[test]
    fn test_empty_diagram_error() {
        let error = DiagramError::empty_diagram("empty");
        assert_eq!(format!("{}", error), "Diagram sequence 'empty' is empty");
    }

    #[test]
    fn test_fatal_errors() {
        let error = DiagramError::contract_violation("lambda stack underflow");
        assert!(error.is_fatal());

        let error = DiagramError::DuplicateIdentifier {
            id: ParticipantId::new(7),
            existing: "a()".to_string(),
            incoming: "b()".to_string(),
        };
        assert!(error.is_fatal());
        assert!(format!("{}", error).contains("'a()' collides with 'b()'"));
    }

    #[test]
    fn test_parse_error() {
        let error = DiagramError::parse_error("Invalid event".to_string(), 5, 10);
        let error_msg = format!("{}", error);
        assert!(error_msg.contains("Parse error"));
        assert!(error_msg.contains("line 5"));
        assert!(error_msg.contains("column 10"));
    }

    #[test]
    fn test_io_error_conversion() {
        use std::io;
        let io_err = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error: DiagramError = io_err.into();
        let error_msg = format!("{}", error);
        assert!(error_msg.contains("IO error"));
        assert!(error_msg.contains("File not found"));
    }
}
