//! AST visitation events
//!
//! A compiler front-end walks a translation unit and reports what it sees as
//! a stream of [`AstEvent`]s. Events can be fed to a visitor directly or
//! stored as a JSON Lines trace, one event per line:
//!
//! ```text
//! {"event":"function_enter","kind":"function","name":"tmain","qualified_name":"tmain"}
//! {"event":"call_enter","callee":{"kind":"function","name":"add","qualified_name":"add"}}
//! {"event":"call_leave"}
//! {"event":"function_leave"}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, span, Level};

use super::{DiagramError, MessageKind, SourceLocation};

/// Kind of callable declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallableKind {
    #[default]
    Function,
    Method,
    Lambda,
}

/// A function, method or lambda declaration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallableDecl {
    #[serde(default)]
    pub kind: CallableKind,
    /// Unqualified name, e.g. `add`
    pub name: String,
    /// Qualified name without parameters, e.g. `ns::A::add`
    pub qualified_name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    /// Return type text; absent means `void`
    #[serde(default)]
    pub return_type: Option<String>,
    /// Explicit template arguments, e.g. `int, std::vector<T>`
    #[serde(default)]
    pub template_arguments: Option<String>,
    /// Qualified name of the owning class for methods
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub is_const: bool,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_constructor: bool,
    #[serde(default)]
    pub is_coroutine: bool,
    #[serde(default)]
    pub location: Option<SourceLocation>,
    /// Last line of the body, when the declaration is a definition
    #[serde(default)]
    pub end_line: Option<u32>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl CallableDecl {
    pub fn function(qualified_name: &str) -> Self {
        Self {
            kind: CallableKind::Function,
            name: unqualified(qualified_name),
            qualified_name: qualified_name.to_string(),
            ..Default::default()
        }
    }

    pub fn method(class: &str, name: &str) -> Self {
        Self {
            kind: CallableKind::Method,
            name: name.to_string(),
            qualified_name: format!("{}::{}", class, name),
            class: Some(class.to_string()),
            ..Default::default()
        }
    }

    pub fn lambda(qualified_name: &str, location: SourceLocation) -> Self {
        Self {
            kind: CallableKind::Lambda,
            name: unqualified(qualified_name),
            qualified_name: qualified_name.to_string(),
            location: Some(location),
            ..Default::default()
        }
    }

    pub fn with_parameters(mut self, parameters: &[&str]) -> Self {
        self.parameters = parameters.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_return_type(mut self, return_type: &str) -> Self {
        self.return_type = Some(return_type.to_string());
        self
    }

    pub fn with_location(mut self, file: &str, line: u32, end_line: Option<u32>) -> Self {
        self.location = Some(SourceLocation::new(file, line, 1));
        self.end_line = end_line;
        self
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    pub fn constructor(mut self) -> Self {
        self.is_constructor = true;
        self
    }

    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// True if the callable produces no value; constructors produce an object
    pub fn is_void(&self) -> bool {
        if self.is_constructor {
            return false;
        }
        match self.return_type.as_deref().map(str::trim) {
            None | Some("") | Some("void") => true,
            Some(_) => false,
        }
    }
}

fn unqualified(qualified_name: &str) -> String {
    super::names::split_qualified_name(qualified_name)
        .last()
        .map(|s| s.to_string())
        .unwrap_or_default()
}

/// A class or struct declaration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    pub qualified_name: String,
    #[serde(default)]
    pub template_arguments: Option<String>,
    #[serde(default)]
    pub is_struct: bool,
    #[serde(default)]
    pub location: Option<SourceLocation>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl ClassDecl {
    pub fn new(qualified_name: &str) -> Self {
        Self {
            name: unqualified(qualified_name),
            qualified_name: qualified_name.to_string(),
            ..Default::default()
        }
    }
}

/// Control-flow statement kinds that open a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    If,
    While,
    For,
    Do,
    Try,
    Switch,
    Conditional,
}

impl ControlKind {
    /// Marker opening the block
    pub fn begin(&self) -> MessageKind {
        match self {
            ControlKind::If => MessageKind::If,
            ControlKind::While => MessageKind::While,
            ControlKind::For => MessageKind::For,
            ControlKind::Do => MessageKind::Do,
            ControlKind::Try => MessageKind::Try,
            ControlKind::Switch => MessageKind::Switch,
            ControlKind::Conditional => MessageKind::Conditional,
        }
    }

    /// Marker closing the block
    pub fn end(&self) -> MessageKind {
        match self {
            ControlKind::If => MessageKind::IfEnd,
            ControlKind::While => MessageKind::WhileEnd,
            ControlKind::For => MessageKind::ForEnd,
            ControlKind::Do => MessageKind::DoEnd,
            ControlKind::Try => MessageKind::TryEnd,
            ControlKind::Switch => MessageKind::SwitchEnd,
            ControlKind::Conditional => MessageKind::ConditionalEnd,
        }
    }
}

/// One AST visitation event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AstEvent {
    ClassDecl(ClassDecl),
    /// Traversal enters the body of a function or method definition
    FunctionEnter(CallableDecl),
    FunctionLeave,
    /// Traversal enters the body of a lambda expression
    LambdaEnter(CallableDecl),
    LambdaLeave,
    /// A call expression starts; its arguments are visited before `CallLeave`
    CallEnter {
        callee: CallableDecl,
        #[serde(default)]
        location: Option<SourceLocation>,
        #[serde(default)]
        comment: Option<String>,
    },
    CallLeave,
    ControlEnter {
        kind: ControlKind,
        #[serde(default)]
        token: u64,
        #[serde(default)]
        condition: Option<String>,
        #[serde(default)]
        location: Option<SourceLocation>,
    },
    /// `else if`, `else`, `catch`, `case` or the false arm of `?:`
    ControlBranch {
        kind: MessageKind,
        #[serde(default)]
        token: u64,
        #[serde(default)]
        text: Option<String>,
    },
    ControlLeave {
        kind: ControlKind,
        #[serde(default)]
        token: u64,
    },
    /// Traversal enters the condition of a control statement
    ConditionEnter,
    ConditionLeave,
    CoAwait {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        location: Option<SourceLocation>,
    },
    CoYield {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        location: Option<SourceLocation>,
    },
    CoReturn {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        location: Option<SourceLocation>,
    },
}

/// Parse a JSON Lines event trace
pub fn parse_event_trace(input: &str) -> Result<Vec<AstEvent>, DiagramError> {
    let parse_span = span!(Level::DEBUG, "parse_event_trace", input_len = input.len());
    let _enter = parse_span.enter();

    let mut events = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str::<AstEvent>(trimmed).map_err(|e| {
            DiagramError::parse_error(format!("Invalid event: {}", e), index + 1, e.column())
        })?;
        events.push(event);
    }

    debug!(event_count = events.len(), "Parsed event trace");
    Ok(events)
}

/// Read and parse a JSON Lines event trace from disk
pub fn load_event_trace<P: AsRef<Path>>(path: P) -> Result<Vec<AstEvent>, DiagramError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    parse_event_trace(&content)
}
