//! Core type definitions shared by models, renderers and configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a sequence diagram message
///
/// Calls and returns connect two participants. Everything else is a
/// control-flow marker whose `to` endpoint is `ParticipantId::NONE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Call,
    Return,
    If,
    ElseIf,
    Else,
    IfEnd,
    While,
    WhileEnd,
    For,
    ForEnd,
    Do,
    DoEnd,
    Try,
    Catch,
    TryEnd,
    Switch,
    Case,
    SwitchEnd,
    Conditional,
    ConditionalElse,
    ConditionalEnd,
    CoAwait,
    CoYield,
    CoReturn,
}

impl MessageKind {
    /// Returns true for markers that open a block
    pub fn is_block_begin(&self) -> bool {
        matches!(
            self,
            MessageKind::If
                | MessageKind::While
                | MessageKind::For
                | MessageKind::Do
                | MessageKind::Try
                | MessageKind::Switch
                | MessageKind::Conditional
        )
    }

    /// Returns true for markers that close a block
    pub fn is_block_end(&self) -> bool {
        matches!(
            self,
            MessageKind::IfEnd
                | MessageKind::WhileEnd
                | MessageKind::ForEnd
                | MessageKind::DoEnd
                | MessageKind::TryEnd
                | MessageKind::SwitchEnd
                | MessageKind::ConditionalEnd
        )
    }

    /// Returns true for markers that start a new branch of an open block
    pub fn is_block_branch(&self) -> bool {
        matches!(
            self,
            MessageKind::ElseIf
                | MessageKind::Else
                | MessageKind::Catch
                | MessageKind::Case
                | MessageKind::ConditionalElse
        )
    }

    /// Returns true for the coroutine suspension markers
    pub fn is_coroutine(&self) -> bool {
        matches!(
            self,
            MessageKind::CoAwait | MessageKind::CoYield | MessageKind::CoReturn
        )
    }

    /// The opening marker a branch or end marker belongs to
    pub fn block_begin(&self) -> Option<MessageKind> {
        match self {
            MessageKind::If | MessageKind::ElseIf | MessageKind::Else | MessageKind::IfEnd => {
                Some(MessageKind::If)
            }
            MessageKind::While | MessageKind::WhileEnd => Some(MessageKind::While),
            MessageKind::For | MessageKind::ForEnd => Some(MessageKind::For),
            MessageKind::Do | MessageKind::DoEnd => Some(MessageKind::Do),
            MessageKind::Try | MessageKind::Catch | MessageKind::TryEnd => Some(MessageKind::Try),
            MessageKind::Switch | MessageKind::Case | MessageKind::SwitchEnd => {
                Some(MessageKind::Switch)
            }
            MessageKind::Conditional
            | MessageKind::ConditionalElse
            | MessageKind::ConditionalEnd => Some(MessageKind::Conditional),
            _ => None,
        }
    }

    /// The closing marker of a block opened by this kind
    pub fn block_end(&self) -> Option<MessageKind> {
        match self.block_begin()? {
            MessageKind::If => Some(MessageKind::IfEnd),
            MessageKind::While => Some(MessageKind::WhileEnd),
            MessageKind::For => Some(MessageKind::ForEnd),
            MessageKind::Do => Some(MessageKind::DoEnd),
            MessageKind::Try => Some(MessageKind::TryEnd),
            MessageKind::Switch => Some(MessageKind::SwitchEnd),
            MessageKind::Conditional => Some(MessageKind::ConditionalEnd),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Call => "call",
            MessageKind::Return => "return",
            MessageKind::If => "if",
            MessageKind::ElseIf => "else if",
            MessageKind::Else => "else",
            MessageKind::IfEnd => "end if",
            MessageKind::While => "while",
            MessageKind::WhileEnd => "end while",
            MessageKind::For => "for",
            MessageKind::ForEnd => "end for",
            MessageKind::Do => "do",
            MessageKind::DoEnd => "end do",
            MessageKind::Try => "try",
            MessageKind::Catch => "catch",
            MessageKind::TryEnd => "end try",
            MessageKind::Switch => "switch",
            MessageKind::Case => "case",
            MessageKind::SwitchEnd => "end switch",
            MessageKind::Conditional => "conditional",
            MessageKind::ConditionalElse => "conditional else",
            MessageKind::ConditionalEnd => "end conditional",
            MessageKind::CoAwait => "co_await",
            MessageKind::CoYield => "co_yield",
            MessageKind::CoReturn => "co_return",
        };
        write!(f, "{}", name)
    }
}

/// Whether a message was recorded inside a control-flow condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageScope {
    #[default]
    Normal,
    Condition,
}

impl fmt::Display for MessageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageScope::Normal => write!(f, "normal"),
            MessageScope::Condition => write!(f, "condition"),
        }
    }
}

/// Diagram kinds known to the configuration
///
/// Only sequence diagrams have a model in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagramKind {
    Class,
    Sequence,
    Package,
    Include,
}

impl DiagramKind {
    pub fn variants() -> &'static [&'static str] {
        &["class", "sequence", "package", "include"]
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, DiagramKind::Sequence)
    }
}

impl fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagramKind::Class => write!(f, "class"),
            DiagramKind::Sequence => write!(f, "sequence"),
            DiagramKind::Package => write!(f, "package"),
            DiagramKind::Include => write!(f, "include"),
        }
    }
}

impl FromStr for DiagramKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "class" => Ok(DiagramKind::Class),
            "sequence" => Ok(DiagramKind::Sequence),
            "package" => Ok(DiagramKind::Package),
            "include" => Ok(DiagramKind::Include),
            _ => Err(format!("Unknown diagram type: {}", s)),
        }
    }
}

/// Output format of a diagram generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[serde(rename = "plantuml")]
    PlantUml,
    Mermaid,
    Json,
}

impl OutputFormat {
    /// File extension used for generated files
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::PlantUml => "puml",
            OutputFormat::Mermaid => "mmd",
            OutputFormat::Json => "json",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["plantuml", "mermaid", "json"]
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::PlantUml => write!(f, "plantuml"),
            OutputFormat::Mermaid => write!(f, "mermaid"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plantuml" | "puml" => Ok(OutputFormat::PlantUml),
            "mermaid" | "mmd" => Ok(OutputFormat::Mermaid),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Position in a source file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}
