//! Comment decorators
//!
//! Doc comments can carry `@cxxuml{...}` (or `\cxxuml{...}`) directives that
//! adjust the generated diagrams:
//!
//! ```text
//! /// @cxxuml{note[right] Entry point of the worker}
//! /// @cxxuml{skip}
//! /// @cxxuml{style:seq_a[#back:lightblue]}
//! /// @cxxuml{call ns::callback()}
//! ```
//!
//! A `:name,name` suffix after the decorator label restricts it to the
//! listed diagrams.

use chumsky::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::chumsky_utils::{bracketed, inline_whitespace, name_list, optional_whitespace, rest_text};

const TAG: &str = "cxxuml";

/// Decorator payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecoratorKind {
    Note { position: String, text: String },
    Skip,
    Style { spec: String },
    Call { callee: String },
}

/// Placement of a note relative to its participant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotePosition {
    #[default]
    Left,
    Right,
    Over,
}

impl NotePosition {
    /// Unknown positions fall back to `Left`
    pub fn parse(position: &str) -> Self {
        match position.trim() {
            "right" => NotePosition::Right,
            "over" | "top" | "bottom" => NotePosition::Over,
            "left" => NotePosition::Left,
            other => {
                debug!(position = other, "Unknown note position, using left");
                NotePosition::Left
            }
        }
    }

    /// Placement clause shared by PlantUML and Mermaid, e.g. `left of`
    pub fn placement(&self) -> &'static str {
        match self {
            NotePosition::Left => "left of",
            NotePosition::Right => "right of",
            NotePosition::Over => "over",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotePosition::Left => "left",
            NotePosition::Right => "right",
            NotePosition::Over => "over",
        }
    }
}

/// A parsed comment decorator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decorator {
    /// Diagrams this decorator is restricted to, empty for all
    #[serde(default)]
    pub diagrams: Vec<String>,
    #[serde(flatten)]
    pub kind: DecoratorKind,
}

impl Decorator {
    pub fn applies_to_diagram(&self, name: &str) -> bool {
        self.diagrams.is_empty() || self.diagrams.iter().any(|d| d == name)
    }
}

/// Result of scanning one comment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedComment {
    pub decorators: Vec<Decorator>,
    /// Comment text with all decorator blocks removed
    pub text: String,
}

impl ParsedComment {
    /// True if a `skip` decorator applies to the given diagram
    pub fn skip(&self, diagram: &str) -> bool {
        self.decorators
            .iter()
            .any(|d| d.kind == DecoratorKind::Skip && d.applies_to_diagram(diagram))
    }

    /// Position and text of the first `note` decorator applying to the given diagram
    pub fn note(&self, diagram: &str) -> Option<(NotePosition, &str)> {
        self.decorators.iter().find_map(|d| match &d.kind {
            DecoratorKind::Note { position, text } if d.applies_to_diagram(diagram) => {
                Some((NotePosition::parse(position), text.as_str()))
            }
            _ => None,
        })
    }
}

fn diagram_filter<'src>() -> impl Parser<'src, &'src str, Vec<String>> + Clone {
    just(':')
        .ignore_then(name_list())
        .or_not()
        .map(Option::unwrap_or_default)
}

fn decorator_parser<'src>() -> impl Parser<'src, &'src str, Decorator> {
    let note = just("note")
        .ignore_then(diagram_filter())
        .then(bracketed().or_not())
        .then_ignore(optional_whitespace())
        .then(rest_text())
        .map(|((diagrams, position), text)| Decorator {
            diagrams,
            kind: DecoratorKind::Note {
                position: position
                    .filter(|p| !p.is_empty())
                    .unwrap_or_else(|| "left".to_string()),
                text,
            },
        });

    let skip = just("skip")
        .ignore_then(diagram_filter())
        .then_ignore(optional_whitespace())
        .map(|diagrams| Decorator {
            diagrams,
            kind: DecoratorKind::Skip,
        });

    let style = just("style")
        .ignore_then(diagram_filter())
        .then(bracketed())
        .then_ignore(optional_whitespace())
        .map(|(diagrams, spec)| Decorator {
            diagrams,
            kind: DecoratorKind::Style { spec },
        });

    let call = just("call")
        .ignore_then(diagram_filter())
        .then_ignore(inline_whitespace())
        .then(rest_text())
        .map(|(diagrams, callee)| Decorator {
            diagrams,
            kind: DecoratorKind::Call { callee },
        });

    optional_whitespace()
        .ignore_then(choice((note, skip, style, call)))
        .then_ignore(end())
}

/// Parse the body of a single decorator (the text between the braces)
pub fn parse_decorator(body: &str) -> Option<Decorator> {
    match decorator_parser().parse(body).into_result() {
        Ok(decorator) => Some(decorator),
        Err(errors) => {
            debug!(body, ?errors, "Ignoring unrecognized decorator");
            None
        }
    }
}

/// Extract all decorators from a comment
///
/// Both `@cxxuml{` and `\cxxuml{` open a decorator, which ends at the next
/// `}`. An unterminated decorator is left in the comment text.
pub fn parse_comment(comment: &str) -> ParsedComment {
    let normalized = comment.replace(&format!("\\{}{{", TAG), &format!("@{}{{", TAG));
    let open = format!("@{}{{", TAG);

    let mut parsed = ParsedComment::default();
    let mut text = String::new();
    let mut rest = normalized.as_str();

    while let Some(start) = rest.find(&open) {
        let body_start = start + open.len();
        let Some(len) = rest[body_start..].find('}') else {
            break;
        };
        text.push_str(&rest[..start]);
        let body = &rest[body_start..body_start + len];
        if let Some(decorator) = parse_decorator(body) {
            trace!(?decorator, "Parsed decorator");
            parsed.decorators.push(decorator);
        }
        rest = &rest[body_start + len + 1..];
    }
    text.push_str(rest);

    parsed.text = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    parsed
}
