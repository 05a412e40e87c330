//! Mermaid sequence diagram output

use anyhow::Result;
use std::fmt::Write;
use tracing::{debug, span, Level};

use crate::core::{MessageKind, MessageScope};

use super::database::SequenceDatabase;
use super::renderer::{walk, RenderOptions, Step};

const INDENT: &str = "    ";

/// Renders a sequence model as a Mermaid `sequenceDiagram`
#[derive(Debug, Clone, Default)]
pub struct MermaidRenderer {
    options: RenderOptions,
}

/// Escape a participant name for a Mermaid label
fn participant_name(name: &str) -> String {
    name.replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('{', "&lbrace;")
        .replace('}', "&rbrace;")
}

/// `;` terminates a Mermaid statement
fn message_text(text: &str) -> String {
    text.replace(';', "&#59;")
}

fn note_text(text: &str) -> String {
    message_text(text.trim()).replace('\n', "<br/>")
}

impl MermaidRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    fn line(out: &mut String, keyword: &str, text: Option<&str>) -> std::fmt::Result {
        match text {
            Some(text) if !text.is_empty() => {
                writeln!(out, "{}{} {}", INDENT, keyword, message_text(text))
            }
            _ => writeln!(out, "{}{}", INDENT, keyword),
        }
    }

    fn step(&self, out: &mut String, step: &Step) -> std::fmt::Result {
        match step {
            Step::Participant(decl) => writeln!(
                out,
                "{}participant {} as {}",
                INDENT,
                decl.alias,
                participant_name(&decl.name)
            )?,
            Step::SequenceStart { .. } | Step::Separator => {}
            Step::Entry { to, text } => {
                writeln!(out, "{}* ->> {} : {}", INDENT, to, message_text(text))?
            }
            Step::EntryReturn { from, text } => writeln!(
                out,
                "{}{} -->> * : {}",
                INDENT,
                from,
                text.as_deref().unwrap_or_default()
            )?,
            Step::Call {
                from, to, text, scope, ..
            } => {
                let text = message_text(text);
                let label = if *scope == MessageScope::Condition {
                    format!("[{}]", text)
                } else {
                    text
                };
                writeln!(out, "{}{} ->> {} : {}", INDENT, from, to, label)?;
            }
            Step::Return { from, to, text } => writeln!(
                out,
                "{}{} -->> {} : {}",
                INDENT,
                from,
                to,
                text.as_deref().unwrap_or_default()
            )?,
            Step::Activate(alias) => writeln!(out, "{}activate {}", INDENT, alias)?,
            Step::Deactivate(alias) => writeln!(out, "{}deactivate {}", INDENT, alias)?,
            Step::BlockBegin { kind, text } => match kind {
                MessageKind::While | MessageKind::For | MessageKind::Do => {
                    Self::line(out, "loop", text.as_deref())?
                }
                MessageKind::Try => Self::line(out, "critical", None)?,
                MessageKind::Switch => Self::line(out, "alt", None)?,
                _ => Self::line(out, "alt", text.as_deref())?,
            },
            Step::BlockBranch { kind, text } => match kind {
                MessageKind::Catch => Self::line(out, "option", text.as_deref())?,
                _ => Self::line(out, "else", text.as_deref())?,
            },
            Step::BlockEnd { .. } => Self::line(out, "end", None)?,
            Step::Marker { kind, from, text } => {
                let text = match text {
                    Some(text) => format!("{} {}", kind, note_text(text)),
                    None => kind.to_string(),
                };
                writeln!(out, "{}note over {}: {}", INDENT, from, text)?;
            }
            Step::Note {
                participant,
                position,
                text,
            } => writeln!(
                out,
                "{}note {} {}: {}",
                INDENT,
                position.placement(),
                participant,
                note_text(text)
            )?,
        }
        Ok(())
    }
}

impl crate::core::Renderer<SequenceDatabase> for MermaidRenderer {
    type Output = String;

    fn render(&self, database: &SequenceDatabase) -> Result<Self::Output> {
        let render_span = span!(Level::INFO, "render_mermaid", diagram = database.name());
        let _enter = render_span.enter();

        let steps = walk(database, &self.options)?;
        let mut out = String::from("sequenceDiagram\n");
        if let Some(title) = database.title() {
            writeln!(out, "{}title {}", INDENT, title)?;
        }
        if let Some(comment) = database.comment() {
            for line in comment.lines() {
                writeln!(out, "{}%% {}", INDENT, line)?;
            }
        }

        // The diagram boundary is a participant of its own in Mermaid
        let has_entry = steps
            .iter()
            .any(|s| matches!(s, Step::Entry { .. } | Step::EntryReturn { .. }));
        let mut boundary_declared = false;
        for step in &steps {
            if has_entry && !boundary_declared && !matches!(step, Step::Participant(_)) {
                writeln!(out, "{}participant *", INDENT)?;
                boundary_declared = true;
            }
            self.step(&mut out, step)?;
        }

        debug!(bytes = out.len(), "Rendered Mermaid");
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "mermaid"
    }

    fn version(&self) -> &'static str {
        "0.1.0"
    }

    fn format(&self) -> &'static str {
        "mermaid"
    }
}
