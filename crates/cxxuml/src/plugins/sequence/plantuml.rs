//! PlantUML sequence diagram output

use anyhow::Result;
use std::fmt::Write;
use tracing::{debug, span, Level};

use crate::core::{MessageKind, MessageScope};

use super::database::SequenceDatabase;
use super::renderer::{walk, ParticipantDecl, RenderOptions, Step};

/// Renders a sequence model as PlantUML
#[derive(Debug, Clone, Default)]
pub struct PlantUmlRenderer {
    options: RenderOptions,
}

impl PlantUmlRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    fn participant(&self, out: &mut String, decl: &ParticipantDecl) -> std::fmt::Result {
        let keyword = match decl.kind {
            "file" => "collections",
            _ => "participant",
        };
        write!(out, "{} \"{}\" as {}", keyword, escape(&decl.name), decl.alias)?;
        for style in &decl.styles {
            write!(out, " {}", style)?;
        }
        writeln!(out)?;
        if let Some(comment) = &decl.comment {
            writeln!(out, "note over {} : {}", decl.alias, note_text(comment))?;
        }
        Ok(())
    }

    fn step(&self, out: &mut String, step: &Step) -> std::fmt::Result {
        match step {
            Step::Participant(decl) => self.participant(out, decl)?,
            Step::SequenceStart { .. } => {}
            Step::Separator => writeln!(out, "====")?,
            Step::Entry { to, text } => writeln!(out, "[-> {} : {}", to, text)?,
            Step::EntryReturn { from, text } => match text {
                Some(text) => writeln!(out, "[<-- {} : //{}//", from, text)?,
                None => writeln!(out, "[<-- {}", from)?,
            },
            Step::Call {
                from,
                to,
                text,
                is_static,
                scope,
                ..
            } => {
                let mut label = if *is_static {
                    format!("__{}__", text)
                } else {
                    text.clone()
                };
                if *scope == MessageScope::Condition {
                    label = format!("**[**{}**]**", label);
                }
                writeln!(out, "{} -> {} : {}", from, to, label)?;
            }
            Step::Return { from, to, text } => match text {
                Some(text) => writeln!(out, "{} --> {} : //{}//", from, to, text)?,
                None => writeln!(out, "{} --> {}", from, to)?,
            },
            Step::Activate(alias) => writeln!(out, "activate {}", alias)?,
            Step::Deactivate(alias) => writeln!(out, "deactivate {}", alias)?,
            Step::BlockBegin { kind, text } => {
                let keyword = match kind {
                    MessageKind::While | MessageKind::For | MessageKind::Do => "loop",
                    MessageKind::Try => "group try",
                    MessageKind::Switch => "group switch",
                    _ => "alt",
                };
                line_with_text(out, keyword, text.as_deref())?;
            }
            Step::BlockBranch { text, .. } => line_with_text(out, "else", text.as_deref())?,
            Step::BlockEnd { .. } => writeln!(out, "end")?,
            Step::Marker { kind, from, text } => {
                line_with_text(out, &format!("note over {} : {}", from, kind), text.as_deref())?
            }
            Step::Note {
                participant,
                position,
                text,
            } => writeln!(
                out,
                "note {} {} : {}",
                position.placement(),
                participant,
                note_text(text)
            )?,
        }
        Ok(())
    }
}

fn line_with_text(out: &mut String, keyword: &str, text: Option<&str>) -> std::fmt::Result {
    match text {
        Some(text) if !text.is_empty() => writeln!(out, "{} {}", keyword, text),
        _ => writeln!(out, "{}", keyword),
    }
}

fn escape(name: &str) -> String {
    name.replace('"', "\\\"")
}

fn note_text(text: &str) -> String {
    text.trim().replace('\n', "\\n")
}

impl crate::core::Renderer<SequenceDatabase> for PlantUmlRenderer {
    type Output = String;

    fn render(&self, database: &SequenceDatabase) -> Result<Self::Output> {
        let render_span = span!(Level::INFO, "render_plantuml", diagram = database.name());
        let _enter = render_span.enter();

        let steps = walk(database, &self.options)?;
        let mut out = String::from("@startuml\n");
        if let Some(title) = database.title() {
            writeln!(out, "title {}", title)?;
        }
        if let Some(comment) = database.comment() {
            for line in comment.lines() {
                writeln!(out, "' {}", line)?;
            }
        }
        for step in &steps {
            self.step(&mut out, step)?;
        }
        out.push_str("@enduml\n");

        debug!(bytes = out.len(), "Rendered PlantUML");
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "plantuml"
    }

    fn version(&self) -> &'static str {
        "0.1.0"
    }

    fn format(&self) -> &'static str {
        "plantuml"
    }
}
