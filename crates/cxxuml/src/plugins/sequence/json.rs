//! JSON sequence diagram output
//!
//! Blocks are nested: every block holds its branches and every branch
//! holds its own messages.

use anyhow::Result;
use serde_json::{json, Map, Value};
use tracing::{debug, span, Level};

use crate::core::MessageKind;

use super::database::SequenceDatabase;
use super::renderer::{walk, RenderOptions, SequenceKind, Step};

/// Renders a sequence model as a JSON document
#[derive(Debug, Clone, Default)]
pub struct JsonRenderer {
    options: RenderOptions,
}

impl JsonRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }
}

fn block_type(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::While | MessageKind::For | MessageKind::Do => "loop",
        MessageKind::Try => "break",
        _ => "alt",
    }
}

/// An open block and its branches
struct OpenBlock {
    kind: MessageKind,
    branches: Vec<Value>,
    branch: MessageKind,
    text: Option<String>,
    messages: Vec<Value>,
}

impl OpenBlock {
    fn close_branch(&mut self) {
        let mut branch = Map::new();
        branch.insert("type".into(), json!(self.branch));
        if let Some(text) = self.text.take() {
            branch.insert("condition_text".into(), json!(text));
        }
        branch.insert("messages".into(), Value::Array(std::mem::take(&mut self.messages)));
        self.branches.push(Value::Object(branch));
    }

    fn into_value(mut self) -> Value {
        self.close_branch();
        json!({
            "type": block_type(self.kind),
            "name": self.kind,
            "branches": self.branches,
        })
    }
}

/// One sequence under construction
struct SequenceBuilder {
    kind: SequenceKind,
    start: String,
    messages: Vec<Value>,
    blocks: Vec<OpenBlock>,
}

impl SequenceBuilder {
    fn push(&mut self, value: Value) {
        match self.blocks.last_mut() {
            Some(block) => block.messages.push(value),
            None => self.messages.push(value),
        }
    }

    fn close_block(&mut self) {
        if let Some(block) = self.blocks.pop() {
            let value = block.into_value();
            self.push(value);
        }
    }

    fn into_value(mut self) -> Value {
        while !self.blocks.is_empty() {
            self.close_block();
        }
        json!({
            "kind": self.kind.as_str(),
            "start": self.start,
            "messages": self.messages,
        })
    }
}

fn message_value(step: &Step) -> Option<Value> {
    let value = match step {
        Step::Entry { to, text } => json!({ "type": "entry", "to": to, "name": text }),
        Step::EntryReturn { from, text } => {
            json!({ "type": "entry_return", "from": from, "return_type": text })
        }
        Step::Call {
            from,
            to,
            text,
            is_static,
            scope,
            return_type,
        } => json!({
            "type": "message",
            "name": text,
            "from": from,
            "to": to,
            "scope": scope,
            "static": is_static,
            "return_type": return_type,
        }),
        Step::Return { from, to, text } => {
            json!({ "type": "return", "from": from, "to": to, "return_type": text })
        }
        Step::Marker { kind, from, text } => json!({ "type": kind, "from": from, "text": text }),
        Step::Note {
            participant,
            position,
            text,
        } => json!({
            "type": "note",
            "participant": participant,
            "position": position.as_str(),
            "text": text,
        }),
        _ => return None,
    };
    Some(value)
}

impl crate::core::Renderer<SequenceDatabase> for JsonRenderer {
    type Output = String;

    fn render(&self, database: &SequenceDatabase) -> Result<Self::Output> {
        let render_span = span!(Level::INFO, "render_json", diagram = database.name());
        let _enter = render_span.enter();

        let steps = walk(database, &self.options)?;
        let mut participants = Vec::new();
        let mut sequences = Vec::new();
        let mut current: Option<SequenceBuilder> = None;

        for step in &steps {
            match step {
                Step::Participant(decl) => participants.push(json!({
                    "id": decl.id.value().to_string(),
                    "alias": decl.alias,
                    "name": decl.name,
                    "type": decl.kind,
                    "comment": decl.comment,
                    "styles": decl.styles,
                })),
                Step::SequenceStart { kind, start } => {
                    if let Some(done) = current.take() {
                        sequences.push(done.into_value());
                    }
                    current = Some(SequenceBuilder {
                        kind: *kind,
                        start: start.clone(),
                        messages: Vec::new(),
                        blocks: Vec::new(),
                    });
                }
                Step::BlockBegin { kind, text } => {
                    if let Some(sequence) = current.as_mut() {
                        sequence.blocks.push(OpenBlock {
                            kind: *kind,
                            branches: Vec::new(),
                            branch: *kind,
                            text: text.clone(),
                            messages: Vec::new(),
                        });
                    }
                }
                Step::BlockBranch { kind, text } => {
                    if let Some(block) = current.as_mut().and_then(|s| s.blocks.last_mut()) {
                        block.close_branch();
                        block.branch = *kind;
                        block.text = text.clone();
                    }
                }
                Step::BlockEnd { .. } => {
                    if let Some(sequence) = current.as_mut() {
                        sequence.close_block();
                    }
                }
                other => {
                    let value = message_value(other);
                    if let (Some(sequence), Some(value)) = (current.as_mut(), value) {
                        sequence.push(value);
                    }
                }
            }
        }
        if let Some(done) = current.take() {
            sequences.push(done.into_value());
        }

        let document = json!({
            "name": database.name(),
            "diagram_type": "sequence",
            "title": database.title(),
            "comment": database.comment(),
            "participants": participants,
            "sequences": sequences,
        });
        let out = serde_json::to_string_pretty(&document)?;

        debug!(bytes = out.len(), "Rendered JSON");
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "json"
    }

    fn version(&self) -> &'static str {
        "0.1.0"
    }

    fn format(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AstEvent, CallableDecl, ControlKind, ModelBuilder, Renderer};
    use crate::plugins::sequence::SequenceModelBuilder;

    #[test]
    fn test_nested_blocks() {
        let call = |name: &str| AstEvent::CallEnter {
            callee: CallableDecl::function(name),
            location: None,
            comment: None,
        };
        let events = vec![
            AstEvent::FunctionEnter(CallableDecl::function("tmain")),
            AstEvent::ControlEnter {
                kind: ControlKind::If,
                token: 7,
                condition: Some("ready".to_string()),
                location: None,
            },
            call("a"),
            AstEvent::CallLeave,
            AstEvent::ControlBranch {
                kind: MessageKind::Else,
                token: 7,
                text: None,
            },
            call("b"),
            AstEvent::CallLeave,
            AstEvent::ControlLeave {
                kind: ControlKind::If,
                token: 7,
            },
            call("c"),
            AstEvent::CallLeave,
            AstEvent::FunctionLeave,
        ];
        let mut db = SequenceDatabase::new("json");
        SequenceModelBuilder::new(crate::plugins::sequence::VisitorOptions::new("json"))
            .build(&events, &mut db)
            .unwrap();

        let out = JsonRenderer::default().render(&db).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value["name"], "json");
        assert_eq!(value["participants"].as_array().unwrap().len(), 4);
        let messages = value["sequences"][0]["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["type"], "alt");
        assert_eq!(messages[0]["name"], "if");
        let branches = messages[0]["branches"].as_array().unwrap();
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0]["messages"][0]["name"], "a()");
        assert_eq!(branches[1]["type"], "else");
        assert_eq!(branches[1]["messages"][0]["name"], "b()");
        assert_eq!(messages[1]["name"], "c()");
    }
}
