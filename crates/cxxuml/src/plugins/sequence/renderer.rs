//! Diagram walk shared by all sequence renderers
//!
//! [`walk`] turns a finalized model plus its directives into a flat list of
//! format independent [`Step`]s. Each renderer only has to print steps.

use std::collections::HashSet;
use tracing::{debug, span, warn, Level};

use crate::core::config::DiagramConfig;
use crate::core::decorators::NotePosition;
use crate::core::{DiagramError, MessageKind, MessageScope, ParticipantId};

use super::blocks::{BlockStep, BlockTracker};
use super::context::ExpansionPath;
use super::database::SequenceDatabase;
use super::message::Message;
use super::participant::{MessageRenderMode, Participant, ParticipantDetails};

/// Presentation settings of one diagram
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub generate_return_types: bool,
    pub message_mode: MessageRenderMode,
    pub generate_condition_statements: bool,
    pub combine_free_functions_into_file_participants: bool,
    pub fold_repeated_activities: bool,
    pub participants_order: Vec<String>,
}

impl From<&DiagramConfig> for RenderOptions {
    fn from(config: &DiagramConfig) -> Self {
        Self {
            generate_return_types: config.generate_return_types,
            message_mode: config.generate_method_arguments.into(),
            generate_condition_statements: config.generate_condition_statements,
            combine_free_functions_into_file_participants: config
                .combine_free_functions_into_file_participants,
            fold_repeated_activities: config.fold_repeated_activities,
            participants_order: config.participants_order.clone(),
        }
    }
}

/// A participant as it appears in the output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantDecl {
    pub id: ParticipantId,
    pub alias: String,
    pub name: String,
    pub kind: &'static str,
    pub comment: Option<String>,
    pub styles: Vec<String>,
}

/// Which directive produced a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceKind {
    FromTo,
    To,
    From,
    /// No directive; an activity nobody calls
    Root,
}

impl SequenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceKind::FromTo => "from_to",
            SequenceKind::To => "to",
            SequenceKind::From => "from",
            SequenceKind::Root => "root",
        }
    }
}

/// One output instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// First appearance of a participant
    Participant(ParticipantDecl),
    SequenceStart {
        kind: SequenceKind,
        start: String,
    },
    /// Boundary between two chains of the same `from_to` directive
    Separator,
    /// Incoming call from outside the diagram
    Entry {
        to: String,
        text: String,
    },
    EntryReturn {
        from: String,
        text: Option<String>,
    },
    Call {
        from: String,
        to: String,
        text: String,
        is_static: bool,
        scope: MessageScope,
        return_type: Option<String>,
    },
    Return {
        from: String,
        to: String,
        text: Option<String>,
    },
    Activate(String),
    Deactivate(String),
    BlockBegin {
        kind: MessageKind,
        text: Option<String>,
    },
    BlockBranch {
        kind: MessageKind,
        text: Option<String>,
    },
    /// Closes the block opened by `kind`
    BlockEnd {
        kind: MessageKind,
    },
    /// Coroutine suspension point
    Marker {
        kind: MessageKind,
        from: String,
        text: Option<String>,
    },
    Note {
        participant: String,
        position: NotePosition,
        text: String,
    },
}

/// Walk the model and produce the steps of the whole diagram
///
/// Fails with `EmptyDiagram` if there are no messages at all, and with the
/// `from` / `to` resolution errors if a directive names nothing.
pub fn walk(model: &SequenceDatabase, options: &RenderOptions) -> Result<Vec<Step>, DiagramError> {
    let walk_span = span!(Level::DEBUG, "walk_sequence", diagram = model.name());
    let _enter = walk_span.enter();

    if model.is_empty() {
        return Err(DiagramError::empty_diagram(model.name()));
    }

    let mut walker = Walker {
        model,
        options,
        generated: HashSet::new(),
        expanded: HashSet::new(),
        steps: Vec::new(),
    };
    walker.participants_order();
    walker.from_to()?;
    walker.to()?;
    walker.from()?;
    if model.from().is_empty() && model.to().is_empty() && model.from_to().is_empty() {
        walker.roots();
    }

    debug!(steps = walker.steps.len(), "Walked sequence model");
    Ok(walker.steps)
}

/// Per render state
struct Walker<'a> {
    model: &'a SequenceDatabase,
    options: &'a RenderOptions,
    /// Ids of the participants already declared
    generated: HashSet<ParticipantId>,
    /// Activities already expanded, for `fold_repeated_activities`
    expanded: HashSet<ParticipantId>,
    steps: Vec<Step>,
}

impl<'a> Walker<'a> {
    fn participant(&self, id: ParticipantId) -> Option<&'a Participant> {
        self.model.registry().lookup(id)
    }

    /// Free functions rendered as their file, if combining is enabled
    fn file_participant(&self, participant: &Participant) -> Option<Participant> {
        if !self.options.combine_free_functions_into_file_participants
            || !participant.is_free_function()
        {
            return None;
        }
        participant.source_file().map(Participant::file)
    }

    fn alias(&self, participant: &Participant) -> String {
        if let ParticipantDetails::Method(method) = &participant.details {
            return method.class_id.alias();
        }
        match self.file_participant(participant) {
            Some(file) => file.alias(),
            None => participant.alias(),
        }
    }

    fn declare_as(&mut self, shown: &Participant) {
        if !self.generated.insert(shown.id) {
            return;
        }
        self.steps.push(Step::Participant(ParticipantDecl {
            id: shown.id,
            alias: shown.alias(),
            name: shown.full_name.clone(),
            kind: shown.type_name(),
            comment: shown.comment.clone(),
            styles: shown.styles.clone(),
        }));
    }

    /// Declare the participant a callable is drawn as, once
    fn declare(&mut self, participant: &'a Participant) {
        if let ParticipantDetails::Method(method) = &participant.details {
            match self.participant(method.class_id) {
                Some(class) => self.declare_as(class),
                None => debug!(class = %method.class_id, "Method of unknown class"),
            }
            return;
        }
        match self.file_participant(participant) {
            Some(file) => self.declare_as(&file),
            None => self.declare_as(participant),
        }
    }

    fn participants_order(&mut self) {
        for name in &self.options.participants_order {
            match self.model.registry().lookup_by_name(name) {
                Some(id) => {
                    if let Some(participant) = self.participant(id) {
                        self.declare(participant);
                    }
                }
                None => {
                    warn!(participant = %name, "Cannot find participant from 'participants_order'")
                }
            }
        }
    }

    fn needs_entry(&self, participant: &Participant) -> bool {
        participant.is_method() || self.options.combine_free_functions_into_file_participants
    }

    fn entry(&mut self, start: &'a Participant) {
        if self.needs_entry(start) {
            let to = self.alias(start);
            self.steps.push(Step::Entry {
                to,
                text: start.message_name(self.options.message_mode),
            });
        }
    }

    /// Emit one call; `None` if an endpoint is unknown
    fn call(&mut self, message: &Message) -> Option<(String, String)> {
        let (Some(from), Some(to)) =
            (self.participant(message.from), self.participant(message.to))
        else {
            debug!(
                from = %message.from,
                to = %message.to,
                "Skipping call with unknown participant"
            );
            return None;
        };
        self.declare(from);
        self.declare(to);

        let from_alias = self.alias(from);
        let to_alias = self.alias(to);
        if let Some(comment) = &message.comment {
            self.steps.push(Step::Note {
                participant: from_alias.clone(),
                position: comment.position,
                text: comment.text.clone(),
            });
        }
        self.steps.push(Step::Call {
            from: from_alias.clone(),
            to: to_alias.clone(),
            text: to.message_name(self.options.message_mode),
            is_static: message.is_static,
            scope: message.scope,
            return_type: message.return_type.clone(),
        });
        Some((from_alias, to_alias))
    }

    fn chain(&mut self, kind: SequenceKind, chain: &[Message]) {
        let Some(first) = chain.first() else {
            return;
        };
        let Some(start) = self.participant(first.from) else {
            debug!(start = %first.from, "Chain starts at unknown participant");
            return;
        };
        self.steps.push(Step::SequenceStart {
            kind,
            start: start.full_name.clone(),
        });
        self.declare(start);
        self.entry(start);
        for message in chain {
            self.call(message);
        }
    }

    fn from_to(&mut self) -> Result<(), DiagramError> {
        for (from, to) in self.model.from_to() {
            let (from_ids, to_ids) = self.model.resolve_from_to(from, to)?;
            let mut first = true;
            for from_id in &from_ids {
                for to_id in &to_ids {
                    for chain in self.model.get_all_from_to_message_chains(Some(*from_id), *to_id) {
                        if !first {
                            self.steps.push(Step::Separator);
                        }
                        first = false;
                        self.chain(SequenceKind::FromTo, &chain);
                    }
                }
            }
            if first {
                debug!(%from, %to, "No call chain connects the 'from_to' ends");
            }
        }
        Ok(())
    }

    fn to(&mut self) -> Result<(), DiagramError> {
        for location in self.model.to() {
            for to_id in self.model.resolve_to(location)? {
                for chain in self.model.get_all_from_to_message_chains(None, to_id) {
                    self.chain(SequenceKind::To, &chain);
                }
            }
        }
        Ok(())
    }

    fn from(&mut self) -> Result<(), DiagramError> {
        for location in self.model.from() {
            for id in self.model.resolve_from(location)? {
                self.sequence(SequenceKind::From, id);
            }
        }
        Ok(())
    }

    fn roots(&mut self) {
        let mut roots = self.model.root_activities();
        if roots.is_empty() {
            roots = self
                .model
                .sequences()
                .iter()
                .filter(|a| !a.is_empty())
                .map(|a| a.from)
                .collect();
        }
        for id in roots {
            self.sequence(SequenceKind::Root, id);
        }
    }

    /// A full sequence starting at the activity of `id`
    fn sequence(&mut self, kind: SequenceKind, id: ParticipantId) {
        let Some(start) = self.participant(id) else {
            debug!(start = %id, "Sequence starts at unknown participant");
            return;
        };
        self.steps.push(Step::SequenceStart {
            kind,
            start: start.full_name.clone(),
        });
        self.declare(start);
        let alias = self.alias(start);
        self.entry(start);
        self.steps.push(Step::Activate(alias.clone()));

        let mut path = ExpansionPath::new();
        path.enter(id);
        self.expanded.insert(id);
        self.activity(id, &mut path);

        if self.needs_entry(start) && !start.is_void() {
            self.steps.push(Step::EntryReturn {
                from: alias.clone(),
                text: self.return_text(start.return_type()),
            });
        }
        self.steps.push(Step::Deactivate(alias));
    }

    fn return_text(&self, return_type: Option<&str>) -> Option<String> {
        if self.options.generate_return_types {
            return_type.map(str::to_string)
        } else {
            None
        }
    }

    fn block_text(&self, message: &Message) -> Option<String> {
        let text = message.text()?;
        match message.kind {
            // Caught types and case labels identify the branch
            MessageKind::Catch | MessageKind::Case => Some(text.to_string()),
            _ if self.options.generate_condition_statements => Some(text.to_string()),
            _ => None,
        }
    }

    fn activity(&mut self, id: ParticipantId, path: &mut ExpansionPath) {
        let Some(activity) = self.model.get_activity(id) else {
            return;
        };
        let messages = &activity.messages;
        let mut tracker = BlockTracker::new();
        let mut index = 0;

        while index < messages.len() {
            let message = &messages[index];
            if message.is_call() {
                let response = messages
                    .get(index + 1)
                    .filter(|r| r.is_return() && r.from == message.to && r.to == message.from);
                if response.is_some() {
                    index += 1;
                }
                self.call_with_activity(message, response, path);
            } else if message.kind.is_coroutine() {
                if let Some(from) = self.participant(message.from) {
                    let from = self.alias(from);
                    self.steps.push(Step::Marker {
                        kind: message.kind,
                        from,
                        text: message.text().map(str::to_string),
                    });
                }
            } else if !message.is_return() {
                match tracker.step(message.kind) {
                    BlockStep::Open => self.steps.push(Step::BlockBegin {
                        kind: message.kind,
                        text: self.block_text(message),
                    }),
                    BlockStep::Branch => self.steps.push(Step::BlockBranch {
                        kind: message.kind,
                        text: self.block_text(message),
                    }),
                    BlockStep::Close { implicit } => {
                        for kind in implicit {
                            self.steps.push(Step::BlockEnd { kind });
                        }
                        if let Some(kind) = message.kind.block_begin() {
                            self.steps.push(Step::BlockEnd { kind });
                        }
                    }
                    BlockStep::Stray => {
                        debug!(
                            kind = %message.kind,
                            participant = %id,
                            "Skipping stray block marker"
                        )
                    }
                    BlockStep::Other => {}
                }
            }
            index += 1;
        }

        for kind in tracker.finish() {
            self.steps.push(Step::BlockEnd { kind });
        }
    }

    fn call_with_activity(
        &mut self,
        call: &Message,
        response: Option<&Message>,
        path: &mut ExpansionPath,
    ) {
        let Some((from_alias, to_alias)) = self.call(call) else {
            return;
        };
        self.steps.push(Step::Activate(to_alias.clone()));

        let folded = self.options.fold_repeated_activities && self.expanded.contains(&call.to);
        if self.model.get_activity(call.to).is_some() && !folded && path.enter(call.to) {
            self.expanded.insert(call.to);
            self.activity(call.to, path);
            path.leave();
        }

        if let Some(response) = response {
            if call.from != call.to {
                let return_type = response.return_type.as_deref().or(call.return_type.as_deref());
                self.steps.push(Step::Return {
                    from: to_alias.clone(),
                    to: from_alias,
                    text: self.return_text(return_type),
                });
            }
        }
        self.steps.push(Step::Deactivate(to_alias));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Location;
    use crate::core::{AstEvent, CallableDecl, ModelBuilder};
    use crate::plugins::sequence::SequenceModelBuilder;

    fn model(config: &DiagramConfig, events: &[AstEvent]) -> SequenceDatabase {
        let mut db = SequenceDatabase::new("walk");
        db.apply_config(config);
        SequenceModelBuilder::from_config("walk", config)
            .build(events, &mut db)
            .unwrap();
        db
    }

    fn recursion_events() -> Vec<AstEvent> {
        let f = CallableDecl::function("f").with_return_type("int");
        vec![
            AstEvent::FunctionEnter(CallableDecl::function("tmain")),
            AstEvent::CallEnter {
                callee: f.clone(),
                location: None,
                comment: None,
            },
            AstEvent::CallLeave,
            AstEvent::FunctionLeave,
            AstEvent::FunctionEnter(f.clone()),
            AstEvent::CallEnter {
                callee: f,
                location: None,
                comment: None,
            },
            AstEvent::CallLeave,
            AstEvent::FunctionLeave,
        ]
    }

    fn calls(steps: &[Step]) -> Vec<&str> {
        steps
            .iter()
            .filter_map(|s| match s {
                Step::Call { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_empty_model_is_an_error() {
        let db = SequenceDatabase::new("empty");
        let err = walk(&db, &RenderOptions::default()).unwrap_err();
        assert!(matches!(err, DiagramError::EmptyDiagram { .. }));
    }

    #[test]
    fn test_recursion_is_not_expanded_twice() {
        let config = DiagramConfig::sequence("unused.jsonl");
        let db = model(&config, &recursion_events());
        let steps = walk(&db, &RenderOptions::from(&config)).unwrap();
        // tmain -> f, then f -> f once, without expanding f again
        assert_eq!(calls(&steps), vec!["f()", "f()"]);
        let returns = steps.iter().filter(|s| matches!(s, Step::Return { .. })).count();
        assert_eq!(returns, 1);
    }

    #[test]
    fn test_unresolved_from_fails() {
        let mut config = DiagramConfig::sequence("unused.jsonl");
        config.from = vec![Location::function("nonexistent::fn()")];
        let db = model(&config, &recursion_events());
        let err = walk(&db, &RenderOptions::from(&config)).unwrap_err();
        assert!(matches!(err, DiagramError::InvalidSequenceFromCondition { .. }));
    }

    #[test]
    fn test_condition_text_is_optional() {
        let events = vec![
            AstEvent::FunctionEnter(CallableDecl::function("tmain")),
            AstEvent::ControlEnter {
                kind: crate::core::ControlKind::If,
                token: 1,
                condition: Some("x > 0".to_string()),
                location: None,
            },
            AstEvent::CallEnter {
                callee: CallableDecl::function("g"),
                location: None,
                comment: None,
            },
            AstEvent::CallLeave,
            AstEvent::ControlLeave {
                kind: crate::core::ControlKind::If,
                token: 1,
            },
            AstEvent::FunctionLeave,
        ];
        let mut config = DiagramConfig::sequence("unused.jsonl");
        let db = model(&config, &events);

        let steps = walk(&db, &RenderOptions::from(&config)).unwrap();
        assert!(steps.contains(&Step::BlockBegin {
            kind: MessageKind::If,
            text: None
        }));

        config.generate_condition_statements = true;
        let steps = walk(&db, &RenderOptions::from(&config)).unwrap();
        assert!(steps.contains(&Step::BlockBegin {
            kind: MessageKind::If,
            text: Some("x > 0".to_string())
        }));
        assert!(steps.contains(&Step::BlockEnd { kind: MessageKind::If }));
    }

    #[test]
    fn test_participants_order_comes_first() {
        let mut config = DiagramConfig::sequence("unused.jsonl");
        config.participants_order = vec!["f()".to_string(), "missing()".to_string()];
        let db = model(&config, &recursion_events());
        let steps = walk(&db, &RenderOptions::from(&config)).unwrap();
        match &steps[0] {
            Step::Participant(decl) => assert_eq!(decl.name, "f()"),
            other => panic!("unexpected first step {:?}", other),
        }
    }

    #[test]
    fn test_unknown_callee_is_skipped() {
        let mut db = SequenceDatabase::new("walk");
        let tmain = Participant::from_callable(&CallableDecl::function("tmain"), None).unwrap();
        let tmain = db.registry_mut().get_or_create(tmain).unwrap();
        db.activities_mut()
            .append_message(tmain, Message::call(tmain, ParticipantId::new(99)));

        let steps = walk(&db, &RenderOptions::default()).unwrap();
        assert!(calls(&steps).is_empty());
    }
}
