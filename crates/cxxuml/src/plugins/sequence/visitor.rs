//! AST event visitor
//!
//! Turns a stream of [`AstEvent`]s into the activities and messages of a
//! [`SequenceDatabase`].

use anyhow::Result;
use tracing::{debug, span, trace, Level};

use crate::core::config::{DiagramConfig, NamespaceFilter};
use crate::core::decorators::{parse_comment, DecoratorKind, NotePosition, ParsedComment};
use crate::core::names::split_qualified_name;
use crate::core::{
    AstEvent, CallableDecl, CallableKind, ClassDecl, ControlKind, DiagramError, MessageKind,
    MessageScope, ModelBuilder, ParticipantId, SourceLocation,
};

use super::context::{CallContext, ControlFrame, PendingCall};
use super::database::SequenceDatabase;
use super::message::{Message, MessageNote};
use super::participant::{MessageRenderMode, MethodView, Participant, ParticipantDetails};

/// Settings the visitor needs from the diagram config
#[derive(Debug, Clone)]
pub struct VisitorOptions {
    /// Name decorators are matched against
    pub diagram_name: String,
    pub fold_empty_blocks: bool,
    pub include: NamespaceFilter,
    pub exclude: NamespaceFilter,
}

impl VisitorOptions {
    pub fn new(diagram_name: impl Into<String>) -> Self {
        Self {
            diagram_name: diagram_name.into(),
            fold_empty_blocks: true,
            include: NamespaceFilter::default(),
            exclude: NamespaceFilter::default(),
        }
    }

    pub fn from_config(diagram_name: &str, config: &DiagramConfig) -> Self {
        Self {
            diagram_name: diagram_name.to_string(),
            fold_empty_blocks: config.fold_empty_blocks,
            include: config.include.clone(),
            exclude: config.exclude.clone(),
        }
    }

    /// True if a participant with this full name passes the namespace filters
    pub fn includes(&self, full_name: &str) -> bool {
        !self.exclude.matches(full_name)
            && (self.include.is_empty() || self.include.matches(full_name))
    }
}

/// Split `ns::A<int>` into a class declaration with template arguments
fn class_decl_for(name: &str) -> ClassDecl {
    let name = name.trim();
    match name.find('<') {
        Some(open) if name.ends_with('>') => {
            let mut decl = ClassDecl::new(&name[..open]);
            decl.template_arguments = Some(name[open + 1..name.len() - 1].to_string());
            decl
        }
        _ => ClassDecl::new(name),
    }
}

/// Enclosing scope of a qualified name, `ns::A` for `ns::A::run`
fn parent_scope(qualified_name: &str) -> Option<String> {
    let segments = split_qualified_name(qualified_name);
    if segments.len() < 2 {
        return None;
    }
    Some(segments[..segments.len() - 1].join("::"))
}

/// Note of a comment; plain text without a `note` decorator goes over the participant
fn comment_note(parsed: &ParsedComment, diagram: &str) -> Option<MessageNote> {
    match parsed.note(diagram) {
        Some((position, text)) => Some(MessageNote::new(position, text)),
        None if !parsed.text.is_empty() => {
            Some(MessageNote::new(NotePosition::Over, parsed.text.as_str()))
        }
        None => None,
    }
}

/// Builds a sequence model one event at a time
pub struct SequenceVisitor<'a> {
    model: &'a mut SequenceDatabase,
    context: CallContext,
    options: VisitorOptions,
}

impl<'a> SequenceVisitor<'a> {
    pub fn new(model: &'a mut SequenceDatabase, options: VisitorOptions) -> Self {
        Self {
            model,
            context: CallContext::new(),
            options,
        }
    }

    /// Handle one event
    ///
    /// Only contract violations are returned as errors; malformed nesting
    /// in the event stream is logged and ignored.
    pub fn visit(&mut self, event: &AstEvent) -> Result<(), DiagramError> {
        trace!(?event, "Visiting event");
        match event {
            AstEvent::ClassDecl(decl) => {
                self.register_class(decl)?;
            }
            AstEvent::FunctionEnter(decl) => self.on_function_enter(decl)?,
            AstEvent::FunctionLeave => self.context.clear_caller(),
            AstEvent::LambdaEnter(decl) => self.on_lambda_enter(decl)?,
            AstEvent::LambdaLeave => {
                self.context.leave_lambda()?;
            }
            AstEvent::CallEnter {
                callee,
                location,
                comment,
            } => self.on_call_enter(callee, location.as_ref(), comment.as_deref())?,
            AstEvent::CallLeave => self.on_call_leave(),
            AstEvent::ControlEnter {
                kind,
                token,
                condition,
                location,
            } => self.on_control_enter(*kind, *token, condition.as_deref(), location.as_ref()),
            AstEvent::ControlBranch { kind, token, text } => {
                self.on_control_branch(*kind, *token, text.as_deref())
            }
            AstEvent::ControlLeave { kind, token } => self.on_control_leave(*kind, *token),
            AstEvent::ConditionEnter => self.context.enter_condition(),
            AstEvent::ConditionLeave => self.context.leave_condition(),
            AstEvent::CoAwait { text, location } => {
                self.on_coroutine(MessageKind::CoAwait, text.as_deref(), location.as_ref())
            }
            AstEvent::CoYield { text, location } => {
                self.on_coroutine(MessageKind::CoYield, text.as_deref(), location.as_ref())
            }
            AstEvent::CoReturn { text, location } => {
                self.on_coroutine(MessageKind::CoReturn, text.as_deref(), location.as_ref())
            }
        }
        Ok(())
    }

    pub fn visit_all(&mut self, events: &[AstEvent]) -> Result<(), DiagramError> {
        events.iter().try_for_each(|event| self.visit(event))
    }

    /// Finalize the model once every event has been visited
    pub fn finish(self) {
        let options = self.options;
        self.model
            .finalize(|p| options.includes(&p.full_name), options.fold_empty_blocks);
        self.model.print();
    }

    fn parse_comment(comment: Option<&str>) -> ParsedComment {
        comment.map(parse_comment).unwrap_or_default()
    }

    /// Apply the decorators of a declaration comment to its participant
    fn apply_comment(&mut self, id: ParticipantId, comment: Option<&str>) {
        let Some(comment) = comment else {
            return;
        };
        let parsed = parse_comment(comment);
        let diagram = self.options.diagram_name.as_str();

        if parsed.skip(diagram) {
            debug!(participant = %id, "Skipping participant");
            self.model.registry_mut().mark_skipped(id);
        }
        let styles: Vec<String> = parsed
            .decorators
            .iter()
            .filter(|d| d.applies_to_diagram(diagram))
            .filter_map(|d| match &d.kind {
                DecoratorKind::Style { spec } => Some(spec.clone()),
                _ => None,
            })
            .collect();
        let text = comment_note(&parsed, diagram).map(|note| note.text);
        self.model.registry_mut().annotate(id, text, styles);
    }

    fn register_class(
        &mut self,
        decl: &ClassDecl,
    ) -> Result<(ParticipantId, String), DiagramError> {
        let participant = Participant::from_class(decl)?;
        let full_name = participant.full_name.clone();
        let id = self.model.registry_mut().get_or_create(participant)?;
        self.apply_comment(id, decl.comment.as_deref());
        Ok((id, full_name))
    }

    /// Class of the method the current caller belongs to, for lambdas
    fn enclosing_class(&self) -> Option<(ParticipantId, String)> {
        let caller = self.context.current_caller()?;
        if let Some(method) = self.model.get_participant::<MethodView>(caller) {
            return Some((method.info.class_id, method.info.class_full_name.clone()));
        }
        let participant = self.model.registry().lookup(caller)?;
        match &participant.details {
            ParticipantDetails::Lambda(lambda) => {
                let class_id = lambda.class_id?;
                let class = self.model.registry().lookup(class_id)?;
                Some((class_id, class.full_name.clone()))
            }
            _ => None,
        }
    }

    /// Register a callable, and its class first if it is a method
    fn ensure_callable(&mut self, decl: &CallableDecl) -> Result<ParticipantId, DiagramError> {
        let class = match decl.kind {
            CallableKind::Method => {
                let class_name = decl
                    .class
                    .clone()
                    .or_else(|| parent_scope(&decl.qualified_name));
                match class_name {
                    Some(name) => Some(self.register_class(&class_decl_for(&name))?),
                    None => None,
                }
            }
            CallableKind::Lambda => self.enclosing_class(),
            CallableKind::Function => None,
        };

        let participant = Participant::from_callable(
            decl,
            class.as_ref().map(|(id, name)| (*id, name.as_str())),
        )?;
        let id = self.model.registry_mut().get_or_create(participant)?;
        self.apply_comment(id, decl.comment.as_deref());
        Ok(id)
    }

    fn on_function_enter(&mut self, decl: &CallableDecl) -> Result<(), DiagramError> {
        let function_span = span!(Level::TRACE, "function", name = %decl.qualified_name);
        let _enter = function_span.enter();

        let id = self.ensure_callable(decl)?;
        self.context.clear_caller();
        self.context.set_caller(id);
        self.model.activities_mut().begin_activity(id);
        self.model.add_active_participant(id);
        Ok(())
    }

    fn on_lambda_enter(&mut self, decl: &CallableDecl) -> Result<(), DiagramError> {
        let id = self.ensure_callable(decl)?;
        self.context.enter_lambda(id);
        self.model.activities_mut().begin_activity(id);
        self.model.add_active_participant(id);
        Ok(())
    }

    fn on_call_enter(
        &mut self,
        callee: &CallableDecl,
        location: Option<&SourceLocation>,
        comment: Option<&str>,
    ) -> Result<(), DiagramError> {
        let Some(caller) = self.context.current_caller() else {
            debug!(callee = %callee.qualified_name, "Call outside of any function");
            self.context.push_call(PendingCall {
                message: None,
                returns: None,
            });
            return Ok(());
        };

        let mut callee_id = self.ensure_callable(callee)?;
        let parsed = Self::parse_comment(comment);
        let diagram = self.options.diagram_name.as_str();

        if parsed.skip(diagram) {
            debug!(callee = %callee.qualified_name, "Skipping call");
            self.context.push_call(PendingCall {
                message: None,
                returns: None,
            });
            return Ok(());
        }

        // An explicit `call` decorator names the real target, e.g. behind a function pointer
        let redirect = parsed.decorators.iter().find_map(|d| match &d.kind {
            DecoratorKind::Call { callee } if d.applies_to_diagram(diagram) => {
                Some(callee.as_str())
            }
            _ => None,
        });
        if let Some(target) = redirect {
            match self.model.registry().lookup_by_name(target) {
                Some(id) => callee_id = id,
                None => debug!(target, "Call decorator target not found"),
            }
        }

        let participant = self.model.registry().lookup(callee_id).ok_or_else(|| {
            DiagramError::contract_violation(format!("Callee {} is not registered", callee_id))
        })?;

        let returns = if participant.is_void() {
            None
        } else {
            participant.return_type().map(str::to_string)
        };
        let scope = if self.context.in_condition() {
            MessageScope::Condition
        } else {
            MessageScope::Normal
        };
        let comment = comment_note(&parsed, diagram);

        let message = Message::call(caller, callee_id)
            .with_text(participant.message_name(MessageRenderMode::Full))
            .with_static(participant.is_static())
            .with_scope(scope)
            .with_comment(comment)
            .with_location(location.cloned());

        self.context.push_call(PendingCall {
            message: Some(message),
            returns,
        });
        Ok(())
    }

    /// Record the call once its arguments have been visited
    fn on_call_leave(&mut self) {
        let Some(pending) = self.context.pop_call() else {
            return;
        };
        let Some(message) = pending.message else {
            return;
        };

        let (caller, callee) = (message.from, message.to);
        self.model.add_active_participant(caller);
        self.model.add_active_participant(callee);
        self.model.activities_mut().append_message(caller, message);

        if let Some(return_type) = pending.returns {
            let response = Message::response(callee, caller).with_return_type(Some(return_type));
            self.model.activities_mut().append_message(caller, response);
        }
    }

    fn on_control_enter(
        &mut self,
        kind: ControlKind,
        token: u64,
        condition: Option<&str>,
        location: Option<&SourceLocation>,
    ) {
        let Some(caller) = self.context.current_caller() else {
            debug!(?kind, "Control statement outside of any function");
            return;
        };
        let begin = kind.begin();
        self.context.enter_control_frame(ControlFrame {
            kind: begin,
            token,
            caller,
        });

        let mut marker = Message::marker(begin, caller).with_location(location.cloned());
        if let Some(condition) = condition {
            marker = marker.with_text(condition.trim());
        }
        self.model.activities_mut().append_message(caller, marker);
    }

    fn on_control_branch(&mut self, kind: MessageKind, token: u64, text: Option<&str>) {
        if !kind.is_block_branch() {
            debug!(%kind, "Not a branch marker");
            return;
        }
        let Some(frame) = self.context.current_frame().copied() else {
            debug!(%kind, "Branch without an open control statement");
            return;
        };
        let same_statement = token == 0 || frame.token == 0 || token == frame.token;
        if Some(frame.kind) != kind.block_begin() || !same_statement {
            debug!(%kind, open = %frame.kind, "Branch does not match the open control statement");
            return;
        }

        let marker = Message::marker(kind, frame.caller).with_text(text.unwrap_or("").trim());
        if kind == MessageKind::Case {
            self.model.activities_mut().add_case(frame.caller, marker);
        } else {
            self.model.activities_mut().append_message(frame.caller, marker);
        }
    }

    fn on_control_leave(&mut self, kind: ControlKind, token: u64) {
        let Some(frame) = self.context.leave_control_frame(kind.begin(), token) else {
            return;
        };
        let end = Message::marker(kind.end(), frame.caller);
        self.model
            .activities_mut()
            .end_block(frame.caller, end, self.options.fold_empty_blocks);
    }

    fn on_coroutine(
        &mut self,
        kind: MessageKind,
        text: Option<&str>,
        location: Option<&SourceLocation>,
    ) {
        let Some(caller) = self.context.current_caller() else {
            debug!(%kind, "Coroutine marker outside of any function");
            return;
        };
        let marker = Message::marker(kind, caller)
            .with_text(text.unwrap_or("").trim())
            .with_location(location.cloned());
        self.model.activities_mut().append_message(caller, marker);
    }
}

/// [`ModelBuilder`] running a [`SequenceVisitor`] over a whole event trace
#[derive(Debug, Clone)]
pub struct SequenceModelBuilder {
    options: VisitorOptions,
}

impl SequenceModelBuilder {
    pub fn new(options: VisitorOptions) -> Self {
        Self { options }
    }

    pub fn from_config(diagram_name: &str, config: &DiagramConfig) -> Self {
        Self::new(VisitorOptions::from_config(diagram_name, config))
    }
}

impl ModelBuilder<SequenceDatabase> for SequenceModelBuilder {
    fn build(&self, events: &[AstEvent], database: &mut SequenceDatabase) -> Result<()> {
        let build_span = span!(
            Level::INFO,
            "build_sequence_model",
            diagram = %self.options.diagram_name,
            event_count = events.len()
        );
        let _enter = build_span.enter();

        let mut visitor = SequenceVisitor::new(database, self.options.clone());
        visitor.visit_all(events)?;
        visitor.finish();

        debug!(
            participants = database.registry().len(),
            activities = database.sequences().len(),
            messages = database.message_count(),
            "Sequence model built"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sequence"
    }

    fn version(&self) -> &'static str {
        "0.1.0"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(events: Vec<AstEvent>) -> SequenceDatabase {
        let mut db = SequenceDatabase::new("test");
        SequenceModelBuilder::new(VisitorOptions::new("test"))
            .build(&events, &mut db)
            .unwrap();
        db
    }

    fn call(callee: CallableDecl) -> AstEvent {
        AstEvent::CallEnter {
            callee,
            location: None,
            comment: None,
        }
    }

    fn kinds(db: &SequenceDatabase, id: ParticipantId) -> Vec<MessageKind> {
        db.get_activity(id)
            .unwrap()
            .messages
            .iter()
            .map(|m| m.kind)
            .collect()
    }

    #[test]
    fn test_arguments_are_called_first() {
        let db = build(vec![
            AstEvent::FunctionEnter(CallableDecl::function("tmain")),
            call(CallableDecl::function("a").with_parameters(&["int"])),
            call(CallableDecl::function("b").with_return_type("int")),
            AstEvent::CallLeave,
            AstEvent::CallLeave,
            AstEvent::FunctionLeave,
        ]);
        let tmain = db.registry().lookup_by_name("tmain").unwrap();
        let messages = &db.get_activity(tmain).unwrap().messages;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].text, "b()");
        assert!(messages[1].is_return());
        assert_eq!(messages[2].text, "a(int)");
    }

    #[test]
    fn test_method_registers_class_first() {
        let db = build(vec![
            AstEvent::FunctionEnter(CallableDecl::function("tmain")),
            call(CallableDecl::method("ns::A<int>", "run")),
            AstEvent::CallLeave,
            AstEvent::FunctionLeave,
        ]);
        let class = db.registry().lookup_by_name("ns::A<int>").unwrap();
        let method = db.registry().lookup_by_name("ns::A<int>::run()").unwrap();
        let view = db.get_participant::<MethodView>(method).unwrap();
        assert_eq!(view.info.class_id, class);
        assert!(db.registry().all_ids().iter().position(|id| *id == class)
            < db.registry().all_ids().iter().position(|id| *id == method));
    }

    #[test]
    fn test_condition_scope() {
        let db = build(vec![
            AstEvent::FunctionEnter(CallableDecl::function("tmain")),
            AstEvent::ControlEnter {
                kind: ControlKind::If,
                token: 1,
                condition: Some("ready()".to_string()),
                location: None,
            },
            AstEvent::ConditionEnter,
            call(CallableDecl::function("ready").with_return_type("bool")),
            AstEvent::CallLeave,
            AstEvent::ConditionLeave,
            AstEvent::ControlLeave {
                kind: ControlKind::If,
                token: 1,
            },
            AstEvent::FunctionLeave,
        ]);
        let tmain = db.registry().lookup_by_name("tmain").unwrap();
        let messages = &db.get_activity(tmain).unwrap().messages;
        assert_eq!(messages[0].kind, MessageKind::If);
        assert_eq!(messages[0].text, "ready()");
        assert_eq!(messages[1].scope, MessageScope::Condition);
        assert_eq!(messages.last().unwrap().kind, MessageKind::IfEnd);
    }

    #[test]
    fn test_empty_loop_is_folded() {
        let db = build(vec![
            AstEvent::FunctionEnter(CallableDecl::function("tmain")),
            AstEvent::ControlEnter {
                kind: ControlKind::While,
                token: 0,
                condition: None,
                location: None,
            },
            AstEvent::ControlLeave {
                kind: ControlKind::While,
                token: 0,
            },
            call(CallableDecl::function("f")),
            AstEvent::CallLeave,
            AstEvent::FunctionLeave,
        ]);
        let tmain = db.registry().lookup_by_name("tmain").unwrap();
        assert_eq!(kinds(&db, tmain), vec![MessageKind::Call]);
    }

    #[test]
    fn test_lambda_activity() {
        let lambda = CallableDecl::lambda("tmain()::(lambda)", SourceLocation::new("t.cc", 5, 14));
        let db = build(vec![
            AstEvent::FunctionEnter(CallableDecl::function("tmain")),
            call(CallableDecl::function("apply")),
            AstEvent::LambdaEnter(lambda),
            call(CallableDecl::function("inner")),
            AstEvent::CallLeave,
            AstEvent::LambdaLeave,
            AstEvent::CallLeave,
            AstEvent::FunctionLeave,
        ]);
        let tmain = db.registry().lookup_by_name("tmain").unwrap();
        let lambda = db.registry().lookup_by_name("tmain()::(lambda)()").unwrap();
        let inner = db.registry().lookup_by_name("inner").unwrap();
        assert_eq!(db.get_activity(lambda).unwrap().messages[0].to, inner);
        assert_eq!(db.get_activity(tmain).unwrap().messages[0].text, "apply()");
    }

    #[test]
    fn test_lambda_underflow_is_an_error() {
        let mut db = SequenceDatabase::new("test");
        let result = SequenceModelBuilder::new(VisitorOptions::new("test"))
            .build(&[AstEvent::LambdaLeave], &mut db);
        let err = result.unwrap_err();
        assert!(err.downcast_ref::<DiagramError>().is_some_and(DiagramError::is_fatal));
    }

    #[test]
    fn test_skip_decorators() {
        let skipped = CallableDecl::function("log").with_comment("@cxxuml{skip}");
        let db = build(vec![
            AstEvent::FunctionEnter(CallableDecl::function("tmain")),
            call(skipped),
            AstEvent::CallLeave,
            AstEvent::CallEnter {
                callee: CallableDecl::function("trace"),
                location: None,
                comment: Some("// @cxxuml{skip:test}".to_string()),
            },
            AstEvent::CallLeave,
            AstEvent::CallEnter {
                callee: CallableDecl::function("kept"),
                location: None,
                comment: Some("// @cxxuml{note[right] Important}".to_string()),
            },
            AstEvent::CallLeave,
            AstEvent::FunctionLeave,
        ]);
        let tmain = db.registry().lookup_by_name("tmain").unwrap();
        let messages = &db.get_activity(tmain).unwrap().messages;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "kept()");
        assert_eq!(
            messages[0].comment,
            Some(MessageNote::new(NotePosition::Right, "Important"))
        );
    }

    #[test]
    fn test_stray_markers_are_ignored() {
        let db = build(vec![
            AstEvent::FunctionEnter(CallableDecl::function("tmain")),
            AstEvent::ControlBranch {
                kind: MessageKind::Else,
                token: 0,
                text: None,
            },
            AstEvent::ControlLeave {
                kind: ControlKind::Try,
                token: 0,
            },
            call(CallableDecl::function("f")),
            AstEvent::CallLeave,
            AstEvent::CallLeave,
            AstEvent::FunctionLeave,
        ]);
        let tmain = db.registry().lookup_by_name("tmain").unwrap();
        assert_eq!(kinds(&db, tmain), vec![MessageKind::Call]);
    }
}
