//! Sequence diagram model
//!
//! Aggregates the participant registry, the activities and the diagram
//! directives. Built by [`SequenceVisitor`](super::SequenceVisitor), read by
//! the renderers.

use anyhow::Result;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, span, trace, Level};

use crate::core::config::{DiagramConfig, Location};
use crate::core::{Database, ParticipantId};

use super::activity::{Activity, ActivityStore};
use super::message::Message;
use super::participant::{Participant, ParticipantFacet};
use super::registry::ParticipantRegistry;

#[derive(Debug, Clone, Default)]
pub struct SequenceDatabase {
    name: String,
    title: Option<String>,
    comment: Option<String>,
    registry: ParticipantRegistry,
    activities: ActivityStore,
    active_participants: Vec<ParticipantId>,
    active_set: HashSet<ParticipantId>,
    from: Vec<Location>,
    to: Vec<Location>,
    from_to: Vec<(Location, Location)>,
}

impl SequenceDatabase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Take over title, comment and directives from a diagram config
    pub fn apply_config(&mut self, config: &DiagramConfig) {
        self.title = config.title.clone();
        self.comment = config.comment.clone();
        self.from = config.from.clone();
        self.to = config.to.clone();
        self.from_to = config.from_to.clone();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn from(&self) -> &[Location] {
        &self.from
    }

    pub fn to(&self) -> &[Location] {
        &self.to
    }

    pub fn from_to(&self) -> &[(Location, Location)] {
        &self.from_to
    }

    pub fn registry(&self) -> &ParticipantRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ParticipantRegistry {
        &mut self.registry
    }

    pub fn activities(&self) -> &ActivityStore {
        &self.activities
    }

    pub fn activities_mut(&mut self) -> &mut ActivityStore {
        &mut self.activities
    }

    /// A typed view of a participant
    ///
    /// ```
    /// use cxxuml::core::{CallableDecl, Database};
    /// use cxxuml::plugins::sequence::{FunctionView, Participant, SequenceDatabase};
    ///
    /// let mut db = SequenceDatabase::new("demo");
    /// let decl = CallableDecl::function("run").with_return_type("int");
    /// let id = db.add_node(Participant::from_callable(&decl, None).unwrap()).unwrap();
    ///
    /// let function = db.get_participant::<FunctionView>(id).unwrap();
    /// assert_eq!(function.info.return_type, "int");
    /// ```
    pub fn get_participant<'a, T: ParticipantFacet<'a>>(&'a self, id: ParticipantId) -> Option<T> {
        self.registry.lookup(id).and_then(T::from_participant)
    }

    pub fn add_active_participant(&mut self, id: ParticipantId) {
        if self.active_set.insert(id) {
            self.active_participants.push(id);
        }
    }

    /// Participants taking part in some message, in order of first appearance
    pub fn active_participants(&self) -> &[ParticipantId] {
        &self.active_participants
    }

    pub fn is_active(&self, id: ParticipantId) -> bool {
        self.active_set.contains(&id)
    }

    pub fn get_activity(&self, id: ParticipantId) -> Option<&Activity> {
        self.activities.get_activity(id)
    }

    /// Activities in creation order
    pub fn sequences(&self) -> &[Activity] {
        self.activities.sequences()
    }

    /// True if there is nothing to render
    pub fn is_empty(&self) -> bool {
        self.activities.sequences().iter().all(Activity::is_empty)
    }

    /// Ids of every participant that is the target of some call
    pub fn call_targets(&self) -> HashSet<ParticipantId> {
        self.sequences()
            .iter()
            .flat_map(|a| a.calls())
            .map(|m| m.to)
            .collect()
    }

    /// Non-empty activities whose participant is never called
    pub fn root_activities(&self) -> Vec<ParticipantId> {
        let targets = self.call_targets();
        self.sequences()
            .iter()
            .filter(|a| !a.is_empty() && !targets.contains(&a.from))
            .map(|a| a.from)
            .collect()
    }

    /// Clean the model up once all events are visited
    ///
    /// Calls to skipped participants, to unknown ids and to participants
    /// rejected by `include` are removed with their returns. Activities of
    /// such participants are emptied. Blocks left without calls collapse
    /// when `fold_empty_blocks` is set. Every call is stamped with the
    /// return type of its callee.
    pub fn finalize<F>(&mut self, include: F, fold_empty_blocks: bool)
    where
        F: Fn(&Participant) -> bool,
    {
        let finalize_span = span!(Level::DEBUG, "finalize", diagram = %self.name);
        let _enter = finalize_span.enter();

        let registry = &self.registry;
        let visible = |id: ParticipantId| {
            registry
                .lookup(id)
                .is_some_and(|p| !p.skip && include(p))
        };

        let mut removed = 0;
        for activity in self.activities.iter_mut() {
            if !visible(activity.from) {
                removed += activity.messages.len();
                activity.messages.clear();
                continue;
            }
            removed += activity.retain_calls(|m| visible(m.to));
            if fold_empty_blocks {
                activity.collapse_empty_blocks();
            }
            for message in activity.messages.iter_mut().filter(|m| m.is_call()) {
                if message.return_type.is_none() {
                    message.return_type = registry
                        .lookup(message.to)
                        .and_then(Participant::return_type)
                        .map(str::to_string);
                }
            }
        }

        let mut referenced = HashSet::new();
        for activity in self.activities.sequences() {
            if !activity.is_empty() {
                referenced.insert(activity.from);
            }
            for message in activity.calls() {
                referenced.insert(message.from);
                referenced.insert(message.to);
            }
        }
        self.active_participants.retain(|id| referenced.contains(id));
        self.active_set.retain(|id| referenced.contains(id));

        debug!(
            removed,
            activities = self.activities.len(),
            participants = self.active_participants.len(),
            "Finalized sequence model"
        );
    }

    /// Full names of participants a diagram can start from
    pub fn list_from_values(&self) -> Vec<String> {
        let names: BTreeSet<String> = self
            .sequences()
            .iter()
            .filter(|a| !a.is_empty())
            .filter_map(|a| self.registry.lookup(a.from))
            .map(|p| p.full_name.clone())
            .collect();
        names.into_iter().collect()
    }

    /// Full names of participants a diagram can end at
    pub fn list_to_values(&self) -> Vec<String> {
        let names: BTreeSet<String> = self
            .call_targets()
            .into_iter()
            .filter_map(|id| self.registry.lookup(id))
            .map(|p| p.full_name.clone())
            .collect();
        names.into_iter().collect()
    }

    /// Dump the model at trace level
    pub fn print(&self) {
        trace!(diagram = %self.name, "--- Sequence diagram model ---");
        for activity in self.sequences() {
            let caller = self
                .registry
                .lookup(activity.from)
                .map(|p| p.full_name.as_str())
                .unwrap_or("<unknown>");
            trace!(id = %activity.from, caller, "Activity");
            for message in &activity.messages {
                let callee = self
                    .registry
                    .lookup(message.to)
                    .map(|p| p.full_name.as_str())
                    .unwrap_or("");
                trace!(%message, callee, "  Message");
            }
        }
    }

    pub fn message_count(&self) -> usize {
        self.sequences().iter().map(|a| a.messages.len()).sum()
    }
}

impl Database for SequenceDatabase {
    type Id = ParticipantId;
    type Node = Participant;
    type Edge = Message;

    fn add_node(&mut self, node: Self::Node) -> Result<Self::Id> {
        Ok(self.registry.get_or_create(node)?)
    }

    /// Append a message to the activity it belongs to
    ///
    /// Returns go to the activity of the caller they return to, everything
    /// else to the activity of its sender.
    fn add_edge(&mut self, edge: Self::Edge) -> Result<()> {
        let owner = if edge.is_return() { edge.to } else { edge.from };
        if owner.is_none() {
            anyhow::bail!("Message '{}' has no owning activity", edge);
        }
        if edge.is_call() {
            self.add_active_participant(edge.from);
            self.add_active_participant(edge.to);
        }
        self.activities.append_message(owner, edge);
        Ok(())
    }

    fn get_node(&self, id: Self::Id) -> Option<&Self::Node> {
        self.registry.lookup(id)
    }

    fn nodes(&self) -> impl Iterator<Item = &Self::Node> {
        self.registry.iter()
    }

    fn edges(&self) -> impl Iterator<Item = &Self::Edge> {
        self.sequences().iter().flat_map(|a| a.messages.iter())
    }

    fn clear(&mut self) {
        self.registry.clear();
        self.activities.clear();
        self.active_participants.clear();
        self.active_set.clear();
    }

    fn node_count(&self) -> usize {
        self.registry.len()
    }

    fn edge_count(&self) -> usize {
        self.message_count()
    }
}
