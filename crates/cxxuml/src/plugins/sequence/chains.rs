//! Call chain extraction
//!
//! Resolves `from` / `to` locations against the model and collects every
//! call chain leading from one participant to another.

use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, span, trace, Level};

use crate::core::config::Location;
use crate::core::{DiagramError, ParticipantId};

use super::database::SequenceDatabase;
use super::message::Message;
use super::participant::Participant;

/// Calls leading from a start participant to an end participant
pub type MessageChain = Vec<Message>;

/// Number of lines covered by a definition
fn body_span(participant: &Participant) -> u32 {
    let start = participant.location.as_ref().map(|l| l.line).unwrap_or(0);
    participant.end_line.unwrap_or(start).saturating_sub(start)
}

impl SequenceDatabase {
    /// Participants matching `location`, restricted to `candidates`
    fn match_location<F>(&self, location: &Location, candidate: F) -> Vec<ParticipantId>
    where
        F: Fn(ParticipantId) -> bool,
    {
        match location {
            Location::Function { function } => {
                self.registry().lookup_closest_by_name(function, candidate)
            }
            Location::File { file, line } => {
                let matching: Vec<(u32, ParticipantId)> = self
                    .registry()
                    .iter()
                    .filter(|p| p.is_callable() && candidate(p.id) && p.contains_line(file, *line))
                    .map(|p| (body_span(p), p.id))
                    .collect();
                // The innermost definition wins, e.g. a lambda over its enclosing function
                let narrowest = matching.iter().map(|(span, _)| *span).min();
                matching
                    .into_iter()
                    .filter(|(span, _)| Some(*span) == narrowest)
                    .map(|(_, id)| id)
                    .collect()
            }
        }
    }

    /// Participants with an activity matching `location`
    pub fn get_from_activity_ids(&self, location: &Location) -> Vec<ParticipantId> {
        self.match_location(location, |id| {
            self.get_activity(id).is_some_and(|a| !a.is_empty())
        })
    }

    /// Participants called somewhere in the model matching `location`
    pub fn get_to_activity_ids(&self, location: &Location) -> Vec<ParticipantId> {
        let targets = self.call_targets();
        self.match_location(location, |id| targets.contains(&id))
    }

    /// Resolve a `from` directive
    pub fn resolve_from(&self, location: &Location) -> Result<Vec<ParticipantId>, DiagramError> {
        let ids = self.get_from_activity_ids(location);
        if ids.is_empty() {
            return Err(DiagramError::invalid_from_condition(
                self.name(),
                format!(
                    "Failed to find participant matching '{}' for 'from' condition",
                    location
                ),
            ));
        }
        Ok(ids)
    }

    /// Resolve a `to` directive
    pub fn resolve_to(&self, location: &Location) -> Result<Vec<ParticipantId>, DiagramError> {
        let ids = self.get_to_activity_ids(location);
        if ids.is_empty() {
            return Err(DiagramError::invalid_to_condition(
                self.name(),
                format!(
                    "Failed to find participant matching '{}' for 'to' condition",
                    location
                ),
            ));
        }
        Ok(ids)
    }

    /// Resolve both ends of a `from_to` directive; the unresolved side picks the error
    pub fn resolve_from_to(
        &self,
        from: &Location,
        to: &Location,
    ) -> Result<(Vec<ParticipantId>, Vec<ParticipantId>), DiagramError> {
        let from_ids = self.resolve_from(from)?;
        let to_ids = self.resolve_to(to)?;
        Ok((from_ids, to_ids))
    }

    /// Participants from which `to` can be reached by following calls
    fn reaching(&self, to: ParticipantId) -> HashSet<ParticipantId> {
        let mut callers: HashMap<ParticipantId, Vec<ParticipantId>> = HashMap::new();
        for activity in self.sequences() {
            for call in activity.calls() {
                callers.entry(call.to).or_default().push(call.from);
            }
        }

        let mut reaching = HashSet::new();
        let mut queue = VecDeque::from([to]);
        while let Some(id) = queue.pop_front() {
            for caller in callers.get(&id).into_iter().flatten() {
                if reaching.insert(*caller) {
                    queue.push_back(*caller);
                }
            }
        }
        reaching
    }

    /// Participants reachable from `starts` by following calls, starts included
    fn reachable_from(&self, starts: &[ParticipantId]) -> HashSet<ParticipantId> {
        let mut reached: HashSet<ParticipantId> = starts.iter().copied().collect();
        let mut queue: VecDeque<ParticipantId> = starts.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            let Some(activity) = self.get_activity(id) else {
                continue;
            };
            for call in activity.calls() {
                if reached.insert(call.to) {
                    queue.push_back(call.to);
                }
            }
        }
        reached
    }

    /// Start participants for chains without an explicit `from`
    ///
    /// Root activities come first. Activities that reach the end participant
    /// but that no root calls into, such as a call cycle nobody enters,
    /// follow in activity order.
    fn chain_starts(&self, reaching: &HashSet<ParticipantId>) -> Vec<ParticipantId> {
        let roots = self.root_activities();
        if roots.is_empty() {
            return self.sequences().iter().map(|a| a.from).collect();
        }

        let covered = self.reachable_from(&roots);
        let mut starts = roots;
        for activity in self.sequences() {
            if reaching.contains(&activity.from)
                && !covered.contains(&activity.from)
                && !starts.contains(&activity.from)
            {
                trace!(start = %activity.from, "Adding start not reached from any root");
                starts.push(activity.from);
            }
        }
        starts
    }

    /// Every call chain from `from` (or from any root activity) to `to`
    ///
    /// Each participant appears at most once per chain, so recursion and
    /// call cycles terminate. Identical chains are reported once.
    pub fn get_all_from_to_message_chains(
        &self,
        from: Option<ParticipantId>,
        to: ParticipantId,
    ) -> Vec<MessageChain> {
        let chains_span = span!(Level::DEBUG, "message_chains", ?from, %to);
        let _enter = chains_span.enter();

        let reaching = self.reaching(to);
        let starts: Vec<ParticipantId> = match from {
            Some(id) => vec![id],
            None => self.chain_starts(&reaching),
        };

        let mut chains: Vec<MessageChain> = Vec::new();
        for start in starts {
            if !reaching.contains(&start) {
                trace!(%start, "Start cannot reach the end participant");
                continue;
            }
            let mut path = vec![start];
            let mut chain = Vec::new();
            self.collect_chains(start, to, &reaching, &mut path, &mut chain, &mut chains);
        }

        debug!(chain_count = chains.len(), "Extracted message chains");
        chains
    }

    fn collect_chains(
        &self,
        current: ParticipantId,
        to: ParticipantId,
        reaching: &HashSet<ParticipantId>,
        path: &mut Vec<ParticipantId>,
        chain: &mut MessageChain,
        chains: &mut Vec<MessageChain>,
    ) {
        let Some(activity) = self.get_activity(current) else {
            return;
        };

        for call in activity.calls() {
            if call.to == to {
                chain.push(call.clone());
                if !chains.contains(chain) {
                    chains.push(chain.clone());
                }
                chain.pop();
                continue;
            }
            if !reaching.contains(&call.to) || path.contains(&call.to) {
                continue;
            }
            path.push(call.to);
            chain.push(call.clone());
            self.collect_chains(call.to, to, reaching, path, chain, chains);
            chain.pop();
            path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CallableDecl, Database};

    fn model(calls: &[(&str, &str)]) -> SequenceDatabase {
        let mut db = SequenceDatabase::new("chains");
        for (from, to) in calls {
            let from = db
                .add_node(Participant::from_callable(&CallableDecl::function(from), None).unwrap())
                .unwrap();
            let to = db
                .add_node(Participant::from_callable(&CallableDecl::function(to), None).unwrap())
                .unwrap();
            db.add_edge(Message::call(from, to)).unwrap();
        }
        db
    }

    fn id(db: &SequenceDatabase, name: &str) -> ParticipantId {
        db.registry().lookup_by_name(name).unwrap()
    }

    #[test]
    fn test_linear_chain() {
        let db = model(&[("a", "b"), ("b", "c")]);
        let chains = db.get_all_from_to_message_chains(Some(id(&db, "a")), id(&db, "c"));
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].len(), 2);
        assert_eq!(chains[0][0].to, id(&db, "b"));
    }

    #[test]
    fn test_branching_chains() {
        let db = model(&[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d"), ("a", "e")]);
        let chains = db.get_all_from_to_message_chains(Some(id(&db, "a")), id(&db, "d"));
        assert_eq!(chains.len(), 2);
    }

    #[test]
    fn test_cycle_terminates() {
        let db = model(&[("a", "b"), ("b", "a"), ("b", "c")]);
        let chains = db.get_all_from_to_message_chains(Some(id(&db, "a")), id(&db, "c"));
        assert_eq!(chains.len(), 1);
        assert!(chains[0].len() <= 3);
    }

    #[test]
    fn test_from_roots() {
        let db = model(&[("main", "a"), ("a", "z"), ("other", "z")]);
        let chains = db.get_all_from_to_message_chains(None, id(&db, "z"));
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0][0].from, id(&db, "main"));
    }

    #[test]
    fn test_cycle_unreached_from_roots() {
        let db = model(&[("main", "other"), ("x", "y"), ("y", "x"), ("y", "z")]);
        let z = id(&db, "z");
        let chains = db.get_all_from_to_message_chains(None, z);
        assert!(!chains.is_empty());
        for chain in &chains {
            assert_eq!(chain.last().unwrap().to, z);
            assert!([id(&db, "x"), id(&db, "y")].contains(&chain[0].from));
        }
        assert!(chains.iter().any(|c| c.len() == 2));
    }

    #[test]
    fn test_overloads_resolve_together() {
        let mut db = SequenceDatabase::new("overloads");
        let add_int = CallableDecl::function("add").with_parameters(&["int"]);
        let add_double = CallableDecl::function("add").with_parameters(&["double"]);
        let add_int = db.add_node(Participant::from_callable(&add_int, None).unwrap()).unwrap();
        let add_double = db
            .add_node(Participant::from_callable(&add_double, None).unwrap())
            .unwrap();
        let g = db
            .add_node(Participant::from_callable(&CallableDecl::function("g"), None).unwrap())
            .unwrap();
        let h = db
            .add_node(Participant::from_callable(&CallableDecl::function("h"), None).unwrap())
            .unwrap();
        db.add_edge(Message::call(add_int, g)).unwrap();
        db.add_edge(Message::call(add_double, h)).unwrap();

        assert_eq!(
            db.get_from_activity_ids(&Location::function("add")),
            vec![add_int, add_double]
        );
        assert_eq!(
            db.get_from_activity_ids(&Location::function("add(double)")),
            vec![add_double]
        );
    }

    #[test]
    fn test_duplicate_calls_reported_once() {
        let db = model(&[("a", "b"), ("a", "b")]);
        let chains = db.get_all_from_to_message_chains(Some(id(&db, "a")), id(&db, "b"));
        assert_eq!(chains.len(), 1);
    }

    #[test]
    fn test_resolution_errors() {
        let db = model(&[("a", "b")]);
        let err = db
            .resolve_from(&Location::function("nonexistent::fn()"))
            .unwrap_err();
        assert!(matches!(err, DiagramError::InvalidSequenceFromCondition { .. }));
        assert!(err.to_string().contains(
            "Failed to find participant matching 'nonexistent::fn()' for 'from' condition"
        ));

        let err = db
            .resolve_from_to(&Location::function("a()"), &Location::function("zz()"))
            .unwrap_err();
        assert!(matches!(err, DiagramError::InvalidSequenceToCondition { .. }));

        // `b` is called but has no activity of its own
        assert!(db.resolve_from(&Location::function("b()")).is_err());
        assert_eq!(db.resolve_to(&Location::function("b")).unwrap().len(), 1);
    }

    #[test]
    fn test_file_location_prefers_innermost() {
        let mut db = SequenceDatabase::new("files");
        let outer = CallableDecl::function("outer").with_location("src/main.cc", 10, Some(30));
        let inner = CallableDecl::function("inner").with_location("src/main.cc", 12, Some(14));
        let callee = CallableDecl::function("callee");
        let outer = db.add_node(Participant::from_callable(&outer, None).unwrap()).unwrap();
        let inner = db.add_node(Participant::from_callable(&inner, None).unwrap()).unwrap();
        let callee = db.add_node(Participant::from_callable(&callee, None).unwrap()).unwrap();
        db.add_edge(Message::call(outer, callee)).unwrap();
        db.add_edge(Message::call(inner, callee)).unwrap();

        assert_eq!(db.get_from_activity_ids(&Location::file("main.cc", 13)), vec![inner]);
        assert_eq!(db.get_from_activity_ids(&Location::file("main.cc", 20)), vec![outer]);
        assert!(db.get_from_activity_ids(&Location::file("main.cc", 40)).is_empty());
    }
}
