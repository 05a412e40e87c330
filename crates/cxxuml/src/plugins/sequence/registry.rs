//! Participant registry
//!
//! Owns every participant of one diagram, keyed by its stable id.

use std::collections::HashMap;
use tracing::trace;

use crate::core::names::{split_qualified_name, strip_parameters};
use crate::core::{DiagramError, ParticipantId};

use super::participant::{Participant, ParticipantDetails};

/// Registry of diagram participants, in registration order
#[derive(Debug, Default, Clone)]
pub struct ParticipantRegistry {
    participants: HashMap<ParticipantId, Participant>,
    order: Vec<ParticipantId>,
}

/// Strip whitespace so `f(int, char *)` and `f(int,char*)` compare equal
fn canonical(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant, or return the id of the identical one already present
    ///
    /// Fails with `DuplicateIdentifier` if the id is taken by a different
    /// signature, and with `ContractViolation` if a method arrives before
    /// its owning class.
    pub fn get_or_create(
        &mut self,
        participant: Participant,
    ) -> Result<ParticipantId, DiagramError> {
        let id = participant.id;

        if let Some(existing) = self.participants.get_mut(&id) {
            if existing.signature != participant.signature {
                return Err(DiagramError::DuplicateIdentifier {
                    id,
                    existing: existing.signature.clone(),
                    incoming: participant.signature,
                });
            }
            existing.skip |= participant.skip;
            if existing.location.is_none() {
                existing.location = participant.location;
                existing.end_line = participant.end_line;
            }
            return Ok(id);
        }

        if let ParticipantDetails::Method(method) = &participant.details {
            if !self.participants.contains_key(&method.class_id) {
                return Err(DiagramError::contract_violation(format!(
                    "Class '{}' of method '{}' is not registered",
                    method.class_full_name, participant.full_name
                )));
            }
        }

        trace!(%participant, "Registered participant");
        self.order.push(id);
        self.participants.insert(id, participant);
        Ok(id)
    }

    pub fn lookup(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.participants.contains_key(&id)
    }

    /// Mark a participant as skipped; the flag only ever accumulates
    pub fn mark_skipped(&mut self, id: ParticipantId) {
        if let Some(participant) = self.participants.get_mut(&id) {
            participant.skip = true;
        }
    }

    /// Attach a comment and styles to a participant
    pub fn annotate(&mut self, id: ParticipantId, comment: Option<String>, styles: Vec<String>) {
        if let Some(participant) = self.participants.get_mut(&id) {
            if participant.comment.is_none() {
                participant.comment = comment;
            }
            participant.styles.extend(styles);
        }
    }

    fn match_rank(participant: &Participant, query: &str) -> Option<usize> {
        let with_parameters = query.contains('(');
        let candidate = if with_parameters {
            canonical(&participant.full_name)
        } else {
            canonical(strip_parameters(&participant.full_name))
        };
        let query = canonical(query);
        let query = query.trim_start_matches("::");

        if candidate == query {
            return Some(0);
        }

        let candidate_segments = split_qualified_name(&candidate);
        let query_segments = split_qualified_name(query);
        if query_segments.is_empty() || query_segments.len() >= candidate_segments.len() {
            return None;
        }
        let tail = &candidate_segments[candidate_segments.len() - query_segments.len()..];
        if tail == query_segments.as_slice() {
            Some(candidate_segments.len() - query_segments.len())
        } else {
            None
        }
    }

    /// Find the participant best matching a (possibly partially) qualified name
    ///
    /// An exact full name match wins. Otherwise the query must match the
    /// trailing `::` segments of a name, and the closest match wins. A query
    /// without a parameter list matches any overload.
    pub fn lookup_by_name(&self, name: &str) -> Option<ParticipantId> {
        self.order
            .iter()
            .filter_map(|id| {
                let participant = self.participants.get(id)?;
                Self::match_rank(participant, name).map(|rank| (rank, *id))
            })
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, id)| id)
    }

    /// Participants accepted by `filter` that match `name` most closely
    ///
    /// Every overload at the closest rank is kept, in registration order.
    pub fn lookup_closest_by_name<F>(&self, name: &str, filter: F) -> Vec<ParticipantId>
    where
        F: Fn(ParticipantId) -> bool,
    {
        let ranked: Vec<(usize, ParticipantId)> = self
            .order
            .iter()
            .filter(|id| filter(**id))
            .filter_map(|id| {
                let participant = self.participants.get(id)?;
                Self::match_rank(participant, name).map(|rank| (rank, *id))
            })
            .collect();
        let closest = ranked.iter().map(|(rank, _)| *rank).min();
        ranked
            .into_iter()
            .filter(|(rank, _)| Some(*rank) == closest)
            .map(|(_, id)| id)
            .collect()
    }

    /// All participants matching `name`, in registration order
    pub fn lookup_all_by_name(&self, name: &str) -> Vec<ParticipantId> {
        self.order
            .iter()
            .filter(|id| {
                self.participants
                    .get(id)
                    .and_then(|p| Self::match_rank(p, name))
                    .is_some()
            })
            .copied()
            .collect()
    }

    /// Ids in registration order
    pub fn all_ids(&self) -> &[ParticipantId] {
        &self.order
    }

    /// Participants in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.order.iter().filter_map(|id| self.participants.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.participants.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CallableDecl, ClassDecl};

    fn registry_with_methods() -> (ParticipantRegistry, ParticipantId, ParticipantId) {
        let mut registry = ParticipantRegistry::new();
        let class = Participant::from_class(&ClassDecl::new("ns::A")).unwrap();
        let class_id = registry.get_or_create(class).unwrap();

        let add_int = CallableDecl::method("ns::A", "add").with_parameters(&["int", "int"]);
        let add_double =
            CallableDecl::method("ns::A", "add").with_parameters(&["double", "double"]);
        let class = Some((class_id, "ns::A"));
        let a = registry
            .get_or_create(Participant::from_callable(&add_int, class).unwrap())
            .unwrap();
        let b = registry
            .get_or_create(Participant::from_callable(&add_double, class).unwrap())
            .unwrap();
        (registry, a, b)
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut registry = ParticipantRegistry::new();
        let decl = CallableDecl::function("f");
        let first = registry
            .get_or_create(Participant::from_callable(&decl, None).unwrap())
            .unwrap();
        let second = registry
            .get_or_create(Participant::from_callable(&decl, None).unwrap())
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_identifier() {
        let mut registry = ParticipantRegistry::new();
        let f = Participant::from_callable(&CallableDecl::function("f"), None).unwrap();
        let mut forged = Participant::from_callable(&CallableDecl::function("g"), None).unwrap();
        forged.id = f.id;

        registry.get_or_create(f).unwrap();
        let err = registry.get_or_create(forged).unwrap_err();
        assert!(matches!(err, DiagramError::DuplicateIdentifier { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_method_requires_registered_class() {
        let mut registry = ParticipantRegistry::new();
        let class = Participant::from_class(&ClassDecl::new("A")).unwrap();
        let method =
            Participant::from_callable(&CallableDecl::method("A", "run"), Some((class.id, "A")))
                .unwrap();
        let err = registry.get_or_create(method).unwrap_err();
        assert!(matches!(err, DiagramError::ContractViolation { .. }));
    }

    #[test]
    fn test_lookup_by_exact_and_suffix() {
        let (registry, a, b) = registry_with_methods();
        assert_eq!(registry.lookup_by_name("ns::A::add(int,int)"), Some(a));
        assert_eq!(registry.lookup_by_name("A::add(double, double)"), Some(b));
        assert_eq!(registry.lookup_by_name("add(int,int)"), Some(a));
        assert_eq!(registry.lookup_by_name("s::A::add(int,int)"), None);
        assert_eq!(registry.lookup_by_name("ns::A::add(char)"), None);
    }

    #[test]
    fn test_lookup_without_parameters_matches_overloads() {
        let (registry, a, b) = registry_with_methods();
        assert_eq!(registry.lookup_all_by_name("A::add"), vec![a, b]);
        assert_eq!(registry.lookup_by_name("ns::A::add"), Some(a));
    }

    #[test]
    fn test_class_lookup() {
        let (registry, _, _) = registry_with_methods();
        let class = registry.lookup_by_name("ns::A").unwrap();
        assert_eq!(registry.lookup(class).unwrap().type_name(), "class");
        assert_eq!(registry.all_ids()[0], class);
    }

    #[test]
    fn test_skip_accumulates() {
        let mut registry = ParticipantRegistry::new();
        let decl = CallableDecl::function("f");
        let id = registry
            .get_or_create(Participant::from_callable(&decl, None).unwrap())
            .unwrap();
        registry.mark_skipped(id);
        registry
            .get_or_create(Participant::from_callable(&decl, None).unwrap())
            .unwrap();
        assert!(registry.lookup(id).unwrap().skip);
    }
}
