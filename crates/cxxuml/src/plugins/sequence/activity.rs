//! Activities: the messages emitted while control resides in one participant

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::core::{MessageKind, ParticipantId};

use super::blocks::{BlockStep, BlockTracker};
use super::message::Message;

/// Ordered messages of one participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub from: ParticipantId,
    pub messages: Vec<Message>,
}

/// Calls and coroutine suspension points keep an enclosing block alive
fn is_block_content(message: &Message) -> bool {
    message.is_call() || message.kind.is_coroutine()
}

impl Activity {
    pub fn new(from: ParticipantId) -> Self {
        Self {
            from,
            messages: Vec::new(),
        }
    }

    /// Call messages only, in order
    pub fn calls(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_call())
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop calls rejected by `keep_call` together with the return that follows them
    pub fn retain_calls<F>(&mut self, mut keep_call: F) -> usize
    where
        F: FnMut(&Message) -> bool,
    {
        let before = self.messages.len();
        let mut kept: Vec<Message> = Vec::with_capacity(before);
        let mut dropped_call: Option<(ParticipantId, ParticipantId)> = None;

        for message in self.messages.drain(..) {
            if message.is_call() {
                if keep_call(&message) {
                    dropped_call = None;
                    kept.push(message);
                } else {
                    dropped_call = Some((message.from, message.to));
                }
                continue;
            }
            if message.is_return() {
                if let Some((caller, callee)) = dropped_call.take() {
                    if message.from == callee && message.to == caller {
                        continue;
                    }
                }
            } else {
                dropped_call = None;
            }
            kept.push(message);
        }

        self.messages = kept;
        before - self.messages.len()
    }

    /// Remove blocks without calls and stray markers, close unclosed blocks
    pub fn collapse_empty_blocks(&mut self) {
        struct Level {
            start: usize,
            kind: MessageKind,
            has_content: bool,
        }

        let from = self.from;
        let mut out: Vec<Message> = Vec::with_capacity(self.messages.len());
        let mut levels: Vec<Level> = Vec::new();
        let mut tracker = BlockTracker::new();

        // Closes the innermost level, keeping it only if it has content
        fn close(
            out: &mut Vec<Message>,
            levels: &mut Vec<Level>,
            end: Option<Message>,
            from: ParticipantId,
        ) {
            let Some(level) = levels.pop() else {
                return;
            };
            if level.has_content {
                let end = end.or_else(|| {
                    level
                        .kind
                        .block_end()
                        .map(|kind| Message::marker(kind, from))
                });
                if let Some(end) = end {
                    out.push(end);
                }
                if let Some(parent) = levels.last_mut() {
                    parent.has_content = true;
                }
            } else {
                out.truncate(level.start);
            }
        }

        for message in self.messages.drain(..) {
            match tracker.step(message.kind) {
                BlockStep::Open => {
                    levels.push(Level {
                        start: out.len(),
                        kind: message.kind,
                        has_content: false,
                    });
                    out.push(message);
                }
                BlockStep::Branch => out.push(message),
                BlockStep::Close { implicit } => {
                    for _ in implicit {
                        close(&mut out, &mut levels, None, from);
                    }
                    close(&mut out, &mut levels, Some(message), from);
                }
                BlockStep::Stray => {
                    debug!(
                        kind = %message.kind,
                        participant = %from,
                        "Dropping stray block marker"
                    );
                }
                BlockStep::Other => {
                    if is_block_content(&message) {
                        if let Some(level) = levels.last_mut() {
                            level.has_content = true;
                        }
                    }
                    out.push(message);
                }
            }
        }
        for _ in tracker.finish() {
            close(&mut out, &mut levels, None, from);
        }

        self.messages = out;
    }
}

/// All activities of one diagram, in creation order
#[derive(Debug, Clone, Default)]
pub struct ActivityStore {
    activities: Vec<Activity>,
    index: HashMap<ParticipantId, usize>,
}

impl ActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The activity of `id`, created on first use
    pub fn begin_activity(&mut self, id: ParticipantId) -> &mut Activity {
        let position = match self.index.get(&id) {
            Some(position) => *position,
            None => {
                trace!(participant = %id, "Creating activity");
                self.activities.push(Activity::new(id));
                let position = self.activities.len() - 1;
                self.index.insert(id, position);
                position
            }
        };
        &mut self.activities[position]
    }

    pub fn append_message(&mut self, id: ParticipantId, message: Message) {
        trace!(%message, "Appending message");
        self.begin_activity(id).messages.push(message);
    }

    /// Append a `case` unless it directly follows another one
    ///
    /// Consecutive case labels share a body, so only the first one is kept.
    pub fn add_case(&mut self, id: ParticipantId, message: Message) {
        let activity = self.begin_activity(id);
        if activity
            .messages
            .last()
            .is_some_and(|m| m.kind == MessageKind::Case)
        {
            debug!(participant = %id, label = %message.text, "Dropping fallthrough case");
            return;
        }
        activity.messages.push(message);
    }

    /// Close a block, or remove it entirely if nothing was called inside it
    ///
    /// Scans back from the end of the activity: reaching the opening marker
    /// first means the block is empty and everything from the marker on is
    /// erased; reaching a call first means the end marker is appended.
    pub fn end_block(&mut self, id: ParticipantId, end: Message, fold_empty: bool) {
        let Some(begin) = end.kind.block_begin() else {
            debug!(kind = %end.kind, "Not a block end marker");
            return;
        };
        let Some(activity) = self.get_activity_mut(id) else {
            debug!(participant = %id, kind = %end.kind, "Block end without activity");
            return;
        };

        if !fold_empty {
            activity.messages.push(end);
            return;
        }

        let messages = &mut activity.messages;
        for position in (0..messages.len()).rev() {
            let message = &messages[position];
            if message.kind == begin {
                trace!(participant = %id, kind = %begin, "Folding empty block");
                messages.truncate(position);
                return;
            }
            if is_block_content(message) {
                messages.push(end);
                return;
            }
        }
        debug!(participant = %id, kind = %end.kind, "Block end without matching begin");
    }

    pub fn get_activity(&self, id: ParticipantId) -> Option<&Activity> {
        self.index.get(&id).map(|position| &self.activities[*position])
    }

    pub fn get_activity_mut(&mut self, id: ParticipantId) -> Option<&mut Activity> {
        let position = *self.index.get(&id)?;
        self.activities.get_mut(position)
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.index.contains_key(&id)
    }

    /// Activities in creation order
    pub fn sequences(&self) -> &[Activity] {
        &self.activities
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Activity> {
        self.activities.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    pub fn clear(&mut self) {
        self.activities.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(v: u64) -> ParticipantId {
        ParticipantId::new(v)
    }

    fn kinds(activity: &Activity) -> Vec<MessageKind> {
        activity.messages.iter().map(|m| m.kind).collect()
    }

    #[test]
    fn test_begin_activity_returns_same_object() {
        let mut store = ActivityStore::new();
        store.begin_activity(id(1));
        store.append_message(id(1), Message::call(id(1), id(2)));
        store.begin_activity(id(1));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_activity(id(1)).unwrap().messages.len(), 1);
        assert!(store.get_activity(id(2)).is_none());
    }

    #[test]
    fn test_empty_block_is_folded() {
        let mut store = ActivityStore::new();
        store.append_message(id(1), Message::call(id(1), id(2)));
        store.append_message(id(1), Message::marker(MessageKind::If, id(1)));
        store.append_message(id(1), Message::marker(MessageKind::Else, id(1)));
        store.end_block(id(1), Message::marker(MessageKind::IfEnd, id(1)), true);
        assert_eq!(kinds(store.get_activity(id(1)).unwrap()), vec![MessageKind::Call]);
    }

    #[test]
    fn test_block_with_call_is_closed() {
        let mut store = ActivityStore::new();
        store.append_message(id(1), Message::marker(MessageKind::While, id(1)));
        store.append_message(id(1), Message::call(id(1), id(2)));
        store.end_block(id(1), Message::marker(MessageKind::WhileEnd, id(1)), true);
        assert_eq!(
            kinds(store.get_activity(id(1)).unwrap()),
            vec![MessageKind::While, MessageKind::Call, MessageKind::WhileEnd]
        );
    }

    #[test]
    fn test_no_folding_keeps_empty_block() {
        let mut store = ActivityStore::new();
        store.append_message(id(1), Message::marker(MessageKind::For, id(1)));
        store.end_block(id(1), Message::marker(MessageKind::ForEnd, id(1)), false);
        assert_eq!(store.get_activity(id(1)).unwrap().messages.len(), 2);
    }

    #[test]
    fn test_fallthrough_case_dropped() {
        let mut store = ActivityStore::new();
        store.append_message(id(1), Message::marker(MessageKind::Switch, id(1)));
        store.add_case(id(1), Message::marker(MessageKind::Case, id(1)).with_text("1"));
        store.add_case(id(1), Message::marker(MessageKind::Case, id(1)).with_text("2"));
        let activity = store.get_activity(id(1)).unwrap();
        assert_eq!(activity.messages.len(), 2);
        assert_eq!(activity.messages[1].text, "1");
    }

    #[test]
    fn test_retain_calls_drops_matching_return() {
        let mut activity = Activity::new(id(1));
        activity.messages.push(Message::call(id(1), id(2)));
        activity.messages.push(Message::response(id(2), id(1)));
        activity.messages.push(Message::call(id(1), id(3)));
        activity.messages.push(Message::response(id(3), id(1)));

        let removed = activity.retain_calls(|m| m.to != id(2));
        assert_eq!(removed, 2);
        assert_eq!(activity.messages[0].to, id(3));
        assert_eq!(activity.messages.len(), 2);
    }

    #[test]
    fn test_collapse_after_filtering() {
        let mut activity = Activity::new(id(1));
        activity.messages.push(Message::marker(MessageKind::If, id(1)));
        activity.messages.push(Message::marker(MessageKind::Else, id(1)));
        activity.messages.push(Message::marker(MessageKind::Try, id(1)));
        activity.messages.push(Message::call(id(1), id(3)));
        activity.messages.push(Message::marker(MessageKind::TryEnd, id(1)));
        activity.messages.push(Message::marker(MessageKind::IfEnd, id(1)));
        activity.messages.push(Message::marker(MessageKind::While, id(1)));
        activity.messages.push(Message::marker(MessageKind::WhileEnd, id(1)));

        activity.collapse_empty_blocks();
        assert_eq!(
            kinds(&activity),
            vec![
                MessageKind::If,
                MessageKind::Else,
                MessageKind::Try,
                MessageKind::Call,
                MessageKind::TryEnd,
                MessageKind::IfEnd
            ]
        );
    }

    #[test]
    fn test_collapse_closes_unterminated_block() {
        let mut activity = Activity::new(id(1));
        activity.messages.push(Message::marker(MessageKind::DoEnd, id(1)));
        activity.messages.push(Message::marker(MessageKind::For, id(1)));
        activity.messages.push(Message::call(id(1), id(2)));

        activity.collapse_empty_blocks();
        assert_eq!(
            kinds(&activity),
            vec![MessageKind::For, MessageKind::Call, MessageKind::ForEnd]
        );
    }
}
