//! Control-flow block nesting
//!
//! Tracks which blocks are open while a message list is replayed, so that
//! finalize and the renderers agree on what a stray marker is.

use crate::core::MessageKind;

/// What a marker does to the open blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockStep {
    /// A block was opened
    Open,
    /// A new branch of the innermost block
    Branch,
    /// A block was closed; `implicit` lists the inner blocks that were
    /// still open and got closed with it, innermost first
    Close { implicit: Vec<MessageKind> },
    /// A branch or end marker without a matching open block
    Stray,
    /// Not a block marker
    Other,
}

#[derive(Debug, Clone, Default)]
pub struct BlockTracker {
    open: Vec<MessageKind>,
}

impl BlockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one message kind and update the open blocks
    pub fn step(&mut self, kind: MessageKind) -> BlockStep {
        if kind.is_block_begin() {
            self.open.push(kind);
            return BlockStep::Open;
        }

        if kind.is_block_branch() {
            return match (self.open.last(), kind.block_begin()) {
                (Some(top), Some(begin)) if *top == begin => BlockStep::Branch,
                _ => BlockStep::Stray,
            };
        }

        if kind.is_block_end() {
            let Some(begin) = kind.block_begin() else {
                return BlockStep::Stray;
            };
            let Some(position) = self.open.iter().rposition(|k| *k == begin) else {
                return BlockStep::Stray;
            };
            let mut implicit: Vec<MessageKind> = self.open.drain(position..).skip(1).collect();
            implicit.reverse();
            return BlockStep::Close { implicit };
        }

        BlockStep::Other
    }

    /// Close everything still open, innermost first
    pub fn finish(&mut self) -> Vec<MessageKind> {
        let mut open: Vec<MessageKind> = self.open.drain(..).collect();
        open.reverse();
        open
    }

    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn innermost(&self) -> Option<MessageKind> {
        self.open.last().copied()
    }
}
