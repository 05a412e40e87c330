//! Model storage trait
//!
//! A diagram model is a graph: nodes are the diagram elements (participants,
//! classes) and edges are what connects them (messages, relationships).

use anyhow::Result;

/// Storage layer of a diagram model
///
/// Builders write into it, renderers only read from it.
pub trait Database: Send + Sync {
    /// Stable node identifier
    type Id: Copy + Eq + Send + Sync;

    type Node: Clone + Send + Sync;

    type Edge: Clone + Send + Sync;

    /// Insert a node, or return the id of the identical node already present
    fn add_node(&mut self, node: Self::Node) -> Result<Self::Id>;

    fn add_edge(&mut self, edge: Self::Edge) -> Result<()>;

    fn get_node(&self, id: Self::Id) -> Option<&Self::Node>;

    /// Nodes in insertion order
    fn nodes(&self) -> impl Iterator<Item = &Self::Node>;

    fn edges(&self) -> impl Iterator<Item = &Self::Edge>;

    fn clear(&mut self);

    fn node_count(&self) -> usize;

    fn edge_count(&self) -> usize;
}
