//! Diagram type implementations
//!
//! Each plugin implements the core traits for one diagram type. The
//! orchestrator runs them for every configured diagram.

pub mod orchestrator;
pub mod sequence;

pub use orchestrator::*;
pub use sequence::*;
