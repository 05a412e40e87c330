//! Renderer trait
//!
//! Renderers turn a finalized diagram model into a text format such as
//! PlantUML, Mermaid or JSON.

use anyhow::Result;

use super::Database;

/// Produces diagram output from a model
pub trait Renderer<D: Database>: Send + Sync {
    type Output;

    /// Render the complete diagram
    fn render(&self, database: &D) -> Result<Self::Output>;

    fn name(&self) -> &'static str;

    fn version(&self) -> &'static str;

    /// Name of the generated format
    fn format(&self) -> &'static str;
}
