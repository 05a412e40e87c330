//! Diagram trait tying a model, its builder and its renderers together

use super::config::DiagramConfig;
use super::{Database, DiagramKind, ModelBuilder, OutputFormat, Renderer};

/// Text renderer usable behind a trait object
pub type BoxedRenderer<D> = Box<dyn Renderer<D, Output = String>>;

/// A diagram type supported by the generator
pub trait Diagram {
    type Database: Database;
    type Builder: ModelBuilder<Self::Database>;

    fn create_builder(name: &str, config: &DiagramConfig) -> Self::Builder;

    /// Empty model carrying the diagram's directives and metadata
    fn create_database(name: &str, config: &DiagramConfig) -> Self::Database;

    fn create_renderer(
        format: OutputFormat,
        config: &DiagramConfig,
    ) -> BoxedRenderer<Self::Database>;

    fn kind() -> DiagramKind;

    fn name() -> &'static str;

    fn version() -> &'static str;
}
