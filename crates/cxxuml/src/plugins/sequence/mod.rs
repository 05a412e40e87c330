//! Sequence diagram plugin
//!
//! Reconstructs call sequences from AST visitation events:
//!
//! ```text
//! AstEvent stream -> SequenceVisitor -> SequenceDatabase -> walk -> PlantUML / Mermaid / JSON
//! ```
//!
//! The visitor records one activity per function body. Directives
//! (`from`, `to`, `from_to`) select which activities the renderers expand.

mod activity;
mod blocks;
mod chains;
mod context;
mod database;
mod json;
mod mermaid;
mod message;
mod participant;
mod plantuml;
mod registry;
mod renderer;
mod visitor;

pub use activity::{Activity, ActivityStore};
pub use blocks::{BlockStep, BlockTracker};
pub use chains::MessageChain;
pub use context::{CallContext, ControlFrame, ExpansionPath, PendingCall};
pub use database::SequenceDatabase;
pub use json::JsonRenderer;
pub use mermaid::MermaidRenderer;
pub use message::{Message, MessageNote};
pub use participant::{
    ClassInfo, ClassView, FunctionInfo, FunctionView, LambdaInfo, LambdaView, MessageRenderMode,
    MethodInfo, MethodView, Participant, ParticipantDetails, ParticipantFacet,
};
pub use plantuml::PlantUmlRenderer;
pub use registry::ParticipantRegistry;
pub use renderer::{walk, ParticipantDecl, RenderOptions, SequenceKind, Step};
pub use visitor::{SequenceModelBuilder, SequenceVisitor, VisitorOptions};

use crate::core::config::DiagramConfig;
use crate::core::{BoxedRenderer, Diagram, DiagramKind, OutputFormat};

/// Renderer for `format` using explicit render options
pub fn renderer_for(
    format: OutputFormat,
    options: RenderOptions,
) -> BoxedRenderer<SequenceDatabase> {
    match format {
        OutputFormat::PlantUml => Box::new(PlantUmlRenderer::new(options)),
        OutputFormat::Mermaid => Box::new(MermaidRenderer::new(options)),
        OutputFormat::Json => Box::new(JsonRenderer::new(options)),
    }
}

/// Sequence diagram implementation
pub struct SequenceDiagram;

impl Diagram for SequenceDiagram {
    type Database = SequenceDatabase;
    type Builder = SequenceModelBuilder;

    fn create_builder(name: &str, config: &DiagramConfig) -> Self::Builder {
        SequenceModelBuilder::from_config(name, config)
    }

    fn create_database(name: &str, config: &DiagramConfig) -> Self::Database {
        let mut database = SequenceDatabase::new(name);
        database.apply_config(config);
        database
    }

    fn create_renderer(
        format: OutputFormat,
        config: &DiagramConfig,
    ) -> BoxedRenderer<Self::Database> {
        renderer_for(format, RenderOptions::from(config))
    }

    fn kind() -> DiagramKind {
        DiagramKind::Sequence
    }

    fn name() -> &'static str {
        "sequence"
    }

    fn version() -> &'static str {
        "0.1.0"
    }
}
