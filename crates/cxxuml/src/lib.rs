//! cxxuml - UML sequence diagrams from C++ AST events
//!
//! The library reconstructs the call graph of a C++ program from a stream of
//! AST visitation events and renders it as PlantUML, Mermaid or JSON.
//!
//! # Quick Start
//!
//! ```rust
//! use cxxuml::{build_sequence, render_sequence, AstEvent, CallableDecl, OutputFormat};
//!
//! let events = vec![
//!     AstEvent::FunctionEnter(CallableDecl::function("tmain")),
//!     AstEvent::CallEnter {
//!         callee: CallableDecl::function("helper"),
//!         location: None,
//!         comment: None,
//!     },
//!     AstEvent::CallLeave,
//!     AstEvent::FunctionLeave,
//! ];
//!
//! let model = build_sequence(&events, "example").unwrap();
//! let puml = render_sequence(&model, OutputFormat::PlantUml).unwrap();
//! assert!(puml.contains("helper()"));
//! ```
//!
//! # Advanced Usage
//!
//! Diagrams described in a TOML config file are generated by the
//! [`Orchestrator`](plugins::Orchestrator), which builds them in parallel
//! and writes one file per diagram and output format.
//!
//! ```rust,no_run
//! use cxxuml::prelude::*;
//!
//! let config = Config::load(".cxxuml.toml").unwrap();
//! let report = Orchestrator::new(config).generate(&[]).unwrap();
//! for path in &report.generated {
//!     println!("{}", path.display());
//! }
//! ```

pub mod core;
pub mod plugins;

pub use core::*;

use crate::core::config::DiagramConfig;
use crate::plugins::sequence::{
    renderer_for, RenderOptions, SequenceDatabase, SequenceDiagram, SequenceModelBuilder,
    VisitorOptions,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::config::{Config, DiagramConfig, Location, MethodArguments};
    pub use crate::core::{
        AstEvent, CallableDecl, ClassDecl, ControlKind, Database, Diagram, DiagramError,
        DiagramKind, MessageKind, ModelBuilder, OutputFormat, ParticipantId, Renderer,
    };
    pub use crate::plugins::orchestrator::{GenerationReport, Orchestrator};
    pub use crate::plugins::sequence::{
        JsonRenderer, MermaidRenderer, Participant, PlantUmlRenderer, RenderOptions,
        SequenceDatabase, SequenceDiagram, SequenceModelBuilder,
    };
}

/// Build a finalized sequence model from AST events with default settings
///
/// Decorators are matched against `name`.
pub fn build_sequence(events: &[AstEvent], name: &str) -> anyhow::Result<SequenceDatabase> {
    let mut database = SequenceDatabase::new(name);
    SequenceModelBuilder::new(VisitorOptions::new(name)).build(events, &mut database)?;
    Ok(database)
}

/// Render a sequence model with default render options
pub fn render_sequence(model: &SequenceDatabase, format: OutputFormat) -> anyhow::Result<String> {
    renderer_for(format, RenderOptions::default()).render(model)
}

/// Render a sequence model with the render options of `config`
pub fn render_sequence_with(
    model: &SequenceDatabase,
    format: OutputFormat,
    config: &DiagramConfig,
) -> anyhow::Result<String> {
    SequenceDiagram::create_renderer(format, config).render(model)
}
