//! Core abstractions for diagram generation
//!
//! Every diagram type provides a model implementing [`Database`], a
//! [`ModelBuilder`] filling it from AST events and one [`Renderer`] per
//! output format, bundled by a [`Diagram`] implementation.

mod builder;
mod chumsky_utils;
pub mod config;
mod database;
pub mod decorators;
mod diagram;
mod error;
pub mod event;
mod ids;
pub mod logging;
pub mod names;
mod renderer;
pub mod thread_pool;
mod types;

pub use builder::*;
pub use database::*;
pub use diagram::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use logging::*;
pub use renderer::*;
pub use thread_pool::*;
pub use types::*;
