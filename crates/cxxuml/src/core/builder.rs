//! Model builder trait
//!
//! A builder consumes the AST events of one translation unit and fills a
//! diagram model with what they describe.

use anyhow::Result;

use super::{AstEvent, Database};

/// Builds a diagram model from AST visitation events
pub trait ModelBuilder<D: Database>: Send + Sync {
    /// Visit all `events` and finalize `database`
    fn build(&self, events: &[AstEvent], database: &mut D) -> Result<()>;

    fn name(&self) -> &'static str;

    fn version(&self) -> &'static str;
}
