//! Rendering of search domains into SQL.
//!
//! [`SqlRenderer`] walks the nodes of a [`SearchDomain`](crate::domain::SearchDomain)
//! and assembles one statement per query kind. Per-node SQL lives in the
//! handlers; forward and reverse chains are resolved into nested sub-selects
//! by the chain resolver.

mod chain;
mod context;
mod handlers;
mod renderer;

pub use renderer::SqlRenderer;
