//! Test infrastructure for the search compiler.
//!
//! Provides a seeded parameter registry, an in-memory cache-miss resolver
//! that counts database round trips, SQL shape assertions and a harness
//! running one test body per dialect.

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;
pub mod harness;

// Re-export commonly used items
pub use assertions::*;
pub use fixtures::*;
pub use harness::{DialectContext, TEST_HINT};
