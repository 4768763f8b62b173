//! Shared domain types for maestro.
//!
//! Everything the other crates agree on lives here: the error taxonomy,
//! the configuration tree, the plan/task/observation model, the intent
//! taxonomy, and the tool registry.

pub mod config;
pub mod error;
pub mod intent;
pub mod plan;
pub mod tool;

pub use error::{Error, Result};
