//! The maestro gateway: HTTP surface and agentic runtime.
//!
//! A request flows classify → plan → execute → synthesize. The executor
//! calls the downstream tool services (and the in-process retrieval
//! engine) with per-session caching and bounded re-planning; the
//! streaming endpoint mirrors progress as a to-do checklist.

pub mod api;
pub mod cli;
pub mod runtime;
pub mod state;
