//! Session context for maestro.
//!
//! In-process, non-durable: the store owns every live session, its
//! bounded window of recent turns, and the per-session tool-result
//! cache. A restart drops everything; callers must tolerate absent
//! sessions.

pub mod canon;
pub mod reclaimer;
pub mod store;

pub use canon::canonical_json;
pub use reclaimer::spawn_reclaimer;
pub use store::{ContextStore, ConversationTurn, NewTurn, RecentTurn, SessionContext};
