use std::sync::Arc;

use maestro_domain::config::Config;
use maestro_providers::ProviderRegistry;
use maestro_retrieval::{DocIndexer, RetrievalEngine};
use maestro_sessions::ContextStore;

use crate::runtime::AgentRuntime;

/// Shared application state passed to all API handlers.
///
/// Everything is constructed once at startup and passed by reference —
/// no global singletons, so tests can assemble their own state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<ContextStore>,
    pub llm: Arc<ProviderRegistry>,
    pub engine: Arc<RetrievalEngine>,
    pub indexer: Arc<DocIndexer>,
    pub runtime: Arc<AgentRuntime>,
}
