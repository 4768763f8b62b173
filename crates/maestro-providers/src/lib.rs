//! LLM provider adapters for maestro.
//!
//! The rest of the system needs exactly two capabilities — `chat(prompt)
//! -> text` and `embed(texts) -> vectors` — behind one trait. Adapters
//! exist for OpenAI-compatible endpoints and Azure OpenAI; a disabled
//! registry keeps the gateway running on its fallback paths.

pub mod embeddings;
pub mod openai_compat;
pub mod registry;
pub mod traits;

pub use embeddings::EmbeddingGateway;
pub use openai_compat::OpenAiCompatProvider;
pub use registry::ProviderRegistry;
pub use traits::{ChatMessage, ChatRequest, LlmProvider};
