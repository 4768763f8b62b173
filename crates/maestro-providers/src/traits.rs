use maestro_domain::error::Result;
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One message of conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// A provider-agnostic chat completion request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Prior conversation, oldest first. The current user message goes
    /// last.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature. `None` uses the configured default.
    pub temperature: Option<f32>,
    /// Max completion tokens. `None` uses the configured default.
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// A single-turn prompt with no history.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage {
                role: "user".into(),
                content: text.into(),
            }],
            ..Self::default()
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait every chat/embedding adapter implements.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request and return the assistant text.
    async fn chat(&self, req: ChatRequest) -> Result<String>;

    /// Generate one embedding vector per input text.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;
}
