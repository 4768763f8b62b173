use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which chat/embedding backend to use.
///
/// `disabled` keeps the gateway fully functional: classification falls
/// back to the keyword lexicon and the runtime takes the rule-based
/// branch. API keys are always read from env vars, never from the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmKind {
    Openai,
    AzureOpenai,
    #[default]
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub kind: LlmKind,

    // ── OpenAI-compatible ─────────────────────────────────────────
    #[serde(default = "d_openai_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_openai_base_url")]
    pub base_url: String,
    #[serde(default = "d_chat_model")]
    pub chat_model: String,
    #[serde(default = "d_embedding_model")]
    pub embedding_model: String,

    // ── Azure OpenAI ──────────────────────────────────────────────
    #[serde(default = "d_azure_key_env")]
    pub azure_api_key_env: String,
    #[serde(default)]
    pub azure_endpoint: String,
    #[serde(default)]
    pub azure_chat_deployment: String,
    #[serde(default)]
    pub azure_embedding_deployment: String,
    #[serde(default = "d_azure_api_version")]
    pub azure_api_version: String,

    // ── Sampling ──────────────────────────────────────────────────
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    #[serde(default = "d_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            kind: LlmKind::Disabled,
            api_key_env: d_openai_key_env(),
            base_url: d_openai_base_url(),
            chat_model: d_chat_model(),
            embedding_model: d_embedding_model(),
            azure_api_key_env: d_azure_key_env(),
            azure_endpoint: String::new(),
            azure_chat_deployment: String::new(),
            azure_embedding_deployment: String::new(),
            azure_api_version: d_azure_api_version(),
            temperature: d_temperature(),
            max_tokens: d_max_tokens(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_openai_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn d_openai_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_chat_model() -> String {
    "gpt-4o-mini".into()
}
fn d_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn d_azure_key_env() -> String {
    "AZURE_OPENAI_API_KEY".into()
}
fn d_azure_api_version() -> String {
    "2024-12-01-preview".into()
}
fn d_temperature() -> f32 {
    0.2
}
fn d_max_tokens() -> u32 {
    2000
}
