//! Provider registry.
//!
//! Resolves the configured provider at startup. Missing credentials
//! downgrade to the disabled state rather than aborting: the gateway
//! still serves every endpoint through its fallback paths, and LLM
//! calls return a `Provider` error until credentials are configured.

use std::sync::Arc;

use maestro_domain::config::{LlmConfig, LlmKind};
use maestro_domain::error::{Error, Result};

use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::{ChatRequest, LlmProvider};

pub struct ProviderRegistry {
    provider: Option<Arc<dyn LlmProvider>>,
    /// Why the provider is absent (for logs and response meta).
    disabled_reason: Option<String>,
}

impl ProviderRegistry {
    /// Build the registry from the application's [`LlmConfig`].
    /// Credentials are resolved eagerly (env vars are read here).
    pub fn from_config(cfg: &LlmConfig) -> Self {
        match cfg.kind {
            LlmKind::Disabled => Self::disabled("llm.kind = disabled"),
            LlmKind::Openai | LlmKind::AzureOpenai => {
                match OpenAiCompatProvider::from_config(cfg) {
                    Ok(p) => {
                        tracing::info!(provider = p.provider_id(), "LLM provider ready");
                        Self {
                            provider: Some(Arc::new(p)),
                            disabled_reason: None,
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "LLM provider unavailable, running disabled");
                        Self::disabled(e.to_string())
                    }
                }
            }
        }
    }

    pub fn disabled(reason: impl Into<String>) -> Self {
        Self {
            provider: None,
            disabled_reason: Some(reason.into()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub fn disabled_reason(&self) -> Option<&str> {
        self.disabled_reason.as_deref()
    }

    fn require(&self) -> Result<&Arc<dyn LlmProvider>> {
        self.provider.as_ref().ok_or_else(|| Error::Provider {
            provider: "none".into(),
            message: self
                .disabled_reason
                .clone()
                .unwrap_or_else(|| "no provider configured".into()),
        })
    }

    pub async fn chat(&self, req: ChatRequest) -> Result<String> {
        self.require()?.chat(req).await
    }

    /// Convenience: single-turn prompt -> text.
    pub async fn chat_prompt(&self, prompt: &str) -> Result<String> {
        self.chat(ChatRequest::prompt(prompt)).await
    }

    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.require()?.embed(texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maestro_domain::config::LlmConfig;

    #[tokio::test]
    async fn disabled_registry_errors_on_use() {
        let registry = ProviderRegistry::from_config(&LlmConfig::default());
        assert!(!registry.is_enabled());
        let err = registry.chat_prompt("hello").await.unwrap_err();
        assert_eq!(err.kind(), "provider_error");
    }
}
