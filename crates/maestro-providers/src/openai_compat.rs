//! OpenAI-compatible adapter.
//!
//! Works with OpenAI and any other endpoint following the OpenAI chat
//! completions contract. Also handles Azure OpenAI, which uses the same
//! wire format but a deployment-scoped URL pattern and an `api-key`
//! header instead of `Authorization: Bearer`.

use maestro_domain::config::{LlmConfig, LlmKind};
use maestro_domain::error::{Error, Result};
use serde_json::Value;

use crate::traits::{ChatRequest, LlmProvider};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug)]
pub struct OpenAiCompatProvider {
    id: String,
    api_key: String,
    base_url: String,
    chat_model: String,
    embedding_model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
    /// When true, uses the Azure URL layout and `api-key` auth header.
    is_azure: bool,
    azure_api_version: String,
}

impl OpenAiCompatProvider {
    /// Build the adapter from config. The API key is read from the
    /// configured env var; an empty key is a `Config` error (the
    /// registry decides whether that downgrades to disabled).
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let is_azure = cfg.kind == LlmKind::AzureOpenai;

        let key_env = if is_azure {
            &cfg.azure_api_key_env
        } else {
            &cfg.api_key_env
        };
        let api_key = std::env::var(key_env).unwrap_or_default();
        if api_key.is_empty() {
            return Err(Error::Config(format!("{key_env} is not set")));
        }

        if is_azure && (cfg.azure_endpoint.is_empty() || cfg.azure_chat_deployment.is_empty()) {
            return Err(Error::Config(
                "azure_endpoint and azure_chat_deployment are required for azure_openai".into(),
            ));
        }

        let (base_url, chat_model, embedding_model) = if is_azure {
            (
                cfg.azure_endpoint.trim_end_matches('/').to_string(),
                cfg.azure_chat_deployment.clone(),
                cfg.azure_embedding_deployment.clone(),
            )
        } else {
            (
                cfg.base_url.trim_end_matches('/').to_string(),
                cfg.chat_model.clone(),
                cfg.embedding_model.clone(),
            )
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Provider {
                provider: "openai".into(),
                message: e.to_string(),
            })?;

        Ok(Self {
            id: if is_azure { "azure_openai" } else { "openai" }.into(),
            api_key,
            base_url,
            chat_model,
            embedding_model,
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            client,
            is_azure,
            azure_api_version: cfg.azure_api_version.clone(),
        })
    }

    // ── Internal: URLs and auth ───────────────────────────────────

    fn chat_url(&self) -> String {
        if self.is_azure {
            format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.base_url, self.chat_model, self.azure_api_version
            )
        } else {
            format!("{}/chat/completions", self.base_url)
        }
    }

    fn embeddings_url(&self) -> String {
        if self.is_azure {
            format!(
                "{}/openai/deployments/{}/embeddings?api-version={}",
                self.base_url, self.embedding_model, self.azure_api_version
            )
        } else {
            format!("{}/embeddings", self.base_url)
        }
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.post(url).header("Content-Type", "application/json");
        if self.is_azure {
            builder.header("api-key", &self.api_key)
        } else {
            builder.header("Authorization", format!("Bearer {}", self.api_key))
        }
    }

    async fn post_json(&self, url: &str, body: Value) -> Result<Value> {
        let resp = self
            .authed_post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| provider_err(&self.id, e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {status}: {}", truncate(&text, 300)),
            });
        }
        resp.json().await.map_err(|e| provider_err(&self.id, e))
    }
}

fn provider_err(id: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("{id}: {e}"))
    } else {
        Error::Provider {
            provider: id.to_owned(),
            message: e.to_string(),
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_chat_content(body: &Value) -> Option<String> {
    body.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(String::from)
}

fn parse_embeddings(body: &Value) -> Option<Vec<Vec<f32>>> {
    let data = body.get("data")?.as_array()?;
    let mut out = Vec::with_capacity(data.len());
    for item in data {
        let vector = item
            .get("embedding")?
            .as_array()?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        out.push(vector);
    }
    Some(out)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LlmProvider impl
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(&self, req: ChatRequest) -> Result<String> {
        let messages: Vec<Value> = req
            .messages
            .iter()
            .map(|m| serde_json::json!({ "role": m.role, "content": m.content }))
            .collect();

        let mut body = serde_json::json!({
            "messages": messages,
            "temperature": req.temperature.unwrap_or(self.temperature),
            "max_tokens": req.max_tokens.unwrap_or(self.max_tokens),
        });
        // Azure embeds the deployment name in the URL and rejects a
        // `model` field; standard OpenAI requires it.
        if !self.is_azure {
            body["model"] = Value::String(self.chat_model.clone());
        }

        let resp = self.post_json(&self.chat_url(), body).await?;
        parse_chat_content(&resp).ok_or_else(|| Error::Provider {
            provider: self.id.clone(),
            message: "chat response carried no content".into(),
        })
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.is_azure && self.embedding_model.is_empty() {
            return Err(Error::Config(
                "azure_embedding_deployment is not set".into(),
            ));
        }

        let mut body = serde_json::json!({ "input": texts });
        if !self.is_azure {
            body["model"] = Value::String(self.embedding_model.clone());
        }

        let resp = self.post_json(&self.embeddings_url(), body).await?;
        parse_embeddings(&resp).ok_or_else(|| Error::Provider {
            provider: self.id.clone(),
            message: "embeddings response carried no data".into(),
        })
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_content_parses() {
        let body = json!({
            "choices": [{ "message": { "role": "assistant", "content": "hi" } }]
        });
        assert_eq!(parse_chat_content(&body).as_deref(), Some("hi"));
        assert_eq!(parse_chat_content(&json!({"choices": []})), None);
    }

    #[test]
    fn embeddings_parse_in_order() {
        let body = json!({
            "data": [
                { "index": 0, "embedding": [0.1, 0.2] },
                { "index": 1, "embedding": [0.3, 0.4] }
            ]
        });
        let vecs = parse_embeddings(&body).unwrap();
        assert_eq!(vecs.len(), 2);
        assert_eq!(vecs[1].len(), 2);
    }
}
