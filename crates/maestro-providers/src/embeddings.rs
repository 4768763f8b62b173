//! Embedding gateway.
//!
//! Thin front over the provider registry: sanitizes inputs and enforces
//! the collection's vector dimension before anything reaches the store.

use std::sync::Arc;

use maestro_domain::error::{Error, Result};

use crate::registry::ProviderRegistry;

pub struct EmbeddingGateway {
    registry: Arc<ProviderRegistry>,
    /// Expected output dimension; must equal the collection dimension.
    dimension: usize,
}

impl EmbeddingGateway {
    pub fn new(registry: Arc<ProviderRegistry>, dimension: usize) -> Self {
        Self {
            registry,
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed a batch of texts. Newlines are flattened to spaces before
    /// the provider call. A dimension mismatch against the configured
    /// collection is a fatal configuration error.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let cleaned: Vec<String> = texts.iter().map(|t| sanitize(t)).collect();
        let vectors = self.registry.embed(&cleaned).await?;

        if let Some(v) = vectors.first() {
            if v.len() != self.dimension {
                return Err(Error::Config(format!(
                    "embedding dimension mismatch: expected {}, provider returned {} — \
                     recreate the collection or fix retrieval.vector_dim",
                    self.dimension,
                    v.len()
                )));
            }
        }
        Ok(vectors)
    }
}

fn sanitize(text: &str) -> String {
    text.replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newlines_become_spaces() {
        assert_eq!(sanitize("a\nb\nc"), "a b c");
        assert_eq!(sanitize("no newline"), "no newline");
    }

    #[tokio::test]
    async fn disabled_provider_surfaces_provider_error() {
        let registry = Arc::new(ProviderRegistry::disabled("test"));
        let gateway = EmbeddingGateway::new(registry, 4);
        let err = gateway.embed(&["x".into()]).await.unwrap_err();
        assert_eq!(err.kind(), "provider_error");
    }
}
