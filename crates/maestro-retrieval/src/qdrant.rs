//! Qdrant vector store adapter.
//!
//! Wraps one named collection (cosine distance, fixed dimension) over
//! Qdrant's REST API. Unreachable-store failures surface as `Storage`
//! errors so the HTTP layer can answer 503 with a remediation hint.

use std::sync::Arc;

use maestro_domain::error::{Error, Result};
use maestro_providers::EmbeddingGateway;
use serde_json::{Map, Value};

use crate::chunker::Chunk;

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub vector_score: f64,
    pub payload: Map<String, Value>,
}

pub struct VectorStore {
    base_url: String,
    collection: String,
    dimension: usize,
    client: reqwest::Client,
    embedder: Arc<EmbeddingGateway>,
}

impl VectorStore {
    pub fn new(
        qdrant_url: &str,
        collection: &str,
        dimension: usize,
        embedder: Arc<EmbeddingGateway>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Storage(e.to_string()))?;
        Ok(Self {
            base_url: qdrant_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            dimension,
            client,
            embedder,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{suffix}", self.base_url, self.collection)
    }

    async fn request_json(&self, builder: reqwest::RequestBuilder) -> Result<Value> {
        let resp = builder
            .send()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(Error::Storage(format!(
                "qdrant HTTP {status}: {}",
                body.get("status")
                    .and_then(|s| s.get("error"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
            )));
        }
        Ok(body)
    }

    // ── Collection lifecycle ──────────────────────────────────────

    /// Create the collection if missing. An existing collection with a
    /// different vector dimension is a fatal configuration error.
    pub async fn ensure_collection(&self) -> Result<()> {
        let resp = self
            .client
            .get(self.collection_url(""))
            .send()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return self.create_collection().await;
        }
        if !resp.status().is_success() {
            return Err(Error::Storage(format!(
                "qdrant HTTP {} describing collection {}",
                resp.status(),
                self.collection
            )));
        }

        let body: Value = resp.json().await.map_err(|e| Error::Storage(e.to_string()))?;
        let size = body
            .pointer("/result/config/params/vectors/size")
            .and_then(Value::as_u64);
        if let Some(size) = size {
            if size as usize != self.dimension {
                return Err(Error::Config(format!(
                    "collection '{}' vector dimension mismatch: expected {}, got {size} — \
                     recreate the collection or fix retrieval.vector_dim",
                    self.collection, self.dimension
                )));
            }
        }
        Ok(())
    }

    async fn create_collection(&self) -> Result<()> {
        let body = serde_json::json!({
            "vectors": { "size": self.dimension, "distance": "Cosine" }
        });
        self.request_json(self.client.put(self.collection_url("")).json(&body))
            .await?;
        tracing::info!(
            collection = %self.collection,
            dimension = self.dimension,
            "created vector collection"
        );
        Ok(())
    }

    /// Drop then create. Idempotent: a missing collection is fine.
    pub async fn recreate(&self) -> Result<()> {
        let _ = self
            .client
            .delete(self.collection_url(""))
            .send()
            .await;
        self.create_collection().await
    }

    /// Exact point count, or 0 when the store misbehaves.
    pub async fn count(&self) -> usize {
        let body = serde_json::json!({ "exact": true });
        match self
            .request_json(self.client.post(self.collection_url("/points/count")).json(&body))
            .await
        {
            Ok(resp) => resp
                .pointer("/result/count")
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize,
            Err(_) => 0,
        }
    }

    /// Remove points matching a Qdrant filter.
    pub async fn delete_by_filter(&self, filter: Value) -> Result<()> {
        self.ensure_collection().await?;
        let body = serde_json::json!({ "filter": filter });
        self.request_json(
            self.client
                .post(self.collection_url("/points/delete?wait=true"))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    // ── Points ────────────────────────────────────────────────────

    /// Embed chunk texts and upsert them with their payloads. Chunk ids
    /// are deterministic, so repeated indexing overwrites in place.
    pub async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        self.ensure_collection().await?;

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        let points: Vec<Value> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                let mut payload = chunk.meta.clone();
                payload.insert("text".into(), Value::String(chunk.text.clone()));
                payload.insert("source".into(), Value::String(chunk.source.clone()));
                serde_json::json!({
                    "id": chunk.id,
                    "vector": vector,
                    "payload": payload,
                })
            })
            .collect();

        let body = serde_json::json!({ "points": points });
        self.request_json(
            self.client
                .put(self.collection_url("/points?wait=true"))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    /// Embed the query and search the collection. `filter` is a
    /// pre-compiled Qdrant filter (exact-match pushdown only).
    pub async fn vector_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<Value>,
    ) -> Result<Vec<VectorHit>> {
        self.ensure_collection().await?;
        let vector = self
            .embedder
            .embed(std::slice::from_ref(&query.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider {
                provider: "embeddings".into(),
                message: "empty embedding batch for query".into(),
            })?;

        let mut body = serde_json::json!({
            "vector": vector,
            "limit": k,
            "with_payload": true,
        });
        if let Some(filter) = filter {
            body["filter"] = filter;
        }

        let resp = self
            .request_json(self.client.post(self.collection_url("/points/search")).json(&body))
            .await?;

        let hits = resp
            .pointer("/result")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|h| VectorHit {
                        id: id_to_string(h.get("id")),
                        vector_score: h.get("score").and_then(Value::as_f64).unwrap_or(0.0),
                        payload: h
                            .get("payload")
                            .and_then(Value::as_object)
                            .cloned()
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(hits)
    }

    /// Scroll payloads (no vectors) up to `limit`, batched. Used to
    /// rebuild the BM25 index from stored text.
    pub async fn scroll_payloads(&self, limit: usize) -> Result<Vec<(String, Map<String, Value>)>> {
        self.ensure_collection().await?;

        let mut out = Vec::new();
        let mut offset: Option<Value> = None;

        while out.len() < limit {
            let batch = (limit - out.len()).min(256);
            let mut body = serde_json::json!({
                "limit": batch,
                "with_payload": true,
                "with_vector": false,
            });
            if let Some(ref o) = offset {
                body["offset"] = o.clone();
            }

            let resp = self
                .request_json(self.client.post(self.collection_url("/points/scroll")).json(&body))
                .await?;

            let points = resp
                .pointer("/result/points")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if points.is_empty() {
                break;
            }
            for p in &points {
                out.push((
                    id_to_string(p.get("id")),
                    p.get("payload")
                        .and_then(Value::as_object)
                        .cloned()
                        .unwrap_or_default(),
                ));
                if out.len() >= limit {
                    break;
                }
            }

            match resp.pointer("/result/next_page_offset") {
                Some(next) if !next.is_null() => offset = Some(next.clone()),
                _ => break,
            }
        }
        Ok(out)
    }
}

/// Qdrant point ids come back as strings or integers.
fn id_to_string(id: Option<&Value>) -> String {
    match id {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn point_ids_normalize_to_strings() {
        assert_eq!(id_to_string(Some(&json!("abc"))), "abc");
        assert_eq!(id_to_string(Some(&json!(42))), "42");
        assert_eq!(id_to_string(None), "");
    }
}
