//! Hybrid retrieval engine.
//!
//! Vector and BM25 candidates are over-fetched, merged by id,
//! post-filtered, fused (RRF by default), and cut to the requested k.
//! The BM25 corpus is process-local and rebuilt lazily from a bounded
//! payload scroll whenever it is empty.

use std::collections::HashMap;
use std::sync::Arc;

use maestro_domain::config::{FusionStrategy, RetrievalConfig};
use maestro_domain::error::Result;
use serde_json::{Map, Value};

use crate::bm25::{Bm25Document, Bm25Index};
use crate::filter::PayloadFilter;
use crate::qdrant::VectorStore;

/// Minimum candidate pool fetched from each source regardless of k.
const MIN_CANDIDATES: usize = 20;

#[derive(Debug, Clone)]
pub struct RetrievalHit {
    pub id: String,
    pub payload: Map<String, Value>,
    pub vector_score: Option<f64>,
    pub bm25_score: Option<f64>,
    /// 1-based rank in each source list; `None` = absent from that list.
    pub vector_rank: Option<usize>,
    pub bm25_rank: Option<usize>,
    /// Fused score; fill via [`fuse`].
    pub score: f64,
}

impl RetrievalHit {
    /// Public response shape for API hits and the rag.query tool:
    /// `{id, score, vector_score, bm25_score, source, text}` with the
    /// text clipped to `snippet_chars` (plus a trailing ellipsis).
    pub fn to_public_json(&self, snippet_chars: usize) -> Value {
        let full = self
            .payload
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let mut text: String = full.chars().take(snippet_chars).collect();
        if text.chars().count() < full.chars().count() {
            text.push_str("...");
        }
        serde_json::json!({
            "id": self.id,
            "score": self.score,
            "vector_score": self.vector_score,
            "bm25_score": self.bm25_score,
            "source": self.payload.get("source").and_then(Value::as_str).unwrap_or_default(),
            "text": text,
        })
    }
}

pub struct RetrievalEngine {
    store: Arc<VectorStore>,
    bm25: Bm25Index,
    fusion: FusionStrategy,
    alpha: f64,
    rrf_k: f64,
    vector_mult: usize,
    bm25_mult: usize,
    scroll_limit: usize,
}

impl RetrievalEngine {
    pub fn new(store: Arc<VectorStore>, cfg: &RetrievalConfig) -> Self {
        Self {
            store,
            bm25: Bm25Index::new(),
            fusion: cfg.fusion,
            alpha: cfg.alpha,
            rrf_k: cfg.rrf_k,
            vector_mult: cfg.vector_mult.max(1),
            bm25_mult: cfg.bm25_mult.max(1),
            scroll_limit: cfg.bm25_scroll_limit,
        }
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Rebuild the BM25 corpus from stored payloads. Called lazily when
    /// the index is empty and explicitly after (re)indexing.
    pub async fn rebuild_bm25(&self) -> Result<usize> {
        let payloads = self.store.scroll_payloads(self.scroll_limit).await?;
        let docs: Vec<Bm25Document> = payloads
            .into_iter()
            .map(|(id, payload)| Bm25Document {
                text: payload
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                id,
                payload,
            })
            .collect();
        let count = docs.len();
        self.bm25.build(docs);
        tracing::debug!(docs = count, "BM25 index rebuilt from payload scroll");
        Ok(count)
    }

    /// Hybrid search: top `k` fused hits, filters applied on both legs.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filters: Option<&Map<String, Value>>,
    ) -> Result<Vec<RetrievalHit>> {
        if self.bm25.is_empty() {
            self.rebuild_bm25().await?;
        }

        let filter = filters.map(PayloadFilter::from_map).unwrap_or_default();
        let (pushdown, post) = filter.split_pushdown();

        let vector_k = (k * self.vector_mult).max(MIN_CANDIDATES);
        let bm25_k = (k * self.bm25_mult).max(MIN_CANDIDATES);

        let vector_hits = self
            .store
            .vector_search(query, vector_k, pushdown.to_qdrant())
            .await?;
        let bm25_hits = self.bm25.search(query, bm25_k, Some(&filter));

        // Merge by id; ranks are 1-based positions in each source list.
        let mut merged: HashMap<String, RetrievalHit> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for (rank, hit) in vector_hits.into_iter().enumerate() {
            order.push(hit.id.clone());
            merged.insert(
                hit.id.clone(),
                RetrievalHit {
                    id: hit.id,
                    payload: hit.payload,
                    vector_score: Some(hit.vector_score),
                    bm25_score: None,
                    vector_rank: Some(rank + 1),
                    bm25_rank: None,
                    score: 0.0,
                },
            );
        }
        for (rank, hit) in bm25_hits.into_iter().enumerate() {
            match merged.entry(hit.id.clone()) {
                std::collections::hash_map::Entry::Occupied(mut entry) => {
                    let existing = entry.get_mut();
                    existing.bm25_score = Some(hit.bm25_score);
                    existing.bm25_rank = Some(rank + 1);
                }
                std::collections::hash_map::Entry::Vacant(entry) => {
                    order.push(hit.id.clone());
                    entry.insert(RetrievalHit {
                        id: hit.id,
                        payload: hit.payload,
                        vector_score: None,
                        bm25_score: Some(hit.bm25_score),
                        vector_rank: None,
                        bm25_rank: Some(rank + 1),
                        score: 0.0,
                    });
                }
            }
        }

        let mut candidates: Vec<RetrievalHit> = order
            .into_iter()
            .filter_map(|id| merged.remove(&id))
            .filter(|hit| post.matches(&hit.payload))
            .collect();

        fuse(&mut candidates, self.fusion, self.alpha, self.rrf_k);

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        candidates.truncate(k);
        Ok(candidates)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fusion
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Fill `hit.score` for every candidate.
///
/// RRF adds `α/(K + rank)` per source the hit appears in; a hit missing
/// from a source simply omits that term. Min-max normalizes each score
/// list to [0,1] (zero when the range is zero) and takes the weighted
/// sum.
pub fn fuse(candidates: &mut [RetrievalHit], strategy: FusionStrategy, alpha: f64, rrf_k: f64) {
    match strategy {
        FusionStrategy::Rrf => {
            for hit in candidates.iter_mut() {
                let mut score = 0.0;
                if let Some(rank) = hit.vector_rank {
                    score += alpha / (rrf_k + rank as f64);
                }
                if let Some(rank) = hit.bm25_rank {
                    score += (1.0 - alpha) / (rrf_k + rank as f64);
                }
                hit.score = score;
            }
        }
        FusionStrategy::Minmax => {
            let vector_norm = MinMax::over(candidates.iter().filter_map(|h| h.vector_score));
            let bm25_norm = MinMax::over(candidates.iter().filter_map(|h| h.bm25_score));
            for hit in candidates.iter_mut() {
                let v = hit.vector_score.map(|s| vector_norm.norm(s)).unwrap_or(0.0);
                let b = hit.bm25_score.map(|s| bm25_norm.norm(s)).unwrap_or(0.0);
                hit.score = alpha * v + (1.0 - alpha) * b;
            }
        }
    }
}

struct MinMax {
    min: f64,
    range: f64,
}

impl MinMax {
    fn over(values: impl Iterator<Item = f64>) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            min = min.min(v);
            max = max.max(v);
        }
        Self {
            min,
            range: max - min,
        }
    }

    fn norm(&self, v: f64) -> f64 {
        if !self.range.is_finite() || self.range <= 0.0 {
            0.0
        } else {
            (v - self.min) / self.range
        }
    }
}
