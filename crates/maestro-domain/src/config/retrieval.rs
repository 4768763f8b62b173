use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Retrieval (vector store + chunking + hybrid fusion)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How vector and BM25 rankings are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    /// Reciprocal-rank fusion: `α/(K + rank_v) + (1−α)/(K + rank_b)`.
    #[default]
    Rrf,
    /// Min-max normalize each score list to [0,1], then weighted sum.
    Minmax,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "d_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default = "d_collection")]
    pub collection: String,
    /// Must match the embedding model's output dimension.
    #[serde(default = "d_vector_dim")]
    pub vector_dim: usize,

    // ── Chunking ──────────────────────────────────────────────────
    #[serde(default = "d_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "d_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Default documentation root for `/rag/index/docs`.
    #[serde(default = "d_docs_root")]
    pub docs_root: String,

    // ── Hybrid fusion tuning ──────────────────────────────────────
    #[serde(default)]
    pub fusion: FusionStrategy,
    /// Weight of the vector ranking in fusion.
    #[serde(default = "d_alpha")]
    pub alpha: f64,
    /// RRF smoothing constant.
    #[serde(default = "d_rrf_k")]
    pub rrf_k: f64,
    /// Candidate over-fetch multiplier for vector search.
    #[serde(default = "d_mult")]
    pub vector_mult: usize,
    /// Candidate over-fetch multiplier for BM25.
    #[serde(default = "d_mult")]
    pub bm25_mult: usize,
    /// Upper bound on payloads scrolled when rebuilding BM25.
    #[serde(default = "d_scroll_limit")]
    pub bm25_scroll_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            qdrant_url: d_qdrant_url(),
            collection: d_collection(),
            vector_dim: d_vector_dim(),
            chunk_size: d_chunk_size(),
            chunk_overlap: d_chunk_overlap(),
            docs_root: d_docs_root(),
            fusion: FusionStrategy::Rrf,
            alpha: d_alpha(),
            rrf_k: d_rrf_k(),
            vector_mult: d_mult(),
            bm25_mult: d_mult(),
            bm25_scroll_limit: d_scroll_limit(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_qdrant_url() -> String {
    "http://localhost:6333".into()
}
fn d_collection() -> String {
    "maestro-docs".into()
}
fn d_vector_dim() -> usize {
    1536
}
fn d_chunk_size() -> usize {
    900
}
fn d_chunk_overlap() -> usize {
    120
}
fn d_docs_root() -> String {
    "docs".into()
}
fn d_alpha() -> f64 {
    0.6
}
fn d_rrf_k() -> f64 {
    60.0
}
fn d_mult() -> usize {
    4
}
fn d_scroll_limit() -> usize {
    5000
}
