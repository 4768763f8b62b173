//! Retrieval endpoints.
//!
//! - `POST /rag/query`          — hybrid search with optional auto-index
//! - `POST /rag/index/:docset`  — (re)index a documentation tree

use std::path::PathBuf;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::{Map, Value};

use maestro_retrieval::indexer::IndexRequest;

use crate::state::AppState;

/// Auto-indexing kicks in below this many stored points.
const AUTO_INDEX_MIN_POINTS: usize = 20;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /rag/query
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct QueryApiRequest {
    pub query: String,
    #[serde(default = "d_top_k")]
    pub top_k: usize,
    #[serde(default = "d_true")]
    pub auto_index: bool,
    #[serde(default = "d_snippet_chars")]
    pub snippet_chars: usize,
    #[serde(default)]
    pub filters: Option<Map<String, Value>>,
}

fn d_top_k() -> usize {
    5
}
fn d_true() -> bool {
    true
}
fn d_snippet_chars() -> usize {
    1200
}

pub async fn query(
    State(state): State<AppState>,
    Json(body): Json<QueryApiRequest>,
) -> impl IntoResponse {
    if body.query.trim().is_empty() {
        return super::api_error(
            axum::http::StatusCode::BAD_REQUEST,
            "query must not be empty",
        );
    }

    let mut meta = serde_json::json!({
        "collection": state.engine.store().collection(),
        "auto_indexed": false,
    });

    if body.auto_index {
        match maybe_auto_index(&state).await {
            Ok(Some(indexed)) => {
                meta["auto_indexed"] = Value::Bool(true);
                meta["indexed_chunks"] = Value::Number(indexed.into());
            }
            Ok(None) => {}
            Err(e) => {
                // Best-effort: a failed auto-index must not block the query.
                tracing::warn!(error = %e, "auto-index failed");
                meta["auto_index_warning"] = Value::String(e.to_string());
            }
        }
    }

    match state
        .engine
        .search(&body.query, body.top_k, body.filters.as_ref())
        .await
    {
        Ok(hits) => {
            let formatted: Vec<Value> = hits
                .iter()
                .map(|h| h.to_public_json(body.snippet_chars))
                .collect();
            Json(serde_json::json!({
                "query": body.query,
                "hits": formatted,
                "meta": meta,
            }))
            .into_response()
        }
        Err(e) => super::error_response(&e),
    }
}

/// Index the configured docs root once if the collection is (nearly)
/// empty. Returns the number of chunks written, if any.
async fn maybe_auto_index(state: &AppState) -> maestro_domain::Result<Option<usize>> {
    let count = state.engine.store().count().await;
    if count >= AUTO_INDEX_MIN_POINTS {
        return Ok(None);
    }
    let docs_root = PathBuf::from(&state.config.retrieval.docs_root);
    if !docs_root.exists() {
        return Ok(None);
    }
    let report = state
        .indexer
        .index(&IndexRequest {
            docs_root,
            docset: "docs".into(),
            max_files: 200,
            recreate: false,
            replace_docset: false,
            preview: false,
            preview_files: 0,
            preview_chunks_per_file: 0,
            preview_chars: 0,
        })
        .await?;
    Ok(Some(report.indexed_chunks))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /rag/index/:docset
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct IndexApiRequest {
    /// Defaults to the configured docs root.
    #[serde(default)]
    pub docs_root: Option<String>,
    #[serde(default = "d_max_files")]
    pub max_files: usize,
    #[serde(default)]
    pub recreate: bool,
    #[serde(default)]
    pub replace_docset: bool,
    #[serde(default)]
    pub preview: bool,
    #[serde(default = "d_preview_files")]
    pub preview_files: usize,
    #[serde(default = "d_preview_chunks")]
    pub preview_chunks_per_file: usize,
    #[serde(default = "d_preview_chars")]
    pub preview_chars: usize,
}

fn d_max_files() -> usize {
    200
}
fn d_preview_files() -> usize {
    8
}
fn d_preview_chunks() -> usize {
    3
}
fn d_preview_chars() -> usize {
    240
}

pub async fn index(
    State(state): State<AppState>,
    Path(docset): Path<String>,
    Json(body): Json<IndexApiRequest>,
) -> impl IntoResponse {
    let docs_root = PathBuf::from(
        body.docs_root
            .clone()
            .unwrap_or_else(|| state.config.retrieval.docs_root.clone()),
    );

    let request = IndexRequest {
        docs_root,
        docset,
        max_files: body.max_files,
        recreate: body.recreate,
        replace_docset: body.replace_docset,
        preview: body.preview,
        preview_files: body.preview_files,
        preview_chunks_per_file: body.preview_chunks_per_file,
        preview_chars: body.preview_chars,
    };

    match state.indexer.index(&request).await {
        Ok(report) => Json(serde_json::json!(report)).into_response(),
        Err(e) => super::error_response(&e),
    }
}
