//! Health endpoint: gateway liveness plus vector-store reachability.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.engine.store();
    match store.ensure_collection().await {
        Ok(()) => Json(serde_json::json!({
            "status": "ok",
            "vector_store_ok": true,
            "collection": store.collection(),
            "points": store.count().await,
            "llm_enabled": state.llm.is_enabled(),
        }))
        .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "degraded",
                "vector_store_ok": false,
                "collection": store.collection(),
                "llm_enabled": state.llm.is_enabled(),
                "error": e.to_string(),
                "hint": e.hint(),
            })),
        )
            .into_response(),
    }
}
