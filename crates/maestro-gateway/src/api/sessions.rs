//! Session inspection endpoints.
//!
//! - `GET /v1/sessions`     — live session summaries
//! - `GET /v1/sessions/:id` — full session export (turns + metadata)

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> impl IntoResponse {
    let sessions: Vec<_> = state
        .store
        .list()
        .into_iter()
        .map(|(session_id, last_activity, turns)| {
            serde_json::json!({
                "session_id": session_id,
                "last_activity": last_activity,
                "turns": turns,
            })
        })
        .collect();

    Json(serde_json::json!({
        "sessions": sessions,
        "count": sessions.len(),
    }))
}

pub async fn export(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get(&id) {
        Some(session) => Json(serde_json::json!(session)).into_response(),
        None => super::api_error(StatusCode::NOT_FOUND, format!("unknown session: {id}")),
    }
}
