//! HTTP surface: chat (unary + SSE), retrieval query/index, session
//! inspection, health.

pub mod chat;
pub mod health;
pub mod rag;
pub mod sessions;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;

use maestro_domain::error::Error;

use crate::state::AppState;

/// Assemble the full router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/v1/chat", post(chat::chat))
        .route("/v1/chat/stream", post(chat::chat_stream))
        .route("/v1/sessions", get(sessions::list))
        .route("/v1/sessions/:id", get(sessions::export))
        .route("/rag/query", post(rag::query))
        .route("/rag/index/:docset", post(rag::index))
        .with_state(state)
}

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

/// Map a domain error onto its HTTP status and response body, carrying
/// the remediation hint for operator-facing failures.
pub fn error_response(err: &Error) -> Response {
    let status = match err {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::Config(_) | Error::Storage(_) | Error::Provider { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        Error::Downstream { .. } | Error::Timeout(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let mut body = serde_json::json!({
        "error": err.to_string(),
        "kind": err.kind(),
    });
    if let Some(hint) = err.hint() {
        body["hint"] = serde_json::Value::String(hint.into());
    }
    (status, Json(body)).into_response()
}
