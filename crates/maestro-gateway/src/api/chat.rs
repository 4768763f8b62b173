//! Chat API endpoints — the primary interface for agent turns.
//!
//! - `POST /v1/chat`        — non-streaming: returns the full response
//! - `POST /v1/chat/stream` — SSE: streams the to-do checklist while
//!   work is in flight, then the final answer, then `[DONE]`

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use futures_util::stream::Stream;
use serde::Deserialize;

use maestro_providers::ChatMessage;

use crate::runtime::StatusEvent;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ChatApiRequest {
    pub message: String,
    /// Session id; absent means a fresh session.
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Optional client-supplied history (role/content pairs).
    #[serde(default)]
    pub messages: Option<Vec<ChatMessage>>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/chat (unary)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatApiRequest>,
) -> impl IntoResponse {
    if body.message.trim().is_empty() {
        return super::api_error(
            axum::http::StatusCode::BAD_REQUEST,
            "message must not be empty",
        );
    }

    let outcome = state
        .runtime
        .handle(&body.message, body.conversation_id.as_deref(), body.messages)
        .await;

    Json(serde_json::json!({
        "message": outcome.message,
        "conversation_id": outcome.conversation_id,
        "role": "assistant",
        "meta": outcome.meta,
    }))
    .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/chat/stream (SSE)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat_stream(
    State(state): State<AppState>,
    Json(body): Json<ChatApiRequest>,
) -> impl IntoResponse {
    if body.message.trim().is_empty() {
        return super::api_error(
            axum::http::StatusCode::BAD_REQUEST,
            "message must not be empty",
        );
    }

    let rx = state.runtime.stream(body.message, body.conversation_id);
    Sse::new(make_sse_stream(rx))
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn make_sse_stream(
    mut rx: tokio::sync::mpsc::Receiver<StatusEvent>,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let data = serde_json::to_string(&event).unwrap_or_default();
            yield Ok(Event::default().data(data));
        }
        // Channel closed = the turn finished (or the handler died);
        // either way the client gets a terminator, never an empty end.
        yield Ok(Event::default().data("[DONE]"));
    }
}
