//! Streaming relay route.
//!
//! Everything that can fail the request happens before the first byte:
//! body parsing, provider availability, search and opening the provider
//! stream. After that the response is committed and failures travel in-band
//! as the stream's terminal record.

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::error::{ApiError, RELAY_FAILURE_MESSAGE};
use crate::llm::types::Message;
use crate::relay::{RelayError, RelayStream};
use crate::state::AppState;
use crate::wire;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
}

/// `POST /api/chat`: search-augmented streaming answer.
///
/// # Errors
///
/// Returns a JSON error for a malformed body (400), a missing provider
/// (503) or a provider that rejects the request (500).
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let relay = state
        .relay()
        .ok_or_else(|| ApiError::unavailable("LLM provider is not configured"))?;

    let stream = relay.open(&request.messages).await.map_err(|e| match e {
        RelayError::EmptyConversation => ApiError::bad_request(e.to_string()),
        RelayError::Provider(_) => ApiError::upstream(RELAY_FAILURE_MESSAGE, &e),
    })?;
    Ok(sse_response(stream))
}

fn sse_response(stream: RelayStream) -> Response {
    (
        [
            (header::CONTENT_TYPE, wire::CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(stream.into_body()),
    )
        .into_response()
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
