//! Stream consumer: client-side reader that folds a relay response into a
//! growing assistant turn.
//!
//! DESIGN
//! ======
//! A [`Conversation`] is an append-only list of [`Turn`]s held in memory.
//! [`consume`] reads a response body incrementally through
//! [`RecordDecoder`], applies each record to one assistant turn and calls
//! the update callback after every record, so a UI can redraw per fragment.
//! Reaching the end of the body ends consumption; a terminal marker only
//! refines the recorded [`StreamOutcome`]. Dropping the future abandons the
//! read.

use std::fmt::Display;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::llm::types::{Message, Role};
use crate::sources::Source;
use crate::wire::{DecodeError, RecordDecoder, StreamEvent};

/// Text placed in the assistant turn when the request itself fails.
pub const REQUEST_FAILED_MESSAGE: &str = "An error occurred while generating the response.";

// =============================================================================
// CONVERSATION
// =============================================================================

/// How an assistant turn's stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamOutcome {
    /// The relay sent its `done` marker.
    Completed,
    /// The relay reported a provider failure, or the request never streamed.
    Failed,
    /// The body ended without a marker.
    Truncated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub role: Role,
    pub text: String,
    /// Set once from the sources record; `None` until it arrives.
    pub sources: Option<Vec<Source>>,
    /// True only on the in-flight assistant turn until content or an end arrives.
    pub pending: bool,
    /// Terminal state; `None` while streaming and on user turns.
    pub outcome: Option<StreamOutcome>,
}

impl Turn {
    fn new(role: Role, text: String, pending: bool) -> Self {
        Self { id: Uuid::new_v4().to_string(), role, text, sources: None, pending, outcome: None }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn turn(&self, id: &str) -> Option<&Turn> {
        self.turns.iter().find(|t| t.id == id)
    }

    fn turn_mut(&mut self, id: &str) -> Option<&mut Turn> {
        self.turns.iter_mut().find(|t| t.id == id)
    }

    /// Append a user turn and return its id.
    pub fn push_user(&mut self, text: impl Into<String>) -> String {
        let turn = Turn::new(Role::User, text.into(), false);
        let id = turn.id.clone();
        self.turns.push(turn);
        id
    }

    /// Append an empty pending assistant turn and return its id.
    pub fn begin_assistant(&mut self) -> String {
        let turn = Turn::new(Role::Assistant, String::new(), true);
        let id = turn.id.clone();
        self.turns.push(turn);
        id
    }

    /// The settled turns as request messages. In-flight turns are left out.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.turns
            .iter()
            .filter(|t| !t.pending)
            .map(|t| Message { role: t.role, content: t.text.clone() })
            .collect()
    }

    /// Apply one decoded record to the assistant turn `turn_id`.
    ///
    /// Returns `false` when the turn does not exist.
    pub fn apply(&mut self, turn_id: &str, event: StreamEvent) -> bool {
        let Some(turn) = self.turn_mut(turn_id) else {
            return false;
        };
        match event {
            StreamEvent::Sources(sources) => {
                if turn.sources.is_none() {
                    turn.sources = Some(sources);
                } else {
                    debug!(turn = %turn_id, "ignoring repeated sources record");
                }
            }
            StreamEvent::Delta(text) => {
                turn.text.push_str(&text);
                turn.pending = false;
            }
            StreamEvent::Done => {
                turn.outcome = Some(StreamOutcome::Completed);
                turn.pending = false;
            }
            StreamEvent::Error(message) => {
                warn!(turn = %turn_id, error = %message, "relay reported a failed stream");
                turn.outcome = Some(StreamOutcome::Failed);
                turn.pending = false;
            }
        }
        true
    }

    /// Mark `turn_id` as failed before any content arrived.
    pub fn fail(&mut self, turn_id: &str) {
        if let Some(turn) = self.turn_mut(turn_id) {
            turn.text = REQUEST_FAILED_MESSAGE.to_string();
            turn.pending = false;
            turn.outcome = Some(StreamOutcome::Failed);
        }
    }

    fn settle(&mut self, turn_id: &str) -> StreamOutcome {
        let Some(turn) = self.turn_mut(turn_id) else {
            return StreamOutcome::Truncated;
        };
        turn.pending = false;
        *turn.outcome.get_or_insert(StreamOutcome::Truncated)
    }
}

// =============================================================================
// CONSUME
// =============================================================================

/// Read `body` to its end, folding every record into `turn_id`.
///
/// `on_update` runs after each applied record with the turn's current
/// state. Read errors end consumption like a normal end of body.
pub async fn consume<S, B, E>(
    body: S,
    conversation: &mut Conversation,
    turn_id: &str,
    mut on_update: impl FnMut(&Turn),
) -> StreamOutcome
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut body = std::pin::pin!(body);
    let mut decoder = RecordDecoder::new();
    let mut records: u64 = 0;
    let mut clean_end = true;

    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                for decoded in decoder.push(bytes.as_ref()) {
                    records += 1;
                    apply_decoded(conversation, turn_id, decoded, &mut on_update);
                }
            }
            Err(e) => {
                warn!(turn = %turn_id, error = %e, "response body read failed");
                clean_end = false;
                break;
            }
        }
    }
    if clean_end {
        if let Some(decoded) = decoder.finish() {
            records += 1;
            apply_decoded(conversation, turn_id, decoded, &mut on_update);
        }
    }

    let outcome = conversation.settle(turn_id);
    debug!(turn = %turn_id, records, ?outcome, "stream consumed");
    outcome
}

fn apply_decoded(
    conversation: &mut Conversation,
    turn_id: &str,
    decoded: Result<StreamEvent, DecodeError>,
    on_update: &mut impl FnMut(&Turn),
) {
    match decoded {
        Ok(event) => {
            conversation.apply(turn_id, event);
        }
        Err(e) => warn!(turn = %turn_id, error = %e, "ignoring undecodable record"),
    }
    if let Some(turn) = conversation.turn(turn_id) {
        on_update(turn);
    }
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid relay url: {0}")]
    InvalidUrl(String),

    #[error("relay request failed: {0}")]
    Request(String),

    #[error("relay answered {status}: {message}")]
    Status { status: u16, message: String },

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for ClientError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "E_CLIENT_URL",
            Self::Request(_) => "E_CLIENT_REQUEST",
            Self::Status { .. } => "E_CLIENT_STATUS",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for a running relay.
pub struct RelayClient {
    http: reqwest::Client,
    endpoint: url::Url,
}

impl RelayClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:3000`. A path
    /// prefix is kept whether or not it ends in `/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let mut base = url::Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join("api/chat")
            .map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ClientError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, endpoint })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// Ask `query` as the next user turn and stream the answer into a new
    /// assistant turn.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the relay answers non-200;
    /// the assistant turn then carries [`REQUEST_FAILED_MESSAGE`].
    pub async fn ask(
        &self,
        conversation: &mut Conversation,
        query: &str,
        on_update: impl FnMut(&Turn),
    ) -> Result<StreamOutcome, ClientError> {
        conversation.push_user(query);
        let messages = conversation.messages();
        let turn_id = conversation.begin_assistant();

        let response = match self
            .http
            .post(self.endpoint.clone())
            .json(&ChatRequest { messages: &messages })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                conversation.fail(&turn_id);
                return Err(ClientError::Request(e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body).map_or(body, |b| b.error);
            conversation.fail(&turn_id);
            return Err(ClientError::Status { status: status.as_u16(), message });
        }

        Ok(consume(response.bytes_stream(), conversation, &turn_id, on_update).await)
    }
}

#[cfg(test)]
#[path = "consumer_test.rs"]
mod tests;
