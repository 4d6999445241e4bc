//! Relay: search-augmented streaming answer for one conversation turn.
//!
//! DESIGN
//! ======
//! [`Relay::open`] runs everything that can fail the request as a whole:
//! search (which degrades to no sources instead of failing), source
//! construction, prompt assembly, and opening the provider stream. Once it
//! returns, [`RelayStream`] owns the source list and the provider stream and
//! turns them into wire records lazily: the first record is always the
//! sources, then one record per provider fragment as the provider delivers
//! it, then a terminal marker.
//!
//! The body is pulled by the HTTP layer, so a slow client slows the read of
//! the provider stream. A disconnecting client drops the body, which drops
//! the provider stream and closes the upstream request.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::error::ErrorCode;
use crate::llm::types::{DeltaStream, LlmChat, LlmError, Message};
use crate::prompt::build_system_prompt;
use crate::retry::RetryPolicy;
use crate::search::{SearchProvider, SearchResult};
use crate::sources::{Source, build_sources};
use crate::wire::StreamEvent;

/// Message carried by the `error` record when the provider breaks off.
pub const STREAM_INTERRUPTED_MESSAGE: &str = "The response stream was interrupted";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("conversation must contain at least one message")]
    EmptyConversation,

    #[error(transparent)]
    Provider(#[from] LlmError),
}

impl ErrorCode for RelayError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyConversation => "E_EMPTY_CONVERSATION",
            Self::Provider(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::EmptyConversation => false,
            Self::Provider(e) => e.retryable(),
        }
    }
}

// =============================================================================
// RELAY
// =============================================================================

/// Per-request relay, built from injected client handles.
pub struct Relay {
    llm: Arc<dyn LlmChat>,
    search: Option<Arc<dyn SearchProvider>>,
    retry: RetryPolicy,
    max_tokens: u32,
}

impl Relay {
    #[must_use]
    pub fn new(
        llm: Arc<dyn LlmChat>,
        search: Option<Arc<dyn SearchProvider>>,
        retry: RetryPolicy,
        max_tokens: u32,
    ) -> Self {
        Self { llm, search, retry, max_tokens }
    }

    /// Ground the last message with search results and open the provider stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the conversation is empty or the provider rejects
    /// the request. Search failures never surface here.
    pub async fn open(&self, conversation: &[Message]) -> Result<RelayStream, RelayError> {
        let query = conversation
            .last()
            .ok_or(RelayError::EmptyConversation)?
            .content
            .as_str();

        let results = self.search(query).await;
        let sources = build_sources(&results);
        let system = build_system_prompt(&sources);

        let deltas = self
            .retry
            .run("llm.chat_stream", || self.llm.chat_stream(self.max_tokens, &system, conversation))
            .await?;

        info!(
            turns = conversation.len(),
            results = results.len(),
            sources = sources.len(),
            "relay stream opened"
        );
        Ok(RelayStream { sources, deltas })
    }

    async fn search(&self, query: &str) -> Vec<SearchResult> {
        let Some(search) = &self.search else {
            debug!("search not configured; answering without sources");
            return Vec::new();
        };
        match self.retry.run("search", || search.search(query)).await {
            Ok(response) => response.results,
            Err(e) => {
                warn!(code = e.error_code(), error = %e, "search failed; answering without sources");
                Vec::new()
            }
        }
    }
}

// =============================================================================
// STREAM
// =============================================================================

/// An opened relay response, not yet serialized.
pub struct RelayStream {
    sources: Vec<Source>,
    deltas: DeltaStream,
}

impl RelayStream {
    /// Events in wire order: sources, deltas, then `Done` or `Error`.
    pub fn into_events(self) -> impl Stream<Item = StreamEvent> + Send + 'static {
        let Self { sources, mut deltas } = self;
        async_stream::stream! {
            yield StreamEvent::Sources(sources);
            let mut fragments: u64 = 0;
            while let Some(item) = deltas.next().await {
                match item {
                    Ok(text) if text.is_empty() => {}
                    Ok(text) => {
                        fragments += 1;
                        yield StreamEvent::Delta(text);
                    }
                    Err(e) => {
                        warn!(code = e.error_code(), error = %e, fragments, "provider stream failed mid-answer");
                        yield StreamEvent::Error(STREAM_INTERRUPTED_MESSAGE.to_string());
                        return;
                    }
                }
            }
            debug!(fragments, "provider stream finished");
            yield StreamEvent::Done;
        }
    }

    /// Encoded response body.
    pub fn into_body(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        self.into_events().map(|event| Ok(event.encode()))
    }
}

#[cfg(test)]
#[path = "relay_test.rs"]
mod tests;
