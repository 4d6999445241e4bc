//! LLM: streaming chat adapter for the relay.
//!
//! DESIGN
//! ======
//! `LlmClient` wraps an OpenAI-compatible client (OpenRouter by default)
//! together with the configured model, and implements [`LlmChat`] so the
//! relay only ever sees the trait. Client handles are built once from
//! [`LlmConfig`] and injected through application state.

pub mod config;
pub mod openai;
pub mod types;

use config::LlmConfig;
pub use types::LlmChat;
use types::{DeltaStream, LlmError, Message};

// =============================================================================
// CLIENT
// =============================================================================

/// Concrete LLM client configured by [`LlmClient::from_config`].
pub struct LlmClient {
    inner: openai::OpenAiClient,
    model: String,
    max_tokens: u32,
}

impl LlmClient {
    /// Build an LLM client from a parsed typed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider HTTP client fails to build.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let inner = openai::OpenAiClient::new(config)?;
        Ok(Self { inner, model: config.model.clone(), max_tokens: config.max_tokens })
    }

    /// Return the configured model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Return the configured completion token cap.
    #[must_use]
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

#[async_trait::async_trait]
impl LlmChat for LlmClient {
    async fn chat_stream(&self, max_tokens: u32, system: &str, messages: &[Message]) -> Result<DeltaStream, LlmError> {
        self.inner
            .chat_stream(&self.model, max_tokens, system, messages)
            .await
    }
}
