//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the outbound client handles, each optional so a missing
//! credential disables one route instead of the whole server. Handlers build
//! a fresh [`Relay`] per request from these handles; nothing here is
//! mutated after startup.

use std::sync::Arc;

use crate::llm::LlmChat;
use crate::news::NewsClient;
use crate::relay::Relay;
use crate::retry::RetryPolicy;
use crate::search::SearchProvider;

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state. Clone is required by Axum; every field is an
/// `Arc` or `Copy`.
#[derive(Clone)]
pub struct AppState {
    /// Streaming chat provider. `None` if LLM env vars are not configured.
    pub llm: Option<Arc<dyn LlmChat>>,
    /// Web search provider. `None` means answers carry no sources.
    pub search: Option<Arc<dyn SearchProvider>>,
    /// Headline provider for the news proxy.
    pub news: Option<Arc<NewsClient>>,
    pub retry: RetryPolicy,
    /// Completion budget passed to the provider for every relay request.
    pub max_tokens: u32,
}

impl AppState {
    #[must_use]
    pub fn new(llm: Option<Arc<dyn LlmChat>>, search: Option<Arc<dyn SearchProvider>>, max_tokens: u32) -> Self {
        Self { llm, search, news: None, retry: RetryPolicy::default(), max_tokens }
    }

    #[must_use]
    pub fn with_news(mut self, news: Option<Arc<NewsClient>>) -> Self {
        self.news = news;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// A relay bound to this state's handles, or `None` without an LLM.
    #[must_use]
    pub fn relay(&self) -> Option<Relay> {
        let llm = self.llm.clone()?;
        Some(Relay::new(llm, self.search.clone(), self.retry, self.max_tokens))
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use std::sync::Mutex;

    use futures::stream;

    use super::*;
    use crate::llm::types::{DeltaStream, LlmError, Message};
    use crate::search::{SearchError, SearchResponse, SearchResult};

    pub const TEST_MAX_TOKENS: u32 = 256;

    /// One scripted provider call: either a rejection, or the items its stream yields.
    pub type ScriptedCall = Result<Vec<Result<String, LlmError>>, LlmError>;

    /// A call observed by [`MockLlm`].
    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub max_tokens: u32,
        pub system: String,
        pub messages: Vec<Message>,
    }

    /// Scripted LLM. Once the script runs out every call streams `"done"`.
    pub struct MockLlm {
        script: Mutex<Vec<ScriptedCall>>,
        pub calls: Mutex<Vec<RecordedCall>>,
    }

    impl MockLlm {
        pub fn new(script: Vec<ScriptedCall>) -> Self {
            Self { script: Mutex::new(script), calls: Mutex::new(Vec::new()) }
        }

        pub fn streaming(fragments: &[&str]) -> Self {
            Self::new(vec![Ok(fragments.iter().map(|f| Ok((*f).to_string())).collect())])
        }

        pub fn recorded(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl LlmChat for MockLlm {
        async fn chat_stream(&self, max_tokens: u32, system: &str, messages: &[Message]) -> Result<DeltaStream, LlmError> {
            self.calls.lock().unwrap().push(RecordedCall {
                max_tokens,
                system: system.to_string(),
                messages: messages.to_vec(),
            });
            let mut script = self.script.lock().unwrap();
            let next = if script.is_empty() { Ok(vec![Ok("done".to_string())]) } else { script.remove(0) };
            let items = next?;
            Ok(Box::pin(stream::iter(items)))
        }
    }

    /// Scripted search provider. Once the script runs out every call returns no results.
    pub struct MockSearch {
        script: Mutex<Vec<Result<SearchResponse, SearchError>>>,
        pub queries: Mutex<Vec<String>>,
    }

    impl MockSearch {
        pub fn new(script: Vec<Result<SearchResponse, SearchError>>) -> Self {
            Self { script: Mutex::new(script), queries: Mutex::new(Vec::new()) }
        }

        pub fn returning(results: Vec<SearchResult>) -> Self {
            Self::new(vec![Ok(SearchResponse { results, ..Default::default() })])
        }

        pub fn failing(error: SearchError) -> Self {
            Self::new(vec![Err(error)])
        }
    }

    #[async_trait::async_trait]
    impl SearchProvider for MockSearch {
        async fn search(&self, query: &str) -> Result<SearchResponse, SearchError> {
            self.queries.lock().unwrap().push(query.to_string());
            let mut script = self.script.lock().unwrap();
            if script.is_empty() { Ok(SearchResponse::default()) } else { script.remove(0) }
        }
    }

    /// The France hit used across relay tests.
    pub fn france_hit() -> SearchResult {
        SearchResult {
            title: "France".into(),
            url: "https://en.wikipedia.org/wiki/France".into(),
            content: Some("Paris is the capital...".into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn test_app_state(llm: Option<Arc<dyn LlmChat>>, search: Option<Arc<dyn SearchProvider>>) -> AppState {
        AppState::new(llm, search, TEST_MAX_TOKENS)
    }
}
