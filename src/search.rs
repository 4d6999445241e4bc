//! Web search capability used for grounding.
//!
//! DESIGN
//! ======
//! [`SearchProvider`] is the seam the relay depends on; [`TavilyClient`] is
//! the production implementation. The raw response shape is preserved so
//! the search proxy route can return it unchanged, while the relay only
//! reads `results`.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::{env_parse, env_string};
use crate::error::ErrorCode;

pub const DEFAULT_TAVILY_BASE_URL: &str = "https://api.tavily.com";
pub const DEFAULT_SEARCH_DEPTH: &str = "advanced";
pub const DEFAULT_MAX_RESULTS: u32 = 7;
const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    pub api_key: String,
    pub base_url: String,
    pub search_depth: String,
    pub max_results: u32,
}

impl SearchConfig {
    /// Read `TAVILY_API_KEY` (required), `TAVILY_BASE_URL`, `SEARCH_DEPTH`
    /// and `SEARCH_MAX_RESULTS`. Returns `None` without an API key.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env_string("TAVILY_API_KEY")?;
        Some(Self {
            api_key,
            base_url: env_string("TAVILY_BASE_URL")
                .unwrap_or_else(|| DEFAULT_TAVILY_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            search_depth: env_string("SEARCH_DEPTH").unwrap_or_else(|| DEFAULT_SEARCH_DEPTH.to_string()),
            max_results: env_parse("SEARCH_MAX_RESULTS", DEFAULT_MAX_RESULTS),
        })
    }
}

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Request(String),

    #[error("search response error: status {status}")]
    Response { status: u16, body: String },

    #[error("search response parse failed: {0}")]
    Parse(String),

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for SearchError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Request(_) => "E_SEARCH_REQUEST",
            Self::Response { .. } => "E_SEARCH_RESPONSE",
            Self::Parse(_) => "E_SEARCH_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Response { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// RESULT TYPES
// =============================================================================

/// One raw search hit. Fields beyond these are kept in `extra` so the proxy
/// route can echo the provider's payload. Known fields of the wrong JSON type
/// read as absent, so one odd hit never fails the whole response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl SearchResult {
    /// Text used for grounding: the snippet when present, else the content.
    #[must_use]
    pub fn text(&self) -> &str {
        self.snippet
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.content.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Hits that are not JSON objects are skipped.
    #[serde(default, deserialize_with = "lenient_results")]
    pub results: Vec<SearchResult>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

fn lenient_results<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<SearchResult>, D::Error> {
    let Value::Array(hits) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(hits
        .into_iter()
        .filter_map(|hit| match serde_json::from_value::<SearchResult>(hit) {
            Ok(result) => Some(result),
            Err(e) => {
                debug!(error = %e, "skipping unreadable search hit");
                None
            }
        })
        .collect())
}

// =============================================================================
// PROVIDER TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run a web search for `query`.
    ///
    /// # Errors
    ///
    /// Returns a [`SearchError`] if the provider cannot be reached or answers badly.
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError>;
}

// =============================================================================
// TAVILY
// =============================================================================

pub struct TavilyClient {
    http: reqwest::Client,
    config: SearchConfig,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    api_key: &'a str,
    search_depth: &'a str,
    include_answer: bool,
    max_results: u32,
}

impl TavilyClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| SearchError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, config })
    }
}

#[async_trait::async_trait]
impl SearchProvider for TavilyClient {
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError> {
        let body = TavilyRequest {
            query,
            api_key: &self.config.api_key,
            search_depth: &self.config.search_depth,
            include_answer: true,
            max_results: self.config.max_results,
        };
        let response = self
            .http
            .post(format!("{}/search", self.config.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;
        if status != 200 {
            return Err(SearchError::Response { status, body: text });
        }
        serde_json::from_str(&text).map_err(|e| SearchError::Parse(e.to_string()))
    }
}

#[cfg(test)]
#[path = "search_test.rs"]
mod tests;
