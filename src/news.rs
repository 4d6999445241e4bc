//! Headline feed proxy client.
//!
//! The feed is independent of the relay; its JSON is passed through to the
//! caller untouched. Feed kind and category are validated here so a typo in
//! the query string becomes a 400 instead of an upstream 404.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::config::env_string;
use crate::error::ErrorCode;
use crate::retry::RetryPolicy;

pub const DEFAULT_NEWS_BASE_URL: &str = "https://api.thenewsapi.com/v1";
pub const NEWS_LANGUAGE: &str = "en";
pub const NEWS_LIMIT: u32 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 20;

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsConfig {
    pub api_token: String,
    pub base_url: String,
}

impl NewsConfig {
    /// Read `NEWS_API_TOKEN` (required) and `NEWS_BASE_URL`.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_token = env_string("NEWS_API_TOKEN")?;
        let base_url = env_string("NEWS_BASE_URL").unwrap_or_else(|| DEFAULT_NEWS_BASE_URL.to_string());
        Some(Self { api_token, base_url: base_url.trim_end_matches('/').to_string() })
    }
}

// =============================================================================
// FEED SELECTION
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedKind {
    #[default]
    Top,
    Headlines,
    All,
}

impl FeedKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Headlines => "headlines",
            Self::All => "all",
        }
    }
}

impl FromStr for FeedKind {
    type Err = NewsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(Self::Top),
            "headlines" => Ok(Self::Headlines),
            "all" => Ok(Self::All),
            other => Err(NewsError::InvalidKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    General,
    Business,
    Entertainment,
    Health,
    Science,
    Sports,
    Tech,
    Politics,
}

impl Category {
    pub const ALL: [Self; 8] = [
        Self::General,
        Self::Business,
        Self::Entertainment,
        Self::Health,
        Self::Science,
        Self::Sports,
        Self::Tech,
        Self::Politics,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Business => "business",
            Self::Entertainment => "entertainment",
            Self::Health => "health",
            Self::Science => "science",
            Self::Sports => "sports",
            Self::Tech => "tech",
            Self::Politics => "politics",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = NewsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| NewsError::InvalidCategory(s.to_string()))
    }
}

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum NewsError {
    #[error("unknown news feed type: {0}")]
    InvalidKind(String),

    #[error("unknown news category: {0}")]
    InvalidCategory(String),

    #[error("news request failed: {0}")]
    Request(String),

    #[error("news response error: status {status}")]
    Response { status: u16, body: String },

    #[error("news response parse failed: {0}")]
    Parse(String),

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for NewsError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidKind(_) => "E_NEWS_KIND",
            Self::InvalidCategory(_) => "E_NEWS_CATEGORY",
            Self::Request(_) => "E_NEWS_REQUEST",
            Self::Response { .. } => "E_NEWS_RESPONSE",
            Self::Parse(_) => "E_NEWS_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Response { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct NewsClient {
    http: reqwest::Client,
    config: NewsConfig,
    retry: RetryPolicy,
}

impl NewsClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: NewsConfig, retry: RetryPolicy) -> Result<Self, NewsError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| NewsError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, config, retry })
    }

    /// Fetch one page of headlines as raw JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed is unreachable, answers non-200, or
    /// returns something other than JSON.
    pub async fn fetch(&self, kind: FeedKind, category: Option<Category>) -> Result<serde_json::Value, NewsError> {
        self.retry.run("news", || self.fetch_once(kind, category)).await
    }

    async fn fetch_once(&self, kind: FeedKind, category: Option<Category>) -> Result<serde_json::Value, NewsError> {
        let limit = NEWS_LIMIT.to_string();
        let mut query = vec![
            ("api_token", self.config.api_token.as_str()),
            ("language", NEWS_LANGUAGE),
            ("limit", limit.as_str()),
        ];
        if let Some(category) = category {
            query.push(("categories", category.as_str()));
        }

        let response = self
            .http
            .get(format!("{}/news/{}", self.config.base_url, kind.as_str()))
            .header("Accept", "application/json")
            .query(&query)
            .send()
            .await
            .map_err(|e| NewsError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| NewsError::Request(e.to_string()))?;
        if status != 200 {
            return Err(NewsError::Response { status, body: text });
        }
        serde_json::from_str(&text).map_err(|e| NewsError::Parse(e.to_string()))
    }
}

#[cfg(test)]
#[path = "news_test.rs"]
mod tests;
