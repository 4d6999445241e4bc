//! Process configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! Each outbound collaborator has its own optional section. A missing
//! section disables the collaborator instead of failing startup: without
//! an LLM the chat route answers 503, without search the relay streams with
//! an empty source list, without a news token the news route answers 503.

use crate::llm::config::LlmConfig;
use crate::llm::types::LlmError;
use crate::news::NewsConfig;
use crate::retry::RetryPolicy;
use crate::search::SearchConfig;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid PORT: {0}")]
    InvalidPort(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// `Err` when the LLM section is missing or malformed; kept so startup can log why.
    pub llm: Result<LlmConfig, String>,
    pub search: Option<SearchConfig>,
    pub news: Option<NewsConfig>,
    pub retry: RetryPolicy,
}

impl AppConfig {
    /// Read the full application configuration.
    ///
    /// # Errors
    ///
    /// Returns an error only for values that make serving impossible (a bad `PORT`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort(raw))?,
            Err(_) => DEFAULT_PORT,
        };
        Ok(Self {
            port,
            llm: LlmConfig::from_env().map_err(|e: LlmError| e.to_string()),
            search: SearchConfig::from_env(),
            news: NewsConfig::from_env(),
            retry: RetryPolicy::from_env(),
        })
    }
}

/// Parse an env var, falling back to `default` when unset or unparsable.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Read a non-empty, trimmed env var.
pub(crate) fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
