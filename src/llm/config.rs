//! LLM configuration parsed from environment variables.

use crate::config::{env_parse, env_string};

use super::types::LlmError;

pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENROUTER_MODEL: &str = "deepseek/deepseek-r1-distill-llama-70b:free";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const DEFAULT_LLM_READ_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_LLM_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProviderKind {
    OpenRouter,
    OpenAi,
}

impl LlmProviderKind {
    fn default_key_var(self) -> &'static str {
        match self {
            Self::OpenRouter => "OPENROUTER_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenRouter => DEFAULT_OPENROUTER_BASE_URL,
            Self::OpenAi => DEFAULT_OPENAI_BASE_URL,
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Self::OpenRouter => DEFAULT_OPENROUTER_MODEL,
            Self::OpenAi => DEFAULT_OPENAI_MODEL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlmTimeouts {
    /// Longest silence tolerated between reads, including between streamed
    /// chunks. A long answer that keeps arriving is never cut off.
    pub read_secs: u64,
    pub connect_secs: u64,
}

/// Attribution headers OpenRouter uses for app rankings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteAttribution {
    pub url: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub provider: LlmProviderKind,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub site: SiteAttribution,
    pub timeouts: LlmTimeouts,
}

impl LlmConfig {
    /// Build typed LLM config from environment variables.
    ///
    /// Optional:
    /// - `LLM_PROVIDER`: `openrouter` (default) or `openai`
    /// - `LLM_API_KEY_ENV`: names the env var holding the key
    ///   (default `OPENROUTER_API_KEY` / `OPENAI_API_KEY`)
    /// - `LLM_MODEL`: provider default when absent
    /// - `LLM_BASE_URL`: provider default when absent
    /// - `LLM_TEMPERATURE`: default 0.7
    /// - `LLM_MAX_TOKENS`: default 4000
    /// - `LLM_SITE_URL` / `LLM_SITE_NAME`: sent as `HTTP-Referer` / `X-Title`
    /// - `LLM_READ_TIMEOUT_SECS`: idle limit between reads, default 120
    /// - `LLM_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is unknown or the API key is absent.
    pub fn from_env() -> Result<Self, LlmError> {
        let provider = parse_provider(std::env::var("LLM_PROVIDER").ok().as_deref())?;

        let key_var = env_string("LLM_API_KEY_ENV").unwrap_or_else(|| provider.default_key_var().to_string());
        let api_key = env_string(&key_var).ok_or(LlmError::MissingApiKey { var: key_var })?;

        let model = env_string("LLM_MODEL").unwrap_or_else(|| provider.default_model().to_string());
        let base_url = env_string("LLM_BASE_URL")
            .unwrap_or_else(|| provider.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string();
        let site = SiteAttribution { url: env_string("LLM_SITE_URL"), name: env_string("LLM_SITE_NAME") };
        let timeouts = LlmTimeouts {
            read_secs: env_parse("LLM_READ_TIMEOUT_SECS", DEFAULT_LLM_READ_TIMEOUT_SECS),
            connect_secs: env_parse("LLM_CONNECT_TIMEOUT_SECS", DEFAULT_LLM_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self {
            provider,
            api_key,
            model,
            base_url,
            temperature: env_parse("LLM_TEMPERATURE", DEFAULT_TEMPERATURE),
            max_tokens: env_parse("LLM_MAX_TOKENS", DEFAULT_MAX_TOKENS),
            site,
            timeouts,
        })
    }
}

fn parse_provider(raw: Option<&str>) -> Result<LlmProviderKind, LlmError> {
    match raw.map(str::trim).unwrap_or("openrouter") {
        "openrouter" => Ok(LlmProviderKind::OpenRouter),
        "openai" => Ok(LlmProviderKind::OpenAi),
        other => Err(LlmError::ConfigParse(format!("unknown LLM_PROVIDER: {other}"))),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
