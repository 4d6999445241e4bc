//! Explicit retry policy for outbound calls.
//!
//! DESIGN
//! ======
//! Outbound calls (search, news, opening the provider stream) run through a
//! [`RetryPolicy`]. Only errors whose [`ErrorCode::retryable`] flag is set
//! are retried, with capped exponential backoff. The default policy makes a
//! single attempt, so the out-of-the-box behavior stays "fail fast, degrade
//! locally". A provider stream is never retried once it has produced bytes;
//! callers only wrap the request that opens it.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::env_parse;
use crate::error::ErrorCode;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;
pub const DEFAULT_BASE_DELAY_MS: u64 = 250;
pub const DEFAULT_MAX_DELAY_MS: u64 = 4_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fail_fast()
    }
}

impl RetryPolicy {
    /// A single attempt, no backoff.
    #[must_use]
    pub fn fail_fast() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }

    /// Read `RETRY_MAX_ATTEMPTS`, `RETRY_BASE_DELAY_MS` and `RETRY_MAX_DELAY_MS`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            max_attempts: env_parse("RETRY_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
            base_delay: Duration::from_millis(env_parse("RETRY_BASE_DELAY_MS", DEFAULT_BASE_DELAY_MS)),
            max_delay: Duration::from_millis(env_parse("RETRY_MAX_DELAY_MS", DEFAULT_MAX_DELAY_MS)),
        }
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`, capped.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or attempts run out.
    ///
    /// # Errors
    ///
    /// Returns the last error produced by `op`.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        E: ErrorCode,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && e.retryable() => {
                    let delay = self.backoff(attempt);
                    warn!(
                        op = label,
                        attempt,
                        code = e.error_code(),
                        error = %e,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod tests;
