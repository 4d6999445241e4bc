//! Error plumbing shared by the HTTP surface.
//!
//! DESIGN
//! ======
//! Every module owns its own `thiserror` enum. Those enums implement
//! [`ErrorCode`] so they carry a grepable code and a retryable flag, which
//! the retry policy consults. Handlers convert failures into [`ApiError`],
//! whose `IntoResponse` impl produces the single JSON `{ "error": ... }`
//! body used for every non-streamed failure.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, warn};

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured errors.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// API ERROR
// =============================================================================

/// Generic message returned when the relay cannot start a response.
pub const RELAY_FAILURE_MESSAGE: &str = "An error occurred during the request";

/// A request-level failure, rendered as a JSON `{ "error": ... }` body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body or parameters were unusable.
    #[error("{0}")]
    BadRequest(String),

    /// A required upstream client is not configured.
    #[error("{0}")]
    Unavailable(String),

    /// An upstream call failed before any response bytes were written.
    #[error("{public}")]
    Upstream { public: String, code: &'static str, detail: String },
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Wrap an upstream error behind a public message. The detail is logged, never returned.
    pub fn upstream(public: impl Into<String>, err: &impl ErrorCode) -> Self {
        Self::Upstream { public: public.into(), code: err.error_code(), detail: err.to_string() }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            Self::BadRequest(msg) => warn!(%status, error = %msg, "rejected request"),
            Self::Unavailable(msg) => warn!(%status, error = %msg, "service unavailable"),
            Self::Upstream { code, detail, .. } => error!(%status, code, error = %detail, "upstream failure"),
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
