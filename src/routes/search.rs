//! Search proxy route.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::Deserialize;

use crate::error::ApiError;
use crate::search::SearchResponse;
use crate::state::AppState;

pub const SEARCH_FAILURE_MESSAGE: &str = "Failed to fetch search results";

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
}

/// `POST /api/search`: raw search provider response.
///
/// # Errors
///
/// 400 for a missing query, 503 without a search provider, 500 when the
/// provider fails.
pub async fn search(
    State(state): State<AppState>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let query = request.query.trim();
    if query.is_empty() {
        return Err(ApiError::bad_request("Query parameter is required"));
    }
    let provider = state
        .search
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("search provider is not configured"))?;

    let response = state
        .retry
        .run("search", || provider.search(query))
        .await
        .map_err(|e| ApiError::upstream(SEARCH_FAILURE_MESSAGE, &e))?;
    Ok(Json(response))
}

#[cfg(test)]
#[path = "search_test.rs"]
mod tests;
