//! News proxy route.

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;

use crate::error::ApiError;
use crate::news::{Category, FeedKind};
use crate::state::AppState;

pub const NEWS_FAILURE_MESSAGE: &str = "Failed to fetch news";

#[derive(Debug, Default, Deserialize)]
pub struct NewsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category: Option<String>,
}

/// `GET /api/news?type=top&category=tech`: one page of headlines.
///
/// # Errors
///
/// 400 for an unknown type or category, 503 without a news token, 500 when
/// the feed fails.
pub async fn news(State(state): State<AppState>, Query(query): Query<NewsQuery>) -> Result<Json<serde_json::Value>, ApiError> {
    let kind = match query.kind.as_deref().filter(|k| !k.is_empty()) {
        Some(raw) => raw.parse::<FeedKind>().map_err(|e| ApiError::bad_request(e.to_string()))?,
        None => FeedKind::default(),
    };
    let category = match query.category.as_deref().filter(|c| !c.is_empty()) {
        Some(raw) => Some(raw.parse::<Category>().map_err(|e| ApiError::bad_request(e.to_string()))?),
        None => None,
    };
    let client = state
        .news
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("news feed is not configured"))?;

    let value = client
        .fetch(kind, category)
        .await
        .map_err(|e| ApiError::upstream(NEWS_FAILURE_MESSAGE, &e))?;
    Ok(Json(value))
}

#[cfg(test)]
#[path = "news_test.rs"]
mod tests;
