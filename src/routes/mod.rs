//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router serves the streaming relay at `/api/chat`, the search and
//! news proxies, and a health probe. CORS is open for browser clients and
//! every request is traced.

pub mod chat;
pub mod news;
pub mod search;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(chat::chat))
        .route("/api/search", post(search::search))
        .route("/api/news", get(news::news))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
