use std::sync::Arc;

use insighter::config::AppConfig;
use insighter::llm::{LlmChat, LlmClient};
use insighter::news::NewsClient;
use insighter::search::{SearchProvider, TavilyClient};
use insighter::{routes, state};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env().expect("invalid configuration");

    let (llm, max_tokens): (Option<Arc<dyn LlmChat>>, u32) = match &config.llm {
        Ok(llm_config) => match LlmClient::from_config(llm_config) {
            Ok(client) => {
                tracing::info!(model = client.model(), provider = ?llm_config.provider, "LLM client initialized");
                let max_tokens = client.max_tokens();
                (Some(Arc::new(client)), max_tokens)
            }
            Err(e) => {
                tracing::warn!(error = %e, "LLM client init failed; /api/chat disabled");
                (None, 0)
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "LLM not configured; /api/chat disabled");
            (None, 0)
        }
    };

    let search: Option<Arc<dyn SearchProvider>> = match config.search.clone().map(TavilyClient::new) {
        Some(Ok(client)) => Some(Arc::new(client)),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "search client init failed; answers will carry no sources");
            None
        }
        None => {
            tracing::warn!("TAVILY_API_KEY not set; answers will carry no sources");
            None
        }
    };

    let news = match config.news.clone().map(|c| NewsClient::new(c, config.retry)) {
        Some(Ok(client)) => Some(Arc::new(client)),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "news client init failed; /api/news disabled");
            None
        }
        None => None,
    };

    let state = state::AppState::new(llm, search, max_tokens)
        .with_news(news)
        .with_retry(config.retry);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "insighter listening");
    axum::serve(listener, app).await.expect("server failed");
}
