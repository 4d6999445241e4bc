use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::news::{NewsClient, NewsConfig};
use crate::retry::RetryPolicy;
use crate::routes::test_server::spawn;
use crate::state::test_helpers::test_app_state;

async fn relay_with_feed(feed: &MockServer) -> std::net::SocketAddr {
    let client = NewsClient::new(
        NewsConfig { api_token: "news-test".into(), base_url: feed.uri() },
        RetryPolicy::fail_fast(),
    )
    .unwrap();
    spawn(test_app_state(None, None).with_news(Some(Arc::new(client)))).await
}

#[tokio::test]
async fn forwards_type_and_category() {
    let feed = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/news/headlines"))
        .and(query_param("categories", "tech"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [{ "title": "Chips" }] })))
        .mount(&feed)
        .await;
    let addr = relay_with_feed(&feed).await;

    let response = reqwest::get(format!("http://{addr}/api/news?type=headlines&category=tech")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let value: serde_json::Value = response.json().await.unwrap();
    assert_eq!(value, json!({ "data": [{ "title": "Chips" }] }));
}

#[tokio::test]
async fn defaults_to_top_stories() {
    let feed = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/news/top"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&feed)
        .await;
    let addr = relay_with_feed(&feed).await;

    let response = reqwest::get(format!("http://{addr}/api/news")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn unknown_category_is_bad_request() {
    let feed = MockServer::start().await;
    let addr = relay_with_feed(&feed).await;
    let response = reqwest::get(format!("http://{addr}/api/news?category=weather")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    assert!(feed.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn feed_failure_is_server_error() {
    let feed = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&feed)
        .await;
    let addr = relay_with_feed(&feed).await;

    let response = reqwest::get(format!("http://{addr}/api/news?type=all")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let value: serde_json::Value = response.json().await.unwrap();
    assert_eq!(value, json!({ "error": "Failed to fetch news" }));
}

#[tokio::test]
async fn unconfigured_feed_is_unavailable() {
    let addr = spawn(test_app_state(None, None)).await;
    let response = reqwest::get(format!("http://{addr}/api/news")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
}
