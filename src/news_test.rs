use super::*;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(base_url: String) -> NewsClient {
    NewsClient::new(NewsConfig { api_token: "news-test".into(), base_url }, RetryPolicy::fail_fast()).unwrap()
}

#[test]
fn feed_kind_parses_known_values() {
    assert_eq!("top".parse::<FeedKind>().unwrap(), FeedKind::Top);
    assert_eq!("headlines".parse::<FeedKind>().unwrap(), FeedKind::Headlines);
    assert_eq!("all".parse::<FeedKind>().unwrap(), FeedKind::All);
    assert_eq!(FeedKind::default(), FeedKind::Top);
    assert!(matches!("latest".parse::<FeedKind>(), Err(NewsError::InvalidKind(k)) if k == "latest"));
}

#[test]
fn category_round_trips_through_str() {
    for category in Category::ALL {
        assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
    }
    assert!(matches!("weather".parse::<Category>(), Err(NewsError::InvalidCategory(_))));
}

#[test]
fn validation_errors_are_not_retryable() {
    assert!(!NewsError::InvalidKind("x".into()).retryable());
    assert!(NewsError::Response { status: 503, body: String::new() }.retryable());
    assert_eq!(NewsError::InvalidCategory("x".into()).error_code(), "E_NEWS_CATEGORY");
}

#[tokio::test]
async fn fetch_sends_fixed_query_and_passes_json_through() {
    let server = MockServer::start().await;
    let payload = json!({
        "meta": { "found": 1, "returned": 1, "limit": 10, "page": 1 },
        "data": [{ "uuid": "n1", "title": "Markets rally", "categories": ["business"] }]
    });
    Mock::given(method("GET"))
        .and(path("/news/top"))
        .and(query_param("api_token", "news-test"))
        .and(query_param("language", "en"))
        .and(query_param("limit", "10"))
        .and(query_param("categories", "business"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload.clone()))
        .mount(&server)
        .await;

    let value = client(server.uri()).fetch(FeedKind::Top, Some(Category::Business)).await.unwrap();
    assert_eq!(value, payload);
}

#[tokio::test]
async fn fetch_without_category_omits_parameter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/news/headlines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;

    client(server.uri()).fetch(FeedKind::Headlines, None).await.unwrap();
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].url.query().unwrap_or_default().contains("categories"));
}

#[tokio::test]
async fn fetch_maps_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(402).set_body_string("usage limit"))
        .mount(&server)
        .await;

    let err = client(server.uri()).fetch(FeedKind::All, None).await.unwrap_err();
    assert!(matches!(err, NewsError::Response { status: 402, ref body } if body == "usage limit"));
}

#[tokio::test]
async fn fetch_rejects_non_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client(server.uri()).fetch(FeedKind::Top, None).await.unwrap_err();
    assert!(matches!(err, NewsError::Parse(_)));
}
