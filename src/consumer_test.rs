use std::convert::Infallible;

use futures::stream;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

fn source(id: &str) -> Source {
    Source {
        id: id.into(),
        title: "France".into(),
        content: "Paris is the capital...".into(),
        url: "https://en.wikipedia.org/wiki/France".into(),
        date: "N/A".into(),
        domain: "en.wikipedia.org".into(),
        favicon: String::new(),
    }
}

fn body_of(events: &[StreamEvent]) -> Vec<u8> {
    events.iter().flat_map(|e| e.encode().to_vec()).collect()
}

/// A body stream that delivers `bytes` in reads of `size` bytes.
fn chunked(bytes: &[u8], size: usize) -> impl Stream<Item = Result<Vec<u8>, Infallible>> {
    let chunks: Vec<Result<Vec<u8>, Infallible>> = bytes.chunks(size).map(|c| Ok(c.to_vec())).collect();
    stream::iter(chunks)
}

fn assistant_turn() -> (Conversation, String) {
    let mut conversation = Conversation::new();
    conversation.push_user("capital of France?");
    let id = conversation.begin_assistant();
    (conversation, id)
}

// =============================================================================
// CONVERSATION
// =============================================================================

#[test]
fn turn_ids_are_unique() {
    let mut conversation = Conversation::new();
    let a = conversation.push_user("a");
    let b = conversation.begin_assistant();
    let c = conversation.push_user("c");
    assert_ne!(a, b);
    assert_ne!(b, c);
    assert_ne!(a, c);
}

#[test]
fn only_the_in_flight_assistant_turn_is_pending() {
    let (conversation, id) = assistant_turn();
    let pending: Vec<&str> = conversation.turns().iter().filter(|t| t.pending).map(|t| t.id.as_str()).collect();
    assert_eq!(pending, vec![id.as_str()]);
}

#[test]
fn messages_skip_pending_turns() {
    let (conversation, _) = assistant_turn();
    assert_eq!(conversation.messages(), vec![Message::user("capital of France?")]);
}

#[test]
fn apply_sets_sources_once() {
    let (mut conversation, id) = assistant_turn();
    assert!(conversation.apply(&id, StreamEvent::Sources(vec![source("0")])));
    conversation.apply(&id, StreamEvent::Sources(vec![]));
    assert_eq!(conversation.turn(&id).unwrap().sources.as_ref().unwrap().len(), 1);
    assert!(conversation.turn(&id).unwrap().pending);
}

#[test]
fn apply_to_unknown_turn_is_rejected() {
    let mut conversation = Conversation::new();
    assert!(!conversation.apply("missing", StreamEvent::Done));
}

#[test]
fn fail_sets_fixed_message() {
    let (mut conversation, id) = assistant_turn();
    conversation.fail(&id);
    let turn = conversation.turn(&id).unwrap();
    assert_eq!(turn.text, REQUEST_FAILED_MESSAGE);
    assert!(!turn.pending);
    assert_eq!(turn.outcome, Some(StreamOutcome::Failed));
}

// =============================================================================
// CONSUME
// =============================================================================

#[tokio::test]
async fn reconstructs_text_for_any_chunking() {
    let fragments = ["# Research", " Analysis\n\n## Summary\n", "• **Paris** ⟨1789⟩", " [Source 0]"];
    let mut events = vec![StreamEvent::Sources(vec![source("0")])];
    events.extend(fragments.iter().map(|f| StreamEvent::Delta((*f).to_string())));
    events.push(StreamEvent::Done);
    let bytes = body_of(&events);

    for size in [1, 2, 7, 13, bytes.len()] {
        let (mut conversation, id) = assistant_turn();
        let outcome = consume(chunked(&bytes, size), &mut conversation, &id, |_| {}).await;
        let turn = conversation.turn(&id).unwrap();
        assert_eq!(outcome, StreamOutcome::Completed, "chunk size {size}");
        assert_eq!(turn.text, fragments.concat(), "chunk size {size}");
        assert_eq!(turn.sources.as_deref(), Some(&[source("0")][..]));
        assert!(!turn.pending);
    }
}

#[tokio::test]
async fn update_fires_after_every_record_in_order() {
    let bytes = body_of(&[
        StreamEvent::Sources(vec![]),
        StreamEvent::Delta("a".into()),
        StreamEvent::Delta("b".into()),
        StreamEvent::Done,
    ]);
    let (mut conversation, id) = assistant_turn();
    let mut seen: Vec<(String, bool)> = Vec::new();
    consume(chunked(&bytes, bytes.len()), &mut conversation, &id, |turn| {
        seen.push((turn.text.clone(), turn.pending));
    })
    .await;

    assert_eq!(
        seen,
        vec![
            (String::new(), true),
            ("a".to_string(), false),
            ("ab".to_string(), false),
            ("ab".to_string(), false),
        ]
    );
}

#[tokio::test]
async fn missing_marker_is_truncation_not_an_error() {
    let raw = b"event: sources\ndata: {\"sources\":[]}\n\ndata: Hello\n\ndata:  world";
    let (mut conversation, id) = assistant_turn();
    let outcome = consume(chunked(raw, 5), &mut conversation, &id, |_| {}).await;

    assert_eq!(outcome, StreamOutcome::Truncated);
    let turn = conversation.turn(&id).unwrap();
    assert_eq!(turn.text, "Hello world");
    assert_eq!(turn.sources, Some(vec![]));
    assert!(!turn.pending);
}

#[tokio::test]
async fn malformed_sources_are_ignored() {
    let raw = b"event: sources\ndata: {\"sources\": [oops\n\ndata: still streaming\n\n";
    let (mut conversation, id) = assistant_turn();
    consume(chunked(raw, 64), &mut conversation, &id, |_| {}).await;

    let turn = conversation.turn(&id).unwrap();
    assert_eq!(turn.sources, None);
    assert_eq!(turn.text, "still streaming");
}

#[tokio::test]
async fn error_record_marks_failure_and_keeps_partial_text() {
    let bytes = body_of(&[
        StreamEvent::Sources(vec![]),
        StreamEvent::Delta("partial".into()),
        StreamEvent::Error("The response stream was interrupted".into()),
    ]);
    let (mut conversation, id) = assistant_turn();
    let outcome = consume(chunked(&bytes, 3), &mut conversation, &id, |_| {}).await;

    assert_eq!(outcome, StreamOutcome::Failed);
    assert_eq!(conversation.turn(&id).unwrap().text, "partial");
}

#[tokio::test]
async fn read_error_ends_consumption() {
    let items: Vec<Result<Vec<u8>, String>> = vec![
        Ok(b"data: first\n\ndata: half".to_vec()),
        Err("connection reset".into()),
        Ok(b"data: never\n\n".to_vec()),
    ];
    let (mut conversation, id) = assistant_turn();
    let outcome = consume(stream::iter(items), &mut conversation, &id, |_| {}).await;

    assert_eq!(outcome, StreamOutcome::Truncated);
    assert_eq!(conversation.turn(&id).unwrap().text, "first");
}

#[tokio::test]
async fn empty_body_settles_pending_turn() {
    let (mut conversation, id) = assistant_turn();
    let outcome = consume(chunked(b"", 1), &mut conversation, &id, |_| {}).await;
    assert_eq!(outcome, StreamOutcome::Truncated);
    assert!(!conversation.turn(&id).unwrap().pending);
}

// =============================================================================
// RELAY CLIENT
// =============================================================================

#[test]
fn client_rejects_invalid_base_url() {
    assert!(matches!(RelayClient::new("not a url"), Err(ClientError::InvalidUrl(_))));
    assert_eq!(
        RelayClient::new("http://127.0.0.1:3000").unwrap().endpoint(),
        "http://127.0.0.1:3000/api/chat"
    );
}

#[test]
fn client_keeps_base_path_prefix() {
    for base in ["http://relay.local:3000/insighter", "http://relay.local:3000/insighter/"] {
        assert_eq!(
            RelayClient::new(base).unwrap().endpoint(),
            "http://relay.local:3000/insighter/api/chat",
            "base {base}"
        );
    }
}

#[tokio::test]
async fn ask_posts_history_and_streams_answer() {
    let server = MockServer::start().await;
    let body = body_of(&[
        StreamEvent::Sources(vec![source("0")]),
        StreamEvent::Delta("Paris".into()),
        StreamEvent::Done,
    ]);
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "messages": [{ "role": "user", "content": "capital of France?" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = RelayClient::new(&server.uri()).unwrap();
    let mut conversation = Conversation::new();
    let mut updates = 0;
    let outcome = client
        .ask(&mut conversation, "capital of France?", |_| updates += 1)
        .await
        .unwrap();

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(updates, 3);
    let turns = conversation.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[1].text, "Paris");
    assert_eq!(turns[1].sources.as_ref().unwrap()[0].domain, "en.wikipedia.org");
}

#[tokio::test]
async fn ask_sends_prior_turns() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body_of(&[StreamEvent::Delta("ok".into())]), "text/event-stream"))
        .mount(&server)
        .await;

    let client = RelayClient::new(&server.uri()).unwrap();
    let mut conversation = Conversation::new();
    client.ask(&mut conversation, "first", |_| {}).await.unwrap();
    client.ask(&mut conversation, "second", |_| {}).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let sent: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(
        sent,
        json!({ "messages": [
            { "role": "user", "content": "first" },
            { "role": "assistant", "content": "ok" },
            { "role": "user", "content": "second" }
        ]})
    );
}

#[tokio::test]
async fn ask_non_ok_status_sets_failure_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "An error occurred during the request" })))
        .mount(&server)
        .await;

    let client = RelayClient::new(&server.uri()).unwrap();
    let mut conversation = Conversation::new();
    let err = client.ask(&mut conversation, "q", |_| {}).await.unwrap_err();

    assert!(matches!(err, ClientError::Status { status: 500, ref message } if message == "An error occurred during the request"));
    let turn = &conversation.turns()[1];
    assert_eq!(turn.text, REQUEST_FAILED_MESSAGE);
    assert!(!turn.pending);
}

#[tokio::test]
async fn ask_transport_failure_sets_failure_text() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = RelayClient::new(&format!("http://{addr}")).unwrap();
    let mut conversation = Conversation::new();
    let err = client.ask(&mut conversation, "q", |_| {}).await.unwrap_err();

    assert!(matches!(err, ClientError::Request(_)));
    assert_eq!(conversation.turns()[1].text, REQUEST_FAILED_MESSAGE);
}
