//! Gemini client against a mock HTTP server

use alon_providers::{Oracle, OracleError, OracleRequest, OracleSettings, StreamEvent};
use serde_json::json;
use tokio::sync::mpsc;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    TEST_MODEL, final_chunk, generate_body, generate_path, mount_generate,
    mount_generate_status, mount_stream, oracle_for, stream_path, text_chunk,
};

fn request(content: &str) -> OracleRequest {
    OracleRequest::new(OracleSettings::new(TEST_MODEL, 0.7, 0.95), content)
}

async fn collect_stream(oracle: &impl Oracle, request: &OracleRequest) -> Vec<StreamEvent> {
    let (tx, mut rx) = mpsc::channel(16);
    oracle.stream(request, tx).await.unwrap();
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn generate_returns_text_and_usage() {
    let server = MockServer::start().await;
    mount_generate(&server, "[{\"text\":\"a b\"}]", 42).await;

    let response = oracle_for(&server).generate(&request("hi")).await.unwrap();
    assert_eq!(response.text, "[{\"text\":\"a b\"}]");
    assert_eq!(response.usage.map(|u| u.total_token_count), Some(42));
    assert!(response.grounding.is_empty());
}

#[tokio::test]
async fn generate_sends_key_header_and_schema_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(generate_path()))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "hi" }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": { "type": "ARRAY" }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(generate_body("[]", 1)))
        .expect(1)
        .mount(&server)
        .await;

    let request = request("hi").with_response_schema(json!({ "type": "ARRAY" }));
    oracle_for(&server).generate(&request).await.unwrap();
}

#[tokio::test]
async fn web_search_adds_google_search_tool() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(generate_path()))
        .and(body_partial_json(json!({ "tools": [{ "googleSearch": {} }] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(generate_body("ok", 1)))
        .expect(1)
        .mount(&server)
        .await;

    oracle_for(&server)
        .generate(&request("hi").with_web_search())
        .await
        .unwrap();
}

#[tokio::test]
async fn status_429_is_rate_limited_and_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(generate_path()))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .expect(1)
        .mount(&server)
        .await;

    let err = oracle_for(&server).generate(&request("hi")).await.unwrap_err();
    assert!(err.is_rate_limit(), "got {err:?}");
}

#[tokio::test]
async fn resource_exhausted_body_is_rate_limited() {
    let server = MockServer::start().await;
    mount_generate_status(
        &server,
        400,
        r#"{"error":{"code":400,"status":"RESOURCE_EXHAUSTED","message":"quota"}}"#,
    )
    .await;

    let err = oracle_for(&server).generate(&request("hi")).await.unwrap_err();
    assert!(err.is_rate_limit());
}

#[tokio::test]
async fn status_500_is_communication_error_and_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(generate_path()))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let err = oracle_for(&server).generate(&request("hi")).await.unwrap_err();
    match err {
        OracleError::Communication { detail } => assert!(detail.contains("500")),
        other => panic!("expected communication error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let server = MockServer::start().await;
    mount_generate_status(&server, 200, "<html>not json</html>").await;

    let err = oracle_for(&server).generate(&request("hi")).await.unwrap_err();
    assert!(matches!(err, OracleError::MalformedResponse { .. }));
}

#[tokio::test]
async fn stream_emits_text_grounding_usage_then_done() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        &[
            text_chunk("Water "),
            final_chunk(
                "is wet.",
                &[("https://a.example", "A"), ("https://b.example", "B")],
                17,
            ),
        ],
    )
    .await;

    let events = collect_stream(&oracle_for(&server), &request("wet?")).await;
    assert_eq!(events[0], StreamEvent::TextDelta("Water ".into()));
    assert_eq!(events[1], StreamEvent::TextDelta("is wet.".into()));
    let StreamEvent::Grounding(sources) = &events[2] else {
        panic!("expected grounding, got {:?}", events[2]);
    };
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].uri, "https://a.example");
    assert!(matches!(events[3], StreamEvent::Usage(u) if u.total_token_count == 17));
    assert_eq!(events.last(), Some(&StreamEvent::Done));
}

#[tokio::test]
async fn stream_uses_sse_query_parameter() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(stream_path()))
        .and(query_param("alt", "sse"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("data: {}\n\n", final_chunk("ok", &[], 1)))
                .insert_header("content-type", "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let events = collect_stream(&oracle_for(&server), &request("q")).await;
    assert_eq!(events.last(), Some(&StreamEvent::Done));
}

#[tokio::test]
async fn stream_closed_without_finish_reports_error() {
    let server = MockServer::start().await;
    mount_stream(&server, &[text_chunk("partial")]).await;

    let events = collect_stream(&oracle_for(&server), &request("q")).await;
    assert_eq!(events[0], StreamEvent::TextDelta("partial".into()));
    assert!(matches!(events.last(), Some(StreamEvent::Error(_))));
}

#[tokio::test]
async fn stream_http_error_is_returned_not_emitted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(stream_path()))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
        .mount(&server)
        .await;

    let (tx, mut rx) = mpsc::channel(4);
    let err = oracle_for(&server)
        .stream(&request("q"), tx)
        .await
        .unwrap_err();
    assert!(err.is_rate_limit());
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn quota_error_inside_stream_is_rate_limited() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        &[json!({
            "error": { "code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED" }
        })],
    )
    .await;

    let (tx, mut rx) = mpsc::channel(4);
    let err = oracle_for(&server)
        .stream(&request("q"), tx)
        .await
        .unwrap_err();
    assert!(err.is_rate_limit(), "got {err:?}");
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn other_error_inside_stream_is_an_error_event() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        &[json!({ "error": { "code": 400, "message": "bad request", "status": "INVALID_ARGUMENT" } })],
    )
    .await;

    let events = collect_stream(&oracle_for(&server), &request("q")).await;
    assert_eq!(events, vec![StreamEvent::Error("bad request".into())]);
}
