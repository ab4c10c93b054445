//! Shared test utilities and fixtures
//!
//! Wiremock stand-ins for the Gemini `generateContent` and
//! `streamGenerateContent` endpoints.

#![allow(dead_code)]

use std::time::Duration;

use alon_engine::EngineConfig;
use alon_providers::gemini::GeminiOracle;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_MODEL: &str = "gemini-2.5-flash";

pub fn generate_path() -> String {
    format!("/models/{TEST_MODEL}:generateContent")
}

pub fn stream_path() -> String {
    format!("/models/{TEST_MODEL}:streamGenerateContent")
}

/// A client pointed at `server`.
pub fn oracle_for(server: &MockServer) -> GeminiOracle {
    GeminiOracle::with_base_url("test-key", server.uri()).unwrap()
}

/// Engine settings with the throttle shortened for wall-clock tests.
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        inter_batch_delay: Duration::from_millis(5),
        ..EngineConfig::default()
    }
}

/// A `generateContent` body whose single candidate answers with `text`.
pub fn generate_body(text: &str, total_tokens: u64) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": {
            "promptTokenCount": 1,
            "candidatesTokenCount": 1,
            "totalTokenCount": total_tokens
        }
    })
}

/// Answer every `generateContent` call with `text`.
pub async fn mount_generate(server: &MockServer, text: &str, total_tokens: u64) {
    Mock::given(method("POST"))
        .and(path(generate_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(generate_body(text, total_tokens)))
        .mount(server)
        .await;
}

/// Answer exactly one `generateContent` call with `text`, ahead of any
/// later-mounted fallbacks.
pub async fn mount_generate_once(server: &MockServer, text: &str, total_tokens: u64) {
    Mock::given(method("POST"))
        .and(path(generate_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(generate_body(text, total_tokens)))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

pub async fn mount_generate_status(server: &MockServer, status: u16, body: &str) {
    Mock::given(method("POST"))
        .and(path(generate_path()))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

/// Serve `chunks` as an SSE body on the streaming endpoint.
pub async fn mount_stream(server: &MockServer, chunks: &[Value]) {
    let mut sse_body = String::new();
    for chunk in chunks {
        sse_body.push_str(&format!("data: {chunk}\n\n"));
    }

    Mock::given(method("POST"))
        .and(path(stream_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(sse_body)
                .insert_header("content-type", "text/event-stream"),
        )
        .mount(server)
        .await;
}

pub fn text_chunk(text: &str) -> Value {
    json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
    })
}

/// Final chunk: text, grounding sources, finishReason and usage.
pub fn final_chunk(text: &str, sources: &[(&str, &str)], total_tokens: u64) -> Value {
    let chunks: Vec<Value> = sources
        .iter()
        .map(|(uri, title)| json!({ "web": { "uri": uri, "title": title } }))
        .collect();
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP",
            "groundingMetadata": { "groundingChunks": chunks }
        }],
        "usageMetadata": { "totalTokenCount": total_tokens }
    })
}
