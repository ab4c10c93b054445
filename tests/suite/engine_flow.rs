//! End-to-end requests through `Engine` with the real Gemini client

use std::sync::Arc;

use alon_engine::{CombinationGenerator, Engine, Tokenizer};
use alon_types::{AnalysisRecord, CrossCheckOutcome, RequestStatus, StepStatus};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    fast_config, final_chunk, generate_path, mount_generate, mount_generate_once, mount_stream,
    oracle_for, text_chunk,
};

fn engine_for(server: &MockServer) -> Engine {
    Engine::new(Arc::new(oracle_for(server)), fast_config())
}

async fn run_to_end(engine: &mut Engine) {
    while engine.next_update().await.is_some() {}
}

#[tokio::test]
async fn graph_request_completes_with_labels_and_usage() {
    let server = MockServer::start().await;
    let graph = json!({
        "nodes": [{ "id": "n1", "label": "Seoul" }, { "id": "n2", "label": "Korea" }],
        "edges": [{ "from": "n1", "to": "n2", "label": "capital of" }],
        "summary": "Seoul is the capital of Korea."
    });
    mount_generate(&server, &graph.to_string(), 31).await;

    let mut engine = engine_for(&server);
    let id = engine.start_graph("Seoul is the capital of Korea.");
    run_to_end(&mut engine).await;

    let Some(AnalysisRecord::Graph(message)) = engine.record(id) else {
        panic!("expected graph record");
    };
    let report = message.state.value().expect("graph completed");
    assert_eq!(report.graph.nodes.len(), 2);
    assert_eq!(report.graph.node_label("n1"), "Seoul");
    assert_eq!(report.usage.map(|u| u.total_token_count), Some(31));
}

#[tokio::test]
async fn hallucination_request_flags_reported_combination() {
    let text = "하늘은 파랗다 바다는 깊다";
    let tokens = Tokenizer::default().tokenize(text);
    let combinations = CombinationGenerator::default().generate(&tokens);
    let flagged = combinations[0].text();

    let server = MockServer::start().await;
    let reply = json!([{ "text": flagged, "isContradiction": true, "reason": "conflict" }]);
    mount_generate(&server, &reply.to_string(), 50).await;

    let mut engine = engine_for(&server);
    let id = engine.start_hallucination(text);
    run_to_end(&mut engine).await;

    let Some(AnalysisRecord::Hallucination(message)) = engine.record(id) else {
        panic!("expected hallucination record");
    };
    let report = message.state.value().expect("analysis completed");
    assert_eq!(report.result.total_combinations, combinations.len());
    assert_eq!(report.result.verdicts.len(), combinations.len());
    assert_eq!(report.result.hallucinated_combinations.len(), 1);
    assert_eq!(report.result.hallucinated_combinations[0].reason, "conflict");
    // Everything the oracle skipped is a placeholder.
    let placeholders = report
        .result
        .verdicts
        .iter()
        .filter(|v| v.is_placeholder())
        .count();
    assert_eq!(placeholders, combinations.len() - 1);
    assert_eq!(report.usage.total_token_count, 50);
}

#[tokio::test]
async fn rate_limited_hallucination_request_fails_after_one_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(generate_path()))
        .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
        .expect(1)
        .mount(&server)
        .await;

    let mut engine = engine_for(&server);
    let id = engine.start_hallucination("하늘은 파랗다 바다는 깊다");
    run_to_end(&mut engine).await;

    let Some(AnalysisRecord::Hallucination(message)) = engine.record(id) else {
        panic!("expected hallucination record");
    };
    assert_eq!(message.status(), RequestStatus::Error);
    assert!(message.state.error().unwrap().contains("try again later"));
}

#[tokio::test]
async fn logical_request_runs_all_three_steps() {
    let server = MockServer::start().await;
    let extraction = json!([
        { "sentence": "All birds fly.", "expression": "∀x(Bird(x) → Fly(x))" },
        { "sentence": "Penguins do not fly.", "expression": "¬Fly(penguin)" }
    ]);
    let crosscheck = json!([{
        "expression_pair": ["∀x(Bird(x) → Fly(x))", "¬Fly(penguin)"],
        "is_contradictory": true,
        "reason": "penguins are birds"
    }]);
    mount_generate_once(&server, &extraction.to_string(), 10).await;
    mount_generate(&server, &crosscheck.to_string(), 15).await;

    let mut engine = engine_for(&server);
    let id = engine.start_logical("All birds fly. Penguins do not fly.");
    run_to_end(&mut engine).await;

    let Some(AnalysisRecord::Logical(message)) = engine.record(id) else {
        panic!("expected logical record");
    };
    assert_eq!(message.status, RequestStatus::Complete);
    assert!(message.steps.iter().all(|s| s.status == StepStatus::Complete));
    assert!(matches!(
        message.results.crosscheck,
        Some(CrossCheckOutcome::Compared { ref checks }) if checks.len() == 1
    ));
    let verdict = message.results.final_verdict.as_ref().unwrap();
    assert!(verdict.contradiction_found);
    assert_eq!(message.usage.total_token_count, 25);
}

#[tokio::test]
async fn logical_request_failure_marks_later_steps() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(generate_path()))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let mut engine = engine_for(&server);
    let id = engine.start_logical("A. B.");
    run_to_end(&mut engine).await;

    let Some(AnalysisRecord::Logical(message)) = engine.record(id) else {
        panic!("expected logical record");
    };
    assert_eq!(message.status, RequestStatus::Error);
    assert!(message.steps.iter().all(|s| s.status == StepStatus::Error));
}

#[tokio::test]
async fn fact_check_streams_text_and_deduplicated_sources() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        &[
            text_chunk("The Earth "),
            final_chunk(
                "is round.",
                &[
                    ("https://a.example", "A"),
                    ("https://a.example", "A again"),
                    ("https://b.example", "B"),
                ],
                12,
            ),
        ],
    )
    .await;

    let mut engine = engine_for(&server);
    let id = engine.start_fact_check("Is the Earth round?");
    run_to_end(&mut engine).await;

    let Some(AnalysisRecord::FactCheck(message)) = engine.record(id) else {
        panic!("expected fact-check record");
    };
    assert_eq!(message.status, RequestStatus::Complete);
    assert_eq!(message.text, "The Earth is round.");
    let uris: Vec<_> = message.sources.iter().map(|s| s.uri.as_str()).collect();
    assert_eq!(uris, ["https://a.example", "https://b.example"]);
    assert_eq!(message.sources[0].title, "A");
}

#[tokio::test]
async fn requests_in_flight_together_keep_separate_results() {
    let server = MockServer::start().await;
    mount_generate(
        &server,
        &json!({ "nodes": [], "edges": [], "summary": "empty" }).to_string(),
        3,
    )
    .await;

    let mut engine = engine_for(&server);
    let first = engine.start_graph("one");
    let second = engine.start_graph("two");
    run_to_end(&mut engine).await;

    let inputs: Vec<_> = engine.store().iter().map(|(_, r)| r.input().to_string()).collect();
    assert_eq!(inputs, ["one", "two"]);
    assert_eq!(engine.store().pending_count(), 0);
    assert_ne!(first, second);
}

#[tokio::test]
async fn fact_check_quota_error_in_stream_reports_rate_limit() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        &[
            text_chunk("Partial "),
            json!({
                "error": { "code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED" }
            }),
        ],
    )
    .await;

    let mut engine = engine_for(&server);
    let id = engine.start_fact_check("Is the Earth round?");
    run_to_end(&mut engine).await;

    let Some(AnalysisRecord::FactCheck(message)) = engine.record(id) else {
        panic!("expected fact-check record");
    };
    assert_eq!(message.status, RequestStatus::Error);
    assert_eq!(message.text, "Partial ");
    assert!(message.error.as_deref().unwrap().contains("try again later"));
}
