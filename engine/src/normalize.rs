//! Normalize-or-default: the boundary between oracle text and domain values.
//!
//! Structured replies are untrusted. Only text that is not JSON at all fails
//! the call; every other deviation degrades to defaults with a warning.

use alon_providers::OracleError;
use alon_types::{GraphEdge, GraphNode, KnowledgeGraph};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Parse an oracle reply as JSON, tolerating a surrounding code fence.
pub(crate) fn parse_json(text: &str, what: &'static str) -> Result<Value, OracleError> {
    let body = strip_code_fence(text.trim());
    serde_json::from_str(body)
        .map_err(|e| OracleError::malformed(format!("{what} reply is not JSON: {e}")))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Expected an array of `T`: non-arrays become empty, bad items are dropped.
pub(crate) fn normalize_list<T: DeserializeOwned>(value: Value, what: &'static str) -> Vec<T> {
    let Value::Array(items) = value else {
        tracing::warn!(what, kind = json_kind(&value), "Expected JSON array; using empty list");
        return Vec::new();
    };

    let total = items.len();
    let parsed: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    let dropped = total - parsed.len();
    if dropped > 0 {
        tracing::warn!(what, dropped, total, "Dropped malformed items from oracle reply");
    }
    parsed
}

/// Expected `{nodes, edges, summary}`; each field defaults independently.
pub(crate) fn normalize_graph(value: Value) -> KnowledgeGraph {
    let Value::Object(mut map) = value else {
        tracing::warn!(kind = json_kind(&value), "Expected graph object; using empty graph");
        return KnowledgeGraph::default();
    };

    let nodes: Vec<GraphNode> =
        normalize_list(map.remove("nodes").unwrap_or(Value::Null), "graph nodes");
    let edges: Vec<GraphEdge> =
        normalize_list(map.remove("edges").unwrap_or(Value::Null), "graph edges");
    let summary = match map.remove("summary") {
        Some(Value::String(summary)) => summary,
        other => {
            if other.is_some() {
                tracing::warn!("Graph summary is not a string; using empty summary");
            }
            String::new()
        }
    };

    KnowledgeGraph {
        nodes,
        edges,
        summary,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
