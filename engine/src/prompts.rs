//! Prompt text, output schemas and wire shapes for every oracle call.
//!
//! Schemas use the Gemini OpenAPI subset (`ARRAY`, `OBJECT`, `STRING`, `BOOLEAN`).

use alon_types::ContradictionCheck;
use serde::Deserialize;
use serde_json::{Value, json};

pub(crate) const FACT_CHECK_SYSTEM_INSTRUCTION: &str = "You are a fact-checking expert. \
Use live web search to assess the factual accuracy of the text the user provides.\n\
- Be concise: answer only what was asked and add nothing unrequested.\n\
- If web search turns up nothing relevant, say plainly that no relevant information was found.\n\
- Rely only on reputable sources (major news outlets, academic material, official bodies); \
never cite user-generated wikis.\n\
- Answer in the language of the user's text.";

fn json_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

// ============================================================================
// Batch contradiction check
// ============================================================================

pub(crate) fn batch_contradiction_prompt(texts: &[String]) -> String {
    format!(
        "Analyze each of the following phrases for factual or logical contradictions. \
         Return a JSON array with one object per phrase, stating whether it is \
         contradictory and why. Copy the original phrase verbatim into the `text` field. \
         Phrases: {}",
        json_list(texts)
    )
}

pub(crate) fn batch_contradiction_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "text": {
                    "type": "STRING",
                    "description": "The analyzed phrase, verbatim."
                },
                "isContradiction": {
                    "type": "BOOLEAN",
                    "description": "Whether the phrase contains a factual or logical contradiction."
                },
                "reason": {
                    "type": "STRING",
                    "description": "Short explanation if contradictory, otherwise an empty string."
                }
            },
            "required": ["text", "isContradiction", "reason"]
        }
    })
}

/// One item of a batch reply.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchVerdict {
    pub text: String,
    pub is_contradiction: bool,
    #[serde(default)]
    pub reason: String,
}

// ============================================================================
// Logical analysis
// ============================================================================

pub(crate) fn extraction_prompt(text: &str) -> String {
    format!(
        "Split the following text into sentences and translate each sentence into a \
         formal predicate-logic expression, identifying its entities and relations first. \
         Return every sentence paired with its expression. Text: \"{text}\""
    )
}

pub(crate) fn extraction_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "sentence": { "type": "STRING", "description": "The original sentence" },
                "expression": {
                    "type": "STRING",
                    "description": "Predicate-logic expression for the sentence"
                }
            },
            "required": ["sentence", "expression"]
        }
    })
}

pub(crate) fn crosscheck_prompt(expressions: &[String]) -> String {
    format!(
        "You are given a list of logic expressions. Compare every possible pair and decide \
         whether the two contradict each other (for example P and ¬P). Give the reason for \
         each pair. Expressions: {}",
        json_list(expressions)
    )
}

pub(crate) fn crosscheck_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "expression_pair": {
                    "type": "ARRAY",
                    "description": "The two compared expressions",
                    "items": { "type": "STRING" }
                },
                "is_contradictory": {
                    "type": "BOOLEAN",
                    "description": "Whether the two expressions contradict each other"
                },
                "reason": {
                    "type": "STRING",
                    "description": "The logical reason if contradictory, otherwise an empty string"
                }
            },
            "required": ["expression_pair", "is_contradictory", "reason"]
        }
    })
}

/// One item of a cross-check reply. Pairs that are not exactly two strings
/// fail to deserialize and are dropped by normalization.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PairCheck {
    pub expression_pair: (String, String),
    pub is_contradictory: bool,
    #[serde(default)]
    pub reason: String,
}

impl From<PairCheck> for ContradictionCheck {
    fn from(check: PairCheck) -> Self {
        Self {
            pair: check.expression_pair,
            is_contradictory: check.is_contradictory,
            reason: check.reason,
        }
    }
}

// ============================================================================
// Knowledge graph
// ============================================================================

pub(crate) fn graph_prompt(text: &str) -> String {
    format!(
        "Build a knowledge graph from the following text. Identify the key entities \
         (people, places, concepts) as nodes and the relations between them as edges, \
         then summarize the relations briefly. Text: \"{text}\""
    )
}

pub(crate) fn graph_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "nodes": {
                "type": "ARRAY",
                "description": "Graph nodes (entities)",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": { "type": "STRING", "description": "Unique entity identifier" },
                        "label": { "type": "STRING", "description": "Display name" }
                    },
                    "required": ["id", "label"]
                }
            },
            "edges": {
                "type": "ARRAY",
                "description": "Graph edges (relations)",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "from": { "type": "STRING", "description": "Source node id" },
                        "to": { "type": "STRING", "description": "Target node id" },
                        "label": { "type": "STRING", "description": "Relation label" }
                    },
                    "required": ["from", "to", "label"]
                }
            },
            "summary": {
                "type": "STRING",
                "description": "Concise natural-language summary of the relations"
            }
        },
        "required": ["nodes", "edges", "summary"]
    })
}
