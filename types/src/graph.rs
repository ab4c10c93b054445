use serde::{Deserialize, Serialize};

use crate::{RecordState, RequestStatus, UsageMetadata};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub label: String,
}

/// Entities and relations extracted from a text, plus a prose summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub summary: String,
}

impl KnowledgeGraph {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    #[must_use]
    pub fn node_label<'a>(&'a self, id: &'a str) -> &'a str {
        self.nodes
            .iter()
            .find(|node| node.id == id)
            .map_or(id, |node| node.label.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphReport {
    pub graph: KnowledgeGraph,
    pub usage: Option<UsageMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphMessage {
    pub input: String,
    pub state: RecordState<GraphReport>,
}

impl GraphMessage {
    #[must_use]
    pub fn pending(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            state: RecordState::Pending,
        }
    }

    #[must_use]
    pub fn status(&self) -> RequestStatus {
        self.state.status()
    }
}
