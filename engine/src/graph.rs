//! Single-call knowledge-graph extraction.

use std::sync::Arc;

use alon_providers::{Oracle, OracleRequest};
use alon_types::{GraphReport, OracleSettings};

use crate::config::EngineConfig;
use crate::errors::AnalysisError;
use crate::normalize::{normalize_graph, parse_json};
use crate::prompts::{graph_prompt, graph_schema};

pub struct GraphExtractor {
    oracle: Arc<dyn Oracle>,
    settings: OracleSettings,
}

impl GraphExtractor {
    #[must_use]
    pub fn new(oracle: Arc<dyn Oracle>, config: &EngineConfig) -> Self {
        Self {
            oracle,
            settings: config.settings.clone(),
        }
    }

    /// A wrongly shaped reply degrades to an empty graph; only a failed call
    /// or non-JSON text is an error.
    pub async fn extract(&self, text: &str) -> Result<GraphReport, AnalysisError> {
        let request = OracleRequest::new(self.settings.clone(), graph_prompt(text))
            .with_response_schema(graph_schema());
        let response = self.oracle.generate(&request).await?;
        let value = parse_json(&response.text, "knowledge graph")?;
        let graph = normalize_graph(value);
        tracing::info!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Knowledge graph extracted"
        );
        Ok(GraphReport {
            graph,
            usage: response.usage,
        })
    }
}
