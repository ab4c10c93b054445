//! Web-grounded streaming fact check.

use std::sync::Arc;

use alon_providers::{Oracle, OracleRequest};
use alon_types::{FactCheckMessage, OracleSettings, RequestStatus, StreamEvent};
use tokio::sync::mpsc;

use crate::config::EngineConfig;
use crate::errors::AnalysisError;
use crate::prompts::FACT_CHECK_SYSTEM_INSTRUCTION;

const STREAM_CHANNEL_CAPACITY: usize = 64;

pub struct FactChecker {
    oracle: Arc<dyn Oracle>,
    settings: OracleSettings,
}

impl FactChecker {
    #[must_use]
    pub fn new(oracle: Arc<dyn Oracle>, config: &EngineConfig) -> Self {
        Self {
            oracle,
            settings: config.settings.clone(),
        }
    }

    /// Stream a grounded answer for `text`, publishing a snapshot whenever
    /// the text or the source list changes, and once more when terminal.
    pub async fn check(
        &self,
        text: &str,
        mut publish: impl FnMut(&FactCheckMessage),
    ) -> FactCheckMessage {
        let request = OracleRequest::new(self.settings.clone(), text)
            .with_system_instruction(FACT_CHECK_SYSTEM_INSTRUCTION)
            .with_web_search();
        let mut message = FactCheckMessage::pending(text);
        let (tx, mut rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

        let mut stream_error: Option<String> = None;
        let mut finished = false;
        let consume = async {
            while let Some(event) = rx.recv().await {
                if finished {
                    continue;
                }
                match event {
                    StreamEvent::TextDelta(delta) => {
                        message.text.push_str(&delta);
                        publish(&message);
                    }
                    StreamEvent::Grounding(sources) => {
                        if message.merge_sources(sources) > 0 {
                            publish(&message);
                        }
                    }
                    // Gemini reports a running total per chunk.
                    StreamEvent::Usage(usage) => message.usage = Some(usage),
                    StreamEvent::Done => finished = true,
                    StreamEvent::Error(error) => {
                        stream_error = Some(error);
                        finished = true;
                    }
                }
            }
        };
        let (outcome, ()) = tokio::join!(self.oracle.stream(&request, tx), consume);

        let failure = match outcome {
            Err(error) => Some(AnalysisError::from(error).user_message()),
            Ok(()) => stream_error.map(|error| format!("fact check failed: {error}")),
        };
        match failure {
            Some(cause) => {
                tracing::warn!(%cause, "Fact check failed");
                message.status = RequestStatus::Error;
                message.error = Some(cause);
            }
            None => {
                tracing::info!(
                    chars = message.text.chars().count(),
                    sources = message.sources.len(),
                    "Fact check complete"
                );
                message.status = RequestStatus::Complete;
            }
        }
        publish(&message);
        message
    }
}
