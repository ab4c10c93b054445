//! Extract → cross-check → synthesize over logical expressions.
//!
//! Steps run strictly in order and each transition is published as a full
//! [`LarkMessage`] snapshot, so consumers can render step 1 output while
//! step 2 is still in flight.

use std::sync::Arc;

use alon_providers::{Oracle, OracleRequest};
use alon_types::{
    ContradictionCheck, CrossCheckOutcome, FinalVerdict, LarkMessage, LarkStepName,
    LogicExpression, OracleSettings, UsageMetadata,
};

use crate::config::EngineConfig;
use crate::errors::AnalysisError;
use crate::normalize::{normalize_list, parse_json};
use crate::prompts::{
    PairCheck, crosscheck_prompt, crosscheck_schema, extraction_prompt, extraction_schema,
};
use crate::usage::UsageAccumulator;

/// Fewest expressions worth comparing.
const MIN_EXPRESSIONS_TO_COMPARE: usize = 2;

pub const INSUFFICIENT_EXPRESSIONS_SUMMARY: &str =
    "not enough logic expressions to compare for contradictions (at least 2 required)";
pub const NO_CONTRADICTION_SUMMARY: &str =
    "no apparent contradiction found between the analyzed expressions";

pub struct LogicalAnalysis {
    oracle: Arc<dyn Oracle>,
    settings: OracleSettings,
}

impl LogicalAnalysis {
    #[must_use]
    pub fn new(oracle: Arc<dyn Oracle>, config: &EngineConfig) -> Self {
        Self {
            oracle,
            settings: config.settings.clone(),
        }
    }

    /// Run all three steps, calling `publish` after every transition.
    ///
    /// Never returns `Err`: failures are recorded on the returned message.
    pub async fn run(&self, text: &str, mut publish: impl FnMut(&LarkMessage)) -> LarkMessage {
        let mut message = LarkMessage::new(text);
        let mut usage = UsageAccumulator::new();

        // Step 1: extract
        let expressions = match self.extract(text).await {
            Ok((expressions, delta)) => {
                usage.record(delta);
                message.usage = usage.total();
                message.results.logic_expressions = Some(expressions.clone());
                message.complete_step(LarkStepName::Extract);
                publish(&message);
                expressions
            }
            Err(error) => {
                tracing::warn!(%error, "Logic extraction failed");
                message.fail_from(LarkStepName::Extract, error.user_message());
                publish(&message);
                return message;
            }
        };

        // Step 2: crosscheck
        let outcome = if expressions.len() < MIN_EXPRESSIONS_TO_COMPARE {
            tracing::debug!(expressions = expressions.len(), "Skipping cross-check");
            CrossCheckOutcome::Insufficient {
                expressions: expressions.len(),
            }
        } else {
            let formulas: Vec<String> = expressions.into_iter().map(|e| e.expression).collect();
            match self.crosscheck(&formulas).await {
                Ok((checks, delta)) => {
                    usage.record(delta);
                    CrossCheckOutcome::Compared { checks }
                }
                Err(error) => {
                    tracing::warn!(%error, "Cross-check failed");
                    message.fail_from(LarkStepName::Crosscheck, error.user_message());
                    publish(&message);
                    return message;
                }
            }
        };
        message.usage = usage.total();
        let verdict = synthesize(&outcome);
        message.results.crosscheck = Some(outcome);
        message.complete_step(LarkStepName::Crosscheck);
        publish(&message);

        // Step 3: synthesize (local)
        message.results.final_verdict = Some(verdict);
        message.complete_step(LarkStepName::Synthesize);
        message.finish();
        tracing::info!(
            oracle_calls = usage.calls(),
            tokens_used = usage.total().total_token_count,
            "Logical analysis complete"
        );
        publish(&message);
        message
    }

    async fn extract(
        &self,
        text: &str,
    ) -> Result<(Vec<LogicExpression>, Option<UsageMetadata>), AnalysisError> {
        let request = OracleRequest::new(self.settings.clone(), extraction_prompt(text))
            .with_response_schema(extraction_schema());
        let response = self.oracle.generate(&request).await?;
        let value = parse_json(&response.text, "logic extraction")?;
        Ok((normalize_list(value, "logic expressions"), response.usage))
    }

    async fn crosscheck(
        &self,
        expressions: &[String],
    ) -> Result<(Vec<ContradictionCheck>, Option<UsageMetadata>), AnalysisError> {
        let request = OracleRequest::new(self.settings.clone(), crosscheck_prompt(expressions))
            .with_response_schema(crosscheck_schema());
        let response = self.oracle.generate(&request).await?;
        let value = parse_json(&response.text, "cross-check")?;
        let checks: Vec<PairCheck> = normalize_list(value, "contradiction checks");
        Ok((checks.into_iter().map(Into::into).collect(), response.usage))
    }
}

/// Count contradictory pairs and phrase the final verdict.
#[must_use]
pub fn synthesize(outcome: &CrossCheckOutcome) -> FinalVerdict {
    if let CrossCheckOutcome::Insufficient { .. } = outcome {
        return FinalVerdict {
            contradiction_found: false,
            summary: INSUFFICIENT_EXPRESSIONS_SUMMARY.to_string(),
        };
    }
    let found = outcome.contradiction_count();
    let summary = match found {
        0 => NO_CONTRADICTION_SUMMARY.to_string(),
        1 => "1 contradictory relationship found".to_string(),
        n => format!("{n} contradictory relationships found"),
    };
    FinalVerdict {
        contradiction_found: found > 0,
        summary,
    }
}
