//! Batched contradiction probing over sub-phrase combinations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alon_providers::{Oracle, OracleRequest};
use alon_types::{
    AnalysisResult, Combination, ContradictionVerdict, HallucinatedCombination,
    HallucinationReport, OracleSettings, UsageMetadata,
};

use crate::combinations::CombinationGenerator;
use crate::config::EngineConfig;
use crate::errors::AnalysisError;
use crate::normalize::{normalize_list, parse_json};
use crate::prompts::{BatchVerdict, batch_contradiction_prompt, batch_contradiction_schema};
use crate::tokenizer::Tokenizer;
use crate::usage::UsageAccumulator;

pub const TOO_SHORT_MESSAGE: &str = "cannot build combinations to analyze; input is too short";

/// Tokenize → combine → check in sequential, throttled batches.
pub struct HallucinationPipeline {
    oracle: Arc<dyn Oracle>,
    settings: OracleSettings,
    tokenizer: Tokenizer,
    generator: CombinationGenerator,
    batch_size: usize,
    inter_batch_delay: Duration,
}

impl HallucinationPipeline {
    #[must_use]
    pub fn new(oracle: Arc<dyn Oracle>, config: &EngineConfig) -> Self {
        Self {
            oracle,
            settings: config.settings.clone(),
            tokenizer: Tokenizer::new(config.affixes.iter().cloned()),
            generator: CombinationGenerator::new(config.window_size, config.min_size),
            batch_size: config.batch_size.max(1),
            inter_batch_delay: config.inter_batch_delay,
        }
    }

    /// Full request: tokenize, generate, then [`Self::analyze`].
    pub async fn analyze_text(&self, text: &str) -> Result<HallucinationReport, AnalysisError> {
        let tokens = self.tokenizer.tokenize(text);
        let combinations = self.generator.generate(&tokens);
        tracing::debug!(
            tokens = tokens.len(),
            combinations = combinations.len(),
            "Prepared hallucination analysis"
        );
        let mut report = self.analyze(combinations).await?;
        report.result.tokens = tokens;
        Ok(report)
    }

    /// Check every combination, one oracle call per batch, pausing between
    /// batches. Any failed call aborts the whole analysis.
    pub async fn analyze(
        &self,
        combinations: Vec<Combination>,
    ) -> Result<HallucinationReport, AnalysisError> {
        if combinations.is_empty() {
            return Err(AnalysisError::Validation(TOO_SHORT_MESSAGE.to_string()));
        }

        let texts: Vec<String> = combinations.iter().map(Combination::text).collect();
        let batch_count = texts.len().div_ceil(self.batch_size);
        let mut usage = UsageAccumulator::new();
        let mut verdicts = Vec::with_capacity(texts.len());

        for (index, batch) in texts.chunks(self.batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.inter_batch_delay).await;
            }
            tracing::debug!(batch = index + 1, of = batch_count, size = batch.len(), "Checking batch");
            let (batch_verdicts, batch_usage) = self.check_batch(batch).await?;
            usage.record(batch_usage);
            verdicts.extend(batch_verdicts);
        }

        let hallucinated_combinations: Vec<HallucinatedCombination> = verdicts
            .iter()
            .filter(|verdict| verdict.is_contradiction)
            .map(HallucinatedCombination::from_verdict)
            .collect();

        tracing::info!(
            combinations = combinations.len(),
            flagged = hallucinated_combinations.len(),
            tokens_used = usage.total().total_token_count,
            "Hallucination analysis complete"
        );

        Ok(HallucinationReport {
            result: AnalysisResult {
                tokens: Vec::new(),
                total_combinations: combinations.len(),
                hallucinated_combinations,
                all_combinations: combinations,
                verdicts,
            },
            usage: usage.total(),
        })
    }

    async fn check_batch(
        &self,
        batch: &[String],
    ) -> Result<(Vec<ContradictionVerdict>, Option<UsageMetadata>), AnalysisError> {
        let request = OracleRequest::new(self.settings.clone(), batch_contradiction_prompt(batch))
            .with_response_schema(batch_contradiction_schema());
        let response = self.oracle.generate(&request).await?;
        let value = parse_json(&response.text, "contradiction batch")?;
        let returned: Vec<BatchVerdict> = normalize_list(value, "contradiction verdicts");
        Ok((reconcile(batch, returned), response.usage))
    }
}

/// One verdict per submitted text, in submission order; texts the oracle
/// skipped get a placeholder.
pub(crate) fn reconcile(submitted: &[String], returned: Vec<BatchVerdict>) -> Vec<ContradictionVerdict> {
    let mut by_text: HashMap<String, BatchVerdict> = returned
        .into_iter()
        .map(|verdict| (verdict.text.clone(), verdict))
        .collect();

    let mut missing = 0usize;
    let verdicts = submitted
        .iter()
        .map(|text| match by_text.remove(text) {
            Some(verdict) => ContradictionVerdict {
                combo_text: text.clone(),
                is_contradiction: verdict.is_contradiction,
                reason: verdict.reason,
            },
            None => {
                missing += 1;
                ContradictionVerdict::missing(text.clone())
            }
        })
        .collect();

    if missing > 0 {
        tracing::warn!(missing, submitted = submitted.len(), "Oracle omitted verdicts; filled placeholders");
    }
    verdicts
}
