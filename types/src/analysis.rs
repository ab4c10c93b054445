//! Hallucination-analysis domain: tokens, combinations, per-combination verdicts.

use serde::{Deserialize, Serialize};

use crate::{RecordState, RequestStatus, UsageMetadata};

/// An atomic unit of the tokenized input.
pub type Token = String;

/// An ordered sequence of tokens probed as one unit.
///
/// Combinations produced by the generator are already canonical (tokens
/// sorted), so two combinations compare equal iff they hold the same
/// multiset of tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Combination(Vec<Token>);

impl Combination {
    #[must_use]
    pub fn new(tokens: Vec<Token>) -> Self {
        Self(tokens)
    }

    /// Build the canonical form: tokens sorted lexicographically.
    #[must_use]
    pub fn canonical(mut tokens: Vec<Token>) -> Self {
        tokens.sort();
        Self(tokens)
    }

    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flat text sent to the oracle: tokens joined by single spaces.
    #[must_use]
    pub fn text(&self) -> String {
        self.0.join(" ")
    }
}

/// The oracle's judgement for one submitted combination text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContradictionVerdict {
    pub combo_text: String,
    pub is_contradiction: bool,
    pub reason: String,
}

impl ContradictionVerdict {
    /// Reason attached to verdicts synthesized for items the oracle omitted.
    pub const MISSING_REASON: &'static str = "no result returned";

    /// Placeholder for a submitted text the oracle did not answer.
    #[must_use]
    pub fn missing(combo_text: impl Into<String>) -> Self {
        Self {
            combo_text: combo_text.into(),
            is_contradiction: false,
            reason: Self::MISSING_REASON.to_string(),
        }
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        !self.is_contradiction && self.reason == Self::MISSING_REASON
    }
}

/// A combination the oracle flagged, re-split into its tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HallucinatedCombination {
    pub combo: Vec<Token>,
    pub reason: String,
}

impl HallucinatedCombination {
    #[must_use]
    pub fn from_verdict(verdict: &ContradictionVerdict) -> Self {
        Self {
            combo: verdict
                .combo_text
                .split(' ')
                .filter(|part| !part.is_empty())
                .map(ToString::to_string)
                .collect(),
            reason: verdict.reason.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub tokens: Vec<Token>,
    pub total_combinations: usize,
    pub hallucinated_combinations: Vec<HallucinatedCombination>,
    pub all_combinations: Vec<Combination>,
    /// One verdict per submitted combination, in submission order.
    pub verdicts: Vec<ContradictionVerdict>,
}

impl AnalysisResult {
    /// Percentage of combinations flagged as contradictory.
    #[must_use]
    pub fn hallucination_rate(&self) -> f64 {
        if self.total_combinations == 0 {
            return 0.0;
        }
        self.hallucinated_combinations.len() as f64 / self.total_combinations as f64 * 100.0
    }
}

/// Completed hallucination analysis plus what it cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HallucinationReport {
    pub result: AnalysisResult,
    pub usage: UsageMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HallucinationMessage {
    pub input: String,
    pub state: RecordState<HallucinationReport>,
}

impl HallucinationMessage {
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
