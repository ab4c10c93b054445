//! Core domain types for AI-On text analysis.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod analysis;
mod fact;
mod graph;
mod ids;
mod lark;
mod record;
mod usage;

pub use analysis::{
    AnalysisResult, Combination, ContradictionVerdict, HallucinatedCombination,
    HallucinationMessage, HallucinationReport, Token,
};
pub use fact::{FactCheckMessage, GroundingReference};
pub use graph::{GraphEdge, GraphMessage, GraphNode, GraphReport, KnowledgeGraph};
pub use ids::RequestId;
pub use lark::{
    ContradictionCheck, CrossCheckOutcome, FinalVerdict, LarkMessage, LarkResults, LarkStep,
    LarkStepName, LogicExpression, PREVIOUS_STEP_FAILED, StepStatus,
};
pub use record::{AnalysisMode, AnalysisRecord, RecordState, RequestStatus};
pub use usage::UsageMetadata;

use serde::{Deserialize, Serialize};

// ============================================================================
// Oracle Settings
// ============================================================================

/// Model used when nothing else is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TOP_P: f32 = 0.95;

/// Sampling knobs passed through to every oracle call.
///
/// Temperature and top-p are clamped to `[0, 1]` on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleSettings {
    model: String,
    temperature: f32,
    top_p: f32,
    top_k: Option<u32>,
}

impl OracleSettings {
    #[must_use]
    pub fn new(model: impl Into<String>, temperature: f32, top_p: f32) -> Self {
        let model = model.into();
        let model = if model.trim().is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            model.trim().to_string()
        };
        Self {
            model,
            temperature: clamp_unit(temperature),
            top_p: clamp_unit(top_p),
            top_k: None,
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub const fn temperature(&self) -> f32 {
        self.temperature
    }

    #[must_use]
    pub const fn top_p(&self) -> f32 {
        self.top_p
    }

    #[must_use]
    pub const fn top_k(&self) -> Option<u32> {
        self.top_k
    }
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL, DEFAULT_TEMPERATURE, DEFAULT_TOP_P)
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// ============================================================================
// Streaming Events
// ============================================================================

/// Incremental output of a streaming oracle call.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta(String),
    /// Sources cited so far in this chunk (may repeat across chunks).
    Grounding(Vec<GroundingReference>),
    Usage(UsageMetadata),
    Done,
    Error(String),
}

impl StreamEvent {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_clamp_to_unit_interval() {
        let settings = OracleSettings::new("m", 1.7, -0.2);
        assert!((settings.temperature() - 1.0).abs() < f32::EPSILON);
        assert!(settings.top_p().abs() < f32::EPSILON);
        assert_eq!(settings.top_k(), None);
    }

    #[test]
    fn settings_blank_model_uses_default() {
        let settings = OracleSettings::new("  ", 0.5, 0.5);
        assert_eq!(settings.model(), DEFAULT_MODEL);
    }

    #[test]
    fn settings_nan_becomes_zero() {
        let settings = OracleSettings::new("m", f32::NAN, 0.5);
        assert!(settings.temperature().abs() < f32::EPSILON);
    }

    #[test]
    fn terminal_stream_events() {
        assert!(StreamEvent::Done.is_terminal());
        assert!(StreamEvent::Error("x".into()).is_terminal());
        assert!(!StreamEvent::TextDelta("x".into()).is_terminal());
    }
}
