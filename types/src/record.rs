//! Per-request result records as seen by consumers.

use serde::{Deserialize, Serialize};

use crate::{
    FactCheckMessage, GraphMessage, HallucinationMessage, LarkMessage, LarkStepName, StepStatus,
};

/// Lifecycle of one request: `Pending` moves exactly once to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Complete,
    Error,
}

impl RequestStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

/// A single-shot result slot. The payload exists only once complete; the
/// cause exists only once failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum RecordState<T> {
    Pending,
    Complete(T),
    Error(String),
}

impl<T> RecordState<T> {
    #[must_use]
    pub const fn status(&self) -> RequestStatus {
        match self {
            Self::Pending => RequestStatus::Pending,
            Self::Complete(_) => RequestStatus::Complete,
            Self::Error(_) => RequestStatus::Error,
        }
    }

    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Complete(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(cause) => Some(cause),
            _ => None,
        }
    }
}

/// Which analysis a request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Web-grounded streaming fact check.
    Fact,
    /// Extract → cross-check → synthesize over logical expressions.
    Logical,
    /// Batched contradiction probing over sub-phrase combinations.
    Hallucination,
    /// Knowledge-graph extraction.
    Graph,
}

impl AnalysisMode {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fact" | "facts" | "fact-check" => Some(Self::Fact),
            "logical" | "logic" | "lark" => Some(Self::Logical),
            "hallucination" | "halluc" | "combo" => Some(Self::Hallucination),
            "graph" | "kg" | "knowledge-graph" => Some(Self::Graph),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fact => "fact",
            Self::Logical => "logical",
            Self::Hallucination => "hallucination",
            Self::Graph => "graph",
        }
    }

    #[must_use]
    pub const fn all() -> &'static [AnalysisMode] {
        &[Self::Fact, Self::Logical, Self::Hallucination, Self::Graph]
    }
}

/// Snapshot of one request's result slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisRecord {
    Hallucination(HallucinationMessage),
    Logical(LarkMessage),
    Graph(GraphMessage),
    FactCheck(FactCheckMessage),
}

impl AnalysisRecord {
    #[must_use]
    pub fn status(&self) -> RequestStatus {
        match self {
            Self::Hallucination(message) => message.status(),
            Self::Logical(message) => message.status,
            Self::Graph(message) => message.status(),
            Self::FactCheck(message) => message.status,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    #[must_use]
    pub fn input(&self) -> &str {
        match self {
            Self::Hallucination(message) => &message.input,
            Self::Logical(message) => &message.input,
            Self::Graph(message) => &message.input,
            Self::FactCheck(message) => &message.input,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> AnalysisMode {
        match self {
            Self::Hallucination(_) => AnalysisMode::Hallucination,
            Self::Logical(_) => AnalysisMode::Logical,
            Self::Graph(_) => AnalysisMode::Graph,
            Self::FactCheck(_) => AnalysisMode::Fact,
        }
    }

    /// A fresh pending record for `mode`.
    #[must_use]
    pub fn pending(mode: AnalysisMode, input: impl Into<String>) -> Self {
        let input = input.into();
        match mode {
            AnalysisMode::Hallucination => Self::Hallucination(HallucinationMessage::pending(input)),
            AnalysisMode::Logical => Self::Logical(LarkMessage::new(input)),
            AnalysisMode::Graph => Self::Graph(GraphMessage::pending(input)),
            AnalysisMode::Fact => Self::FactCheck(FactCheckMessage::pending(input)),
        }
    }

    /// A terminal `error` record for `mode` with no progress.
    #[must_use]
    pub fn failed(mode: AnalysisMode, input: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::pending(mode, input).fail(cause)
    }

    /// Turn a still-pending snapshot into a terminal `error` record,
    /// keeping whatever progress it already shows. Terminal records are
    /// returned unchanged.
    #[must_use]
    pub fn fail(self, cause: impl Into<String>) -> Self {
        if self.is_terminal() {
            return self;
        }
        let cause = cause.into();
        match self {
            Self::Hallucination(message) => Self::Hallucination(HallucinationMessage {
                input: message.input,
                state: RecordState::Error(cause),
            }),
            Self::Logical(mut message) => {
                let from = LarkStepName::ALL
                    .into_iter()
                    .find(|name| message.step(*name).status != StepStatus::Complete)
                    .unwrap_or(LarkStepName::Synthesize);
                message.fail_from(from, cause);
                Self::Logical(message)
            }
            Self::Graph(message) => Self::Graph(GraphMessage {
                input: message.input,
                state: RecordState::Error(cause),
            }),
            Self::FactCheck(mut message) => {
                message.status = RequestStatus::Error;
                message.error = Some(cause);
                Self::FactCheck(message)
            }
        }
    }
}
