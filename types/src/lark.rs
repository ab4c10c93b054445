//! Logical analysis ("lark") records.
//!
//! A run has exactly three steps, executed in order. Step status only moves
//! forward (`Pending` → `Complete` | `Error`) and once the overall status is
//! terminal the message is frozen.

use serde::{Deserialize, Serialize};

use crate::{RequestStatus, UsageMetadata};

/// Note attached to steps that never ran because an earlier one failed.
pub const PREVIOUS_STEP_FAILED: &str = "previous step failed";

/// One sentence of the input and its predicate-logic rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicExpression {
    pub sentence: String,
    pub expression: String,
}

/// Oracle-reported comparison of two expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContradictionCheck {
    pub pair: (String, String),
    pub is_contradictory: bool,
    pub reason: String,
}

/// Output of the cross-check step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrossCheckOutcome {
    /// Too few expressions to compare; no oracle call was made.
    Insufficient { expressions: usize },
    Compared { checks: Vec<ContradictionCheck> },
}

impl CrossCheckOutcome {
    #[must_use]
    pub fn checks(&self) -> &[ContradictionCheck] {
        match self {
            Self::Insufficient { .. } => &[],
            Self::Compared { checks } => checks,
        }
    }

    #[must_use]
    pub fn contradiction_count(&self) -> usize {
        self.checks().iter().filter(|c| c.is_contradictory).count()
    }
}

/// Output of the synthesize step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalVerdict {
    pub contradiction_found: bool,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LarkStepName {
    Extract,
    Crosscheck,
    Synthesize,
}

impl LarkStepName {
    pub const ALL: [LarkStepName; 3] = [Self::Extract, Self::Crosscheck, Self::Synthesize];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Extract => 0,
            Self::Crosscheck => 1,
            Self::Synthesize => 2,
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Extract => "Logic expression extraction",
            Self::Crosscheck => "Contradiction cross-check",
            Self::Synthesize => "Final result",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LarkStep {
    pub name: LarkStepName,
    pub status: StepStatus,
    pub error: Option<String>,
}

impl LarkStep {
    #[must_use]
    pub const fn pending(name: LarkStepName) -> Self {
        Self {
            name,
            status: StepStatus::Pending,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LarkResults {
    pub logic_expressions: Option<Vec<LogicExpression>>,
    pub crosscheck: Option<CrossCheckOutcome>,
    pub final_verdict: Option<FinalVerdict>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LarkMessage {
    pub input: String,
    pub status: RequestStatus,
    pub steps: [LarkStep; 3],
    pub results: LarkResults,
    pub usage: UsageMetadata,
    pub error: Option<String>,
}

impl LarkMessage {
    #[must_use]
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            status: RequestStatus::Pending,
            steps: LarkStepName::ALL.map(LarkStep::pending),
            results: LarkResults::default(),
            usage: UsageMetadata::default(),
            error: None,
        }
    }

    #[must_use]
    pub fn step(&self, name: LarkStepName) -> &LarkStep {
        &self.steps[name.index()]
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.status.is_terminal()
    }

    /// Mark `name` complete.
    ///
    /// Returns `false` (and changes nothing) if the message is frozen, the
    /// step already left `Pending`, or an earlier step is not complete.
    pub fn complete_step(&mut self, name: LarkStepName) -> bool {
        if self.is_frozen() || self.step(name).status != StepStatus::Pending {
            return false;
        }
        let earlier_done = self.steps[..name.index()]
            .iter()
            .all(|s| s.status == StepStatus::Complete);
        if !earlier_done {
            return false;
        }
        self.steps[name.index()].status = StepStatus::Complete;
        true
    }

    /// Fail `name` with `cause`; every later pending step fails with
    /// [`PREVIOUS_STEP_FAILED`] and the message becomes terminal.
    pub fn fail_from(&mut self, name: LarkStepName, cause: impl Into<String>) {
        if self.is_frozen() {
            return;
        }
        let cause = cause.into();
        for step in &mut self.steps[name.index()..] {
            if step.status != StepStatus::Pending {
                continue;
            }
            step.status = StepStatus::Error;
            step.error = Some(if step.name == name {
                cause.clone()
            } else {
                PREVIOUS_STEP_FAILED.to_string()
            });
        }
        self.status = RequestStatus::Error;
        self.error = Some(cause);
    }

    /// Terminal success. Only valid once every step is complete.
    pub fn finish(&mut self) -> bool {
        if self.is_frozen() || self.steps.iter().any(|s| s.status != StepStatus::Complete) {
            return false;
        }
        self.status = RequestStatus::Complete;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_has_three_pending_steps() {
        let message = LarkMessage::new("p");
        assert_eq!(message.status, RequestStatus::Pending);
        let names: Vec<_> = message.steps.iter().map(|s| s.name).collect();
        assert_eq!(names, LarkStepName::ALL);
        assert!(message.steps.iter().all(|s| s.status == StepStatus::Pending));
    }

    #[test]
    fn steps_complete_only_in_order() {
        let mut message = LarkMessage::new("p");
        assert!(!message.complete_step(LarkStepName::Crosscheck));
        assert!(message.complete_step(LarkStepName::Extract));
        assert!(message.complete_step(LarkStepName::Crosscheck));
        assert!(!message.complete_step(LarkStepName::Crosscheck));
        assert!(message.complete_step(LarkStepName::Synthesize));
        assert!(message.finish());
        assert_eq!(message.status, RequestStatus::Complete);
    }

    #[test]
    fn finish_requires_all_steps() {
        let mut message = LarkMessage::new("p");
        message.complete_step(LarkStepName::Extract);
        assert!(!message.finish());
        assert_eq!(message.status, RequestStatus::Pending);
    }

    #[test]
    fn failure_cascades_to_later_steps() {
        let mut message = LarkMessage::new("p");
        message.fail_from(LarkStepName::Extract, "quota");
        assert_eq!(message.status, RequestStatus::Error);
        assert_eq!(message.error.as_deref(), Some("quota"));
        let extract = message.step(LarkStepName::Extract);
        assert_eq!(extract.status, StepStatus::Error);
        assert_eq!(extract.error.as_deref(), Some("quota"));
        for name in [LarkStepName::Crosscheck, LarkStepName::Synthesize] {
            let step = message.step(name);
            assert_eq!(step.status, StepStatus::Error);
            assert_eq!(step.error.as_deref(), Some(PREVIOUS_STEP_FAILED));
        }
    }

    #[test]
    fn failure_keeps_completed_steps() {
        let mut message = LarkMessage::new("p");
        message.complete_step(LarkStepName::Extract);
        message.fail_from(LarkStepName::Crosscheck, "network");
        assert_eq!(
            message.step(LarkStepName::Extract).status,
            StepStatus::Complete
        );
        assert_eq!(
            message.step(LarkStepName::Crosscheck).error.as_deref(),
            Some("network")
        );
    }

    #[test]
    fn frozen_message_ignores_changes() {
        let mut message = LarkMessage::new("p");
        message.fail_from(LarkStepName::Extract, "first");
        message.fail_from(LarkStepName::Extract, "second");
        assert_eq!(message.error.as_deref(), Some("first"));
        assert!(!message.complete_step(LarkStepName::Extract));
    }

    #[test]
    fn crosscheck_counts_contradictions() {
        let outcome = CrossCheckOutcome::Compared {
            checks: vec![
                ContradictionCheck {
                    pair: ("P".into(), "¬P".into()),
                    is_contradictory: true,
                    reason: "negation".into(),
                },
                ContradictionCheck {
                    pair: ("P".into(), "Q".into()),
                    is_contradictory: false,
                    reason: String::new(),
                },
            ],
        };
        assert_eq!(outcome.contradiction_count(), 1);
        assert_eq!(
            CrossCheckOutcome::Insufficient { expressions: 1 }.contradiction_count(),
            0
        );
    }
}
