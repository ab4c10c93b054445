//! Token usage folding across the oracle calls of one operation.

use alon_types::UsageMetadata;

/// Running total for one logical operation.
///
/// Each stage hands back its own delta; the orchestrator folds them here
/// instead of sharing a mutable counter between stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageAccumulator {
    total: UsageMetadata,
    calls: usize,
}

impl UsageAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one oracle call. Calls that reported no usage count as zero.
    pub fn record(&mut self, usage: Option<UsageMetadata>) {
        self.total += usage.unwrap_or_default();
        self.calls += 1;
    }

    #[must_use]
    pub const fn total(&self) -> UsageMetadata {
        self.total
    }

    /// Number of oracle calls recorded.
    #[must_use]
    pub const fn calls(&self) -> usize {
        self.calls
    }
}
