use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Token consumption reported by the oracle.
///
/// One logical operation (an analysis, a pipeline run, a single extraction)
/// reports the sum over every call it actually made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub total_token_count: u64,
}

impl UsageMetadata {
    #[must_use]
    pub const fn new(total_token_count: u64) -> Self {
        Self { total_token_count }
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.total_token_count == 0
    }
}

impl Add for UsageMetadata {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            total_token_count: self.total_token_count.saturating_add(rhs.total_token_count),
        }
    }
}

impl AddAssign for UsageMetadata {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for UsageMetadata {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::UsageMetadata;

    #[test]
    fn sums_counts() {
        let total: UsageMetadata = [3, 4, 5].into_iter().map(UsageMetadata::new).sum();
        assert_eq!(total.total_token_count, 12);
    }

    #[test]
    fn addition_saturates() {
        let total = UsageMetadata::new(u64::MAX) + UsageMetadata::new(1);
        assert_eq!(total.total_token_count, u64::MAX);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(UsageMetadata::new(9)).unwrap();
        assert_eq!(json["totalTokenCount"], 9);
    }
}
