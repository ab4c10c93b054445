//! Bounded sub-phrase combination generation.

use std::collections::HashSet;

use alon_types::{Combination, Token};

pub const DEFAULT_WINDOW_SIZE: usize = 5;
pub const DEFAULT_MIN_SIZE: usize = 2;

/// Produces every canonical token subset of size `[min_size, window_size]`,
/// sliding a window over long inputs so cost stays `O(n · 2^window)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombinationGenerator {
    window_size: usize,
    min_size: usize,
}

impl Default for CombinationGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE, DEFAULT_MIN_SIZE)
    }
}

impl CombinationGenerator {
    /// `min_size` is raised to at least 1 and `window_size` to at least `min_size`.
    #[must_use]
    pub fn new(window_size: usize, min_size: usize) -> Self {
        let min_size = min_size.max(1);
        Self {
            window_size: window_size.max(min_size),
            min_size,
        }
    }

    #[must_use]
    pub const fn window_size(&self) -> usize {
        self.window_size
    }

    #[must_use]
    pub const fn min_size(&self) -> usize {
        self.min_size
    }

    /// Deduplicated canonical combinations, in first-seen order.
    ///
    /// Returns an empty list when `tokens` is shorter than `min_size`.
    #[must_use]
    pub fn generate(&self, tokens: &[Token]) -> Vec<Combination> {
        let mut unique = UniqueCombinations::default();
        if tokens.len() < self.min_size {
            return unique.into_vec();
        }

        if tokens.len() <= self.window_size {
            self.collect_window(tokens, &mut unique);
        } else {
            for window in tokens.windows(self.window_size) {
                self.collect_window(window, &mut unique);
            }
        }
        unique.into_vec()
    }

    fn collect_window(&self, window: &[Token], unique: &mut UniqueCombinations) {
        let mut current = Vec::with_capacity(window.len());
        for size in self.min_size..=window.len() {
            subsets_of_size(window, size, 0, &mut current, unique);
        }
    }
}

fn subsets_of_size(
    window: &[Token],
    size: usize,
    start: usize,
    current: &mut Vec<Token>,
    unique: &mut UniqueCombinations,
) {
    if current.len() == size {
        unique.insert(Combination::canonical(current.clone()));
        return;
    }
    let remaining = size - current.len();
    for index in start..=window.len().saturating_sub(remaining) {
        current.push(window[index].clone());
        subsets_of_size(window, size, index + 1, current, unique);
        current.pop();
    }
}

#[derive(Default)]
struct UniqueCombinations {
    seen: HashSet<Combination>,
    ordered: Vec<Combination>,
}

impl UniqueCombinations {
    fn insert(&mut self, combination: Combination) {
        if self.seen.insert(combination.clone()) {
            self.ordered.push(combination);
        }
    }

    fn into_vec(self) -> Vec<Combination> {
        self.ordered
    }
}
