//! Whitespace tokenizer with bound-particle splitting.

use alon_types::Token;

/// Korean emphasis particles split off word endings, in priority order.
pub const DEFAULT_AFFIXES: [&str; 11] = [
    "만", "밖에", "도", "까지", "조차", "이라도", "라도", "뿐", "이나", "나마", "부터",
];

/// Splits text into words, then peels at most one configured affix off each word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokenizer {
    affixes: Vec<String>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(DEFAULT_AFFIXES)
    }
}

impl Tokenizer {
    /// Empty affixes are ignored; order is preserved.
    pub fn new<I, S>(affixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let affixes = affixes
            .into_iter()
            .map(Into::into)
            .filter(|affix: &String| !affix.is_empty())
            .collect();
        Self { affixes }
    }

    #[must_use]
    pub fn affixes(&self) -> &[String] {
        &self.affixes
    }

    /// Tokenize `text`.
    ///
    /// The first affix (in configured order) that ends a word and leaves a
    /// non-empty stem wins; the word becomes `[stem, affix]`.
    #[must_use]
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        for word in text.split_whitespace() {
            match self.split_word(word) {
                Some((stem, affix)) => {
                    tokens.push(stem.to_string());
                    tokens.push(affix.to_string());
                }
                None => tokens.push(word.to_string()),
            }
        }
        tokens
    }

    fn split_word<'a>(&self, word: &'a str) -> Option<(&'a str, &'a str)> {
        self.affixes
            .iter()
            .find(|affix| word.len() > affix.len() && word.ends_with(affix.as_str()))
            .map(|affix| word.split_at(word.len() - affix.len()))
    }
}
