//! Pronunciation fixups applied before synthesis

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w+\b").expect("word pattern compiles"));

/// Whole-word substitution table.
///
/// Words are matched case-insensitively (the table is keyed by lowercase
/// words); unmatched words are left exactly as written.
#[derive(Clone, Debug)]
pub struct WordMap {
    words: HashMap<String, String>,
}

impl WordMap {
    /// Build a map; keys are lowercased
    #[must_use]
    pub fn new(words: HashMap<String, String>) -> Self {
        let words = words
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Self { words }
    }

    /// An empty map
    #[must_use]
    pub fn empty() -> Self {
        Self::new(HashMap::new())
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the map has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Substitute every mapped word in `text`
    #[must_use]
    pub fn apply(&self, text: &str) -> String {
        if self.words.is_empty() {
            return text.to_string();
        }
        WORD.replace_all(text, |caps: &Captures<'_>| {
            let word = &caps[0];
            self.words
                .get(&word.to_lowercase())
                .cloned()
                .unwrap_or_else(|| word.to_string())
        })
        .into_owned()
    }
}

impl Default for WordMap {
    fn default() -> Self {
        Self::empty()
    }
}
