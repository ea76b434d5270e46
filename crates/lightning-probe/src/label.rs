//! Label normalization and matching.
//!
//! Field labels arrive from feature files (often with typographic quotes) and
//! are compared against text scraped from the page. Both sides go through the
//! same normalization: smart quotes replaced, whitespace collapsed, case folded.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Replace typographic quotes with their ASCII forms
#[must_use]
pub fn normalize_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{00AB}' | '\u{00BB}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => '\'',
            other => other,
        })
        .collect()
}

/// Normalize quotes, collapse whitespace runs and trim
#[must_use]
pub fn normalize_text(text: &str) -> String {
    normalize_quotes(text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized, case-folded form used for comparisons
#[must_use]
pub fn fold(text: &str) -> String {
    normalize_text(text).to_lowercase()
}

/// Words of a text: alphanumeric runs, case folded
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    fold(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Strip decorations Lightning puts around label text ("*Status", "Status:")
fn strip_decorations(folded: &str) -> &str {
    folded
        .trim_matches(|c: char| c == '*' || c == ':' || c.is_whitespace())
        .trim_end_matches(" required")
}

/// A field label prepared for matching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelQuery {
    raw: String,
    folded: String,
    tokens: Vec<String>,
}

impl LabelQuery {
    /// Prepare a label
    #[must_use]
    pub fn new(label: &str) -> Self {
        let raw = normalize_text(label);
        let folded = raw.to_lowercase();
        let tokens = tokenize(&raw);
        Self {
            raw,
            folded,
            tokens,
        }
    }

    /// Label as written, quotes and whitespace normalized
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Case-folded label
    #[must_use]
    pub fn folded(&self) -> &str {
        &self.folded
    }

    /// Word tokens of the label
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Label is blank after normalization
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Text equals the label, ignoring case and label decorations
    #[must_use]
    pub fn matches_exact(&self, text: &str) -> bool {
        let folded = fold(text);
        strip_decorations(&folded) == self.folded
    }

    /// Every label token appears as a whole word in `text`
    #[must_use]
    pub fn matches_all_tokens(&self, text: &str) -> bool {
        if self.is_empty() {
            return false;
        }
        let words = tokenize(text);
        self.tokens.iter().all(|t| words.contains(t))
    }

    /// Words in `text` that are not label tokens. Smaller is a tighter match.
    #[must_use]
    pub fn extra_words(&self, text: &str) -> usize {
        tokenize(text)
            .iter()
            .filter(|w| !self.tokens.contains(w))
            .count()
    }

    /// Text is the label echoed back rather than a value
    #[must_use]
    pub fn is_echo(&self, text: &str) -> bool {
        self.matches_exact(text)
    }
}

/// Text is an inline-edit affordance ("Change Owner") rather than a value
#[must_use]
pub fn is_edit_hint(text: &str) -> bool {
    fold(text).starts_with("change")
}

impl fmt::Display for LabelQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for LabelQuery {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}
