//! Text classification and normalization for paragraph rewriting.
//!
//! Decides whether a paragraph is worth sending to a backend, and provides
//! the comparisons used when matching backend output back to runs.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Numbers with the usual decoration: signs, percent, separators, brackets.
static NUMERIC_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+\-\d\s%.,()]+$").unwrap());

/// Text without a single letter or digit in any script.
static SYMBOLS_ONLY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\p{L}\p{N}]*$").unwrap());

/// Whether a piece of text should be sent to a rewriting backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translatability {
    Translatable,
    NotTranslatable,
}

impl Translatability {
    pub fn is_translatable(self) -> bool {
        self == Translatability::Translatable
    }
}

/// Classify paragraph text.
///
/// Empty text, numbers like `42%` or `(1,234.5)`, and pure symbol strings
/// are not translatable; passing them through avoids a wasted call and
/// protects numeric formatting.
pub fn classify(text: &str) -> Translatability {
    let text = text.trim();
    if text.is_empty() || NUMERIC_REGEX.is_match(text) || SYMBOLS_ONLY_REGEX.is_match(text) {
        Translatability::NotTranslatable
    } else {
        Translatability::Translatable
    }
}

/// Normalize a segment for key comparison: NFC, trimmed.
///
/// Backends frequently hand back decomposed accents, so literal equality is
/// checked on the composed form.
pub fn normalize_segment(text: &str) -> String {
    text.trim().nfc().collect()
}

/// Rebuild a run text from a replacement, carrying over one leading and one
/// trailing space if the original had them.
///
/// No other whitespace is fabricated: `" Hello "` replaced by `"Bonjour"`
/// becomes `" Bonjour "`, `"Hello"` replaced by `" Bonjour "` becomes
/// `"Bonjour"`.
pub fn restore_edge_spaces(original: &str, replacement: &str) -> String {
    let mut result = String::with_capacity(replacement.len() + 2);
    if original.starts_with(' ') {
        result.push(' ');
    }
    result.push_str(replacement.trim());
    if original.ends_with(' ') {
        result.push(' ');
    }
    result
}
