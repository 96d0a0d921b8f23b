//! Paragraph text extraction.

use crate::run::{run_language, run_text};
use crate::xml::{NodeId, XmlDocument};
use slidemob_core::DEFAULT_LANGUAGE_TAG;

/// Text of one paragraph as seen by the rewriter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedParagraph {
    /// Run and field texts, trimmed and joined with single spaces.
    pub text: String,
    /// Distinct trimmed run texts, in order of first occurrence.
    pub segments: Vec<String>,
    /// Language of the last run that declares one.
    pub language: String,
}

impl ExtractedParagraph {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Reads paragraph text out of a slide tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParagraphExtractor;

impl ParagraphExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, doc: &XmlDocument, paragraph: NodeId) -> ExtractedParagraph {
        let mut parts: Vec<String> = Vec::new();
        let mut segments: Vec<String> = Vec::new();
        let mut language: Option<&str> = None;

        for child in doc.element_children(paragraph) {
            if doc.is_element(child, "r") {
                if let Some(lang) = run_language(doc, child) {
                    language = Some(lang);
                }
                let Some(text) = run_text(doc, child) else {
                    continue;
                };
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    continue;
                }
                parts.push(trimmed.to_string());
                if !segments.iter().any(|s| s == trimmed) {
                    segments.push(trimmed.to_string());
                }
            } else if doc.is_element(child, "fld") {
                let text = doc
                    .child_element(child, "t")
                    .map(|t| doc.text(t))
                    .unwrap_or_default();
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
            }
        }

        ExtractedParagraph {
            text: parts.join(" "),
            segments,
            language: language.unwrap_or(DEFAULT_LANGUAGE_TAG).to_string(),
        }
    }
}
