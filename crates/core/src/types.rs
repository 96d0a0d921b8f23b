//! Domain types reported by a rewrite run.

use serde::{Deserialize, Serialize};

/// Progress notification sent after each slide completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideProgress {
    /// Slide part name, e.g. `slide3.xml`.
    pub slide_name: String,

    /// 1-based position of the slide in the presentation.
    pub index: usize,

    /// Number of slides in the presentation.
    pub total: usize,
}

/// What happened to a single paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParagraphOutcome {
    /// The paragraph now carries rewritten text.
    Rewritten,
    /// Nothing to rewrite (no text, numbers only, ...).
    Skipped,
    /// A backend or alignment failure left the original text in place.
    Degraded,
}

/// Counters for a rewrite run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteSummary {
    pub slides_processed: usize,
    pub paragraphs_seen: usize,
    pub paragraphs_rewritten: usize,
    pub paragraphs_skipped: usize,
    pub paragraphs_degraded: usize,
    pub runs_merged: usize,
    pub runs_removed: usize,
}

impl RewriteSummary {
    /// Create an empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one paragraph outcome.
    pub fn record(&mut self, outcome: ParagraphOutcome) {
        self.paragraphs_seen += 1;
        match outcome {
            ParagraphOutcome::Rewritten => self.paragraphs_rewritten += 1,
            ParagraphOutcome::Skipped => self.paragraphs_skipped += 1,
            ParagraphOutcome::Degraded => self.paragraphs_degraded += 1,
        }
    }
}

/// Overall result of a rewrite run that did not hit a structural error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewriteOutcome {
    /// Every selected slide was processed.
    Completed(RewriteSummary),
    /// The stop check fired; slides processed so far stay rewritten.
    Cancelled(RewriteSummary),
}

impl RewriteOutcome {
    pub fn summary(&self) -> &RewriteSummary {
        match self {
            RewriteOutcome::Completed(summary) | RewriteOutcome::Cancelled(summary) => summary,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RewriteOutcome::Cancelled(_))
    }
}
