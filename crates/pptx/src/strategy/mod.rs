//! Alignment strategies: how rewritten paragraph text is mapped back onto
//! the paragraph's runs.
//!
//! A strategy decides which transformer calls a paragraph needs and turns
//! their replies into a [`Reinsertion`]. It never mutates the document;
//! the orchestrator hands the result to the reinsertion engine.

pub mod mapping;
pub mod markers;

pub use mapping::{parse_mapping_response, SegmentMapper, SegmentMappingStrategy, TranslationMapping};
pub use markers::{decode, encode, DecodedNode, MarkedParagraph, MarkerStrategy, MarkerTarget};

use crate::extract::ExtractedParagraph;
use crate::orchestrator::CallGate;
use crate::xml::{NodeId, XmlDocument};
use slidemob_core::{RewriteConfig, StrategyKind};

/// What to write back into a paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reinsertion {
    /// Replace run texts by segment lookup.
    Mapping(TranslationMapping),
    /// Rebuild the paragraph content from decoded nodes.
    Nodes(Vec<DecodedNode>),
}

/// Result of running a strategy on one paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    /// Rewritten text is ready to be reinserted.
    Ready(Reinsertion),
    /// Nothing worth rewriting.
    Skipped,
    /// A call or the alignment failed; the paragraph keeps its text.
    Degraded,
    /// The stop check fired before a required call; nothing changes.
    Interrupted,
}

pub trait AlignmentStrategy {
    fn kind(&self) -> StrategyKind;

    /// Rewrite one paragraph through `gate` and describe the result.
    fn rewrite(
        &self,
        doc: &XmlDocument,
        paragraph: NodeId,
        extracted: &ExtractedParagraph,
        gate: &mut CallGate<'_>,
    ) -> StrategyOutcome;
}

/// Build the strategy selected by `config`.
pub fn strategy_for(config: &RewriteConfig) -> Box<dyn AlignmentStrategy> {
    match config.strategy {
        StrategyKind::Markers => Box::new(MarkerStrategy::new(
            &config.target_language,
            &config.style_instructions,
            config.unknown_marker_policy,
        )),
        StrategyKind::SegmentMapping => Box::new(SegmentMappingStrategy::new(
            &config.target_language,
            &config.style_instructions,
        )),
    }
}
