//! Structure-preserving text rewriting for PPTX slide parts.
//!
//! Slide XML is parsed into an arena tree, paragraphs are rewritten one at
//! a time through a [`slidemob_core::ContentTransformer`], and the result is
//! written back into the original runs so that formatting, language tags
//! and paragraph layout survive.

pub mod extract;
pub mod orchestrator;
pub mod reinsert;
pub mod run;
pub mod slides;
pub mod strategy;
pub mod xml;

pub use extract::{ExtractedParagraph, ParagraphExtractor};
pub use orchestrator::{CallGate, CallResult, SlideOrchestrator};
pub use reinsert::{Reinserted, ReinsertionEngine};
pub use run::{FormattingKey, RunMerger};
pub use slides::{find_slide_files, load_slides, Slide};
pub use strategy::{
    strategy_for, AlignmentStrategy, DecodedNode, MarkedParagraph, MarkerStrategy, MarkerTarget,
    Reinsertion, SegmentMapper, SegmentMappingStrategy, StrategyOutcome, TranslationMapping,
};
pub use xml::{NodeId, NodeKind, XmlDocument};
