//! Core types, configuration, text classification and rewriting backend
//! traits for structure-preserving slide text rewriting.

pub mod config;
pub mod error;
pub mod language;
pub mod normalize;
pub mod prompts;
pub mod response;
pub mod transformer;
pub mod types;

pub use config::{RewriteConfig, StrategyKind, UnknownMarkerPolicy};
pub use error::{AlignmentError, Error, Result, TransformError, TransformResult};
pub use language::{language_tag, FixedLanguageDetector, LanguageDetector, DEFAULT_LANGUAGE_TAG};
pub use normalize::{classify, Translatability};
pub use transformer::{
    AlignmentRequest, CompletionBackend, ContentTransformer, PassthroughTransformer,
    PromptTransformer, RewriteTask,
};
pub use types::{ParagraphOutcome, RewriteOutcome, RewriteSummary, SlideProgress};
