//! Error types for slide text rewriting.
//!
//! [`Error`] is fatal: the input is not a usable document and no partial
//! result can be trusted. [`TransformError`] and [`AlignmentError`] are
//! recoverable and only ever degrade a single paragraph back to its
//! original text.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for rewriting backend calls.
pub type TransformResult<T> = std::result::Result<T, TransformError>;

/// Structural errors that abort a rewrite run.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A slide part is not well-formed XML.
    #[error("XML parsing error: {0}")]
    XmlError(String),

    /// The XML is well-formed but not shaped like a slide part.
    #[error("Invalid slide document: {0}")]
    InvalidDocument(String),

    /// The rewrite configuration could not be loaded.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The package directory holds no slide parts.
    #[error("No slides found in {0}")]
    NoSlides(String),
}

/// Failures of a rewriting backend call.
///
/// These never escape the orchestrator; the affected text is kept as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// The backend could not be reached or the request was rejected.
    #[error("Backend request failed: {0}")]
    Request(String),

    /// The backend answered with an error or an unusable payload.
    #[error("Backend error: {0}")]
    Backend(String),

    /// The backend answered, but nothing was left after cleanup.
    #[error("Backend returned an empty response")]
    EmptyResponse,

    /// The backend cannot perform this kind of call.
    #[error("Operation not supported by backend '{0}'")]
    Unsupported(String),
}

/// Failures while recovering per-run text from a rewritten paragraph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlignmentError {
    /// The alignment reply could not be parsed.
    #[error("Alignment parse error: {0}")]
    Parse(String),

    /// A marker id came back that was never handed out.
    #[error("Unknown marker id f{0}")]
    UnknownMarker(u32),
}
