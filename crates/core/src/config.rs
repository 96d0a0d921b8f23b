//! Rewrite configuration.
//!
//! A [`RewriteConfig`] is built once (from defaults, a JSON file, CLI flags)
//! and then handed by reference to the orchestrator. Nothing reads settings
//! from anywhere else.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which alignment strategy recovers per-run text after a rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Inline `<fN>` markers, one backend call per paragraph.
    #[default]
    Markers,
    /// Paragraph rewrite followed by a segment alignment call.
    SegmentMapping,
}

impl StrategyKind {
    /// Parse a strategy name as accepted on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().replace('-', "_").as_str() {
            "markers" | "marker" | "marker_based" => Some(Self::Markers),
            "segment_mapping" | "mapping" | "classic" => Some(Self::SegmentMapping),
            _ => None,
        }
    }
}

/// What to do when a rewritten paragraph carries a marker id that was never
/// handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownMarkerPolicy {
    /// Keep the text as a plain run; only that span loses its formatting.
    #[default]
    Lenient,
    /// Reject the rewrite and keep the paragraph's original content.
    Strict,
}

/// Settings for one rewrite run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Language the text is rewritten into, e.g. "German".
    pub target_language: String,

    /// Free-form style guidance forwarded to the backend.
    pub style_instructions: String,

    /// Alignment strategy.
    pub strategy: StrategyKind,

    /// Coalesce identically formatted neighbouring runs before extraction.
    pub merge_runs: bool,

    /// Re-detect and rewrite the `lang` attribute of every touched run.
    pub update_language: bool,

    /// Severity of unknown marker ids.
    pub unknown_marker_policy: UnknownMarkerPolicy,

    /// Slide part names to process (e.g. `slide2.xml`). Empty means all.
    pub slides: Vec<String>,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            target_language: "English".to_string(),
            style_instructions: String::new(),
            strategy: StrategyKind::default(),
            merge_runs: true,
            update_language: false,
            unknown_marker_policy: UnknownMarkerPolicy::default(),
            slides: Vec::new(),
        }
    }
}

impl RewriteConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::ConfigError(e.to_string()))
    }

    pub fn with_target_language(mut self, language: impl Into<String>) -> Self {
        self.target_language = language.into();
        self
    }

    pub fn with_style_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.style_instructions = instructions.into();
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_merge_runs(mut self, merge: bool) -> Self {
        self.merge_runs = merge;
        self
    }

    pub fn with_update_language(mut self, update: bool) -> Self {
        self.update_language = update;
        self
    }

    pub fn with_unknown_marker_policy(mut self, policy: UnknownMarkerPolicy) -> Self {
        self.unknown_marker_policy = policy;
        self
    }

    /// Restrict processing to the named slide parts.
    pub fn with_slides<I, S>(mut self, slides: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.slides = slides.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the slide part called `name` should be processed.
    pub fn includes_slide(&self, name: &str) -> bool {
        self.slides.is_empty() || self.slides.iter().any(|s| s == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RewriteConfig::new();
        assert_eq!(config.target_language, "English");
        assert_eq!(config.strategy, StrategyKind::Markers);
        assert!(config.merge_runs);
        assert!(!config.update_language);
        assert_eq!(config.unknown_marker_policy, UnknownMarkerPolicy::Lenient);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = RewriteConfig::from_json_str(
            r#"{"target_language": "German", "strategy": "segment_mapping"}"#,
        )
        .unwrap();
        assert_eq!(config.target_language, "German");
        assert_eq!(config.strategy, StrategyKind::SegmentMapping);
        assert!(config.merge_runs);
        assert!(config.slides.is_empty());
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = RewriteConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_strategy_from_name() {
        assert_eq!(StrategyKind::from_name("markers"), Some(StrategyKind::Markers));
        assert_eq!(
            StrategyKind::from_name("segment-mapping"),
            Some(StrategyKind::SegmentMapping)
        );
        assert_eq!(StrategyKind::from_name("Classic"), Some(StrategyKind::SegmentMapping));
        assert_eq!(StrategyKind::from_name("other"), None);
    }

    #[test]
    fn test_slide_filter() {
        let config = RewriteConfig::new().with_slides(["slide2.xml"]);
        assert!(config.includes_slide("slide2.xml"));
        assert!(!config.includes_slide("slide3.xml"));
        assert!(RewriteConfig::new().includes_slide("slide3.xml"));
    }
}
