//! Run language metadata.
//!
//! Language detection itself is an external concern; the engine only needs
//! something that turns run text into a PowerPoint culture tag.

use crate::normalize::classify;

/// Language tag assumed for runs that do not declare one.
pub const DEFAULT_LANGUAGE_TAG: &str = "en-GB";

/// Turns text into a culture tag such as `de-DE`.
pub trait LanguageDetector {
    /// Detect the language of `text`. `None` leaves the run's tag alone.
    fn detect(&self, text: &str) -> Option<String>;
}

/// Detector that answers the same tag for any text with words in it.
///
/// After a translation run every rewritten run is in the target language,
/// so this is usually all the metadata update needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedLanguageDetector {
    tag: String,
}

impl FixedLanguageDetector {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    /// Build a detector for a language name or code, e.g. "German" or "fr".
    pub fn for_language(language: &str) -> Option<Self> {
        language_tag(language).map(Self::new)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl LanguageDetector for FixedLanguageDetector {
    fn detect(&self, text: &str) -> Option<String> {
        classify(text).is_translatable().then(|| self.tag.clone())
    }
}

/// Language names, ISO 639-1 codes and the culture tag PowerPoint writes.
const LANGUAGE_TAGS: &[(&str, &str, &str)] = &[
    ("english", "en", "en-GB"),
    ("american english", "en-us", "en-US"),
    ("german", "de", "de-DE"),
    ("french", "fr", "fr-FR"),
    ("spanish", "es", "es-ES"),
    ("italian", "it", "it-IT"),
    ("portuguese", "pt", "pt-PT"),
    ("brazilian portuguese", "pt-br", "pt-BR"),
    ("dutch", "nl", "nl-NL"),
    ("danish", "da", "da-DK"),
    ("swedish", "sv", "sv-SE"),
    ("norwegian", "no", "nb-NO"),
    ("finnish", "fi", "fi-FI"),
    ("polish", "pl", "pl-PL"),
    ("czech", "cs", "cs-CZ"),
    ("hungarian", "hu", "hu-HU"),
    ("romanian", "ro", "ro-RO"),
    ("greek", "el", "el-GR"),
    ("turkish", "tr", "tr-TR"),
    ("russian", "ru", "ru-RU"),
    ("ukrainian", "uk", "uk-UA"),
    ("arabic", "ar", "ar-SA"),
    ("hebrew", "he", "he-IL"),
    ("hindi", "hi", "hi-IN"),
    ("chinese", "zh", "zh-CN"),
    ("traditional chinese", "zh-tw", "zh-TW"),
    ("japanese", "ja", "ja-JP"),
    ("korean", "ko", "ko-KR"),
];

/// Map a language name, ISO code or culture tag to a PowerPoint culture tag.
///
/// Names and codes are matched case-insensitively; a well-formed culture
/// tag (`xx-YY`) that is not in the table is passed through.
pub fn language_tag(language: &str) -> Option<String> {
    let key = language.trim().to_lowercase();
    if key.is_empty() {
        return None;
    }

    if let Some((_, _, tag)) = LANGUAGE_TAGS
        .iter()
        .find(|(name, code, tag)| *name == key || *code == key || tag.to_lowercase() == key)
    {
        return Some(tag.to_string());
    }

    let looks_like_tag = key.len() == 5
        && key.as_bytes()[2] == b'-'
        && key.chars().filter(|c| *c != '-').all(|c| c.is_ascii_alphabetic());
    if looks_like_tag {
        let (lang, region) = key.split_at(2);
        return Some(format!("{}{}", lang, region.to_uppercase()));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_tag_by_name_and_code() {
        assert_eq!(language_tag("German"), Some("de-DE".to_string()));
        assert_eq!(language_tag("fr"), Some("fr-FR".to_string()));
        assert_eq!(language_tag(" JAPANESE "), Some("ja-JP".to_string()));
        assert_eq!(language_tag("de-de"), Some("de-DE".to_string()));
    }

    #[test]
    fn test_language_tag_passes_through_unknown_tags() {
        assert_eq!(language_tag("sk-sk"), Some("sk-SK".to_string()));
        assert_eq!(language_tag("Klingon"), None);
        assert_eq!(language_tag(""), None);
    }

    #[test]
    fn test_language_tag_with_multibyte_input() {
        // KELVIN SIGN lowercases to an ASCII 'k'.
        assert_eq!(language_tag("\u{212A}a-bc"), Some("ka-BC".to_string()));
        assert_eq!(language_tag("\u{e9}\u{e9}-fr"), None);
    }

    #[test]
    fn test_fixed_detector_skips_numbers() {
        let detector = FixedLanguageDetector::for_language("Spanish").unwrap();
        assert_eq!(detector.tag(), "es-ES");
        assert_eq!(detector.detect("Hola"), Some("es-ES".to_string()));
        assert_eq!(detector.detect("42%"), None);
    }
}
