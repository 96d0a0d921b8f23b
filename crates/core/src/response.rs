//! Cleanup of raw backend replies.
//!
//! Language-model backends wrap the useful part of their answer in various
//! ways: reasoning blocks, `<translation>` tags, markdown fences. These
//! helpers peel that off before anything tries to parse markers or JSON.

use regex::Regex;
use std::sync::LazyLock;

static THINK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*?</think>").unwrap());

/// An opening think tag whose block was never closed (truncated reply).
static OPEN_THINK_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<think>.*$").unwrap());

static CODE_FENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```[a-z]*[ \t]*").unwrap());

/// Remove every `<think>...</think>` block and trim the rest.
pub fn strip_reasoning(text: &str) -> String {
    let without_blocks = THINK_REGEX.replace_all(text, "");
    OPEN_THINK_REGEX
        .replace(&without_blocks, "")
        .trim()
        .to_string()
}

/// Return the trimmed inner text of the first `<tag>...</tag>` pair.
///
/// Tag matching is case-insensitive. An opening tag without a closing one
/// (the reply was cut off) yields everything after the opening tag.
pub fn extract_tagged<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let lower = text.to_lowercase();
    // Lowercasing can change byte lengths outside ASCII; only trust the
    // offsets when it did not.
    if lower.len() != text.len() {
        return extract_tagged_exact(text, tag);
    }
    let open = format!("<{}>", tag.to_lowercase());
    let close = format!("</{}>", tag.to_lowercase());

    let start = lower.find(&open)? + open.len();
    let end = lower[start..]
        .find(&close)
        .map(|offset| start + offset)
        .unwrap_or(text.len());
    Some(text[start..end].trim())
}

fn extract_tagged_exact<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = text.find(&open)? + open.len();
    let end = text[start..]
        .find(&close)
        .map(|offset| start + offset)
        .unwrap_or(text.len());
    Some(text[start..end].trim())
}

/// Remove markdown code fences such as "```json" and "```".
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE_REGEX.replace_all(text, "").trim().to_string()
}

/// Slice from the first `{` to the last `}`, if both exist in that order.
pub fn outermost_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_reasoning() {
        let reply = "<think>\nThe user wants German.\n</think>\nHallo Welt";
        assert_eq!(strip_reasoning(reply), "Hallo Welt");
    }

    #[test]
    fn test_strip_reasoning_multiple_and_unclosed() {
        assert_eq!(strip_reasoning("<think>a</think>x<THINK>b</THINK>y"), "xy");
        assert_eq!(strip_reasoning("answer <think>never finished"), "answer");
    }

    #[test]
    fn test_extract_tagged() {
        let reply = "<analysis>lots</analysis>\n<translation>\n Bonjour \n</translation>";
        assert_eq!(extract_tagged(reply, "translation"), Some("Bonjour"));
        assert_eq!(extract_tagged("<Translation>Hi</Translation>", "translation"), Some("Hi"));
        assert_eq!(extract_tagged("<translation>cut off", "translation"), Some("cut off"));
        assert_eq!(extract_tagged("no tags", "translation"), None);
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": \"b\"}\n```"), "{\"a\": \"b\"}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
    }

    #[test]
    fn test_outermost_json_object() {
        let reply = "Here you go: {\"a\": {\"b\": 1}} hope it helps";
        assert_eq!(outermost_json_object(reply), Some("{\"a\": {\"b\": 1}}"));
        assert_eq!(outermost_json_object("} {"), None);
        assert_eq!(outermost_json_object("nothing"), None);
    }
}
