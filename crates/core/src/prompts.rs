//! Prompt templates for language-model backends.

use crate::transformer::RewriteTask;

/// System message for paragraph rewrites.
pub fn system_prompt(task: RewriteTask) -> &'static str {
    match task {
        RewriteTask::Translate => "You are a professional translator.",
        RewriteTask::Polish => "You are a professional editor.",
    }
}

/// System message for segment alignment calls.
pub const ALIGNMENT_SYSTEM_PROMPT: &str =
    "You are a professional text alignment expert, editor and translator.";

fn style_block(style_instructions: &str) -> String {
    if style_instructions.trim().is_empty() {
        "None".to_string()
    } else {
        style_instructions.trim().to_string()
    }
}

/// Prompt for rewriting one paragraph of plain text.
///
/// The reply is expected inside `<translation>` tags; anything around them
/// (analysis, reasoning) is discarded by the caller.
pub fn rewrite_prompt(
    task: RewriteTask,
    text: &str,
    target_language: &str,
    style_instructions: &str,
) -> String {
    let goal = match task {
        RewriteTask::Translate => format!("Translate the text into {target_language}."),
        RewriteTask::Polish => "Polish the text in its own language. If it is already good or \
             very short, return it unchanged."
            .to_string(),
    };

    format!(
        "{goal}

<text_to_translate>
{text}
</text_to_translate>

Style instructions:
<style_instructions>
{style}
</style_instructions>

Guidelines:
1. Keep the total length close to the original; this text sits on a slide.
2. Keep technical terms, role titles (e.g. CEO, DataScientist), company names and product names as they are.
3. Make the wording sharp, concise and business-like.
4. Do not add explanations, notes or alternatives.

Return the final text inside <translation></translation> tags and nothing else.",
        goal = goal,
        text = text,
        style = style_block(style_instructions),
    )
}

/// Prompt for rewriting marker-annotated text.
pub fn marked_rewrite_prompt(
    task: RewriteTask,
    marked_text: &str,
    target_language: &str,
    style_instructions: &str,
) -> String {
    let goal = match task {
        RewriteTask::Translate => format!("Translate the text into {target_language}."),
        RewriteTask::Polish => "Polish the text in its own language.".to_string(),
    };

    format!(
        "{goal} The text contains formatting markers such as <f1>...</f1> and <f2>...</f2>.

<text_to_translate>
{text}
</text_to_translate>

Rules for markers:
1. Keep every marker pair and put it around the words that carry the same meaning as the words it wrapped in the original.
2. Never renumber, rename, merge or invent markers.
3. Keep line breaks where they are.
4. Text outside markers stays outside markers.

Style instructions:
<style_instructions>
{style}
</style_instructions>

Return only the rewritten text with its markers inside <translation></translation> tags.",
        goal = goal,
        text = marked_text,
        style = style_block(style_instructions),
    )
}

/// Prompt asking the backend to pair original segments with pieces of the
/// rewritten paragraph.
pub fn alignment_prompt(segments: &[String], original_text: &str, rewritten_text: &str) -> String {
    let segment_list =
        serde_json::to_string(segments).unwrap_or_else(|_| format!("{:?}", segments));

    format!(
        "Match each original text segment with the part of the rewritten text that corresponds to it.

Original segments: {segment_list}
Full original text: {original_text}
Full rewritten text: {rewritten_text}

Return a JSON object whose keys are the original segments, exactly as listed, and whose values are the matching rewritten text.
Only include segments that appear in the original text. Use an empty string for a segment that has no counterpart.
Return only the JSON object, for example:
{{\"original segment 1\": \"rewritten segment 1\", \"original segment 2\": \"rewritten segment 2\"}}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_prompt_mentions_language_and_text() {
        let prompt = rewrite_prompt(RewriteTask::Translate, "Hello", "German", "");
        assert!(prompt.contains("into German"));
        assert!(prompt.contains("Hello"));
        assert!(prompt.contains("<translation>"));
        assert!(prompt.contains("None"));
    }

    #[test]
    fn test_polish_prompt_does_not_translate() {
        let prompt = rewrite_prompt(RewriteTask::Polish, "Hello", "German", "Be brief");
        assert!(!prompt.contains("into German"));
        assert!(prompt.contains("Be brief"));
    }

    #[test]
    fn test_marked_prompt_keeps_markers() {
        let prompt =
            marked_rewrite_prompt(RewriteTask::Translate, "<f1>Hi</f1> there", "French", "");
        assert!(prompt.contains("<f1>Hi</f1> there"));
        assert!(prompt.contains("Never renumber"));
    }

    #[test]
    fn test_alignment_prompt_quotes_segments() {
        let segments = vec!["Say \"hi\"".to_string(), "now".to_string()];
        let prompt = alignment_prompt(&segments, "Say \"hi\" now", "Sag \"hallo\" jetzt");
        assert!(prompt.contains(r#"["Say \"hi\"","now"]"#));
    }
}
