//! Rewriting backends.
//!
//! The engine only ever talks to a [`ContentTransformer`]. Language-model
//! services plug in underneath through [`CompletionBackend`] and are wrapped
//! by [`PromptTransformer`], which owns prompt construction and reply
//! cleanup so that individual backends stay a single `complete` call.

use crate::error::{TransformError, TransformResult};
use crate::prompts;
use crate::response::{extract_tagged, strip_reasoning};
use serde::{Deserialize, Serialize};

/// Inputs of a segment alignment call.
#[derive(Debug, Clone, Copy)]
pub struct AlignmentRequest<'a> {
    /// Segments to align, deduplicated.
    pub segments: &'a [String],
    /// Paragraph text the segments were taken from.
    pub original_text: &'a str,
    /// Paragraph text returned by the rewrite call.
    pub rewritten_text: &'a str,
}

/// A text rewriting backend (translation, polishing).
///
/// Every method may fail; callers keep the original text when it does.
pub trait ContentTransformer {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Rewrite plain paragraph text.
    fn transform(
        &self,
        text: &str,
        target_language: &str,
        style_instructions: &str,
    ) -> TransformResult<String>;

    /// Rewrite text carrying `<fN>...</fN>` markers, keeping the markers.
    fn transform_marked(
        &self,
        marked_text: &str,
        target_language: &str,
        style_instructions: &str,
    ) -> TransformResult<String> {
        let _ = (marked_text, target_language, style_instructions);
        Err(TransformError::Unsupported(self.name().to_string()))
    }

    /// Return a JSON object pairing original segments with rewritten text.
    fn align_segments(&self, request: &AlignmentRequest<'_>) -> TransformResult<String> {
        let _ = request;
        Err(TransformError::Unsupported(self.name().to_string()))
    }
}

/// Identity backend. Useful for dry runs and for checking that a document
/// survives the pipeline untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTransformer;

impl ContentTransformer for PassthroughTransformer {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn transform(&self, text: &str, _: &str, _: &str) -> TransformResult<String> {
        Ok(text.to_string())
    }

    fn transform_marked(&self, marked_text: &str, _: &str, _: &str) -> TransformResult<String> {
        Ok(marked_text.to_string())
    }

    fn align_segments(&self, request: &AlignmentRequest<'_>) -> TransformResult<String> {
        let identity: serde_json::Map<String, serde_json::Value> = request
            .segments
            .iter()
            .map(|s| (s.clone(), serde_json::Value::String(s.clone())))
            .collect();
        serde_json::to_string(&identity).map_err(|e| TransformError::Backend(e.to_string()))
    }
}

/// A chat-style completion endpoint.
///
/// Network clients (OpenAI, DeepSeek, a local server, ...) implement this
/// and nothing else.
pub trait CompletionBackend {
    fn name(&self) -> &str;

    /// Send one system + user message pair and return the raw reply.
    fn complete(&self, system: &str, prompt: &str) -> TransformResult<String>;
}

/// Kind of rewrite a [`PromptTransformer`] asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewriteTask {
    #[default]
    Translate,
    Polish,
}

/// Adapts a [`CompletionBackend`] into a [`ContentTransformer`].
#[derive(Debug, Clone)]
pub struct PromptTransformer<B> {
    backend: B,
    task: RewriteTask,
    reasoning: bool,
}

impl<B: CompletionBackend> PromptTransformer<B> {
    /// Wrap a backend for translation, without reasoning cleanup.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            task: RewriteTask::Translate,
            reasoning: false,
        }
    }

    pub fn with_task(mut self, task: RewriteTask) -> Self {
        self.task = task;
        self
    }

    /// Mark the backend as a reasoning model whose replies embed
    /// `<think>` blocks.
    pub fn with_reasoning(mut self, reasoning: bool) -> Self {
        self.reasoning = reasoning;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn clean_reply(&self, reply: &str) -> TransformResult<String> {
        let reply = if self.reasoning {
            strip_reasoning(reply)
        } else {
            reply.trim().to_string()
        };
        let text = extract_tagged(&reply, "translation")
            .map(str::to_string)
            .unwrap_or(reply);

        if text.trim().is_empty() {
            return Err(TransformError::EmptyResponse);
        }
        Ok(text)
    }
}

impl<B: CompletionBackend> ContentTransformer for PromptTransformer<B> {
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn transform(
        &self,
        text: &str,
        target_language: &str,
        style_instructions: &str,
    ) -> TransformResult<String> {
        let prompt = prompts::rewrite_prompt(self.task, text, target_language, style_instructions);
        let reply = self
            .backend
            .complete(prompts::system_prompt(self.task), &prompt)?;
        self.clean_reply(&reply)
    }

    fn transform_marked(
        &self,
        marked_text: &str,
        target_language: &str,
        style_instructions: &str,
    ) -> TransformResult<String> {
        let prompt = prompts::marked_rewrite_prompt(
            self.task,
            marked_text,
            target_language,
            style_instructions,
        );
        let reply = self
            .backend
            .complete(prompts::system_prompt(self.task), &prompt)?;
        self.clean_reply(&reply)
    }

    fn align_segments(&self, request: &AlignmentRequest<'_>) -> TransformResult<String> {
        let prompt = prompts::alignment_prompt(
            request.segments,
            request.original_text,
            request.rewritten_text,
        );
        let reply = self
            .backend
            .complete(prompts::ALIGNMENT_SYSTEM_PROMPT, &prompt)?;
        let reply = if self.reasoning {
            strip_reasoning(&reply)
        } else {
            reply
        };
        if reply.trim().is_empty() {
            return Err(TransformError::EmptyResponse);
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Backend that replays canned replies and records prompts.
    struct CannedBackend {
        replies: RefCell<Vec<TransformResult<String>>>,
        prompts: RefCell<Vec<(String, String)>>,
    }

    impl CannedBackend {
        fn new(replies: Vec<TransformResult<String>>) -> Self {
            Self {
                replies: RefCell::new(replies),
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl CompletionBackend for CannedBackend {
        fn name(&self) -> &str {
            "canned"
        }

        fn complete(&self, system: &str, prompt: &str) -> TransformResult<String> {
            self.prompts
                .borrow_mut()
                .push((system.to_string(), prompt.to_string()));
            self.replies.borrow_mut().remove(0)
        }
    }

    #[test]
    fn test_passthrough_is_identity() {
        let t = PassthroughTransformer;
        assert_eq!(t.transform("Hello", "German", "").unwrap(), "Hello");
        assert_eq!(
            t.transform_marked("<f1>Hi</f1>", "German", "").unwrap(),
            "<f1>Hi</f1>"
        );
    }

    #[test]
    fn test_passthrough_alignment_maps_segments_to_themselves() {
        let segments = vec!["Hello".to_string(), "world".to_string()];
        let request = AlignmentRequest {
            segments: &segments,
            original_text: "Hello world",
            rewritten_text: "Hello world",
        };
        let reply = PassthroughTransformer.align_segments(&request).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(parsed["Hello"], "Hello");
        assert_eq!(parsed["world"], "world");
    }

    #[test]
    fn test_prompt_transformer_extracts_translation_tag() {
        let backend = CannedBackend::new(vec![Ok(
            "<analysis>fine</analysis><translation> Hallo Welt </translation>".to_string(),
        )]);
        let t = PromptTransformer::new(backend);
        assert_eq!(t.transform("Hello world", "German", "").unwrap(), "Hallo Welt");

        let prompts = t.backend().prompts.borrow();
        assert_eq!(prompts[0].0, "You are a professional translator.");
        assert!(prompts[0].1.contains("Hello world"));
    }

    #[test]
    fn test_prompt_transformer_strips_reasoning() {
        let backend = CannedBackend::new(vec![Ok(
            "<think><translation>draft</translation></think>Endgültig".to_string(),
        )]);
        let t = PromptTransformer::new(backend).with_reasoning(true);
        assert_eq!(t.transform("Final", "German", "").unwrap(), "Endgültig");
    }

    #[test]
    fn test_prompt_transformer_empty_reply_is_error() {
        let backend = CannedBackend::new(vec![Ok("<translation>  </translation>".to_string())]);
        let t = PromptTransformer::new(backend);
        assert_eq!(
            t.transform("Hello", "German", ""),
            Err(TransformError::EmptyResponse)
        );
    }

    #[test]
    fn test_prompt_transformer_propagates_backend_error() {
        let backend =
            CannedBackend::new(vec![Err(TransformError::Request("timeout".to_string()))]);
        let t = PromptTransformer::new(backend);
        assert!(matches!(
            t.transform("Hello", "German", ""),
            Err(TransformError::Request(_))
        ));
    }

    #[test]
    fn test_polish_uses_editor_prompt() {
        let backend = CannedBackend::new(vec![Ok("Better".to_string())]);
        let t = PromptTransformer::new(backend).with_task(RewriteTask::Polish);
        assert_eq!(t.transform("Good", "English", "").unwrap(), "Better");
        assert_eq!(
            t.backend().prompts.borrow()[0].0,
            "You are a professional editor."
        );
    }

    #[test]
    fn test_alignment_uses_alignment_prompt() {
        let backend = CannedBackend::new(vec![Ok("{\"Hi\": \"Salut\"}".to_string())]);
        let t = PromptTransformer::new(backend);
        let segments = vec!["Hi".to_string()];
        let reply = t
            .align_segments(&AlignmentRequest {
                segments: &segments,
                original_text: "Hi",
                rewritten_text: "Salut",
            })
            .unwrap();
        assert_eq!(reply, "{\"Hi\": \"Salut\"}");
        assert_eq!(t.backend().prompts.borrow()[0].0, prompts::ALIGNMENT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_default_methods_are_unsupported() {
        struct PlainOnly;
        impl ContentTransformer for PlainOnly {
            fn name(&self) -> &str {
                "plain"
            }
            fn transform(&self, text: &str, _: &str, _: &str) -> TransformResult<String> {
                Ok(text.to_uppercase())
            }
        }
        assert_eq!(
            PlainOnly.transform_marked("x", "German", ""),
            Err(TransformError::Unsupported("plain".to_string()))
        );
    }
}
