//! Segment-Mapping strategy.
//!
//! The paragraph text is rewritten as a whole, then a second call asks the
//! backend which part of the rewrite belongs to which original run text.

use super::{AlignmentStrategy, Reinsertion, StrategyOutcome};
use crate::extract::ExtractedParagraph;
use crate::orchestrator::{CallGate, CallResult};
use crate::xml::{NodeId, XmlDocument};
use slidemob_core::normalize::normalize_segment;
use slidemob_core::response::{outermost_json_object, strip_code_fences, strip_reasoning};
use slidemob_core::{AlignmentError, AlignmentRequest, StrategyKind};
use std::collections::BTreeMap;

/// Original segment to rewritten segment.
///
/// Keys are stored NFC-normalised and trimmed. An empty value drops the run
/// holding that segment; a segment with no entry is left as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationMapping {
    entries: BTreeMap<String, String>,
}

impl TranslationMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, segment: &str, rewritten: impl Into<String>) {
        self.entries
            .insert(normalize_segment(segment), rewritten.into());
    }

    /// Rewritten text for a segment, if the backend supplied one.
    pub fn get(&self, segment: &str) -> Option<&str> {
        self.entries
            .get(&normalize_segment(segment))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse an alignment reply into a mapping restricted to `segments`.
///
/// Reasoning blocks, markdown fences and any prose around the outermost
/// JSON object are ignored. String values are taken as-is, numbers and
/// booleans are stringified, anything else is skipped. Keys that are not
/// one of `segments` are dropped.
pub fn parse_mapping_response(
    reply: &str,
    segments: &[String],
) -> Result<TranslationMapping, AlignmentError> {
    let cleaned = strip_code_fences(&strip_reasoning(reply));
    let json = outermost_json_object(&cleaned)
        .ok_or_else(|| AlignmentError::Parse("no JSON object in reply".to_string()))?;

    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| AlignmentError::Parse(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| AlignmentError::Parse("reply is not a JSON object".to_string()))?;

    let known: Vec<String> = segments.iter().map(|s| normalize_segment(s)).collect();
    let mut mapping = TranslationMapping::new();

    for (key, value) in object {
        let key = normalize_segment(key);
        if !known.contains(&key) {
            log::debug!("Dropping alignment key not in segment set: {:?}", key);
            continue;
        }
        let rewritten = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        mapping.insert(&key, rewritten);
    }

    Ok(mapping)
}

/// Asks the backend to align segments and parses the answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentMapper;

impl SegmentMapper {
    pub fn new() -> Self {
        Self
    }

    /// Segments worth sending: those that literally occur in the original
    /// text, or all of them when none does.
    pub fn candidate_segments(&self, segments: &[String], original_text: &str) -> Vec<String> {
        let present: Vec<String> = segments
            .iter()
            .filter(|s| original_text.contains(s.as_str()))
            .cloned()
            .collect();
        if present.is_empty() {
            segments.to_vec()
        } else {
            present
        }
    }

    /// One alignment call. A failed call or an unparseable reply gives an
    /// empty mapping; the stop check firing gives `None`.
    pub fn align(
        &self,
        gate: &mut CallGate<'_>,
        segments: &[String],
        original_text: &str,
        rewritten_text: &str,
    ) -> Option<TranslationMapping> {
        let segments = self.candidate_segments(segments, original_text);
        let request = AlignmentRequest {
            segments: &segments,
            original_text,
            rewritten_text,
        };

        let reply = match gate.call("align", |t| t.align_segments(&request)) {
            CallResult::Done(reply) => reply,
            CallResult::Failed => return Some(TranslationMapping::new()),
            CallResult::Stopped => return None,
        };

        match parse_mapping_response(&reply, &segments) {
            Ok(mapping) => {
                log::debug!("Alignment mapping: {:?}", mapping);
                Some(mapping)
            }
            Err(e) => {
                log::warn!("{}; keeping original paragraph text", e);
                Some(TranslationMapping::new())
            }
        }
    }
}

/// Rewrite the paragraph text, then align segments in a second call.
#[derive(Debug, Clone)]
pub struct SegmentMappingStrategy {
    target_language: String,
    style_instructions: String,
    mapper: SegmentMapper,
}

impl SegmentMappingStrategy {
    pub fn new(target_language: &str, style_instructions: &str) -> Self {
        Self {
            target_language: target_language.to_string(),
            style_instructions: style_instructions.to_string(),
            mapper: SegmentMapper::new(),
        }
    }
}

impl AlignmentStrategy for SegmentMappingStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SegmentMapping
    }

    fn rewrite(
        &self,
        _doc: &XmlDocument,
        _paragraph: NodeId,
        extracted: &ExtractedParagraph,
        gate: &mut CallGate<'_>,
    ) -> StrategyOutcome {
        if extracted.segments.is_empty() {
            return StrategyOutcome::Skipped;
        }

        let rewritten = match gate.call("transform", |t| {
            t.transform(
                &extracted.text,
                &self.target_language,
                &self.style_instructions,
            )
        }) {
            CallResult::Done(text) => text,
            CallResult::Failed => return StrategyOutcome::Degraded,
            CallResult::Stopped => return StrategyOutcome::Interrupted,
        };
        log::debug!("Rewritten paragraph: {:?}", rewritten);

        match self
            .mapper
            .align(gate, &extracted.segments, &extracted.text, &rewritten)
        {
            None => StrategyOutcome::Interrupted,
            Some(mapping) if mapping.is_empty() => StrategyOutcome::Degraded,
            Some(mapping) => StrategyOutcome::Ready(Reinsertion::Mapping(mapping)),
        }
    }
}
