//! Writing rewritten text back into paragraphs.

use crate::run::{paragraph_runs, run_text, set_run_language, set_run_text};
use crate::strategy::{DecodedNode, TranslationMapping};
use crate::xml::{qualified_name, NodeId, XmlDocument};
use slidemob_core::normalize::restore_edge_spaces;
use slidemob_core::{classify, LanguageDetector};

/// Local names of the paragraph children that carry content.
const CONTENT_CHILDREN: [&str; 3] = ["r", "br", "fld"];

/// Runs touched by a reinsertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reinserted {
    /// Runs whose text was replaced or that were newly created.
    pub runs: Vec<NodeId>,
    /// Runs removed from the paragraph.
    pub removed: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReinsertionEngine;

impl ReinsertionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Replace run texts found in `mapping`.
    ///
    /// A non-empty value replaces the run text, keeping a single leading or
    /// trailing space the original had. An empty value removes the run.
    /// Runs whose segment has no entry are not touched.
    pub fn apply_mapping(
        &self,
        doc: &mut XmlDocument,
        paragraph: NodeId,
        mapping: &TranslationMapping,
    ) -> Reinserted {
        let mut result = Reinserted::default();

        for run in paragraph_runs(doc, paragraph) {
            let Some(text) = run_text(doc, run) else {
                continue;
            };
            let segment = text.trim();
            if segment.is_empty() {
                continue;
            }
            match mapping.get(segment) {
                Some(value) if value.trim().is_empty() => {
                    log::debug!("Removing run {:?}", segment);
                    doc.detach(run);
                    result.removed += 1;
                }
                Some(value) => {
                    let replacement = restore_edge_spaces(&text, value);
                    set_run_text(doc, run, &replacement);
                    result.runs.push(run);
                }
                None => {}
            }
        }

        result
    }

    /// Rebuild a paragraph's content from decoded nodes.
    ///
    /// Runs, breaks and fields are removed; fields come back as copies of
    /// the originals. The new nodes take the place of the first of them, or
    /// go before `a:endParaRPr` when the paragraph had no content. Paragraph
    /// properties, end properties and unknown children stay where they are.
    pub fn apply_decoded(
        &self,
        doc: &mut XmlDocument,
        paragraph: NodeId,
        nodes: &[DecodedNode],
    ) -> Reinserted {
        let children = doc.children(paragraph).to_vec();
        let content: Vec<NodeId> = children
            .iter()
            .copied()
            .filter(|child| {
                CONTENT_CHILDREN
                    .iter()
                    .any(|local| doc.is_element(*child, local))
            })
            .collect();

        let insert_at = match content.first() {
            Some(first) => doc.index_in_parent(*first),
            None => children
                .iter()
                .position(|child| doc.is_element(*child, "endParaRPr")),
        }
        .unwrap_or(children.len());

        let removed = content
            .iter()
            .filter(|child| doc.is_element(**child, "r"))
            .count();
        for child in &content {
            doc.detach(*child);
        }

        let prefix = doc.prefix(paragraph).map(str::to_string);
        let mut result = Reinserted {
            runs: Vec::new(),
            removed,
        };

        for (offset, node) in nodes.iter().enumerate() {
            let created = match node {
                DecodedNode::Run { formatting, text } => {
                    let run = doc.create_element(&qualified_name(prefix.as_deref(), "r"));
                    if let Some(rpr) = formatting {
                        let copy = doc.clone_subtree(*rpr);
                        doc.append_child(run, copy);
                    }
                    set_run_text(doc, run, text);
                    result.runs.push(run);
                    run
                }
                DecodedNode::Break { formatting } => {
                    let br = doc.create_element(&qualified_name(prefix.as_deref(), "br"));
                    if let Some(rpr) = formatting {
                        let copy = doc.clone_subtree(*rpr);
                        doc.append_child(br, copy);
                    }
                    br
                }
                DecodedNode::Field { field, text } => {
                    let copy = doc.clone_subtree(*field);
                    set_run_text(doc, copy, text);
                    copy
                }
            };
            doc.insert_child(paragraph, insert_at + offset, created);
        }

        // Inserted runs replace removed ones; only count the shortfall.
        result.removed = result.removed.saturating_sub(result.runs.len());
        result
    }

    /// Set `lang` on every run with translatable text the detector
    /// recognises. Returns the number of runs updated.
    pub fn update_languages(
        &self,
        doc: &mut XmlDocument,
        runs: &[NodeId],
        detector: &dyn LanguageDetector,
    ) -> usize {
        let mut updated = 0;
        for &run in runs {
            let Some(text) = run_text(doc, run) else {
                continue;
            };
            if !classify(&text).is_translatable() {
                continue;
            }
            if let Some(tag) = detector.detect(&text) {
                set_run_language(doc, run, &tag);
                updated += 1;
            }
        }
        updated
    }
}
