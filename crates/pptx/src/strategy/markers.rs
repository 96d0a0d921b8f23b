//! Marker strategy.
//!
//! Formatted runs and fields are wrapped in numbered `<fN>...</fN>` tags
//! before the paragraph is sent to the backend, which is asked to keep the
//! tags around the corresponding rewritten words. Decoding the reply gives
//! back runs tied to the original formatting, in the rewritten order.

use super::{AlignmentStrategy, Reinsertion, StrategyOutcome};
use crate::extract::ExtractedParagraph;
use crate::orchestrator::{CallGate, CallResult};
use crate::run::{has_formatting, run_properties, run_text};
use crate::xml::{NodeId, XmlDocument};
use regex::Regex;
use slidemob_core::response::strip_reasoning;
use slidemob_core::{classify, AlignmentError, StrategyKind, UnknownMarkerPolicy};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// An opening or closing marker tag.
static MARKER_TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(/?)f(\d+)>").unwrap());

static THINK_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<think>").unwrap());

/// What a marker id stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerTarget {
    /// The `a:rPr` of a formatted run.
    Run(NodeId),
    /// An `a:fld` element, written back whole with the span's text.
    Field(NodeId),
}

/// A paragraph encoded for a marker-preserving rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkedParagraph {
    /// Paragraph text with formatted runs and fields wrapped in markers.
    pub text: String,
    /// Marker id to the run formatting or field it was issued for.
    pub markers: BTreeMap<u32, MarkerTarget>,
    /// `a:rPr` of each unwrapped run, in order.
    pub plain_properties: Vec<Option<NodeId>>,
    /// `a:rPr` of each line break, in order.
    pub break_properties: Vec<Option<NodeId>>,
}

impl MarkedParagraph {
    /// The text with all markers removed.
    pub fn plain_text(&self) -> String {
        MARKER_TAG_REGEX.replace_all(&self.text, "").into_owned()
    }

    fn issue(&mut self, target: MarkerTarget, text: &str) {
        let id = self.markers.len() as u32 + 1;
        self.text.push_str(&format!("<f{id}>{text}</f{id}>"));
        self.markers.insert(id, target);
    }
}

/// A node to be written into a rebuilt paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedNode {
    /// A run; `formatting` is the `a:rPr` to copy, if any.
    Run {
        formatting: Option<NodeId>,
        text: String,
    },
    /// A line break; `formatting` is the `a:rPr` to copy, if any.
    Break { formatting: Option<NodeId> },
    /// A copy of the field `field` carrying `text`.
    Field { field: NodeId, text: String },
}

/// Encode a paragraph's content children as marked text.
///
/// Runs with formatting and all fields get a marker each, an empty
/// formatted run included. Runs without formatting stay unwrapped.
pub fn encode(doc: &XmlDocument, paragraph: NodeId) -> MarkedParagraph {
    let mut marked = MarkedParagraph::default();

    for child in doc.element_children(paragraph) {
        if doc.is_element(child, "r") {
            let Some(text) = run_text(doc, child) else {
                continue;
            };
            match run_properties(doc, child).filter(|_| has_formatting(doc, child)) {
                Some(rpr) => marked.issue(MarkerTarget::Run(rpr), &text),
                None if text.is_empty() => {}
                None => {
                    marked.text.push_str(&text);
                    marked.plain_properties.push(run_properties(doc, child));
                }
            }
        } else if doc.is_element(child, "br") {
            marked.text.push('\n');
            marked.break_properties.push(run_properties(doc, child));
        } else if doc.is_element(child, "fld") {
            let text = doc
                .child_element(child, "t")
                .map(|t| doc.text(t))
                .unwrap_or_default();
            marked.issue(MarkerTarget::Field(child), &text);
        }
    }

    marked
}

/// Decode a rewritten marked text into runs, breaks and fields.
///
/// Tags are paired innermost first, so a tag left open or closed twice
/// does not affect the intact spans around it. Unpaired tags fail the
/// paragraph under the strict policy and are dropped under the lenient
/// one. The same goes for spans with an id that was never issued, whose
/// text then becomes plain.
pub fn decode(
    text: &str,
    marked: &MarkedParagraph,
    policy: UnknownMarkerPolicy,
) -> Result<Vec<DecodedNode>, AlignmentError> {
    let text = if THINK_TAG_REGEX.is_match(text) {
        strip_reasoning(text)
    } else {
        text.to_string()
    };

    let tags = scan_tags(&text);
    let paired = pair_tags(&tags);
    let unpaired = paired.iter().filter(|p| !**p).count();
    if unpaired > 0 {
        if policy == UnknownMarkerPolicy::Strict {
            return Err(AlignmentError::Parse(format!(
                "{} unbalanced marker tags in {:?}",
                unpaired, text
            )));
        }
        log::warn!("Dropping {} unbalanced marker tags in {:?}", unpaired, text);
    }

    let mut decoder = Decoder {
        nodes: Vec::new(),
        plain: marked.plain_properties.iter(),
        breaks: marked.break_properties.iter(),
    };
    let mut spans: Vec<Span> = Vec::new();
    let mut last = 0;

    for (tag, paired) in tags.iter().zip(paired) {
        decoder.push_text(&text[last..tag.start], spans.last());
        last = tag.end;
        if !paired {
            continue;
        }

        if tag.closing {
            if let Some(span) = spans.pop() {
                decoder.close(span);
            }
            continue;
        }

        let id = tag.id.unwrap_or_default();
        let target = match marked.markers.get(&id) {
            Some(target) => Some(*target),
            None if policy == UnknownMarkerPolicy::Strict => {
                return Err(AlignmentError::UnknownMarker(id));
            }
            None => {
                log::warn!("Unknown marker f{}; inserting its text unformatted", id);
                None
            }
        };
        spans.push(decoder.open(target));
    }
    decoder.push_text(&text[last..], spans.last());

    Ok(decoder.nodes)
}

#[derive(Debug)]
struct Tag {
    start: usize,
    end: usize,
    /// `None` when the number does not fit a marker id.
    id: Option<u32>,
    closing: bool,
}

fn scan_tags(text: &str) -> Vec<Tag> {
    MARKER_TAG_REGEX
        .captures_iter(text)
        .filter_map(|caps| {
            let (whole, slash, digits) = (caps.get(0)?, caps.get(1)?, caps.get(2)?);
            Some(Tag {
                start: whole.start(),
                end: whole.end(),
                id: digits.as_str().parse().ok(),
                closing: !slash.as_str().is_empty(),
            })
        })
        .collect()
}

/// Whether each tag has a partner. A closing tag pairs with the nearest
/// open tag of the same id; open tags above that one stay unpaired.
fn pair_tags(tags: &[Tag]) -> Vec<bool> {
    let mut paired = vec![false; tags.len()];
    let mut open: Vec<usize> = Vec::new();

    for (i, tag) in tags.iter().enumerate() {
        let Some(id) = tag.id else {
            continue;
        };
        if !tag.closing {
            open.push(i);
            continue;
        }
        if let Some(depth) = open.iter().rposition(|&o| tags[o].id == Some(id)) {
            paired[open[depth]] = true;
            paired[i] = true;
            open.truncate(depth);
        }
    }

    paired
}

/// An open marker span during decoding.
struct Span {
    target: Option<MarkerTarget>,
    /// Length of the node list when the span opened.
    first_node: usize,
}

struct Decoder<'a> {
    nodes: Vec<DecodedNode>,
    plain: std::slice::Iter<'a, Option<NodeId>>,
    breaks: std::slice::Iter<'a, Option<NodeId>>,
}

impl Decoder<'_> {
    fn open(&mut self, target: Option<MarkerTarget>) -> Span {
        let first_node = self.nodes.len();
        if let Some(MarkerTarget::Field(field)) = target {
            self.nodes.push(DecodedNode::Field {
                field,
                text: String::new(),
            });
        }
        Span { target, first_node }
    }

    /// A formatted span that produced nothing still yields its (empty) run.
    fn close(&mut self, span: Span) {
        if let Some(MarkerTarget::Run(rpr)) = span.target {
            if self.nodes.len() == span.first_node {
                self.nodes.push(DecodedNode::Run {
                    formatting: Some(rpr),
                    text: String::new(),
                });
            }
        }
    }

    /// Push a text fragment found inside `span`, or outside any span.
    fn push_text(&mut self, fragment: &str, span: Option<&Span>) {
        if fragment.is_empty() {
            return;
        }
        match span.and_then(|s| s.target.map(|t| (s.first_node, t))) {
            Some((index, MarkerTarget::Field(_))) => {
                if let Some(DecodedNode::Field { text, .. }) = self.nodes.get_mut(index) {
                    text.extend(fragment.chars().filter(|c| *c != '\r').map(|c| match c {
                        '\n' => ' ',
                        c => c,
                    }));
                }
            }
            Some((_, MarkerTarget::Run(rpr))) => self.push_lines(fragment, Some(rpr)),
            None => self.push_lines(fragment, None),
        }
    }

    /// Split a fragment into runs at line breaks. Without `formatting` each
    /// run takes the properties of the next unwrapped original run.
    fn push_lines(&mut self, fragment: &str, formatting: Option<NodeId>) {
        for (i, line) in fragment.split('\n').enumerate() {
            if i > 0 {
                let formatting = self.breaks.next().copied().flatten();
                self.nodes.push(DecodedNode::Break { formatting });
            }
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let formatting = match formatting {
                Some(rpr) => Some(rpr),
                None => self.plain.next().copied().flatten(),
            };
            self.nodes.push(DecodedNode::Run {
                formatting,
                text: line.to_string(),
            });
        }
    }
}

/// Rewrite a paragraph in one call with markers preserved.
#[derive(Debug, Clone)]
pub struct MarkerStrategy {
    target_language: String,
    style_instructions: String,
    policy: UnknownMarkerPolicy,
}

impl MarkerStrategy {
    pub fn new(target_language: &str, style_instructions: &str, policy: UnknownMarkerPolicy) -> Self {
        Self {
            target_language: target_language.to_string(),
            style_instructions: style_instructions.to_string(),
            policy,
        }
    }
}

impl AlignmentStrategy for MarkerStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Markers
    }

    fn rewrite(
        &self,
        doc: &XmlDocument,
        paragraph: NodeId,
        _extracted: &ExtractedParagraph,
        gate: &mut CallGate<'_>,
    ) -> StrategyOutcome {
        let marked = encode(doc, paragraph);
        if !classify(&marked.plain_text()).is_translatable() {
            return StrategyOutcome::Skipped;
        }
        log::debug!("Marked paragraph: {:?}", marked.text);

        let rewritten = match gate.call("transform_marked", |t| {
            t.transform_marked(&marked.text, &self.target_language, &self.style_instructions)
        }) {
            CallResult::Done(text) => text,
            CallResult::Failed => return StrategyOutcome::Degraded,
            CallResult::Stopped => return StrategyOutcome::Interrupted,
        };
        log::debug!("Rewritten marked paragraph: {:?}", rewritten);

        match decode(&rewritten, &marked, self.policy) {
            Ok(nodes) => StrategyOutcome::Ready(Reinsertion::Nodes(nodes)),
            Err(e) => {
                log::warn!("{}; keeping original paragraph content", e);
                StrategyOutcome::Degraded
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::tests::{first_paragraph, slide};

    fn runs(nodes: &[DecodedNode]) -> Vec<(Option<NodeId>, &str)> {
        nodes
            .iter()
            .filter_map(|node| match node {
                DecodedNode::Run { formatting, text } => Some((*formatting, text.as_str())),
                _ => None,
            })
            .collect()
    }

    fn rpr(marked: &MarkedParagraph, id: u32) -> NodeId {
        match marked.markers[&id] {
            MarkerTarget::Run(rpr) => rpr,
            MarkerTarget::Field(_) => panic!("f{} is a field", id),
        }
    }

    /// Two formatted runs, marked as f1 and f2.
    fn two_runs() -> (XmlDocument, MarkedParagraph) {
        let xml = slide(
            r#"<a:r><a:rPr b="1"/><a:t>Alpha </a:t></a:r><a:r><a:rPr i="1"/><a:t>Beta</a:t></a:r>"#,
        );
        let doc = XmlDocument::parse(&xml).unwrap();
        let marked = encode(&doc, first_paragraph(&doc));
        (doc, marked)
    }

    #[test]
    fn test_encode_marks_formatted_runs_and_fields() {
        let xml = slide(
            r#"<a:r><a:rPr b="1"/><a:t>Bold</a:t></a:r><a:r><a:t> plain </a:t></a:r><a:br/><a:r><a:rPr/><a:t>bare</a:t></a:r><a:fld id="{1}"><a:t>7</a:t></a:fld><a:r><a:rPr i="1"/><a:t>it</a:t></a:r><a:r><a:rPr u="sng"/><a:t/></a:r>"#,
        );
        let doc = XmlDocument::parse(&xml).unwrap();
        let marked = encode(&doc, first_paragraph(&doc));
        let bare = doc.descendants(doc.root(), "rPr")[1];
        let field = doc.descendants(doc.root(), "fld")[0];

        assert_eq!(
            marked.text,
            "<f1>Bold</f1> plain \nbare<f2>7</f2><f3>it</f3><f4></f4>"
        );
        assert_eq!(marked.markers.len(), 4);
        assert_eq!(marked.markers[&2], MarkerTarget::Field(field));
        assert_eq!(marked.plain_properties, vec![None, Some(bare)]);
        assert_eq!(marked.break_properties, vec![None]);
        assert_eq!(marked.plain_text(), "Bold plain \nbare7it");
    }

    #[test]
    fn test_decode_round_trip() {
        let xml = slide(
            r#"<a:r><a:rPr b="1"/><a:t>A</a:t></a:r><a:r><a:t> B </a:t></a:r><a:r><a:rPr i="1"/><a:t>C</a:t></a:r>"#,
        );
        let doc = XmlDocument::parse(&xml).unwrap();
        let marked = encode(&doc, first_paragraph(&doc));

        let nodes = decode(&marked.text, &marked, UnknownMarkerPolicy::Lenient).unwrap();
        assert_eq!(
            runs(&nodes),
            vec![
                (Some(rpr(&marked, 1)), "A"),
                (None, " B "),
                (Some(rpr(&marked, 2)), "C")
            ]
        );
    }

    #[test]
    fn test_decode_field_and_empty_run() {
        let xml = slide(
            r#"<a:r><a:rPr/><a:t>Slide </a:t></a:r><a:fld id="{2}" type="slidenum"><a:rPr sz="1000"/><a:t>3</a:t></a:fld><a:r><a:rPr b="1"/><a:t/></a:r>"#,
        );
        let doc = XmlDocument::parse(&xml).unwrap();
        let marked = encode(&doc, first_paragraph(&doc));
        let bare = doc.descendants(doc.root(), "rPr")[0];
        let field = doc.descendants(doc.root(), "fld")[0];

        let nodes = decode("Folie <f1>3</f1><f2></f2>", &marked, UnknownMarkerPolicy::Strict).unwrap();
        assert_eq!(
            nodes,
            vec![
                DecodedNode::Run {
                    formatting: Some(bare),
                    text: "Folie ".to_string()
                },
                DecodedNode::Field {
                    field,
                    text: "3".to_string()
                },
                DecodedNode::Run {
                    formatting: Some(rpr(&marked, 2)),
                    text: String::new()
                },
            ]
        );
    }

    #[test]
    fn test_decode_reordered_spans() {
        let (_doc, marked) = two_runs();

        let nodes = decode(
            "<f2>Beta</f2> und <f1>Alpha</f1>",
            &marked,
            UnknownMarkerPolicy::Lenient,
        )
        .unwrap();
        assert_eq!(
            runs(&nodes),
            vec![
                (Some(rpr(&marked, 2)), "Beta"),
                (None, " und "),
                (Some(rpr(&marked, 1)), "Alpha")
            ]
        );
    }

    #[test]
    fn test_decode_unknown_marker_lenient() {
        let marked = MarkedParagraph::default();
        let nodes = decode("<f9>word</f9>", &marked, UnknownMarkerPolicy::Lenient).unwrap();

        assert_eq!(runs(&nodes), vec![(None, "word")]);
    }

    #[test]
    fn test_decode_unknown_marker_strict() {
        let marked = MarkedParagraph::default();
        let result = decode("<f9>word</f9>", &marked, UnknownMarkerPolicy::Strict);

        assert_eq!(result, Err(AlignmentError::UnknownMarker(9)));
    }

    #[test]
    fn test_decode_unclosed_tag_keeps_intact_span() {
        let (_doc, marked) = two_runs();

        let nodes = decode("<f1>Alpha <f2>Beta</f2>", &marked, UnknownMarkerPolicy::Lenient).unwrap();
        assert_eq!(
            runs(&nodes),
            vec![(None, "Alpha "), (Some(rpr(&marked, 2)), "Beta")]
        );

        let result = decode("<f1>Alpha <f2>Beta</f2>", &marked, UnknownMarkerPolicy::Strict);
        assert!(matches!(result, Err(AlignmentError::Parse(_))));
    }

    #[test]
    fn test_decode_mismatched_and_stray_tags() {
        let marked = MarkedParagraph::default();
        let nodes = decode("<f1>one</f2> two</f3>", &marked, UnknownMarkerPolicy::Lenient).unwrap();

        assert_eq!(runs(&nodes), vec![(None, "one"), (None, " two")]);
    }

    #[test]
    fn test_decode_breaks_and_reasoning() {
        let marked = MarkedParagraph {
            break_properties: vec![None],
            ..MarkedParagraph::default()
        };
        let nodes = decode(
            "<think>two lines</think>first\r\nsecond",
            &marked,
            UnknownMarkerPolicy::Lenient,
        )
        .unwrap();

        assert_eq!(
            nodes,
            vec![
                DecodedNode::Run {
                    formatting: None,
                    text: "first".to_string()
                },
                DecodedNode::Break { formatting: None },
                DecodedNode::Run {
                    formatting: None,
                    text: "second".to_string()
                },
            ]
        );
    }
}
