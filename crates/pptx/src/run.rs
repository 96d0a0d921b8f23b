//! Text runs and run merging.
//!
//! A run is an `a:r` element: an optional `a:rPr` formatting bag followed
//! by an `a:t` text element. PowerPoint splits text into many runs for
//! reasons invisible to the reader (spell-check state, edit history);
//! merging identically formatted neighbours gives the extractor fewer,
//! longer segments to work with.

use crate::xml::{qualified_name, NodeId, XmlDocument};

/// Run property attributes that carry editing state rather than formatting.
const VOLATILE_ATTRIBUTES: &[&str] = &["dirty", "err", "smtClean", "smtId", "bmk"];

/// Attributes compared by name in a [`FormattingKey`].
const KEY_ATTRIBUTES: [&str; 5] = ["lang", "sz", "b", "i", "u"];

/// The formatting of a run as far as merging and alignment care.
///
/// Language, size, bold, italic and underline are compared directly; every
/// other property (colour, font, spacing, ...) is compared through a
/// canonical rendering so two runs only merge when nothing visible differs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormattingKey {
    pub lang: Option<String>,
    pub size: Option<String>,
    pub bold: Option<String>,
    pub italic: Option<String>,
    pub underline: Option<String>,
    rest: String,
}

impl FormattingKey {
    /// Key of a run, or `None` when the run has no `a:rPr`.
    pub fn of(doc: &XmlDocument, run: NodeId) -> Option<Self> {
        let rpr = run_properties(doc, run)?;
        let [lang, size, bold, italic, underline] =
            KEY_ATTRIBUTES.map(|name| doc.attribute(rpr, name).map(str::to_string));

        let mut rest = String::new();
        let mut others: Vec<&(String, String)> = doc
            .attributes(rpr)
            .iter()
            .filter(|(key, _)| {
                !KEY_ATTRIBUTES.contains(&key.as_str()) && !VOLATILE_ATTRIBUTES.contains(&key.as_str())
            })
            .collect();
        others.sort();
        for (key, value) in others {
            rest.push_str(key);
            rest.push('=');
            rest.push_str(value);
            rest.push(';');
        }
        for child in doc.children(rpr) {
            rest.push_str(&doc.node_to_string(*child));
        }

        Some(Self {
            lang,
            size,
            bold,
            italic,
            underline,
            rest,
        })
    }
}

/// The `a:rPr` child of a run.
pub fn run_properties(doc: &XmlDocument, run: NodeId) -> Option<NodeId> {
    doc.child_element(run, "rPr")
}

/// Whether a run's formatting bag has any attribute or child.
pub fn has_formatting(doc: &XmlDocument, run: NodeId) -> bool {
    run_properties(doc, run)
        .map(|rpr| !doc.attributes(rpr).is_empty() || doc.element_children(rpr).next().is_some())
        .unwrap_or(false)
}

/// The run's text, or `None` if it has no `a:t` element.
pub fn run_text(doc: &XmlDocument, run: NodeId) -> Option<String> {
    doc.child_element(run, "t").map(|t| doc.text(t))
}

/// Replace a run's text, creating the `a:t` element if needed.
pub fn set_run_text(doc: &mut XmlDocument, run: NodeId, text: &str) {
    let t = match doc.child_element(run, "t") {
        Some(t) => t,
        None => {
            let name = qualified_name(doc.prefix(run), "t");
            let t = doc.create_element(&name);
            doc.append_child(run, t);
            t
        }
    };
    doc.set_text(t, text);
}

/// The language declared on a run, if any.
pub fn run_language(doc: &XmlDocument, run: NodeId) -> Option<&str> {
    run_properties(doc, run).and_then(|rpr| doc.attribute(rpr, "lang"))
}

/// Set a run's `lang`, creating `a:rPr` as the first child when missing.
pub fn set_run_language(doc: &mut XmlDocument, run: NodeId, language: &str) {
    let rpr = match run_properties(doc, run) {
        Some(rpr) => rpr,
        None => {
            let name = qualified_name(doc.prefix(run), "rPr");
            let rpr = doc.create_element(&name);
            doc.insert_child(run, 0, rpr);
            rpr
        }
    };
    doc.set_attribute(rpr, "lang", language);
}

/// Runs that are direct children of a paragraph, in order.
pub fn paragraph_runs(doc: &XmlDocument, paragraph: NodeId) -> Vec<NodeId> {
    doc.element_children(paragraph)
        .filter(|child| doc.is_element(*child, "r"))
        .collect()
}

/// Coalesces adjacent, identically formatted runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunMerger;

impl RunMerger {
    pub fn new() -> Self {
        Self
    }

    /// Merge runs inside one paragraph. Returns the number of runs removed.
    ///
    /// Only runs that are direct element neighbours merge; a line break or
    /// field in between keeps them apart.
    pub fn merge(&self, doc: &mut XmlDocument, paragraph: NodeId) -> usize {
        let mut merged = 0;
        let mut i = 0;

        loop {
            let children: Vec<NodeId> = doc.element_children(paragraph).collect();
            if i + 1 >= children.len() {
                break;
            }
            let (current, next) = (children[i], children[i + 1]);

            if self.mergeable(doc, current, next) {
                let next_text = run_text(doc, next).unwrap_or_default();
                let mut text = run_text(doc, current).unwrap_or_default();
                text.push_str(&next_text);
                set_run_text(doc, current, &text);
                doc.detach(next);
                merged += 1;
                // Stay on `current`: its new neighbour may merge too.
            } else {
                i += 1;
            }
        }

        if merged > 0 {
            log::debug!("Merged {} runs", merged);
        }
        merged
    }

    /// Two runs merge when both are runs with text and their formatting
    /// keys exist and are equal.
    pub fn mergeable(&self, doc: &XmlDocument, a: NodeId, b: NodeId) -> bool {
        if !doc.is_element(a, "r") || !doc.is_element(b, "r") {
            return false;
        }
        if run_text(doc, a).is_none() || run_text(doc, b).is_none() {
            return false;
        }
        match (FormattingKey::of(doc, a), FormattingKey::of(doc, b)) {
            (Some(ka), Some(kb)) => ka == kb,
            _ => false,
        }
    }
}
