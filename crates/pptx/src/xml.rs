//! Arena XML tree for slide parts.
//!
//! Slides are parsed with quick-xml into a flat arena of nodes addressed by
//! [`NodeId`]. Handles stay valid for the life of the document, including
//! for nodes that have been detached, so a paragraph can be rebuilt without
//! re-querying its siblings after every mutation.
//!
//! Qualified names and `xmlns` declarations are kept verbatim, as are the
//! XML declaration, comments, CDATA sections and processing instructions.

use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use slidemob_core::{Error, Result};

/// Handle to a node in an [`XmlDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element {
        /// Qualified name, e.g. `a:r`.
        name: String,
        attributes: Vec<(String, String)>,
    },
    /// Unescaped character data.
    Text(String),
    /// Markup written back exactly as read (comments, CDATA, PIs).
    Raw(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A parsed XML document.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    nodes: Vec<Node>,
    root: NodeId,
    /// Markup before the root element (declaration, comments, whitespace).
    prolog: Vec<String>,
    /// Markup after the root element.
    epilog: Vec<String>,
}

impl XmlDocument {
    /// Parse a document from a string.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(false);

        let mut nodes: Vec<Node> = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut root: Option<NodeId> = None;
        let mut prolog = Vec::new();
        let mut epilog = Vec::new();

        loop {
            let event = reader.read_event().map_err(|e| {
                Error::XmlError(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    e
                ))
            })?;

            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let is_empty = matches!(event, Event::Empty(_));
                    let kind = element_kind(e)?;
                    let parent = stack.last().copied();
                    if parent.is_none() && root.is_some() {
                        return Err(Error::InvalidDocument(
                            "more than one root element".to_string(),
                        ));
                    }
                    let id = push_node(&mut nodes, kind, parent);
                    if parent.is_none() {
                        root = Some(id);
                    }
                    if !is_empty {
                        stack.push(id);
                    }
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Text(ref e) => {
                    let text = e
                        .unescape()
                        .map_err(|e| Error::XmlError(format!("bad text content: {}", e)))?
                        .into_owned();
                    match stack.last().copied() {
                        Some(parent) => {
                            push_node(&mut nodes, NodeKind::Text(text), Some(parent));
                        }
                        None => {
                            let raw = String::from_utf8_lossy(e).into_owned();
                            if root.is_none() {
                                prolog.push(raw);
                            } else {
                                epilog.push(raw);
                            }
                        }
                    }
                }
                Event::Eof => break,
                other => {
                    let raw = raw_markup(&other);
                    match stack.last().copied() {
                        Some(parent) => {
                            push_node(&mut nodes, NodeKind::Raw(raw), Some(parent));
                        }
                        None if root.is_none() => prolog.push(raw),
                        None => epilog.push(raw),
                    }
                }
            }
        }

        if let Some(open) = stack.last() {
            let name = match &nodes[open.0].kind {
                NodeKind::Element { name, .. } => name.clone(),
                _ => String::new(),
            };
            return Err(Error::XmlError(format!("unclosed element <{}>", name)));
        }

        let root = root.ok_or_else(|| Error::InvalidDocument("no root element".to_string()))?;
        Ok(Self {
            nodes,
            root,
            prolog,
            epilog,
        })
    }

    /// The document element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Qualified name of an element node.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Name of an element without its namespace prefix.
    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.name(id).map(|name| split_name(name).1)
    }

    /// Namespace prefix of an element, if any.
    pub fn prefix(&self, id: NodeId) -> Option<&str> {
        self.name(id).and_then(|name| split_name(name).0)
    }

    /// Whether `id` is an element with the given local name.
    pub fn is_element(&self, id: NodeId, local: &str) -> bool {
        self.local_name(id) == Some(local)
    }

    /// Child elements, skipping text and raw nodes.
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |child| self.name(*child).is_some())
    }

    /// First child element with the given local name.
    pub fn child_element(&self, id: NodeId, local: &str) -> Option<NodeId> {
        self.element_children(id)
            .find(|child| self.is_element(*child, local))
    }

    /// All descendant elements with the given local name, in document order.
    pub fn descendants(&self, id: NodeId, local: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut pending: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = pending.pop() {
            if self.is_element(node, local) {
                found.push(node);
            }
            pending.extend(self.children(node).iter().rev().copied());
        }
        found
    }

    pub fn attributes(&self, id: NodeId) -> &[(String, String)] {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set or replace an attribute. No-op on non-element nodes.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[id.0].kind {
            match attributes.iter_mut().find(|(key, _)| key == name) {
                Some((_, existing)) => *existing = value.to_string(),
                None => attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { .. } => {
                for child in &self.nodes[id.0].children {
                    self.collect_text(*child, out);
                }
            }
            NodeKind::Raw(_) => {}
        }
    }

    /// Replace the children of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        for child in std::mem::take(&mut self.nodes[id.0].children) {
            self.nodes[child.0].parent = None;
        }
        if !text.is_empty() {
            let node = self.create_node(NodeKind::Text(text.to_string()));
            self.append_child(id, node);
        }
    }

    /// Create a detached element.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.create_node(NodeKind::Element {
            name: name.to_string(),
            attributes: Vec::new(),
        })
    }

    fn create_node(&mut self, kind: NodeKind) -> NodeId {
        push_node(&mut self.nodes, kind, None)
    }

    /// Append a detached node as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert a node at `index` among the children of `parent`.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Remove a node from its parent. The handle stays valid.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != id);
        }
    }

    /// Position of `id` among its parent's children.
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|child| *child == id)
    }

    /// Deep-copy a subtree. The copy is detached.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let kind = self.nodes[id.0].kind.clone();
        let copy = self.create_node(kind);
        let children = self.nodes[id.0].children.clone();
        for child in children {
            let child_copy = self.clone_subtree(child);
            self.nodes[child_copy.0].parent = Some(copy);
            self.nodes[copy.0].children.push(child_copy);
        }
        copy
    }

    /// Serialize the whole document.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        for part in &self.prolog {
            out.push_str(part);
        }
        self.write_node(self.root, &mut out);
        for part in &self.epilog {
            out.push_str(part);
        }
        out
    }

    /// Serialize one subtree.
    pub fn node_to_string(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id.0];
        match &node.kind {
            NodeKind::Text(text) => out.push_str(&partial_escape(text)),
            NodeKind::Raw(raw) => out.push_str(raw),
            NodeKind::Element { name, attributes } => {
                out.push('<');
                out.push_str(name);
                for (key, value) in attributes {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&escape_attribute(value));
                    out.push('"');
                }
                if node.children.is_empty() {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    for child in &node.children {
                        self.write_node(*child, out);
                    }
                    out.push_str("</");
                    out.push_str(name);
                    out.push('>');
                }
            }
        }
    }
}

fn push_node(nodes: &mut Vec<Node>, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
    let id = NodeId(nodes.len());
    nodes.push(Node {
        kind,
        parent,
        children: Vec::new(),
    });
    if let Some(parent) = parent {
        nodes[parent.0].children.push(id);
    }
    id
}

fn element_kind(e: &BytesStart<'_>) -> Result<NodeKind> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| Error::XmlError(format!("bad attribute on <{}>: {}", name, e)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::XmlError(format!("bad attribute value on <{}>: {}", name, e)))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(NodeKind::Element { name, attributes })
}

fn raw_markup(event: &Event<'_>) -> String {
    match event {
        Event::Comment(e) => format!("<!--{}-->", String::from_utf8_lossy(e)),
        Event::CData(e) => format!("<![CDATA[{}]]>", String::from_utf8_lossy(e)),
        Event::Decl(e) => format!("<?{}?>", String::from_utf8_lossy(e)),
        Event::PI(e) => format!("<?{}?>", String::from_utf8_lossy(e)),
        Event::DocType(e) => format!("<!DOCTYPE {}>", String::from_utf8_lossy(e)),
        _ => String::new(),
    }
}

/// Escape an attribute value. Whitespace other than the space character is
/// written as a character reference, or readers would normalise it away.
fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in partial_escape(value).chars() {
        match c {
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            '\t' => out.push_str("&#x9;"),
            c => out.push(c),
        }
    }
    out
}

/// Split `prefix:local` into its parts.
fn split_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// Build a qualified name from an optional prefix.
pub fn qualified_name(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:sp><p:txBody><a:bodyPr/><a:p><a:pPr algn="ctr"/><a:r><a:rPr lang="en-GB" b="1"/><a:t>Tom &amp; Jerry </a:t></a:r><!-- note --><a:endParaRPr lang="en-GB"/></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#;

    #[test]
    fn test_round_trip_is_byte_stable() {
        let doc = XmlDocument::parse(SLIDE).unwrap();
        assert_eq!(doc.to_xml_string(), SLIDE);
    }

    #[test]
    fn test_navigation() {
        let doc = XmlDocument::parse(SLIDE).unwrap();
        assert_eq!(doc.local_name(doc.root()), Some("sld"));
        assert_eq!(doc.prefix(doc.root()), Some("p"));

        let paragraphs = doc.descendants(doc.root(), "p");
        assert_eq!(paragraphs.len(), 1);
        let run = doc.child_element(paragraphs[0], "r").unwrap();
        let rpr = doc.child_element(run, "rPr").unwrap();
        assert_eq!(doc.attribute(rpr, "lang"), Some("en-GB"));
        assert_eq!(doc.text(run), "Tom & Jerry ");
        assert_eq!(doc.index_in_parent(run), Some(1));
    }

    #[test]
    fn test_mutation_and_clone() {
        let mut doc = XmlDocument::parse(SLIDE).unwrap();
        let paragraph = doc.descendants(doc.root(), "p")[0];
        let run = doc.child_element(paragraph, "r").unwrap();
        let t = doc.child_element(run, "t").unwrap();

        doc.set_text(t, "<Hi>");
        let copy = doc.clone_subtree(run);
        assert_eq!(doc.parent(copy), None);
        doc.insert_child(paragraph, 2, copy);
        doc.set_attribute(doc.child_element(copy, "rPr").unwrap(), "lang", "de-DE");

        let xml = doc.node_to_string(paragraph);
        assert!(xml.contains(r#"<a:r><a:rPr lang="en-GB" b="1"/><a:t>&lt;Hi&gt;</a:t></a:r>"#));
        assert!(xml.contains(r#"<a:r><a:rPr lang="de-DE" b="1"/><a:t>&lt;Hi&gt;</a:t></a:r>"#));

        doc.detach(run);
        assert_eq!(doc.parent(run), None);
        assert_eq!(doc.element_children(paragraph).count(), 3);
        // Detached handles stay usable.
        assert_eq!(doc.text(run), "<Hi>");
    }

    #[test]
    fn test_attribute_escaping() {
        let mut doc = XmlDocument::parse(r#"<a:t xmlns:a="urn:a"/>"#).unwrap();
        let root = doc.root();
        doc.set_attribute(root, "title", "say \"hi\" & <go>");
        assert_eq!(
            doc.to_xml_string(),
            r#"<a:t xmlns:a="urn:a" title="say &quot;hi&quot; &amp; &lt;go&gt;"/>"#
        );
    }

    #[test]
    fn test_attribute_whitespace_references_round_trip() {
        let xml = r#"<p:cNvPr xmlns:p="urn:p" id="4" descr="line one&#xA;line two&#x9;tab&#xD;"/>"#;
        let doc = XmlDocument::parse(xml).unwrap();

        assert_eq!(
            doc.attribute(doc.root(), "descr"),
            Some("line one\nline two\ttab\r")
        );
        assert_eq!(doc.to_xml_string(), xml);
    }

    #[test]
    fn test_malformed_xml_is_error() {
        assert!(matches!(
            XmlDocument::parse("<a:p><a:r></a:p>"),
            Err(Error::XmlError(_))
        ));
        assert!(matches!(
            XmlDocument::parse("<a:p><a:r>"),
            Err(Error::XmlError(_))
        ));
        assert!(matches!(
            XmlDocument::parse("   "),
            Err(Error::InvalidDocument(_))
        ));
    }
}
