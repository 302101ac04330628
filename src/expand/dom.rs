//! expand::dom
//!
//! Arena-allocated document tree.
//!
//! # Architecture
//!
//! Every node of every file parsed during one expansion lives in a single
//! [`Document`] arena and is addressed by a stable [`NodeId`]. Parsing a
//! file adds a fragment node whose children are that file's top-level
//! nodes; include resolution then moves those children into place.
//! Detached nodes stay in the arena (substitution sources are cloned from
//! them later).
//!
//! Elements parsed from source remember their [`Span`]: byte offsets of the
//! opening tag, content and closing tag in the text they came from.
//!
//! # Invariants
//!
//! - A node has at most one parent, and appears once in its children list
//! - Text and attribute values are stored exactly as written
//! - Void elements never have children

use super::tokenizer::{TokenKind, Tokenizer};

/// Elements that never have content or an end tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements whose start tag implicitly closes an open `<p>`.
const CLOSES_P: &[&str] = &[
    "address", "article", "aside", "blockquote", "div", "dl", "fieldset", "footer", "form",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "nav", "ol", "p", "pre",
    "section", "table", "ul",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Byte offsets of a parsed element in its source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Offset of `<` of the opening tag
    pub start: usize,
    /// Offset just past `>` of the opening tag (content start)
    pub open_end: usize,
    /// Offset of `<` of the closing tag, if one was written
    pub close_start: Option<usize>,
    /// Offset just past the element
    pub end: usize,
}

impl Span {
    /// Byte range of the element's content.
    pub fn content(&self) -> std::ops::Range<usize> {
        let end = self.close_start.unwrap_or(self.end).max(self.open_end);
        self.open_end..end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercased tag name
    pub name: String,
    /// Attributes in source order, values raw
    pub attrs: Vec<(String, Option<String>)>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
        }
    }

    pub fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    /// Container for a parsed file or a detached group of nodes
    Fragment,
    Element(Element),
    Text(String),
    /// Raw source including `<!--` and `-->`
    Comment(String),
    /// Raw `<!...>` or `<?...>` declaration
    Doctype(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    span: Option<Span>,
}

/// Node arena.
#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `html` into a fresh document; returns it and the fragment root.
    pub fn parse(html: &str) -> (Self, NodeId) {
        let mut doc = Self::new();
        let root = doc.parse_fragment(html);
        (doc, root)
    }

    /// Parse `html` into this arena under a new, detached fragment node.
    ///
    /// Malformed markup never fails: unmatched end tags are ignored and
    /// elements left open are closed at end of input.
    pub fn parse_fragment(&mut self, html: &str) -> NodeId {
        let root = self.alloc(NodeData::Fragment, None);
        let mut open: Vec<NodeId> = vec![root];

        for token in Tokenizer::new(html) {
            let text = &html[token.start..token.end];
            match token.kind {
                TokenKind::StartTag {
                    name,
                    attrs,
                    self_closing,
                } => {
                    self.close_implied(&mut open, &name, token.start);

                    let element = Element {
                        name,
                        attrs: attrs.into_iter().map(|a| (a.name, a.value)).collect(),
                    };
                    let closed_now = self_closing || element.is_void();
                    let span = Span {
                        start: token.start,
                        open_end: token.end,
                        close_start: None,
                        end: token.end,
                    };
                    let parent = current(&open);
                    let id = self.alloc(NodeData::Element(element), Some(span));
                    self.append_child(parent, id);
                    if !closed_now {
                        open.push(id);
                    }
                }
                TokenKind::EndTag { name } => {
                    let matching = open
                        .iter()
                        .rposition(|&id| self.is_element_named(id, &name));
                    if let Some(depth) = matching.filter(|&d| d > 0) {
                        while open.len() > depth + 1 {
                            if let Some(id) = open.pop() {
                                self.finish(id, None, token.start);
                            }
                        }
                        if let Some(id) = open.pop() {
                            self.finish(id, Some(token.start), token.end);
                        }
                    }
                }
                TokenKind::Text => {
                    let id = self.alloc(NodeData::Text(text.to_string()), None);
                    self.append_child(current(&open), id);
                }
                TokenKind::Comment => {
                    let id = self.alloc(NodeData::Comment(text.to_string()), None);
                    self.append_child(current(&open), id);
                }
                TokenKind::Doctype => {
                    let id = self.alloc(NodeData::Doctype(text.to_string()), None);
                    self.append_child(current(&open), id);
                }
            }
        }

        while open.len() > 1 {
            if let Some(id) = open.pop() {
                self.finish(id, None, html.len());
            }
        }
        root
    }

    /// Close elements a new `name` start tag implicitly ends.
    fn close_implied(&mut self, open: &mut Vec<NodeId>, name: &str, at: usize) {
        let top = current(open);
        if CLOSES_P.contains(&name) && self.is_element_named(top, "p") {
            open.pop();
            self.finish(top, None, at);
            return;
        }
        if name == "li" {
            let scope = open.iter().rposition(|&id| {
                self.is_element_named(id, "li")
                    || self.is_element_named(id, "ul")
                    || self.is_element_named(id, "ol")
            });
            if let Some(depth) = scope.filter(|&d| self.is_element_named(open[d], "li")) {
                while open.len() > depth {
                    if let Some(id) = open.pop() {
                        self.finish(id, None, at);
                    }
                }
            }
        }
    }

    fn finish(&mut self, id: NodeId, close_start: Option<usize>, end: usize) {
        if let Some(span) = self.nodes[id.0].span.as_mut() {
            span.close_start = close_start;
            span.end = end;
        }
    }

    fn alloc(&mut self, data: NodeData, span: Option<Span>) -> NodeId {
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
            span,
        });
        NodeId(self.nodes.len() - 1)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn is_element_named(&self, id: NodeId, name: &str) -> bool {
        self.element(id).is_some_and(|el| el.name == name)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn span(&self, id: NodeId) -> Option<Span> {
        self.nodes[id.0].span
    }

    /// Attribute value; `Some("")` for a bare attribute.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_deref().unwrap_or(""))
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.element(id)
            .is_some_and(|el| el.attrs.iter().any(|(n, _)| n == name))
    }

    /// All nodes below `id` in document order (excluding `id`).
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    /// Descendant elements of `id` whose `attr` equals `value`.
    pub fn find_by_attr(&self, id: NodeId, attr: &str, value: &str) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&n| self.attr(n, attr) == Some(value))
            .collect()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: Option<&str>) {
        if let Some(el) = self.element_mut(id) {
            let value = value.map(str::to_string);
            match el.attrs.iter_mut().find(|(n, _)| n == name) {
                Some(slot) => slot.1 = value,
                None => el.attrs.push((name.to_string(), value)),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.retain(|(n, _)| n != name);
        }
    }

    /// Create a detached element.
    pub fn create_element(&mut self, element: Element) -> NodeId {
        self.alloc(NodeData::Element(element), None)
    }

    /// Append `child` to `parent`, detaching it from any previous parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Remove `id` from its parent's children.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Put `replacements` where `id` is, in order, and detach `id`.
    pub fn replace_with(&mut self, id: NodeId, replacements: &[NodeId]) {
        let Some(parent) = self.nodes[id.0].parent else {
            return;
        };
        for &r in replacements {
            self.detach(r);
        }
        let Some(index) = self.nodes[parent.0].children.iter().position(|&c| c == id) else {
            return;
        };
        self.nodes[parent.0]
            .children
            .splice(index..=index, replacements.iter().copied());
        for &r in replacements {
            self.nodes[r.0].parent = Some(parent);
        }
        self.nodes[id.0].parent = None;
    }

    /// Replace all children of `id` with `children`.
    pub fn set_children(&mut self, id: NodeId, children: &[NodeId]) {
        for old in std::mem::take(&mut self.nodes[id.0].children) {
            self.nodes[old.0].parent = None;
        }
        for &child in children {
            self.append_child(id, child);
        }
    }

    /// Replace `id` by its own children.
    pub fn unwrap_node(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        self.replace_with(id, &children);
    }

    /// Deep copy of `id`, detached. Spans are kept.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let data = self.nodes[id.0].data.clone();
        let span = self.nodes[id.0].span;
        let copy = self.alloc(data, span);
        for child in self.children(id).to_vec() {
            let child_copy = self.clone_subtree(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Copy of `id` without its children.
    pub fn clone_shallow(&mut self, id: NodeId) -> NodeId {
        let data = self.nodes[id.0].data.clone();
        let span = self.nodes[id.0].span;
        self.alloc(data, span)
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Serialize `id` and everything below it.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    /// Serialize the children of `id`.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_node(child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match self.data(id) {
            NodeData::Fragment => {
                for &child in self.children(id) {
                    self.write_node(child, out);
                }
            }
            NodeData::Text(text) | NodeData::Comment(text) | NodeData::Doctype(text) => {
                out.push_str(text)
            }
            NodeData::Element(el) => {
                out.push('<');
                out.push_str(&el.name);
                for (name, value) in &el.attrs {
                    out.push(' ');
                    out.push_str(name);
                    if let Some(value) = value {
                        out.push_str("=\"");
                        out.push_str(&value.replace('"', "&quot;"));
                        out.push('"');
                    }
                }
                out.push('>');
                if el.is_void() {
                    return;
                }
                for &child in self.children(id) {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(&el.name);
                out.push('>');
            }
        }
    }
}

fn current(open: &[NodeId]) -> NodeId {
    open[open.len() - 1]
}
