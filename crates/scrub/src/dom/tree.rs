// ABOUTME: Arena-backed mutable HTML document with explicit node kinds.
// ABOUTME: Builds from scraper's HTML5 parse, mutates in place, and serializes back to markup.

use ego_tree::NodeRef;
use scraper::Html;

use crate::error::ScrubError;
use crate::resource::decode_body;

/// Elements serialized without an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text children are emitted verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

/// Content types the markup parser accepts.
const MARKUP_CONTENT_TYPES: &[&str] = &[
    "text/html",
    "application/xhtml+xml",
    "application/xml",
    "text/xml",
];

/// Index of a node in its document's arena.
///
/// Ids are only meaningful for the document that produced them; handing one to a
/// different document is a contract violation and panics on access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What a node is.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,
    Doctype(String),
    Element(ElementData),
    Text(String),
    Comment(String),
}

/// Tag name plus an ordered attribute multimap.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementData {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl ElementData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    /// First value for `name`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|(k, _)| k == name)
    }

    /// Replace the first occurrence in place, or append.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    /// Remove every occurrence of `name`. Returns true if anything was removed.
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|(k, _)| k != name);
        before != self.attrs.len()
    }
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A parsed HTML document.
///
/// Detached nodes stay in the arena but are unreachable from the root.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over a node's ancestors, nearest first.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}

enum Step {
    Enter(NodeId),
    Exit(NodeId),
}

impl Document {
    /// An empty document holding only the root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Parse a full HTML document.
    pub fn parse(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let mut doc = Self::new();
        let root = doc.root();
        doc.import_parsed(parsed.tree.root(), root);
        doc
    }

    /// Decode raw bytes with the declared content type and parse them.
    ///
    /// Fails with `InvalidMarkup` for non-markup content types and empty payloads.
    pub fn from_bytes(bytes: &[u8], content_type: Option<&str>) -> Result<Self, ScrubError> {
        if let Some(ct) = content_type {
            let essence = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            if !MARKUP_CONTENT_TYPES.contains(&essence.as_str()) {
                return Err(ScrubError::invalid_markup(
                    "",
                    "Parse",
                    Some(anyhow::anyhow!("unsupported content type {}", essence)),
                ));
            }
        }

        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(ScrubError::invalid_markup(
                "",
                "Parse",
                Some(anyhow::anyhow!("empty document")),
            ));
        }

        let html = decode_body(bytes, content_type);
        Ok(Self::parse(&html))
    }

    fn import_parsed(&mut self, source: NodeRef<'_, scraper::Node>, target: NodeId) {
        let mut stack: Vec<(NodeRef<'_, scraper::Node>, NodeId)> =
            source.children().rev().map(|c| (c, target)).collect();

        while let Some((node, parent)) = stack.pop() {
            let kind = match node.value() {
                scraper::Node::Doctype(doctype) => NodeKind::Doctype(doctype.name().to_string()),
                scraper::Node::Comment(comment) => NodeKind::Comment(String::from(&**comment)),
                scraper::Node::Text(text) => NodeKind::Text(String::from(&**text)),
                scraper::Node::Element(el) => NodeKind::Element(ElementData {
                    name: el.name().to_string(),
                    attrs: el
                        .attrs()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                }),
                _ => continue,
            };
            let id = self.push(kind);
            self.append_child(parent, id);
            for child in node.children().rev() {
                stack.push((child, id));
            }
        }
    }

    /// Deep-copy a subtree from another document. The copy is detached.
    pub fn import(&mut self, other: &Document, source: NodeId) -> NodeId {
        let top = self.push(other.kind(source).clone());
        let mut stack: Vec<(NodeId, NodeId)> = other
            .children(source)
            .iter()
            .rev()
            .map(|&c| (c, top))
            .collect();
        while let Some((src, parent)) = stack.pop() {
            let id = self.push(other.kind(src).clone());
            self.append_child(parent, id);
            for &child in other.children(src).iter().rev() {
                stack.push((child, id));
            }
        }
        top
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes ever allocated, attached or not.
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.node(id).kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.node_mut(id).kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.name.as_str())
    }

    pub fn is_tag(&self, id: NodeId, name: &str) -> bool {
        self.tag(id) == Some(name)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Text(t) => Some(t.as_str()),
            _ => None,
        }
    }

    pub fn text_mut(&mut self, id: NodeId) -> Option<&mut String> {
        match &mut self.node_mut(id).kind {
            NodeKind::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.text(id).is_some()
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.attr(name))
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.element(id).is_some_and(|el| el.has_attr(name))
    }

    /// No-op on non-element nodes.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let Some(el) = self.element_mut(id) {
            el.set_attr(name, value);
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> bool {
        self.element_mut(id).is_some_and(|el| el.remove_attr(name))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |&c| self.is_element(c))
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        pos.checked_sub(1).map(|p| siblings[p])
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings.get(pos + 1).copied()
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(id),
        }
    }

    /// True if any ancestor carries one of `tags`.
    pub fn has_ancestor(&self, id: NodeId, tags: &[&str]) -> bool {
        self.closest(id, tags).is_some()
    }

    /// Nearest ancestor carrying one of `tags`.
    pub fn closest(&self, id: NodeId, tags: &[&str]) -> Option<NodeId> {
        self.ancestors(id)
            .find(|&a| self.tag(a).is_some_and(|t| tags.contains(&t)))
    }

    /// Snapshot of all descendants in document order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Descendant elements of `scope` whose tag is in `tags`, in document order.
    pub fn select(&self, scope: NodeId, tags: &[&str]) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&id| self.tag(id).is_some_and(|t| tags.contains(&t)))
            .collect()
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(t) = self.text(id) {
            return t.to_string();
        }
        let mut out = String::new();
        for d in self.descendants(id) {
            if let Some(t) = self.text(d) {
                out.push_str(t);
            }
        }
        out
    }

    /// True if the root is reachable through the parent chain.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root() || self.ancestors(id).any(|a| a == self.root())
    }

    /// The `<html>` element.
    pub fn document_element(&self) -> Option<NodeId> {
        self.element_children(self.root()).next()
    }

    pub fn head(&self) -> Option<NodeId> {
        let html = self.document_element()?;
        self.element_children(html).find(|&c| self.is_tag(c, "head"))
    }

    pub fn body(&self) -> Option<NodeId> {
        let html = self.document_element()?;
        self.element_children(html).find(|&c| self.is_tag(c, "body"))
    }

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push(NodeKind::Element(ElementData::new(name)))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    /// Move `child` to the end of `parent`'s children.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        assert!(
            parent != child && !self.ancestors(parent).any(|a| a == child),
            "append_child would create a cycle"
        );
        self.detach(child);
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.push(child);
    }

    /// Move `node` into `reference`'s parent, immediately before `reference`.
    ///
    /// Panics if `reference` is detached.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) {
        if reference == node {
            return;
        }
        let parent = self
            .parent(reference)
            .expect("insert_before reference must have a parent");
        assert!(
            !self.ancestors(reference).any(|a| a == node),
            "insert_before would create a cycle"
        );
        self.detach(node);
        let pos = self
            .children(parent)
            .iter()
            .position(|&c| c == reference)
            .unwrap_or(0);
        self.node_mut(parent).children.insert(pos, node);
        self.node_mut(node).parent = Some(parent);
    }

    /// Unlink `id` from its parent. The subtree stays intact.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.node_mut(id).parent.take() {
            self.node_mut(parent).children.retain(|&c| c != id);
        }
    }

    /// Walk `scope`'s descendants in document order, detaching every node matching
    /// `pred` without descending into it. Returns the number of detached nodes.
    pub fn remove_where<F>(&mut self, scope: NodeId, mut pred: F) -> usize
    where
        F: FnMut(&Document, NodeId) -> bool,
    {
        let mut removed = 0;
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            if pred(self, current) {
                self.detach(current);
                removed += 1;
            } else {
                stack.extend(self.children(current).iter().rev().copied());
            }
        }
        removed
    }

    /// Merge runs of adjacent text siblings anywhere under `scope`.
    pub fn merge_adjacent_text(&mut self, scope: NodeId) {
        let mut parents = vec![scope];
        parents.extend(self.descendants(scope));
        for parent in parents {
            let kids = self.children(parent).to_vec();
            let mut run: Option<NodeId> = None;
            for kid in kids {
                let Some(text) = self.text(kid).map(str::to_string) else {
                    run = None;
                    continue;
                };
                match run {
                    Some(first) => {
                        if let Some(t) = self.text_mut(first) {
                            t.push_str(&text);
                        }
                        self.detach(kid);
                    }
                    None => run = Some(kid),
                }
            }
        }
    }

    /// Serialize the whole document.
    pub fn to_html(&self) -> String {
        self.inner_html(self.root())
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_node(child, &mut out);
        }
        out
    }

    fn write_node(&self, start: NodeId, out: &mut String) {
        let mut stack = vec![Step::Enter(start)];
        while let Some(step) = stack.pop() {
            let id = match step {
                Step::Exit(id) => {
                    if let Some(el) = self.element(id) {
                        out.push_str("</");
                        out.push_str(&el.name);
                        out.push('>');
                    }
                    continue;
                }
                Step::Enter(id) => id,
            };

            match &self.node(id).kind {
                NodeKind::Document => {
                    stack.extend(self.children(id).iter().rev().map(|&c| Step::Enter(c)));
                }
                NodeKind::Doctype(name) => {
                    out.push_str("<!DOCTYPE ");
                    out.push_str(name);
                    out.push('>');
                }
                NodeKind::Comment(text) => {
                    out.push_str("<!--");
                    out.push_str(text);
                    out.push_str("-->");
                }
                NodeKind::Text(text) => {
                    let raw = self
                        .parent(id)
                        .and_then(|p| self.tag(p))
                        .is_some_and(|t| RAW_TEXT_ELEMENTS.contains(&t));
                    if raw {
                        out.push_str(text);
                    } else {
                        escape_text(text, out);
                    }
                }
                NodeKind::Element(el) => {
                    out.push('<');
                    out.push_str(&el.name);
                    for (name, value) in &el.attrs {
                        out.push(' ');
                        out.push_str(name);
                        out.push_str("=\"");
                        escape_attr(value, out);
                        out.push('"');
                    }
                    out.push('>');
                    if is_void_element(&el.name) {
                        continue;
                    }
                    stack.push(Step::Exit(id));
                    stack.extend(self.children(id).iter().rev().map(|&c| Step::Enter(c)));
                }
            }
        }
    }
}

/// Check if tag is a void element.
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

fn escape_text(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}
