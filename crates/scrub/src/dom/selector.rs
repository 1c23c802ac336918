// ABOUTME: CSS selector matching over the arena Document using scraper's selector grammar.
// ABOUTME: Implements selectors::Element for a borrowed node handle so any scraper selector applies.

use scraper::error::SelectorErrorKind;
use scraper::selector::{CssLocalName, CssString, NonTSPseudoClass, Parser, PseudoElement, Simple};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::bloom::BloomFilter;
use selectors::matching::{
    self, ElementSelectorFlags, MatchingContext, MatchingForInvalidation, MatchingMode,
    NeedsSelectorFlags, QuirksMode, SelectorCaches,
};
use selectors::parser::{ParseRelative, SelectorImpl, SelectorList};
use selectors::{Element, OpaqueElement};

use super::tree::{Document, NodeId};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A parsed selector group (`a, b > c`) that matches nodes of a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssSelector {
    list: SelectorList<Simple>,
}

impl CssSelector {
    pub fn parse(input: &str) -> Result<Self, SelectorErrorKind<'_>> {
        let mut parser_input = cssparser::ParserInput::new(input);
        let mut parser = cssparser::Parser::new(&mut parser_input);
        SelectorList::parse(&Parser, &mut parser, ParseRelative::No)
            .map(|list| Self { list })
            .map_err(SelectorErrorKind::from)
    }

    /// True when `id` is an element matched by any selector in the group.
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        if !doc.is_element(id) {
            return false;
        }
        let element = NodeHandle { doc, id };
        let mut caches = SelectorCaches::default();
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut caches,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            MatchingForInvalidation::No,
        );
        self.list
            .slice()
            .iter()
            .any(|s| matching::matches_selector(s, 0, None, &element, &mut context))
    }

    /// Matching elements under `scope`, in document order.
    pub fn select(&self, doc: &Document, scope: NodeId) -> Vec<NodeId> {
        doc.descendants(scope)
            .into_iter()
            .filter(|&id| self.matches(doc, id))
            .collect()
    }
}

/// An element of a borrowed document. Only ever built for element nodes.
#[derive(Clone, Copy)]
struct NodeHandle<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl std::fmt::Debug for NodeHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHandle")
            .field("id", &self.id)
            .field("tag", &self.doc.tag(self.id))
            .finish()
    }
}

impl<'a> NodeHandle<'a> {
    fn wrap(doc: &'a Document, id: NodeId) -> Option<Self> {
        doc.is_element(id).then_some(Self { doc, id })
    }

    fn name(&self) -> &str {
        self.doc.tag(self.id).unwrap_or("")
    }

    fn sibling_elements(&self) -> (Vec<NodeId>, usize) {
        let siblings: Vec<NodeId> = match self.doc.parent(self.id) {
            Some(parent) => self.doc.element_children(parent).collect(),
            None => vec![self.id],
        };
        let position = siblings.iter().position(|&s| s == self.id).unwrap_or(0);
        (siblings, position)
    }
}

impl Element for NodeHandle<'_> {
    type Impl = Simple;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self.doc.kind(self.id))
    }

    fn parent_element(&self) -> Option<Self> {
        self.doc
            .parent(self.id)
            .and_then(|p| NodeHandle::wrap(self.doc, p))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let (siblings, position) = self.sibling_elements();
        position
            .checked_sub(1)
            .and_then(|p| siblings.get(p))
            .map(|&id| Self { doc: self.doc, id })
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let (siblings, position) = self.sibling_elements();
        siblings
            .get(position + 1)
            .map(|&id| Self { doc: self.doc, id })
    }

    fn first_element_child(&self) -> Option<Self> {
        self.doc
            .element_children(self.id)
            .next()
            .map(|id| Self { doc: self.doc, id })
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, local_name: &<Simple as SelectorImpl>::BorrowedLocalName) -> bool {
        &*local_name.0 == self.name()
    }

    fn has_namespace(&self, ns: &<Simple as SelectorImpl>::BorrowedNamespaceUrl) -> bool {
        &**ns == HTML_NAMESPACE
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.name() == other.name()
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&<Simple as SelectorImpl>::NamespaceUrl>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        // Parsed attributes never carry a namespace.
        if let NamespaceConstraint::Specific(url) = ns {
            if !url.is_empty() {
                return false;
            }
        }
        self.doc.element(self.id).is_some_and(|el| {
            el.attrs
                .iter()
                .any(|(key, value)| key.as_str() == &*local_name.0 && operation.eval_str(value))
        })
    }

    fn match_non_ts_pseudo_class(
        &self,
        _pc: &NonTSPseudoClass,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        false
    }

    fn match_pseudo_element(
        &self,
        _pe: &PseudoElement,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        false
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        matches!(self.name(), "a" | "area" | "link") && self.doc.has_attr(self.id, "href")
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.doc
            .attr(self.id, "id")
            .is_some_and(|v| case_sensitivity.eq(id.0.as_bytes(), v.as_bytes()))
    }

    fn has_class(&self, name: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.doc.attr(self.id, "class").is_some_and(|classes| {
            classes
                .split_whitespace()
                .any(|c| case_sensitivity.eq(name.0.as_bytes(), c.as_bytes()))
        })
    }

    fn has_custom_state(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn imported_part(&self, _name: &CssLocalName) -> Option<CssLocalName> {
        None
    }

    fn is_part(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        !self
            .doc
            .children(self.id)
            .iter()
            .any(|&c| self.doc.is_element(c) || self.doc.text(c).is_some_and(|t| !t.is_empty()))
    }

    fn is_root(&self) -> bool {
        self.doc.parent(self.id) == Some(self.doc.root())
    }

    fn add_element_unique_hashes(&self, _filter: &mut BloomFilter) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(doc: &Document, ids: &[NodeId]) -> Vec<String> {
        ids.iter()
            .map(|&id| {
                let el = doc.element(id).unwrap();
                match el.attr("id") {
                    Some(v) => format!("{}#{}", el.name, v),
                    None => el.name.clone(),
                }
            })
            .collect()
    }

    #[test]
    fn compound_selectors_match() {
        let doc = Document::parse(concat!(
            r#"<div id="a" class="one two" data-kind="x"></div>"#,
            r#"<div id="b" class="one"></div>"#,
        ));
        let body = doc.body().unwrap();
        let sel = CssSelector::parse("div.one.two[data-kind=x]").unwrap();
        assert_eq!(tags(&doc, &sel.select(&doc, body)), vec!["div#a"]);
        let sel = CssSelector::parse("#b, .missing").unwrap();
        assert_eq!(tags(&doc, &sel.select(&doc, body)), vec!["div#b"]);
    }

    #[test]
    fn combinators_match() {
        let doc = Document::parse(concat!(
            r#"<article><p id="direct">x</p><div><p id="nested">y</p></div></article>"#,
            r#"<p id="outside">z</p><p id="after">w</p>"#,
        ));
        let body = doc.body().unwrap();
        let descendant = CssSelector::parse("article p").unwrap();
        assert_eq!(
            tags(&doc, &descendant.select(&doc, body)),
            vec!["p#direct", "p#nested"]
        );
        let child = CssSelector::parse("article > p").unwrap();
        assert_eq!(tags(&doc, &child.select(&doc, body)), vec!["p#direct"]);
        let adjacent = CssSelector::parse("p#outside + p").unwrap();
        assert_eq!(tags(&doc, &adjacent.select(&doc, body)), vec!["p#after"]);
    }

    #[test]
    fn structural_pseudo_classes_match() {
        let doc = Document::parse("<ul><li>a</li><li>b</li><li>c</li></ul><p></p>");
        let body = doc.body().unwrap();
        let last = CssSelector::parse("li:last-child").unwrap();
        let found = last.select(&doc, body);
        assert_eq!(found.len(), 1);
        assert_eq!(doc.text_content(found[0]), "c");
        let empty = CssSelector::parse("p:empty").unwrap();
        assert_eq!(empty.select(&doc, body).len(), 1);
    }

    #[test]
    fn text_nodes_never_match() {
        let doc = Document::parse("<p>text</p>");
        let p = doc.select(doc.root(), &["p"])[0];
        let text = doc.children(p)[0];
        let sel = CssSelector::parse("*").unwrap();
        assert!(sel.matches(&doc, p));
        assert!(!sel.matches(&doc, text));
    }

    #[test]
    fn invalid_selectors_are_rejected() {
        assert!(CssSelector::parse("div[x").is_err());
        assert!(CssSelector::parse("div.").is_err());
        assert!(CssSelector::parse("").is_err());
    }
}
