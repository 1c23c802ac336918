// ABOUTME: Structural helpers shared by the filter stages and the scorer.
// ABOUTME: Unwrap, coerce, leaf classification, inline-style parsing and hidden detection.

use once_cell::sync::Lazy;
use regex::Regex;

use super::tree::{Document, NodeId};

static ASCII_WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\n\r\x0C]+").unwrap());

/// Block-level tags; unwrapping one next to text pads a space so words don't fuse.
pub const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "center", "dd", "details", "dialog", "dir", "div",
    "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5",
    "h6", "header", "hgroup", "hr", "li", "listing", "main", "menu", "nav", "ol", "p", "pre",
    "section", "summary", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

/// Elements kept even when they have no content.
const LEAF_EXCEPTIONS: &[&str] = &[
    "area", "audio", "br", "canvas", "col", "embed", "hr", "iframe", "img", "object", "picture",
    "source", "svg", "td", "th", "video",
];

/// Tags never removed as hidden.
const ALWAYS_VISIBLE: &[&str] = &["html", "body"];

/// Off-screen offset at or below which a positioned element counts as hidden.
const OFFSCREEN_OFFSET_PX: f64 = -999.0;

pub fn is_block(tag: &str) -> bool {
    BLOCK_TAGS.contains(&tag)
}

/// Collapse ASCII whitespace runs to one space.
pub fn condense_whitespace(text: &str) -> String {
    ASCII_WS_RE.replace_all(text, " ").into_owned()
}

/// True for text nodes that are empty or all ASCII whitespace.
pub fn is_blank_text(doc: &Document, id: NodeId) -> bool {
    doc.text(id)
        .is_some_and(|t| t.chars().all(|c| c.is_ascii_whitespace()))
}

/// Replace `id` with its children in place.
pub fn unwrap(doc: &mut Document, id: NodeId) {
    let Some(parent) = doc.parent(id) else {
        return;
    };

    if doc.tag(id).is_some_and(is_block) {
        let needs_lead = doc
            .prev_sibling(id)
            .and_then(|p| doc.text(p))
            .is_some_and(|t| !t.is_empty() && !t.ends_with(|c: char| c.is_ascii_whitespace()));
        let needs_tail = doc
            .next_sibling(id)
            .and_then(|n| doc.text(n))
            .is_some_and(|t| !t.is_empty() && !t.starts_with(|c: char| c.is_ascii_whitespace()));

        if needs_lead {
            let pad = doc.create_text(" ");
            doc.insert_before(id, pad);
        }
        if needs_tail {
            let pad = doc.create_text(" ");
            doc.append_child(id, pad);
        }
    }

    let children = doc.children(id).to_vec();
    for child in children {
        doc.insert_before(id, child);
    }
    doc.detach(id);
    tracing::trace!(parent = parent.index(), "unwrapped node");
}

/// Rename an element in place, keeping its attributes, children and id.
pub fn coerce(doc: &mut Document, id: NodeId, tag: &str) {
    if let Some(el) = doc.element_mut(id) {
        el.name = tag.to_ascii_lowercase();
    }
}

/// An element with nothing but blank text inside, and no reason to exist empty.
pub fn is_noop_leaf(doc: &Document, id: NodeId) -> bool {
    let Some(tag) = doc.tag(id) else {
        return false;
    };
    if LEAF_EXCEPTIONS.contains(&tag) {
        return false;
    }
    doc.children(id).iter().all(|&c| is_blank_text(doc, c))
}

/// Parse a `style` attribute into lowercase `(property, value)` pairs.
pub fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            let value = value
                .trim()
                .trim_end_matches("!important")
                .trim()
                .to_ascii_lowercase();
            if prop.is_empty() {
                None
            } else {
                Some((prop, value))
            }
        })
        .collect()
}

/// Last declared value for `prop` in an inline style.
pub fn style_value(style: &str, prop: &str) -> Option<String> {
    parse_style(style)
        .into_iter()
        .rev()
        .find(|(p, _)| p == prop)
        .map(|(_, v)| v)
}

/// Parse a CSS length as a number, accepting an optional `px` suffix.
pub fn parse_px(value: &str) -> Option<f64> {
    let value = value.trim();
    let number = value.strip_suffix("px").unwrap_or(value).trim();
    number.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// True if the element hides itself through attributes or its inline style.
pub fn is_inline_hidden(doc: &Document, id: NodeId, contrast_threshold: f64) -> bool {
    let Some(el) = doc.element(id) else {
        return false;
    };
    if ALWAYS_VISIBLE.contains(&el.name.as_str()) {
        return false;
    }
    if el.has_attr("hidden") {
        return true;
    }
    let Some(style) = el.attr("style") else {
        return false;
    };

    let decls = parse_style(style);
    let get = |prop: &str| {
        decls
            .iter()
            .rev()
            .find(|(p, _)| p == prop)
            .map(|(_, v)| v.as_str())
    };

    if get("display") == Some("none") {
        return true;
    }
    if matches!(get("visibility"), Some("hidden") | Some("collapse")) {
        return true;
    }
    if let Some(opacity) = get("opacity").and_then(|v| v.parse::<f64>().ok()) {
        if opacity < contrast_threshold {
            return true;
        }
    }
    if matches!(get("position"), Some("absolute") | Some("fixed")) {
        let offscreen = |prop: &str| {
            get(prop)
                .and_then(parse_px)
                .is_some_and(|v| v <= OFFSCREEN_OFFSET_PX)
        };
        if offscreen("left") || offscreen("top") {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(doc: &Document, tag: &str) -> NodeId {
        doc.select(doc.root(), &[tag])[0]
    }

    #[test]
    fn unwrap_keeps_children_in_place() {
        let mut doc = Document::parse("<p>a<span>b<i>c</i></span>d</p>");
        let span = first(&doc, "span");
        unwrap(&mut doc, span);
        let p = first(&doc, "p");
        assert_eq!(doc.inner_html(p), "ab<i>c</i>d");
    }

    #[test]
    fn unwrap_pads_block_next_to_text() {
        let mut doc = Document::parse("<section>one<div>two</div>three</section>");
        let div = first(&doc, "div");
        unwrap(&mut doc, div);
        let section = first(&doc, "section");
        assert_eq!(doc.text_content(section), "one two three");
    }

    #[test]
    fn coerce_keeps_attributes_and_children() {
        let mut doc = Document::parse(r#"<b class="x">bold <i>it</i></b>"#);
        let b = first(&doc, "b");
        coerce(&mut doc, b, "strong");
        assert_eq!(doc.outer_html(b), r#"<strong class="x">bold <i>it</i></strong>"#);
    }

    #[test]
    fn noop_leaf_classification() {
        let doc = Document::parse("<p> </p><p>x</p><td></td><div><img src=a></div>");
        let ps = doc.select(doc.root(), &["p"]);
        assert!(is_noop_leaf(&doc, ps[0]));
        assert!(!is_noop_leaf(&doc, ps[1]));
        assert!(!is_noop_leaf(&doc, first(&doc, "img")));
        assert!(!is_noop_leaf(&doc, first(&doc, "div")));
    }

    #[test]
    fn hidden_detection() {
        let doc = Document::parse(concat!(
            r#"<p id="a" style="display: none">x</p>"#,
            r#"<p id="b" style="visibility:hidden !important">x</p>"#,
            r#"<p id="c" style="opacity: 0.1">x</p>"#,
            r#"<p id="d" style="opacity: 0.9">x</p>"#,
            r#"<p id="e" style="position:absolute; left:-9999px">x</p>"#,
            r#"<p id="f" style="position:relative; left:-9999px">x</p>"#,
            r#"<p id="g" hidden>x</p>"#,
            r#"<p id="h">x</p>"#,
        ));
        let hidden: Vec<&str> = doc
            .select(doc.root(), &["p"])
            .into_iter()
            .filter(|&p| is_inline_hidden(&doc, p, 0.3))
            .filter_map(|p| doc.attr(p, "id"))
            .collect();
        assert_eq!(hidden, vec!["a", "b", "c", "e", "g"]);
    }

    #[test]
    fn body_is_never_hidden() {
        let doc = Document::parse(r#"<body style="display:none"><p>x</p></body>"#);
        assert!(!is_inline_hidden(&doc, doc.body().unwrap(), 0.3));
    }

    #[test]
    fn style_helpers() {
        assert_eq!(style_value("width: 10px; WIDTH: 20px", "width").as_deref(), Some("20px"));
        assert_eq!(parse_px("300px"), Some(300.0));
        assert_eq!(parse_px(" 42 "), Some(42.0));
        assert_eq!(parse_px("auto"), None);
        assert_eq!(condense_whitespace("a \n\t b"), "a b");
    }
}
