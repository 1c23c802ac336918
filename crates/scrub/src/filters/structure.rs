// ABOUTME: Structural normalization passes run after geometry resolution.
// ABOUTME: Anchors, formatting, emphasis, nesting repair, headings, containers, lists, tables, rules.

use crate::dom::tree::{Document, NodeId};
use crate::dom::utils::{coerce, condense_whitespace, is_blank_text, is_block, unwrap};

/// Presentational wrappers replaced by their content.
const FORMATTING_TAGS: &[&str] = &[
    "acronym", "basefont", "big", "blink", "center", "font", "ilayer", "label", "layer", "mark",
    "marquee", "nobr", "small", "span", "tt",
];

const EMPHASIS_TAGS: &[&str] = &["strong", "em", "u"];

const SEMANTIC_TAGS: &[&str] = &["article", "aside", "footer", "header", "hgroup", "main", "section"];

const TABLE_PARTS: &[&str] = &["caption", "col", "colgroup", "tbody", "td", "tfoot", "th", "thead", "tr"];

/// Limits used by the normalization passes.
#[derive(Debug, Clone, Copy)]
pub struct StructureLimits {
    pub emphasis_max_length: usize,
    pub table_scan_max_rows: usize,
}

fn unwrap_all(doc: &mut Document, scope: NodeId, tags: &[&str]) -> usize {
    let found = doc.select(scope, tags);
    let count = found.len();
    for id in found {
        unwrap(doc, id);
    }
    count
}

/// Unwrap `javascript:` anchors and anchors with neither `href` nor `name`.
fn repair_anchors(doc: &mut Document, scope: NodeId) -> usize {
    let mut count = 0;
    for a in doc.select(scope, &["a"]) {
        let href = doc.attr(a, "href").map(|h| h.trim().to_ascii_lowercase());
        let scripted = href.as_deref().is_some_and(|h| h.starts_with("javascript:"));
        let inert = href.is_none() && !doc.has_attr(a, "name");
        if scripted || inert {
            unwrap(doc, a);
            count += 1;
        }
    }
    count
}

/// `b`→`strong`, `i`→`em`; over-long emphasis loses its wrapper.
fn condense_emphasis(doc: &mut Document, scope: NodeId, max_len: usize) -> usize {
    let mut count = 0;
    for id in doc.select(scope, &["b", "i"]) {
        let target = if doc.is_tag(id, "b") { "strong" } else { "em" };
        coerce(doc, id, target);
        count += 1;
    }
    for id in doc.select(scope, EMPHASIS_TAGS) {
        let len = condense_whitespace(&doc.text_content(id)).trim().chars().count();
        if len > max_len {
            unwrap(doc, id);
            count += 1;
        }
    }
    count
}

/// Fix nesting the parser tolerates but readers render badly.
fn repair_nesting(doc: &mut Document, scope: NodeId) -> usize {
    let mut count = 0;
    for id in doc.descendants(scope) {
        let Some(tag) = doc.tag(id).map(str::to_string) else {
            continue;
        };
        let parent_tag = doc
            .parent(id)
            .and_then(|p| doc.tag(p))
            .unwrap_or("")
            .to_string();
        let parent_tag = parent_tag.as_str();
        match tag.as_str() {
            "a" if doc.has_ancestor(id, &["a"]) => {
                unwrap(doc, id);
                count += 1;
            }
            "hr" if matches!(parent_tag, "ul" | "ol") => {
                doc.detach(id);
                count += 1;
            }
            "li" if !matches!(parent_tag, "ul" | "ol" | "menu") => {
                coerce(doc, id, "div");
                count += 1;
            }
            "figcaption" if parent_tag != "figure" => {
                coerce(doc, id, "div");
                count += 1;
            }
            "source" if !matches!(parent_tag, "picture" | "video" | "audio") => {
                doc.detach(id);
                count += 1;
            }
            _ => {}
        }
    }
    count
}

/// Three or more `h1`s means they are section titles, not the page title.
fn normalize_headings(doc: &mut Document, scope: NodeId) -> usize {
    let h1s = doc.select(scope, &["h1"]);
    if h1s.len() < 3 {
        return 0;
    }
    for &h in &h1s {
        coerce(doc, h, "h2");
    }
    h1s.len()
}

/// A figure holding one element and no caption is just that element.
fn condense_figures(doc: &mut Document, scope: NodeId) -> usize {
    let mut count = 0;
    for figure in doc.select(scope, &["figure"]).into_iter().rev() {
        let elements: Vec<NodeId> = doc.element_children(figure).collect();
        let has_caption = elements.iter().any(|&e| doc.is_tag(e, "figcaption"));
        if elements.len() == 1 && !has_caption {
            unwrap(doc, figure);
            count += 1;
        }
    }
    count
}

/// Innermost first: a div without block children becomes a paragraph, any other
/// div is replaced by its children.
fn unwrap_containers(doc: &mut Document, scope: NodeId) -> usize {
    let divs = doc.select(scope, &["div"]);
    let count = divs.len();
    for div in divs.into_iter().rev() {
        let has_block = doc
            .element_children(div)
            .any(|c| doc.tag(c).is_some_and(is_block));
        if has_block {
            unwrap(doc, div);
        } else {
            coerce(doc, div, "p");
        }
    }
    count
}

/// Drop lists with no content at all; replace a list whose only non-blank child
/// is a single item by that item's content.
fn condense_lists(doc: &mut Document, scope: NodeId) -> usize {
    let mut count = 0;
    for list in doc.select(scope, &["ul", "ol"]).into_iter().rev() {
        let content: Vec<NodeId> = doc
            .children(list)
            .iter()
            .copied()
            .filter(|&c| doc.is_element(c) || (doc.is_text(c) && !is_blank_text(doc, c)))
            .collect();
        match content.as_slice() {
            [] => {
                doc.detach(list);
                count += 1;
            }
            [only] if doc.is_tag(*only, "li") => {
                let kids = doc.children(*only).to_vec();
                for kid in kids {
                    doc.insert_before(list, kid);
                }
                doc.detach(list);
                count += 1;
            }
            _ => {}
        }
    }
    count
}

fn rows_of(doc: &Document, table: NodeId) -> Vec<NodeId> {
    doc.select(table, &["tr"])
        .into_iter()
        .filter(|&tr| doc.closest(tr, &["table"]) == Some(table))
        .collect()
}

/// Unwrap tables whose scanned rows never hold more than one cell.
fn unwrap_layout_tables(doc: &mut Document, scope: NodeId, max_rows: usize) -> usize {
    let mut count = 0;
    for table in doc.select(scope, &["table"]).into_iter().rev() {
        let single_column = rows_of(doc, table).into_iter().take(max_rows).all(|tr| {
            doc.element_children(tr)
                .filter(|&c| matches!(doc.tag(c), Some("td" | "th")))
                .count()
                <= 1
        });
        if !single_column {
            continue;
        }

        let parts: Vec<NodeId> = doc
            .select(table, TABLE_PARTS)
            .into_iter()
            .filter(|&p| doc.closest(p, &["table"]) == Some(table))
            .collect();
        for part in parts.into_iter().rev() {
            if matches!(doc.tag(part), Some("col" | "colgroup")) {
                doc.detach(part);
            } else {
                unwrap(doc, part);
            }
        }
        unwrap(doc, table);
        count += 1;
    }
    count
}

/// Keep the first of each run of `tag` siblings separated only by whitespace.
fn collapse_runs(doc: &mut Document, scope: NodeId, tag: &str) -> usize {
    let mut removed = 0;
    for id in doc.select(scope, &[tag]) {
        if doc.parent(id).is_none() {
            continue;
        }
        let mut cursor = doc.next_sibling(id);
        while let Some(next) = cursor {
            cursor = doc.next_sibling(next);
            if is_blank_text(doc, next) {
                continue;
            }
            if doc.is_tag(next, tag) {
                doc.detach(next);
                removed += 1;
                continue;
            }
            break;
        }
    }
    removed
}

/// Run every normalization pass over `scope`, outermost concerns first.
pub fn normalize_structure(doc: &mut Document, scope: NodeId, limits: StructureLimits) -> usize {
    let passes = [
        repair_anchors(doc, scope),
        unwrap_all(doc, scope, FORMATTING_TAGS),
        condense_emphasis(doc, scope, limits.emphasis_max_length),
        repair_nesting(doc, scope),
        normalize_headings(doc, scope),
        unwrap_all(doc, scope, SEMANTIC_TAGS),
        condense_figures(doc, scope),
        unwrap_containers(doc, scope),
        condense_lists(doc, scope),
        unwrap_layout_tables(doc, scope, limits.table_scan_max_rows),
        collapse_runs(doc, scope, "br"),
        collapse_runs(doc, scope, "hr"),
    ];
    let total = passes.iter().sum();
    tracing::trace!(?passes, total, "structure passes");
    total
}
