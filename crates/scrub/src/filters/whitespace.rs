// ABOUTME: Whitespace condensation, leaf pruning and body trimming stages.
// ABOUTME: Preformatted content is left alone; pruning runs bottom-up so emptied parents go too.

use crate::dom::tree::{Document, NodeId};
use crate::dom::utils::{condense_whitespace, is_blank_text, is_noop_leaf};

const PREFORMATTED_TAGS: &[&str] = &["pre", "code", "textarea", "xmp"];

/// Merge adjacent text nodes and collapse ASCII whitespace runs outside
/// preformatted elements. Returns the number of text nodes changed.
pub fn condense_text(doc: &mut Document, scope: NodeId) -> usize {
    doc.merge_adjacent_text(scope);

    let mut changed = 0;
    for id in doc.descendants(scope) {
        let Some(text) = doc.text(id) else {
            continue;
        };
        if doc.has_ancestor(id, PREFORMATTED_TAGS) {
            continue;
        }
        let condensed = condense_whitespace(text);
        if condensed != text {
            if let Some(t) = doc.text_mut(id) {
                *t = condensed;
            }
            changed += 1;
        }
    }
    changed
}

/// Remove empty elements, children before parents, then re-condense the text
/// that removal brought together.
pub fn prune_leaves(doc: &mut Document, scope: NodeId) -> usize {
    let mut removed = 0;
    for id in doc.descendants(scope).into_iter().rev() {
        if is_noop_leaf(doc, id) {
            doc.detach(id);
            removed += 1;
        }
    }
    if removed > 0 {
        condense_text(doc, scope);
    }
    removed
}

fn is_trimmable(doc: &Document, id: NodeId) -> bool {
    is_blank_text(doc, id) || doc.is_tag(id, "br") || doc.is_tag(id, "hr")
}

/// Drop blank text, `<br>` and `<hr>` from both ends of the body.
pub fn trim_body(doc: &mut Document, body: NodeId) -> usize {
    let mut removed = 0;
    while let Some(&first) = doc.children(body).first() {
        if !is_trimmable(doc, first) {
            break;
        }
        doc.detach(first);
        removed += 1;
    }
    while let Some(&last) = doc.children(body).last() {
        if !is_trimmable(doc, last) {
            break;
        }
        doc.detach(last);
        removed += 1;
    }
    removed
}
