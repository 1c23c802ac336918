// ABOUTME: Final attribute allow-list applied to every element.
// ABOUTME: Each tag keeps a small fixed set; scorer annotations survive when annotating.

use crate::dom::tree::Document;

const ALLOWED: &[(&str, &[&str])] = &[
    ("a", &["href", "name", "title", "rel"]),
    ("img", &["src", "srcset", "sizes", "alt", "width", "height", "title"]),
    ("source", &["src", "srcset", "sizes", "type", "media"]),
    ("td", &["colspan", "rowspan"]),
    ("th", &["colspan", "rowspan"]),
    ("ol", &["start", "reversed"]),
    ("blockquote", &["cite"]),
    ("q", &["cite"]),
    ("abbr", &["title"]),
    ("time", &["datetime"]),
];

const ANNOTATIONS: &[&str] = &["data-score", "data-best"];

fn allowed_for(tag: &str) -> &'static [&'static str] {
    ALLOWED
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, attrs)| *attrs)
        .unwrap_or(&[])
}

/// Strip every attribute not on the tag's allow-list. Returns how many were removed.
pub fn allow_list_attributes(doc: &mut Document, keep_annotations: bool) -> usize {
    let mut removed = 0;
    for id in doc.descendants(doc.root()) {
        let Some(el) = doc.element_mut(id) else {
            continue;
        };
        let allowed = allowed_for(&el.name);
        let before = el.attrs.len();
        el.attrs.retain(|(name, _)| {
            allowed.contains(&name.as_str())
                || (keep_annotations && ANNOTATIONS.contains(&name.as_str()))
        });
        removed += before - el.attrs.len();
    }
    removed
}
