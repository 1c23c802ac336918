// ABOUTME: Removal stages for scripts, comments, hidden elements and non-content tags.
// ABOUTME: Forms are unwrapped rather than removed so page-wide wrappers keep their content.

use crate::dom::tree::{Document, NodeKind};
use crate::dom::utils::{is_inline_hidden, unwrap};

const SCRIPT_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Tags removed with their content.
pub const BLACKLIST: &[&str] = &[
    "applet", "audio", "base", "basefont", "bgsound", "button", "command", "datalist", "dialog",
    "embed", "fieldset", "frame", "frameset", "head", "iframe", "input", "isindex", "keygen",
    "link", "math", "meta", "noembed", "object", "optgroup", "option", "output", "param",
    "progress", "select", "spacer", "textarea", "title", "track", "video", "xmp",
];

/// Remove script-like elements and comments anywhere in the document.
pub fn strip_scripts(doc: &mut Document) -> usize {
    let root = doc.root();
    doc.remove_where(root, |d, id| match d.kind(id) {
        NodeKind::Comment(_) => true,
        NodeKind::Element(el) => SCRIPT_TAGS.contains(&el.name.as_str()),
        _ => false,
    })
}

/// Remove elements hidden by attribute or inline style.
pub fn remove_hidden(doc: &mut Document, contrast_threshold: f64) -> usize {
    let root = doc.root();
    doc.remove_where(root, |d, id| is_inline_hidden(d, id, contrast_threshold))
}

/// Remove blacklisted tags and unwrap forms.
pub fn remove_blacklisted(doc: &mut Document) -> usize {
    let root = doc.root();
    let mut count = doc.remove_where(root, |d, id| {
        d.tag(id).is_some_and(|t| BLACKLIST.contains(&t))
    });
    for form in doc.select(root, &["form"]) {
        unwrap(doc, form);
        count += 1;
    }
    count
}
