// ABOUTME: Replaces frameset documents with a body and removes inline frames.
// ABOUTME: Guarantees a body element exists before the later stages run.

use crate::dom::tree::{Document, NodeId};

const FRAMED_FALLBACK: &str = "Unable to display framed document.";

/// Swap any `<frameset>` for a `<body>` built from the `<noframes>` fallback,
/// drop every `frame`/`iframe`/`noframes`, and make sure a body exists.
///
/// Returns the body.
pub fn replace_frames(doc: &mut Document) -> NodeId {
    let framesets = doc.select(doc.root(), &["frameset"]);
    let noframes = doc.select(doc.root(), &["noframes"]);

    if let Some(&first) = framesets.first() {
        let fallback: String = noframes
            .iter()
            .map(|&n| doc.text_content(n))
            .collect::<Vec<_>>()
            .join("\n");

        let body = doc.create_element("body");
        if fallback.trim().is_empty() {
            let p = doc.create_element("p");
            let text = doc.create_text(FRAMED_FALLBACK);
            doc.append_child(p, text);
            doc.append_child(body, p);
        } else {
            let parsed = Document::parse(&fallback);
            if let Some(source_body) = parsed.body() {
                for &child in parsed.children(source_body) {
                    let copy = doc.import(&parsed, child);
                    doc.append_child(body, copy);
                }
            }
        }

        if doc.parent(first).is_some() {
            doc.insert_before(first, body);
        }
        for frameset in framesets {
            doc.detach(frameset);
        }
        tracing::debug!(fallback = !fallback.trim().is_empty(), "replaced frameset");
    }

    let root = doc.root();
    let removed = doc.remove_where(root, |d, id| {
        matches!(d.tag(id), Some("frame" | "iframe" | "noframes"))
    });
    if removed > 0 {
        tracing::trace!(removed, "removed frames");
    }

    ensure_body(doc)
}

fn ensure_body(doc: &mut Document) -> NodeId {
    if let Some(body) = doc.body() {
        return body;
    }
    let html = match doc.document_element() {
        Some(html) => html,
        None => {
            let html = doc.create_element("html");
            let root = doc.root();
            doc.append_child(root, html);
            html
        }
    };
    let body = doc.create_element("body");
    doc.append_child(html, body);
    body
}
