// ABOUTME: Canonicalizes URL-bearing attributes against the document's effective base URL.
// ABOUTME: Honours <base href>, rewrites srcset candidates, and leaves absolute URLs untouched.

use url::Url;

use crate::dom::tree::{Document, NodeId};

/// (tag, attribute) pairs holding a single URL.
const URL_ATTRIBUTES: &[(&str, &str)] = &[
    ("a", "href"),
    ("area", "href"),
    ("link", "href"),
    ("img", "src"),
    ("audio", "src"),
    ("video", "src"),
    ("video", "poster"),
    ("source", "src"),
    ("track", "src"),
    ("embed", "src"),
    ("iframe", "src"),
    ("script", "src"),
    ("blockquote", "cite"),
    ("q", "cite"),
    ("del", "cite"),
    ("ins", "cite"),
    ("object", "data"),
    ("form", "action"),
];

const SRCSET_TAGS: &[&str] = &["img", "source"];

/// The document URL joined with the first `<base href>`, if any.
pub fn effective_base(doc: &Document, document_url: &Url) -> Url {
    doc.select(doc.root(), &["base"])
        .into_iter()
        .filter_map(|b| doc.attr(b, "href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
        .and_then(|href| document_url.join(href).ok())
        .unwrap_or_else(|| document_url.clone())
}

fn is_opaque(value: &str) -> bool {
    let lower = value.trim_start().to_ascii_lowercase();
    lower.starts_with("data:") || lower.starts_with("javascript:")
}

/// Resolve one attribute value. Absolute URLs come back unchanged.
pub fn canonical_url(base: &Url, value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || is_opaque(trimmed) {
        return None;
    }
    if Url::parse(trimmed).is_ok() {
        return Some(trimmed.to_string());
    }
    base.join(trimmed).ok().map(String::from)
}

/// Split a srcset into `(url, descriptor)` candidates.
pub fn parse_srcset(value: &str) -> Vec<(String, Option<String>)> {
    value
        .split(',')
        .filter_map(|candidate| {
            let mut parts = candidate.split_whitespace();
            let url = parts.next()?.to_string();
            let descriptor = parts.collect::<Vec<_>>().join(" ");
            Some((url, (!descriptor.is_empty()).then_some(descriptor)))
        })
        .collect()
}

fn canonical_srcset(base: &Url, value: &str) -> Option<String> {
    if value.to_ascii_lowercase().contains("data:") {
        return None;
    }
    let candidates: Vec<String> = parse_srcset(value)
        .into_iter()
        .map(|(url, descriptor)| {
            let url = canonical_url(base, &url).unwrap_or(url);
            match descriptor {
                Some(d) => format!("{} {}", url, d),
                None => url,
            }
        })
        .collect();
    (!candidates.is_empty()).then(|| candidates.join(", "))
}

fn rewrite(doc: &mut Document, id: NodeId, attr: &str, value: Option<String>) -> bool {
    match value {
        Some(v) if doc.attr(id, attr) != Some(v.as_str()) => {
            doc.set_attr(id, attr, v);
            true
        }
        _ => false,
    }
}

/// Rewrite every URL-bearing attribute under the root. Returns the number changed.
pub fn canonicalize_urls(doc: &mut Document, base: &Url) -> usize {
    let mut changed = 0;
    for id in doc.descendants(doc.root()) {
        let Some(tag) = doc.tag(id).map(str::to_string) else {
            continue;
        };

        for &(_, attr) in URL_ATTRIBUTES.iter().filter(|(t, _)| *t == tag) {
            let value = doc.attr(id, attr).and_then(|v| canonical_url(base, v));
            if rewrite(doc, id, attr, value) {
                changed += 1;
            }
        }

        if SRCSET_TAGS.contains(&tag.as_str()) {
            let value = doc.attr(id, "srcset").and_then(|v| canonical_srcset(base, v));
            if rewrite(doc, id, "srcset", value) {
                changed += 1;
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base() -> Url {
        Url::parse("https://example.com/news/story.html").unwrap()
    }

    #[test]
    fn absolute_urls_are_identity() {
        for value in [
            "https://cdn.example.net/a%20b.png?x=1#f",
            "HTTP://Example.COM/Path",
            "mailto:someone@example.com",
        ] {
            assert_eq!(canonical_url(&base(), value).as_deref(), Some(value));
        }
    }

    #[test]
    fn relative_urls_resolve() {
        assert_eq!(
            canonical_url(&base(), "../img/a.png").as_deref(),
            Some("https://example.com/img/a.png")
        );
        assert_eq!(
            canonical_url(&base(), "#top").as_deref(),
            Some("https://example.com/news/story.html#top")
        );
        assert_eq!(canonical_url(&base(), "javascript:void(0)"), None);
        assert_eq!(canonical_url(&base(), "data:image/png;base64,AAAA"), None);
    }

    #[test]
    fn base_href_is_honoured() {
        let doc = Document::parse(r#"<head><base href="/static/"></head><body></body>"#);
        assert_eq!(
            effective_base(&doc, &base()).as_str(),
            "https://example.com/static/"
        );
        let doc = Document::parse("<p>no base</p>");
        assert_eq!(effective_base(&doc, &base()), base());
    }

    #[test]
    fn rewrites_attributes_and_srcset() {
        let mut doc = Document::parse(concat!(
            r#"<a href="/a">x</a><img src="i.png" srcset="i.png 1x, /big.png 2x">"#,
            r#"<blockquote cite="q.html">q</blockquote>"#,
        ));
        let changed = canonicalize_urls(&mut doc, &base());
        assert_eq!(changed, 4);
        assert_eq!(
            doc.inner_html(doc.body().unwrap()),
            concat!(
                r#"<a href="https://example.com/a">x</a>"#,
                r#"<img src="https://example.com/news/i.png" "#,
                r#"srcset="https://example.com/news/i.png 1x, https://example.com/big.png 2x">"#,
                r#"<blockquote cite="https://example.com/news/q.html">q</blockquote>"#,
            )
        );
        assert_eq!(canonicalize_urls(&mut doc, &base()), 0);
    }
}
