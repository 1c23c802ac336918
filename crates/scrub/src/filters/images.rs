// ABOUTME: Image source resolution and image removal stages.
// ABOUTME: Promotes lazy-load attributes into src, drops sourceless and undersized images.

use url::Url;

use super::urls::{canonical_url, parse_srcset};
use crate::dom::tree::{Document, NodeId};
use crate::dom::utils::parse_px;

/// Attributes lazy loaders use to hold the real `src`, most specific first.
const LAZY_SRC_ATTRS: &[&str] = &[
    "data-src",
    "data-original",
    "data-lazy-src",
    "data-lazy",
    "data-original-src",
    "data-actualsrc",
    "data-hi-res-src",
    "data-url",
    "lazy-src",
    "data-echo",
];

const LAZY_SRCSET_ATTRS: &[&str] = &["data-srcset", "data-lazy-srcset"];

fn attr_value(doc: &Document, id: NodeId, attr: &str) -> Option<String> {
    doc.attr(id, attr)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn first_srcset_url(value: &str) -> Option<String> {
    parse_srcset(value).into_iter().next().map(|(url, _)| url)
}

fn resolve(base: &Url, value: &str) -> String {
    canonical_url(base, value).unwrap_or_else(|| value.to_string())
}

/// Resolve lazy-load indirection into `src`/`srcset`.
///
/// Fallback order for a missing `src`: lazy attributes, the first `srcset`
/// candidate, then the first candidate of a sibling `<source>` in a `<picture>`.
/// Returns the number of images whose `src` changed.
pub fn resolve_lazy_sources(doc: &mut Document, base: &Url) -> usize {
    let mut changed = 0;
    for img in doc.select(doc.root(), &["img"]) {
        if let Some(srcset) = LAZY_SRCSET_ATTRS
            .iter()
            .find_map(|a| attr_value(doc, img, a))
        {
            let resolved = parse_srcset(&srcset)
                .into_iter()
                .map(|(url, d)| match d {
                    Some(d) => format!("{} {}", resolve(base, &url), d),
                    None => resolve(base, &url),
                })
                .collect::<Vec<_>>()
                .join(", ");
            doc.set_attr(img, "srcset", resolved);
        }

        let lazy = LAZY_SRC_ATTRS.iter().find_map(|a| attr_value(doc, img, a));
        let candidate = lazy.or_else(|| {
            if attr_value(doc, img, "src").is_some() {
                return None;
            }
            attr_value(doc, img, "srcset")
                .and_then(|s| first_srcset_url(&s))
                .or_else(|| picture_source(doc, img))
        });

        if let Some(src) = candidate {
            let src = resolve(base, &src);
            if doc.attr(img, "src") != Some(src.as_str()) {
                doc.set_attr(img, "src", src);
                changed += 1;
            }
        }

        for attr in LAZY_SRC_ATTRS.iter().chain(LAZY_SRCSET_ATTRS) {
            doc.remove_attr(img, attr);
        }
    }
    changed
}

fn picture_source(doc: &Document, img: NodeId) -> Option<String> {
    let picture = doc.parent(img).filter(|&p| doc.is_tag(p, "picture"))?;
    doc.element_children(picture)
        .filter(|&c| doc.is_tag(c, "source"))
        .find_map(|s| attr_value(doc, s, "srcset").and_then(|v| first_srcset_url(&v)))
}

/// Remove images whose `src` is missing or cannot be parsed as a URL.
pub fn remove_sourceless(doc: &mut Document) -> usize {
    let root = doc.root();
    doc.remove_where(root, |d, id| {
        d.is_tag(id, "img")
            && !d
                .attr(id, "src")
                .map(str::trim)
                .is_some_and(|src| !src.is_empty() && Url::parse(src).is_ok())
    })
}

/// Remove images whose known area is under `min_area` pixels.
///
/// Images missing either dimension are kept.
pub fn remove_small(doc: &mut Document, min_area: u64) -> usize {
    let root = doc.root();
    doc.remove_where(root, |d, id| {
        if !d.is_tag(id, "img") {
            return false;
        }
        let dim = |attr: &str| d.attr(id, attr).and_then(parse_px).filter(|v| *v >= 0.0);
        match (dim("width"), dim("height")) {
            (Some(w), Some(h)) => ((w * h) as u64) < min_area,
            _ => false,
        }
    })
}
