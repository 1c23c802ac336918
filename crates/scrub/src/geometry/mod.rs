// ABOUTME: Infers missing image width/height from attributes, inline style, URL hints or probes.
// ABOUTME: Probes run concurrently under per-probe timeouts and never borrow the document.

//! Image geometry resolution.
//!
//! Resolution happens in three phases so the document is never touched while a
//! probe is in flight:
//!
//! 1. inspect every image statically and collect the URLs that need probing;
//! 2. probe each distinct URL concurrently, each under its own timeout;
//! 3. write the settled dimensions back to images that are still attached.

pub mod fetcher;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use url::Url;

use crate::dom::tree::{Document, NodeId};
use crate::dom::utils::{parse_px, style_value};
use crate::error::ScrubError;

pub use fetcher::{Dimensions, HttpImageFetcher, ImageFetcher};

/// How an image's dimensions were (or were not) determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometrySource {
    HasAttributes,
    InlineStyle,
    UrlSniff,
    Fetch,
    FetchError,
    MissingSource,
    InvalidSource,
    /// Probing was needed but disabled.
    NotProbed,
}

/// Per-image result of [`GeometryResolver::resolve_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryOutcome {
    pub node: NodeId,
    pub source: GeometrySource,
    pub dimensions: Option<Dimensions>,
}

impl GeometryOutcome {
    fn new(node: NodeId, source: GeometrySource, dimensions: Option<Dimensions>) -> Self {
        Self {
            node,
            source,
            dimensions,
        }
    }
}

fn positive_int(value: &str) -> Option<u32> {
    parse_px(value)
        .filter(|v| *v > 0.0 && v.fract() == 0.0 && *v <= f64::from(u32::MAX))
        .map(|v| v as u32)
}

fn from_attributes(doc: &Document, img: NodeId) -> Option<Dimensions> {
    let width = doc.attr(img, "width").and_then(positive_int)?;
    let height = doc.attr(img, "height").and_then(positive_int)?;
    Some(Dimensions::new(width, height))
}

fn from_inline_style(doc: &Document, img: NodeId) -> Option<Dimensions> {
    let style = doc.attr(img, "style")?;
    let width = style_value(style, "width").as_deref().and_then(positive_int)?;
    let height = style_value(style, "height").as_deref().and_then(positive_int)?;
    Some(Dimensions::new(width, height))
}

/// Read `w`/`h` or `width`/`height` query pairs.
pub fn sniff_url(url: &Url) -> Option<Dimensions> {
    if url.scheme() == "data" {
        return None;
    }
    let pairs: HashMap<String, String> = url
        .query_pairs()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.into_owned()))
        .collect();
    let pick = |w: &str, h: &str| {
        let width = pairs.get(w).and_then(|v| positive_int(v))?;
        let height = pairs.get(h).and_then(|v| positive_int(v))?;
        Some(Dimensions::new(width, height))
    };
    pick("width", "height").or_else(|| pick("w", "h"))
}

fn write_dimensions(doc: &mut Document, img: NodeId, dims: Dimensions) {
    doc.set_attr(img, "width", dims.width.to_string());
    doc.set_attr(img, "height", dims.height.to_string());
}

enum Inspection {
    Settled(GeometryOutcome),
    NeedsProbe(Url),
}

fn inspect(doc: &mut Document, img: NodeId, base: &Url) -> Inspection {
    use GeometrySource::*;

    if let Some(dims) = from_attributes(doc, img) {
        return Inspection::Settled(GeometryOutcome::new(img, HasAttributes, Some(dims)));
    }
    if let Some(dims) = from_inline_style(doc, img) {
        write_dimensions(doc, img, dims);
        return Inspection::Settled(GeometryOutcome::new(img, InlineStyle, Some(dims)));
    }

    let Some(src) = doc
        .attr(img, "src")
        .map(str::trim)
        .filter(|s| !s.is_empty())
    else {
        return Inspection::Settled(GeometryOutcome::new(img, MissingSource, None));
    };
    let Ok(url) = base.join(src) else {
        return Inspection::Settled(GeometryOutcome::new(img, InvalidSource, None));
    };

    if let Some(dims) = sniff_url(&url) {
        write_dimensions(doc, img, dims);
        return Inspection::Settled(GeometryOutcome::new(img, UrlSniff, Some(dims)));
    }
    Inspection::NeedsProbe(url)
}

/// Resolves image dimensions for a batch of images.
#[derive(Debug, Clone)]
pub struct GeometryResolver {
    fetcher: Option<Arc<dyn ImageFetcher>>,
    timeout: Duration,
}

impl GeometryResolver {
    /// `fetcher: None` disables network probing.
    pub fn new(fetcher: Option<Arc<dyn ImageFetcher>>, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    async fn probe(&self, fetcher: Arc<dyn ImageFetcher>, url: Url) -> Result<Dimensions, ScrubError> {
        match tokio::time::timeout(self.timeout, fetcher.fetch_dimensions(&url)).await {
            Ok(result) => result,
            Err(_) => Err(ScrubError::timeout(
                url.as_str(),
                "Probe",
                Some(anyhow::anyhow!("no response within {:?}", self.timeout)),
            )),
        }
    }

    /// Determine width/height for every image in `images`, writing what was found
    /// back as attributes. Probe failures and timeouts leave the image unchanged.
    pub async fn resolve_all(
        &self,
        doc: &mut Document,
        images: &[NodeId],
        base: &Url,
    ) -> Vec<GeometryOutcome> {
        let mut outcomes: Vec<Option<GeometryOutcome>> = Vec::with_capacity(images.len());
        let mut pending: Vec<(Url, Vec<usize>)> = Vec::new();

        for (slot, &img) in images.iter().enumerate() {
            match inspect(doc, img, base) {
                Inspection::Settled(outcome) => outcomes.push(Some(outcome)),
                Inspection::NeedsProbe(url) => {
                    outcomes.push(None);
                    match pending.iter_mut().find(|(u, _)| *u == url) {
                        Some((_, slots)) => slots.push(slot),
                        None => pending.push((url, vec![slot])),
                    }
                }
            }
        }

        let results = match &self.fetcher {
            Some(fetcher) if !pending.is_empty() => {
                let probes = pending
                    .iter()
                    .map(|(url, _)| self.probe(Arc::clone(fetcher), url.clone()));
                join_all(probes).await
            }
            _ => Vec::new(),
        };

        for (index, (url, slots)) in pending.iter().enumerate() {
            let (source, dims) = match results.get(index) {
                Some(Ok(dims)) => (GeometrySource::Fetch, Some(*dims)),
                Some(Err(err)) => {
                    if err.is_timeout() {
                        tracing::debug!(url = url.as_str(), "image probe timed out");
                    } else {
                        tracing::warn!(url = url.as_str(), error = %err, "image probe failed");
                    }
                    (GeometrySource::FetchError, None)
                }
                None => (GeometrySource::NotProbed, None),
            };
            for &slot in slots {
                let img = images[slot];
                if let Some(dims) = dims {
                    if doc.is_attached(img) {
                        write_dimensions(doc, img, dims);
                    }
                }
                outcomes[slot] = Some(GeometryOutcome::new(img, source, dims));
            }
        }

        let outcomes: Vec<GeometryOutcome> = outcomes.into_iter().flatten().collect();
        for outcome in &outcomes {
            tracing::debug!(
                node = outcome.node.index(),
                source = ?outcome.source,
                dimensions = ?outcome.dimensions,
                "image geometry"
            );
        }
        outcomes
    }
}
