// ABOUTME: The Scrubber orchestrator that runs the fixed, ordered filter pipeline over a Document.
// ABOUTME: Image geometry is the only stage that suspends; all other stages run synchronously in order.

use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Instant;

use url::Url;

use crate::dom::scoring::{score_and_prune, ScoreOutcome};
use crate::dom::tree::Document;
use crate::error::ScrubError;
use crate::filters::host::{apply_host_template, load_builtin_templates, HostTemplateRegistry};
use crate::filters::structure::{normalize_structure, StructureLimits};
use crate::filters::telemetry::{filter_telemetry, TelemetryReport};
use crate::filters::{attributes, frames, images, strip, urls, whitespace};
use crate::geometry::{GeometryOutcome, GeometryResolver, HttpImageFetcher, ImageFetcher};
use crate::options::{Options, ScrubberBuilder};

/// One step of the sanitization pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Frames,
    Scripts,
    Hidden,
    Blacklist,
    Extract,
    CanonicalUrls,
    LazyImages,
    Telemetry,
    SourcelessImages,
    ImageGeometry,
    SmallImages,
    Structure,
    Whitespace,
    Prune,
    Attributes,
}

/// Static description of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDescriptor {
    pub name: &'static str,
    /// The stage may perform network I/O and therefore suspend.
    pub network: bool,
}

impl Stage {
    pub const fn descriptor(self) -> StageDescriptor {
        let (name, network) = match self {
            Stage::Frames => ("frames", false),
            Stage::Scripts => ("scripts", false),
            Stage::Hidden => ("hidden", false),
            Stage::Blacklist => ("blacklist", false),
            Stage::Extract => ("extract", false),
            Stage::CanonicalUrls => ("canonical-urls", false),
            Stage::LazyImages => ("lazy-images", false),
            Stage::Telemetry => ("telemetry", false),
            Stage::SourcelessImages => ("sourceless-images", false),
            Stage::ImageGeometry => ("image-geometry", true),
            Stage::SmallImages => ("small-images", false),
            Stage::Structure => ("structure", false),
            Stage::Whitespace => ("whitespace", false),
            Stage::Prune => ("prune", false),
            Stage::Attributes => ("attributes", false),
        };
        StageDescriptor { name, network }
    }
}

/// Stages in execution order. Later stages rely on the work of earlier ones.
pub const PIPELINE: &[Stage] = &[
    Stage::Frames,
    Stage::Scripts,
    Stage::Hidden,
    Stage::Blacklist,
    Stage::Extract,
    Stage::CanonicalUrls,
    Stage::LazyImages,
    Stage::Telemetry,
    Stage::SourcelessImages,
    Stage::ImageGeometry,
    Stage::SmallImages,
    Stage::Structure,
    Stage::Whitespace,
    Stage::Prune,
    Stage::Attributes,
];

/// What a sanitize run did, for callers that want more than the mutated tree.
#[derive(Debug, Clone, Default)]
pub struct SanitizeReport {
    pub extraction: Option<ScoreOutcome>,
    pub telemetry: TelemetryReport,
    pub geometry: Vec<GeometryOutcome>,
}

/// Runs the sanitization pipeline with a fixed configuration.
#[derive(Debug, Clone)]
pub struct Scrubber {
    opts: Options,
    templates: HostTemplateRegistry,
    geometry: GeometryResolver,
}

fn default_http_client(opts: &Options) -> reqwest::Client {
    let allow_private = opts.allow_private_networks;
    let redirect_policy = reqwest::redirect::Policy::custom(move |attempt| {
        if allow_private {
            return attempt.follow();
        }
        let next = attempt.url().clone();
        if let Some(host) = next.host_str() {
            let port = next.port_or_known_default().unwrap_or(80);
            if let Ok(ip) = host.trim_matches(|c| c == '[' || c == ']').parse::<std::net::IpAddr>() {
                if crate::resource::is_private_ip(&ip) {
                    return attempt.error("redirect to private IP blocked");
                }
            } else {
                // redirect policies are synchronous
                match format!("{}:{}", host, port).to_socket_addrs() {
                    Ok(mut addrs) => {
                        if addrs.any(|sa| crate::resource::is_private_ip(&sa.ip())) {
                            return attempt.error("redirect to private IP blocked");
                        }
                    }
                    Err(_) => return attempt.error("DNS lookup failed during redirect"),
                }
            }
        }
        attempt.follow()
    });

    match reqwest::Client::builder()
        .redirect(redirect_policy)
        .user_agent(&opts.user_agent)
        .timeout(opts.image_probe_timeout)
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()
    {
        Ok(client) => client,
        Err(err) => {
            tracing::warn!(error = %err, "falling back to default HTTP client");
            reqwest::Client::new()
        }
    }
}

impl Scrubber {
    /// Create a new ScrubberBuilder for configuring the scrubber.
    pub fn builder() -> ScrubberBuilder {
        ScrubberBuilder::new()
    }

    /// Create a new Scrubber with the given options.
    pub fn new(opts: Options) -> Self {
        let fetcher: Option<Arc<dyn ImageFetcher>> = if !opts.probe_images {
            None
        } else if let Some(custom) = &opts.image_fetcher {
            Some(Arc::clone(custom))
        } else {
            let client = opts
                .http_client
                .clone()
                .unwrap_or_else(|| default_http_client(&opts));
            let http: Arc<dyn ImageFetcher> =
                Arc::new(HttpImageFetcher::new(client, opts.allow_private_networks));
            Some(http)
        };
        let geometry = GeometryResolver::new(fetcher, opts.image_probe_timeout);
        let templates = opts.templates.clone().unwrap_or_else(load_builtin_templates);

        Self {
            opts,
            templates,
            geometry,
        }
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    fn limits(&self) -> StructureLimits {
        StructureLimits {
            emphasis_max_length: self.opts.emphasis_max_length,
            table_scan_max_rows: self.opts.table_scan_max_rows,
        }
    }

    /// Sanitize `doc` in place. `url` is the address the document was served from.
    ///
    /// Never fails: stages degrade to no-ops on unexpected shapes and probe
    /// failures only leave dimensions unset.
    pub async fn sanitize(&self, doc: &mut Document, url: &Url) -> SanitizeReport {
        let mut report = SanitizeReport::default();
        let mut body = doc.root();
        let mut base = url.clone();

        for &stage in PIPELINE {
            let descriptor = stage.descriptor();
            let started = Instant::now();

            match stage {
                Stage::Frames => {
                    body = frames::replace_frames(doc);
                    base = urls::effective_base(doc, url);
                }
                Stage::Scripts => {
                    strip::strip_scripts(doc);
                }
                Stage::Hidden => {
                    strip::remove_hidden(doc, self.opts.contrast_threshold);
                }
                Stage::Blacklist => {
                    strip::remove_blacklisted(doc);
                }
                Stage::Extract => {
                    apply_host_template(doc, &self.templates, url);
                    report.extraction = score_and_prune(doc, &self.opts.weights, self.opts.annotate);
                }
                Stage::CanonicalUrls => {
                    urls::canonicalize_urls(doc, &base);
                }
                Stage::LazyImages => {
                    images::resolve_lazy_sources(doc, &base);
                }
                Stage::Telemetry => {
                    report.telemetry = filter_telemetry(doc, url, self.opts.min_image_dimension);
                }
                Stage::SourcelessImages => {
                    images::remove_sourceless(doc);
                }
                Stage::ImageGeometry => {
                    let imgs = doc.select(body, &["img"]);
                    report.geometry = self.geometry.resolve_all(doc, &imgs, &base).await;
                }
                Stage::SmallImages => {
                    images::remove_small(doc, self.opts.min_image_area);
                }
                Stage::Structure => {
                    normalize_structure(doc, body, self.limits());
                }
                Stage::Whitespace => {
                    whitespace::condense_text(doc, body);
                }
                Stage::Prune => {
                    whitespace::prune_leaves(doc, body);
                    whitespace::trim_body(doc, body);
                }
                Stage::Attributes => {
                    attributes::allow_list_attributes(doc, self.opts.annotate);
                }
            }

            tracing::trace!(
                stage = descriptor.name,
                network = descriptor.network,
                elapsed_us = started.elapsed().as_micros() as u64,
                "stage complete"
            );
        }

        report
    }

    /// Parse `html`, sanitize it against `url`, and serialize the result.
    pub async fn sanitize_html(&self, html: &str, url: &str) -> Result<String, ScrubError> {
        let parsed_url = parse_base_url(url, "SanitizeHTML")?;
        if html.trim().is_empty() {
            return Err(ScrubError::invalid_markup(
                url,
                "SanitizeHTML",
                Some(anyhow::anyhow!("empty HTML")),
            ));
        }

        let mut doc = Document::parse(html);
        self.sanitize(&mut doc, &parsed_url).await;
        Ok(doc.to_html())
    }

    /// Decode raw bytes with the declared content type, then sanitize and serialize.
    pub async fn sanitize_bytes(
        &self,
        bytes: &[u8],
        content_type: Option<&str>,
        url: &str,
    ) -> Result<String, ScrubError> {
        let parsed_url = parse_base_url(url, "SanitizeBytes")?;
        let mut doc = Document::from_bytes(bytes, content_type)?;
        self.sanitize(&mut doc, &parsed_url).await;
        Ok(doc.to_html())
    }
}

fn parse_base_url(url: &str, op: &str) -> Result<Url, ScrubError> {
    if url.is_empty() {
        return Err(ScrubError::invalid_url(url, op, None));
    }
    Url::parse(url)
        .map_err(|_| ScrubError::invalid_url(url, op, Some(anyhow::anyhow!("malformed URL"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn scrubber() -> Scrubber {
        Scrubber::builder().probe_images(false).build()
    }

    #[test]
    fn pipeline_order_is_fixed() {
        let names: Vec<&str> = PIPELINE.iter().map(|s| s.descriptor().name).collect();
        assert_eq!(
            names,
            vec![
                "frames",
                "scripts",
                "hidden",
                "blacklist",
                "extract",
                "canonical-urls",
                "lazy-images",
                "telemetry",
                "sourceless-images",
                "image-geometry",
                "small-images",
                "structure",
                "whitespace",
                "prune",
                "attributes",
            ]
        );
        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(unique.len(), PIPELINE.len());
    }

    #[test]
    fn only_geometry_touches_the_network() {
        let network: Vec<Stage> = PIPELINE
            .iter()
            .copied()
            .filter(|s| s.descriptor().network)
            .collect();
        assert_eq!(network, vec![Stage::ImageGeometry]);
    }

    #[tokio::test]
    async fn rejects_bad_inputs() {
        let s = scrubber();
        let err = s.sanitize_html("<p>x</p>", "not a url").await.unwrap_err();
        assert!(err.is_invalid_url());
        let err = s.sanitize_html("<p>x</p>", "").await.unwrap_err();
        assert!(err.is_invalid_url());
        let err = s
            .sanitize_html("  \n", "https://example.com/")
            .await
            .unwrap_err();
        assert!(err.is_invalid_markup());
    }

    #[tokio::test]
    async fn root_is_preserved() {
        let s = scrubber();
        let mut doc = Document::parse("<frameset><frame src=a></frameset>");
        let root = doc.root();
        s.sanitize(&mut doc, &Url::parse("https://example.com/").unwrap())
            .await;
        assert_eq!(doc.root(), root);
        assert!(doc.body().is_some());
    }

    #[tokio::test]
    async fn sanitizes_bytes_with_declared_charset() {
        let s = scrubber();
        let html = b"<html><body><article><p>caf\xe9 au lait, with enough words to count as prose.</p></article></body></html>";
        let out = s
            .sanitize_bytes(html, Some("text/html; charset=iso-8859-1"), "https://example.com/")
            .await
            .unwrap();
        assert!(out.contains("café au lait"));

        let err = s
            .sanitize_bytes(b"\x89PNG", Some("image/png"), "https://example.com/")
            .await
            .unwrap_err();
        assert!(err.is_invalid_markup());
    }
}
