// ABOUTME: Removes tracking pixels and anchor ping attributes without touching the network.
// ABOUTME: Matches images by host blacklist, vendor domain suffix, beacon path pattern, or size.

use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;
use url::Url;

use crate::dom::tree::{Document, NodeId};
use crate::dom::utils::parse_px;

/// Hosts that only ever serve tracking or ad images.
const BLACKLISTED_HOSTS: &[&str] = &[
    "ad.doubleclick.net",
    "ad.linksynergy.com",
    "analytics.twitter.com",
    "b.scorecardresearch.com",
    "bat.bing.com",
    "feedads.g.doubleclick.net",
    "feeds.feedburner.com",
    "pagead2.googlesyndication.com",
    "ping.chartbeat.net",
    "pixel.mathtag.com",
    "pixel.quantserve.com",
    "pixel.wp.com",
    "pubads.g.doubleclick.net",
    "rss.feedsportal.com",
    "sb.scorecardresearch.com",
    "sp.analytics.yahoo.com",
    "static.chartbeat.com",
    "stats.wordpress.com",
    "track.hubspot.com",
    "www.google-analytics.com",
    "www.googletagmanager.com",
];

/// Analytics vendors matched on the registrable-domain suffix.
const VENDOR_DOMAINS: &[&str] = &[
    "2o7.net",
    "adnxs.com",
    "chartbeat.net",
    "demdex.net",
    "doubleclick.net",
    "google-analytics.com",
    "googlesyndication.com",
    "krxd.net",
    "mathtag.com",
    "moatads.com",
    "omtrdc.net",
    "quantserve.com",
    "scorecardresearch.com",
];

/// Path fragments used by common beacons.
const BEACON_PATTERNS: &[&str] = &[
    "/tr?",
    "/pixel.gif",
    "/beacon.gif",
    "/1x1.gif",
    "/__utm.gif",
    "/b/ss/",
    "/piwik.php",
    "/matomo.php",
];

static BEACON_MATCHER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(BEACON_PATTERNS)
        .unwrap()
});

/// Counts from one telemetry pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetryReport {
    pub images_removed: usize,
    pub anchors_rewritten: usize,
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn is_cloudfront_beacon(url: &Url, host: &str) -> bool {
    if !host_matches(host, "cloudfront.net") {
        return false;
    }
    let path = url.path().trim_start_matches('/');
    !path.contains('/') && path.to_ascii_lowercase().ends_with(".gif")
}

fn is_tracking_host(url: &Url, host: &str) -> bool {
    BLACKLISTED_HOSTS.contains(&host)
        || VENDOR_DOMAINS.iter().any(|d| host_matches(host, d))
        || is_cloudfront_beacon(url, host)
        || (host_matches(host, "facebook.com") && url.path().starts_with("/tr"))
}

fn is_beacon_path(url: &Url) -> bool {
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    BEACON_MATCHER.is_match(&target)
}

/// True if the URL looks like a tracker. Host rules are skipped when the image
/// is served from `own_host`.
pub fn is_tracking_url(url: &Url, own_host: Option<&str>) -> bool {
    if let Some(host) = url.host_str().map(|h| h.to_ascii_lowercase()) {
        let same_host = own_host.is_some_and(|own| own.eq_ignore_ascii_case(&host));
        if !same_host && is_tracking_host(url, &host) {
            return true;
        }
    }
    is_beacon_path(url)
}

fn is_tiny(doc: &Document, img: NodeId, min_dimension: u32) -> bool {
    ["width", "height"].iter().any(|attr| {
        doc.attr(img, attr)
            .and_then(parse_px)
            .is_some_and(|v| v < f64::from(min_dimension))
    })
}

/// True if the image element is a telemetry element.
pub fn is_telemetry_image(
    doc: &Document,
    img: NodeId,
    own_host: Option<&str>,
    min_dimension: u32,
) -> bool {
    if is_tiny(doc, img, min_dimension) {
        return true;
    }
    doc.attr(img, "src")
        .and_then(|src| Url::parse(src.trim()).ok())
        .is_some_and(|url| is_tracking_url(&url, own_host))
}

/// Strip anchor pings, force `rel="noreferrer"`, and remove tracking images.
pub fn filter_telemetry(doc: &mut Document, document_url: &Url, min_dimension: u32) -> TelemetryReport {
    let mut report = TelemetryReport::default();
    let root = doc.root();

    for anchor in doc.select(root, &["a"]) {
        let had_ping = doc.remove_attr(anchor, "ping");
        let has_href = doc.has_attr(anchor, "href");
        if has_href {
            doc.set_attr(anchor, "rel", "noreferrer");
        }
        if had_ping || has_href {
            report.anchors_rewritten += 1;
        }
    }

    let own_host = document_url.host_str().map(|h| h.to_ascii_lowercase());
    report.images_removed = doc.remove_where(root, |d, id| {
        d.is_tag(id, "img") && is_telemetry_image(d, id, own_host.as_deref(), min_dimension)
    });

    if report.images_removed > 0 {
        tracing::debug!(removed = report.images_removed, "removed telemetry images");
    }
    report
}
