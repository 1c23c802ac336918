// ABOUTME: Outbound fetch plumbing used by image probes, with SSRF protection and size limits.
// ABOUTME: Also owns charset detection and decoding for documents handed in as raw bytes.

use std::collections::HashMap;
use std::net::IpAddr;

use bytes::Bytes;
use ipnet::{Ipv4Net, Ipv6Net};
use once_cell::sync::Lazy;
use url::Url;

use crate::error::ScrubError;

/// Maximum allowed body length (10 MB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

static BLOCKED_V4: Lazy<Vec<Ipv4Net>> = Lazy::new(|| {
    [
        "0.0.0.0/8",
        "10.0.0.0/8",
        "100.64.0.0/10",
        "127.0.0.0/8",
        "169.254.0.0/16",
        "172.16.0.0/12",
        "192.168.0.0/16",
    ]
    .iter()
    .filter_map(|cidr| cidr.parse().ok())
    .collect()
});

static BLOCKED_V6: Lazy<Vec<Ipv6Net>> = Lazy::new(|| {
    ["fc00::/7", "fe80::/10"]
        .iter()
        .filter_map(|cidr| cidr.parse().ok())
        .collect()
});

/// Options for a single fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub headers: HashMap<String, String>,
    pub allow_private_networks: bool,
    pub max_bytes: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            allow_private_networks: false,
            max_bytes: MAX_CONTENT_LENGTH,
        }
    }
}

/// A successful fetch.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

pub fn is_private_ip(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(ip) => BLOCKED_V4.iter().any(|net| net.contains(ip)),
        IpAddr::V6(ip) => {
            if ip.is_loopback() || ip.is_unspecified() {
                return true;
            }
            if let Some(v4) = ip.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(v4));
            }
            BLOCKED_V6.iter().any(|net| net.contains(ip))
        }
    }
}

/// Reject `target` if its host is, or resolves to, a private address.
async fn guard_host(target: &Url, reported: &str, what: &str) -> Result<(), ScrubError> {
    let Some(host) = target.host_str() else {
        return Ok(());
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');

    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_private_ip(&ip) {
            return Err(ScrubError::ssrf(
                reported,
                "Fetch",
                Some(anyhow::anyhow!("{} is not allowed", what)),
            ));
        }
        return Ok(());
    }

    let port = target.port_or_known_default().unwrap_or(80);
    let addrs = tokio::net::lookup_host((host, port)).await.map_err(|e| {
        ScrubError::fetch(
            reported,
            "Fetch",
            Some(anyhow::anyhow!("DNS lookup failed: {}", e)),
        )
    })?;

    for socket_addr in addrs {
        if is_private_ip(&socket_addr.ip()) {
            return Err(ScrubError::ssrf(
                reported,
                "Fetch",
                Some(anyhow::anyhow!("{} is not allowed", what)),
            ));
        }
    }
    Ok(())
}

/// Decode body bytes using the content-type charset, falling back to detection.
pub fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    if let Some(encoding) = content_type
        .and_then(extract_charset)
        .and_then(|charset| encoding_rs::Encoding::for_label(charset.as_bytes()))
    {
        let (decoded, _, _) = encoding.decode(body);
        return decoded.into_owned();
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

/// Extract the charset parameter from a Content-Type value.
fn extract_charset(content_type: &str) -> Option<String> {
    content_type
        .to_lowercase()
        .split(';')
        .find_map(|part| {
            part.trim()
                .strip_prefix("charset=")
                .map(|c| c.trim_matches('"').trim_matches('\'').to_string())
        })
}

/// GET `url`, enforcing scheme, SSRF and size rules. Non-200 responses fail.
pub async fn fetch(
    client: &reqwest::Client,
    url: &Url,
    opts: &FetchOptions,
) -> Result<FetchResult, ScrubError> {
    let reported = url.as_str();

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ScrubError::invalid_url(
            reported,
            "Fetch",
            Some(anyhow::anyhow!("scheme must be http or https")),
        ));
    }

    if !opts.allow_private_networks {
        guard_host(url, reported, "private IP address").await?;
    }

    let mut request = client.get(url.clone());
    for (key, value) in &opts.headers {
        request = request.header(key, value);
    }

    let response = request.send().await.map_err(|e| {
        ScrubError::fetch(
            reported,
            "Fetch",
            Some(anyhow::anyhow!("request failed: {}", e)),
        )
    })?;

    if !opts.allow_private_networks && response.url() != url {
        let final_url = response.url().clone();
        guard_host(&final_url, reported, "redirect to private IP address").await?;
    }

    if let Some(len) = response.content_length() {
        if len as usize > opts.max_bytes {
            return Err(ScrubError::fetch(
                reported,
                "Fetch",
                Some(anyhow::anyhow!("content too large")),
            ));
        }
    }

    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_lowercase());

    if status != 200 {
        return Err(ScrubError::fetch(
            reported,
            "Fetch",
            Some(anyhow::anyhow!("HTTP status {}", status)),
        ));
    }

    let body = response.bytes().await.map_err(|e| {
        ScrubError::fetch(
            reported,
            "Fetch",
            Some(anyhow::anyhow!("failed to read body: {}", e)),
        )
    })?;

    if body.len() > opts.max_bytes {
        return Err(ScrubError::fetch(
            reported,
            "Fetch",
            Some(anyhow::anyhow!("content too large")),
        ));
    }

    Ok(FetchResult {
        status,
        final_url,
        content_type,
        body,
    })
}
