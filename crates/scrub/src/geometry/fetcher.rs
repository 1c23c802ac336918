// ABOUTME: Image probe collaborator trait and its default HTTP implementation.
// ABOUTME: Downloads through the SSRF-guarded fetcher and reads dimensions with the image crate.

use std::fmt;
use std::io::Cursor;

use async_trait::async_trait;
use base64::Engine;
use url::Url;

use crate::error::ScrubError;
use crate::resource::{fetch, FetchOptions};

/// Pixel size of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Looks up the dimensions of a remote image.
#[async_trait]
pub trait ImageFetcher: fmt::Debug + Send + Sync {
    async fn fetch_dimensions(&self, url: &Url) -> Result<Dimensions, ScrubError>;
}

/// Default probe: HTTP(S) download or inline `data:` decode.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    opts: FetchOptions,
}

impl HttpImageFetcher {
    pub fn new(client: reqwest::Client, allow_private_networks: bool) -> Self {
        Self {
            client,
            opts: FetchOptions {
                allow_private_networks,
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch_dimensions(&self, url: &Url) -> Result<Dimensions, ScrubError> {
        let bytes = if url.scheme() == "data" {
            decode_data_url(url)?
        } else {
            fetch(&self.client, url, &self.opts).await?.body.to_vec()
        };
        decode_dimensions(&bytes, url.as_str())
    }
}

/// Read the header of an encoded image.
pub fn decode_dimensions(bytes: &[u8], url: &str) -> Result<Dimensions, ScrubError> {
    let reader = image::io::Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ScrubError::decode(url, "Probe", Some(anyhow::Error::new(e))))?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| ScrubError::decode(url, "Probe", Some(anyhow::Error::new(e))))?;
    Ok(Dimensions { width, height })
}

/// Payload bytes of a base64 `data:` URL.
fn decode_data_url(url: &Url) -> Result<Vec<u8>, ScrubError> {
    let reported = url.as_str();
    let (meta, payload) = url.path().split_once(',').ok_or_else(|| {
        ScrubError::decode(reported, "Probe", Some(anyhow::anyhow!("malformed data URL")))
    })?;
    if !meta.to_ascii_lowercase().ends_with(";base64") {
        return Err(ScrubError::decode(
            reported,
            "Probe",
            Some(anyhow::anyhow!("only base64 data URLs are supported")),
        ));
    }
    let payload: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| ScrubError::decode(reported, "Probe", Some(anyhow::Error::new(e))))
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent GIF.
    const GIF_1X1: &str = "R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

    #[test]
    fn decodes_gif_header() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(GIF_1X1)
            .unwrap();
        assert_eq!(decode_dimensions(&bytes, "x").unwrap(), Dimensions::new(1, 1));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = decode_dimensions(b"not an image", "x").unwrap_err();
        assert!(err.is_decode());
    }

    #[tokio::test]
    async fn data_urls_are_decoded_locally() {
        let fetcher = HttpImageFetcher::new(reqwest::Client::new(), false);
        let url = Url::parse(&format!("data:image/gif;base64,{}", GIF_1X1)).unwrap();
        assert_eq!(
            fetcher.fetch_dimensions(&url).await.unwrap(),
            Dimensions::new(1, 1)
        );

        let url = Url::parse("data:image/svg+xml,<svg></svg>").unwrap();
        assert!(fetcher.fetch_dimensions(&url).await.unwrap_err().is_decode());
    }

    #[test]
    fn area_and_display() {
        let d = Dimensions::new(300, 200);
        assert_eq!(d.area(), 60_000);
        assert_eq!(d.to_string(), "300x200");
    }
}
