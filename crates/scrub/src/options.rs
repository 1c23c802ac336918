// ABOUTME: Configuration for the scrub pipeline: Options with defaults and the fluent ScrubberBuilder.
// ABOUTME: Covers the tunable thresholds, probe settings and pluggable collaborators.

use std::sync::Arc;
use std::time::Duration;

use crate::dom::bias::ScoringWeights;
use crate::filters::host::HostTemplateRegistry;
use crate::geometry::ImageFetcher;
use crate::pipeline::Scrubber;

/// Configuration options for a [`Scrubber`].
#[derive(Debug, Clone)]
pub struct Options {
    /// Opacity below which an inline-styled element counts as hidden.
    pub contrast_threshold: f64,
    /// Maximum rows inspected when deciding whether a table is single-column.
    pub table_scan_max_rows: usize,
    /// Emphasis elements with longer text are unwrapped.
    pub emphasis_max_length: usize,
    pub image_probe_timeout: Duration,
    /// Keep everything and write `data-score`/`data-best` instead of pruning.
    pub annotate: bool,
    pub probe_images: bool,
    /// Telemetry size heuristic: width or height attribute below this is a pixel.
    pub min_image_dimension: u32,
    pub min_image_area: u64,
    pub user_agent: String,
    pub allow_private_networks: bool,
    pub http_client: Option<reqwest::Client>,
    pub image_fetcher: Option<Arc<dyn ImageFetcher>>,
    pub weights: ScoringWeights,
    pub templates: Option<HostTemplateRegistry>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            contrast_threshold: 0.3,
            table_scan_max_rows: 20,
            emphasis_max_length: 200,
            image_probe_timeout: Duration::from_millis(4000),
            annotate: false,
            probe_images: true,
            min_image_dimension: 2,
            min_image_area: 1000,
            user_agent: "Scrub/1.0".to_string(),
            allow_private_networks: false,
            http_client: None,
            image_fetcher: None,
            weights: ScoringWeights::default(),
            templates: None,
        }
    }
}

/// Builder for constructing Scrubber instances with custom configuration.
#[derive(Debug, Clone)]
pub struct ScrubberBuilder {
    opts: Options,
}

impl ScrubberBuilder {
    /// Create a new ScrubberBuilder with default options.
    pub fn new() -> Self {
        Self {
            opts: Options::default(),
        }
    }

    pub fn contrast_threshold(mut self, threshold: f64) -> Self {
        self.opts.contrast_threshold = threshold;
        self
    }

    pub fn table_scan_max_rows(mut self, rows: usize) -> Self {
        self.opts.table_scan_max_rows = rows;
        self
    }

    pub fn emphasis_max_length(mut self, len: usize) -> Self {
        self.opts.emphasis_max_length = len;
        self
    }

    /// Set the per-probe timeout.
    pub fn image_probe_timeout(mut self, timeout: Duration) -> Self {
        self.opts.image_probe_timeout = timeout;
        self
    }

    /// Set the per-probe timeout in milliseconds.
    pub fn image_probe_timeout_ms(self, ms: u64) -> Self {
        self.image_probe_timeout(Duration::from_millis(ms))
    }

    /// Annotate scores instead of pruning.
    pub fn annotate(mut self, annotate: bool) -> Self {
        self.opts.annotate = annotate;
        self
    }

    /// Enable or disable network probes for image dimensions.
    pub fn probe_images(mut self, probe: bool) -> Self {
        self.opts.probe_images = probe;
        self
    }

    pub fn min_image_dimension(mut self, min: u32) -> Self {
        self.opts.min_image_dimension = min;
        self
    }

    pub fn min_image_area(mut self, min: u64) -> Self {
        self.opts.min_image_area = min;
        self
    }

    /// Set the User-Agent header used by probes.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.user_agent = user_agent.into();
        self
    }

    /// Allow or disallow probes to private networks.
    pub fn allow_private_networks(mut self, allow: bool) -> Self {
        self.opts.allow_private_networks = allow;
        self
    }

    /// Use a custom HTTP client for probes.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.opts.http_client = Some(client);
        self
    }

    /// Replace the probe collaborator entirely.
    pub fn image_fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.opts.image_fetcher = Some(fetcher);
        self
    }

    pub fn weights(mut self, weights: ScoringWeights) -> Self {
        self.opts.weights = weights;
        self
    }

    /// Set a custom host template registry.
    pub fn templates(mut self, templates: HostTemplateRegistry) -> Self {
        self.opts.templates = Some(templates);
        self
    }

    /// Build the Scrubber with the configured options.
    pub fn build(self) -> Scrubber {
        Scrubber::new(self.opts)
    }
}

impl Default for ScrubberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let opts = Options::default();
        assert_eq!(opts.contrast_threshold, 0.3);
        assert_eq!(opts.table_scan_max_rows, 20);
        assert_eq!(opts.emphasis_max_length, 200);
        assert_eq!(opts.image_probe_timeout, Duration::from_millis(4000));
        assert!(opts.probe_images);
        assert!(!opts.annotate);
        assert!(!opts.allow_private_networks);
    }

    #[test]
    fn builder_sets_fields() {
        let builder = ScrubberBuilder::new()
            .contrast_threshold(0.5)
            .table_scan_max_rows(5)
            .emphasis_max_length(10)
            .image_probe_timeout_ms(250)
            .annotate(true)
            .probe_images(false)
            .min_image_area(0);
        let opts = &builder.opts;
        assert_eq!(opts.contrast_threshold, 0.5);
        assert_eq!(opts.table_scan_max_rows, 5);
        assert_eq!(opts.emphasis_max_length, 10);
        assert_eq!(opts.image_probe_timeout, Duration::from_millis(250));
        assert!(opts.annotate);
        assert!(!opts.probe_images);
        assert_eq!(opts.min_image_area, 0);
    }
}
