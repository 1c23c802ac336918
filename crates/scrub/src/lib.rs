// ABOUTME: Main library entry point for the scrub content extraction and sanitization pipeline.
// ABOUTME: Re-exports the public API: Scrubber, ScrubberBuilder, Options, Document, ScrubError, ErrorCode.

//! Scrub - boilerplate removal and markup sanitization for fetched web pages.
//!
//! A [`Scrubber`] takes a parsed [`Document`], finds the main content subtree,
//! strips scripts, trackers and page chrome, resolves URLs and image
//! dimensions, and trims the result to a small, readable tree.
//!
//! # Example
//!
//! ```no_run
//! use digests_scrub::{ScrubError, Scrubber};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ScrubError> {
//!     let scrubber = Scrubber::builder().image_probe_timeout_ms(2000).build();
//!     let html = "<html><body><nav>menu</nav><article><p>Story</p></article></body></html>";
//!     let cleaned = scrubber.sanitize_html(html, "https://example.com/story").await?;
//!     println!("{}", cleaned);
//!     Ok(())
//! }
//! ```

pub mod dom;
pub mod error;
pub mod filters;
pub mod geometry;
pub mod options;
pub mod pipeline;
pub mod resource;

pub use crate::dom::{Document, NodeId, ScoringWeights};
pub use crate::error::{ErrorCode, ScrubError};
pub use crate::filters::{load_builtin_templates, HostTemplate, HostTemplateRegistry};
pub use crate::geometry::{Dimensions, GeometryOutcome, GeometrySource, ImageFetcher};
pub use crate::options::{Options, ScrubberBuilder};
pub use crate::pipeline::{SanitizeReport, Scrubber, Stage, StageDescriptor, PIPELINE};
