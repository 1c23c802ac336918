// ABOUTME: Synchronous filter stages the pipeline runs around scoring and geometry.
// ABOUTME: Each submodule owns one concern and mutates the document in place.

pub mod attributes;
pub mod frames;
pub mod host;
pub mod images;
pub mod strip;
pub mod structure;
pub mod telemetry;
pub mod urls;
pub mod whitespace;

pub use host::{load_builtin_templates, HostTemplate, HostTemplateRegistry};
pub use telemetry::{filter_telemetry, TelemetryReport};
