// ABOUTME: CLI binary for the scrub sanitization pipeline.
// ABOUTME: Reads an HTML file, sanitizes it against a base URL, and writes the cleaned markup.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use digests_scrub::{Options, Scrubber};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "scrub")]
#[command(about = "Extract and sanitize the main content of an HTML document")]
struct Args {
    /// HTML file to sanitize
    #[arg(long = "html")]
    html: PathBuf,

    /// Base URL the document was served from
    #[arg(long = "url")]
    url: String,

    /// Output file path (default: stdout)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Print elapsed time in ms to stderr
    #[arg(long = "timing")]
    timing: bool,

    /// Keep all content and write data-score/data-best annotations
    #[arg(long = "annotate")]
    annotate: bool,

    /// Do not probe images over the network for missing dimensions
    #[arg(long = "no-probe")]
    no_probe: bool,

    /// Allow image probes to private/local networks
    #[arg(long = "allow-private-networks")]
    allow_private_networks: bool,

    #[arg(long = "contrast-threshold")]
    contrast_threshold: Option<f64>,

    #[arg(long = "table-scan-max-rows")]
    table_scan_max_rows: Option<usize>,

    #[arg(long = "emphasis-max-length")]
    emphasis_max_length: Option<usize>,

    #[arg(long = "image-probe-timeout-ms")]
    image_probe_timeout_ms: Option<u64>,

    /// Log level used when RUST_LOG is not set
    #[arg(long = "log-level", default_value = "warn")]
    log_level: String,
}

fn init_logging(level: &str) -> Result<()> {
    let level: tracing::Level = level.parse().context("Invalid log level")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    Ok(())
}

fn build_scrubber(args: &Args) -> Scrubber {
    let defaults = Options::default();
    let mut builder = Scrubber::builder()
        .annotate(args.annotate)
        .probe_images(!args.no_probe)
        .allow_private_networks(args.allow_private_networks)
        .contrast_threshold(args.contrast_threshold.unwrap_or(defaults.contrast_threshold))
        .table_scan_max_rows(args.table_scan_max_rows.unwrap_or(defaults.table_scan_max_rows))
        .emphasis_max_length(args.emphasis_max_length.unwrap_or(defaults.emphasis_max_length));
    if let Some(ms) = args.image_probe_timeout_ms {
        builder = builder.image_probe_timeout_ms(ms);
    }
    builder.build()
}

async fn run(args: &Args) -> Result<()> {
    let bytes = fs::read(&args.html)
        .with_context(|| format!("error reading file {:?}", args.html))?;
    let scrubber = build_scrubber(args);

    let start = Instant::now();
    let output = scrubber
        .sanitize_bytes(&bytes, Some("text/html"), &args.url)
        .await
        .context("error sanitizing HTML")?;
    let elapsed = start.elapsed();

    match &args.output {
        Some(path) => {
            fs::write(path, &output).with_context(|| format!("error writing to {:?}", path))?
        }
        None => println!("{}", output),
    }

    if args.timing {
        eprintln!("elapsed: {}ms", elapsed.as_millis());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("error: {:#}", e);
        return ExitCode::from(1);
    }

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}
