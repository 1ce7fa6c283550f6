//! CLI binary for image-ingest.
//!
//! Every invocation is one drop: the listed files and URLs are validated,
//! resampled and uploaded as a single batch. Endpoint and secrets come from
//! the environment; everything else can be overridden with flags.

use anyhow::{Context, Result};
use clap::Parser;
use image_ingest::{
    BatchOutcome, DropEvent, FitPolicy, ImageUrls, IncomingFile, IngestionController,
    NotificationKind, NotificationSink, Notifier, TracingNotifier, UploadMode,
    UploaderConfigBuilder,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── Terminal notifications using indicatif ───────────────────────────────────

/// Renders each notification as a ✓/✗ line above a spinner.
struct CliNotifier {
    bar: ProgressBar,
}

impl CliNotifier {
    fn new(files: usize) -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Uploading");
        bar.set_message(format!("{files} file(s)…"));
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl NotificationSink for CliNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        match kind {
            NotificationKind::Success => self.bar.println(format!("  {} {}", green("✓"), message)),
            NotificationKind::Error => {
                // Truncate very long remote messages to keep output tidy.
                let msg = if message.chars().count() > 100 {
                    let cut: String = message.chars().take(99).collect();
                    format!("{cut}\u{2026}")
                } else {
                    message.to_string()
                };
                self.bar.println(format!("  {} {}", red("✗"), red(&msg)));
            }
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Upload a single profile picture (replaces, never appends)
  image-ingest avatar.png

  # Upload two product shots into the products folder
  image-ingest --multi --folder products front.jpg back.webp

  # Allow up to 5 images and crop to fill instead of stretching
  image-ingest --multi --max-files 5 --fit cover *.jpg

  # Images from URLs, JSON batch report on stdout
  image-ingest --json https://example.com/cat.png

ENVIRONMENT VARIABLES:
  IMAGE_UPLOAD_URL         Upload endpoint (required)
  IMAGE_UPLOAD_API_KEY     Public API key (required)
  IMAGE_UPLOAD_PRESET      Upload preset name (required)
  IMAGE_UPLOAD_API_SECRET  Signing secret, never sent (required)
  IMAGE_UPLOAD_FOLDER      Destination folder
  IMAGE_UPLOAD_MAX_FILES   Files per drop in multi mode (default 2)

LIMITS:
  Accepted types: .jpeg .jpg .png .webp, at most 5 MiB each.
  Every image is resampled to exactly WIDTH×HEIGHT (default 800×800).
"#;

/// Resample and upload images to signed object storage.
#[derive(Parser, Debug)]
#[command(
    name = "image-ingest",
    version,
    about = "Resample and upload images to signed object storage",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image paths or HTTP/HTTPS URLs, uploaded as one batch.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Multi-image mode: append every upload instead of replacing one URL.
    #[arg(long, env = "IMAGE_INGEST_MULTI")]
    multi: bool,

    /// Files accepted per drop in multi mode.
    #[arg(long)]
    max_files: Option<usize>,

    /// Destination folder (overrides IMAGE_UPLOAD_FOLDER).
    #[arg(long)]
    folder: Option<String>,

    /// Target width in pixels.
    #[arg(long, default_value_t = 800, value_parser = clap::value_parser!(u32).range(1..))]
    width: u32,

    /// Target height in pixels.
    #[arg(long, default_value_t = 800, value_parser = clap::value_parser!(u32).range(1..))]
    height: u32,

    /// How the aspect ratio is reconciled: stretch or cover.
    #[arg(long, value_enum, default_value = "stretch")]
    fit: FitArg,

    /// Output the batch report as JSON instead of the URL list.
    #[arg(long)]
    json: bool,

    /// Disable the spinner.
    #[arg(long, env = "IMAGE_INGEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "IMAGE_INGEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FitArg {
    Stretch,
    Cover,
}

impl From<FitArg> for FitPolicy {
    fn from(v: FitArg) -> Self {
        match v {
            FitArg::Stretch => FitPolicy::Stretch,
            FitArg::Cover => FitPolicy::Cover,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner and ✓/✗ lines carry the user-facing feedback, so library
    // logs stay at ERROR unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let mut builder = UploaderConfigBuilder::from_env()
        .context("Upload endpoint is not configured")?
        .target_size(cli.width, cli.height)
        .fit(cli.fit.into());
    if let Some(ref folder) = cli.folder {
        builder = builder.folder(folder);
    }
    if let Some(n) = cli.max_files {
        builder = builder.max_files(n);
    }
    let config = builder.build().context("Invalid configuration")?;

    // ── Load inputs ──────────────────────────────────────────────────────
    let mut files = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let file = IncomingFile::load(input)
            .await
            .with_context(|| format!("Failed to load '{input}'"))?;
        files.push(file);
    }

    let cli_notifier = show_progress.then(|| CliNotifier::new(files.len()));
    let notifier: Notifier = match &cli_notifier {
        Some(n) => n.clone() as Notifier,
        None => Arc::new(TracingNotifier),
    };

    let mode = if cli.multi {
        UploadMode::Multi
    } else {
        UploadMode::Single
    };
    let controller = IngestionController::builder(config)
        .mode(mode)
        .notifier(notifier)
        .build()
        .context("Failed to start uploader")?;

    // ── Run the batch ────────────────────────────────────────────────────
    let report = controller.ingest(DropEvent::new(files)).await;
    if let Some(ref n) = cli_notifier {
        n.finish();
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else {
        match controller.urls() {
            ImageUrls::Single(url) => {
                if let Some(url) = url {
                    println!("{url}");
                }
            }
            ImageUrls::Multi(urls) => {
                for url in urls {
                    println!("{url}");
                }
            }
        }
    }

    if !cli.quiet && !cli.json {
        let failed = report.failures.len();
        match &report.outcome {
            BatchOutcome::Rejected(violations) => eprintln!(
                "{} batch refused  ({} problem(s))",
                red("✘"),
                violations.len()
            ),
            BatchOutcome::Empty => eprintln!("{} nothing to upload", cyan("⚠")),
            BatchOutcome::Completed if failed == 0 => eprintln!(
                "{} {} image(s) uploaded  {}",
                green("✔"),
                bold(&report.uploaded.len().to_string()),
                dim(&format!("{}ms", report.duration_ms)),
            ),
            BatchOutcome::Completed => eprintln!(
                "{} {}/{} image(s) uploaded  ({} failed)  {}",
                if report.uploaded.is_empty() {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&report.uploaded.len().to_string()),
                report.uploaded.len() + failed,
                red(&failed.to_string()),
                dim(&format!("{}ms", report.duration_ms)),
            ),
        }
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
