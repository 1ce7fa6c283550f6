//! # image-ingest
//!
//! Take the image files a user dropped, normalise them to fixed pixel
//! dimensions, sign and upload them to an object-storage endpoint, and fold
//! the resulting URLs into caller-owned state.
//!
//! ## Pipeline Overview
//!
//! ```text
//! drop
//!  │
//!  ├─ 1. Validate   size / media type / file count; refuse the whole batch
//!  ├─ 2. Resample   decode → exact W×H (Lanczos3) → unsharp → re-encode
//!  ├─ 3. Sign       sha256("folder=…&public_id=…&timestamp=…&upload_preset=…" + secret)
//!  ├─ 4. Upload     concurrent multipart POSTs, each settles on its own
//!  └─ 5. Reconcile  append (multi-image) or replace (single-image) URLs
//! ```
//!
//! Failures never escape a batch: refused drops, unreadable images and failed
//! uploads become notifications through the injected
//! [`NotificationSink`] and are listed in the returned [`BatchReport`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use image_ingest::{DropEvent, IncomingFile, IngestionController, UploadMode, UploaderConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads IMAGE_UPLOAD_URL, IMAGE_UPLOAD_API_KEY, IMAGE_UPLOAD_PRESET, IMAGE_UPLOAD_API_SECRET
//!     let config = image_ingest::UploaderConfigBuilder::from_env()?
//!         .folder("products")
//!         .build()?;
//!     let controller = IngestionController::builder(config)
//!         .mode(UploadMode::Multi)
//!         .build()?;
//!
//!     let file = IncomingFile::from_path("front.jpg").await?;
//!     let report = controller.ingest(DropEvent::new(vec![file])).await;
//!     println!("{:?} → {:?}", report.outcome, controller.urls());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `image-ingest` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod error;
pub mod notify;
pub mod pipeline;
pub mod preview;
pub mod state;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{FitPolicy, UploaderConfig, UploaderConfigBuilder};
pub use controller::{
    BatchOutcome, BatchReport, DropEvent, FileRejection, IngestionController,
    IngestionControllerBuilder, RejectionCode, RejectionReason,
};
pub use error::{FileError, StateInvariantError, UploadError, UploaderError, ValidationError};
pub use notify::{NotificationKind, NotificationSink, Notifier, TracingNotifier};
pub use pipeline::input::IncomingFile;
pub use pipeline::resample::{NormalizedImage, Resampler};
pub use pipeline::sign::{public_id_from_filename, SignaturePayload, Signer};
pub use pipeline::upload::{ImageUploader, UploadClient, UploadResult};
pub use preview::{PreviewHandle, PreviewRegistry, TempDirPreviews};
pub use state::{ImageUrls, UploadMode};
