//! Error types for the image-ingest library.
//!
//! Two tiers reflect two distinct failure modes:
//!
//! * [`UploaderError`] is **fatal**: the pipeline cannot be set up at all
//!   (bad configuration, HTTP client or preview directory could not be
//!   created, an input file could not be read). Returned as
//!   `Err(UploaderError)` from constructors and loaders only.
//!
//! * [`ValidationError`], [`FileError`], [`UploadError`] and
//!   [`StateInvariantError`] are **non-fatal**: a batch was refused, or one
//!   file in a batch failed. These never escape an ingestion batch as `Err`;
//!   they are turned into a user notification and recorded in
//!   [`crate::controller::BatchReport`] so callers can inspect them if they
//!   want to.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors returned while building or feeding the pipeline.
#[derive(Debug, Error)]
pub enum UploaderError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required environment variable is missing or empty.
    #[error("Environment variable '{name}' is not set")]
    MissingEnv { name: &'static str },

    // ── Setup errors ──────────────────────────────────────────────────────
    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    /// The preview directory could not be created.
    #[error("Failed to create preview directory: {source}")]
    PreviewDir {
        #[source]
        source: std::io::Error,
    },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found or could not be read.
    #[error("Failed to read image '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP URL was syntactically valid but the download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },
}

/// Why a whole batch was refused before any resampling happened.
///
/// Each variant maps to exactly one user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ValidationError {
    /// The drop carried more files than the configured limit.
    #[error("Maximum {limit} images can be uploaded!")]
    TooManyFiles { limit: usize },

    /// A single file exceeds the maximum byte size.
    #[error("File '{name}' is larger than {max} bytes ({size} bytes)")]
    TooLarge { name: String, size: u64, max: u64 },

    /// The declared media type is not one of the accepted image types.
    #[error("File '{name}' has type '{media_type}'; accepted types are image/jpeg, image/png, image/webp")]
    UnsupportedType { name: String, media_type: String },

    /// The drop source rejected a file for a reason we only know by code.
    #[error("File '{name}' was rejected: {message}")]
    Rejected { name: String, message: String },
}

/// A failure confined to one file of an accepted batch.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum FileError {
    /// The bytes could not be decoded as an image.
    #[error("Could not read image '{name}': {detail}")]
    Decode { name: String, detail: String },

    /// The resampled pixels could not be re-encoded.
    #[error("Could not encode image '{name}': {detail}")]
    Encode { name: String, detail: String },

    /// The local preview could not be created.
    #[error("Could not create preview for '{name}': {detail}")]
    Preview { name: String, detail: String },

    /// The upload failed; siblings are unaffected.
    #[error("Upload of '{name}' failed: {error}")]
    Upload { name: String, error: UploadError },
}

impl FileError {
    /// Original filename of the file that failed.
    pub fn name(&self) -> &str {
        match self {
            FileError::Decode { name, .. }
            | FileError::Encode { name, .. }
            | FileError::Preview { name, .. }
            | FileError::Upload { name, .. } => name,
        }
    }
}

/// Why a single upload did not produce a URL.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum UploadError {
    /// The multipart request could not be assembled.
    #[error("could not build request: {detail}")]
    Request { detail: String },

    /// The request never got a response (DNS, TLS, connection reset, ...).
    #[error("network error: {detail}")]
    Network { detail: String },

    /// The endpoint answered with a non-success status.
    #[error("rejected with HTTP {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Rejected {
        status: u16,
        message: Option<String>,
    },

    /// The endpoint answered 2xx but the body had no usable URL.
    #[error("invalid response: {detail}")]
    InvalidResponse { detail: String },
}

impl UploadError {
    /// Text shown to the user: the remote message when the endpoint sent
    /// one, otherwise a generic failure message.
    pub fn user_message(&self) -> String {
        match self {
            UploadError::Rejected {
                message: Some(message),
                ..
            } if !message.is_empty() => message.clone(),
            _ => "Upload failed".to_string(),
        }
    }
}

/// A URL-state mutation that would break the state's invariants.
///
/// Always a no-op: the state is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum StateInvariantError {
    /// The URL to remove is not in the current state.
    #[error("URL '{url}' is not present")]
    NotPresent { url: String },

    /// An empty URL cannot be stored.
    #[error("empty URL")]
    EmptyUrl,
}
