//! Incoming files: the raw bytes handed over by a drop source.
//!
//! A browser drop zone gives us bytes, a declared media type and a name. The
//! CLI builds the same triple from a local path or an HTTP(S) URL, guessing
//! the media type from the extension the way a drop zone would.

use crate::error::UploaderError;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Media types the pipeline accepts, with their canonical extensions.
pub const ACCEPTED_MEDIA_TYPES: &[(&str, &[&str])] = &[
    ("image/jpeg", &["jpeg", "jpg"]),
    ("image/png", &["png"]),
    ("image/webp", &["webp"]),
];

/// A file as handed over by the drop source.
#[derive(Clone, PartialEq, Eq)]
pub struct IncomingFile {
    /// Original filename, including extension.
    pub name: String,
    /// Declared media type, e.g. `image/png`.
    pub media_type: String,
    /// Raw, still-encoded bytes.
    pub bytes: Vec<u8>,
}

impl fmt::Debug for IncomingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingFile")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl IncomingFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Read a local file; the media type is guessed from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, UploaderError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| UploaderError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let media_type = media_type_for(&name);
        debug!("Loaded '{}' ({} bytes, {})", name, bytes.len(), media_type);
        Ok(Self::new(name, media_type, bytes))
    }

    /// Download a file over HTTP(S).
    ///
    /// The declared type comes from the URL's extension, falling back to the
    /// response's `Content-Type`.
    pub async fn from_url(url: &str) -> Result<Self, UploaderError> {
        if !is_url(url) {
            return Err(UploaderError::InvalidInput {
                input: url.to_string(),
            });
        }
        info!("Downloading image from: {}", url);

        let download_failed = |reason: String| UploaderError::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        let response = reqwest::get(url)
            .await
            .map_err(|e| download_failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(download_failed(format!("HTTP {}", response.status())));
        }

        let name = filename_from_url(url);
        let header_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());
        let media_type = match media_type_for(&name) {
            guessed if guessed != UNKNOWN_MEDIA_TYPE => guessed.to_string(),
            _ => header_type.unwrap_or_else(|| UNKNOWN_MEDIA_TYPE.to_string()),
        };

        let bytes = response
            .bytes()
            .await
            .map_err(|e| download_failed(e.to_string()))?;
        Ok(Self::new(name, media_type, bytes.to_vec()))
    }

    /// Load from a path or a URL, whichever `input` looks like.
    pub async fn load(input: &str) -> Result<Self, UploaderError> {
        if is_url(input) {
            Self::from_url(input).await
        } else {
            Self::from_path(input).await
        }
    }
}

/// Media type reported for unrecognised extensions.
pub const UNKNOWN_MEDIA_TYPE: &str = "application/octet-stream";

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Guess a media type from a filename's extension (case-insensitive).
pub fn media_type_for(name: &str) -> &'static str {
    let Some((_, ext)) = name.rsplit_once('.') else {
        return UNKNOWN_MEDIA_TYPE;
    };
    let ext = ext.to_ascii_lowercase();
    ACCEPTED_MEDIA_TYPES
        .iter()
        .find(|(_, exts)| exts.contains(&ext.as_str()))
        .map(|(mime, _)| *mime)
        .unwrap_or(UNKNOWN_MEDIA_TYPE)
}

/// Canonical extension for an accepted media type.
pub fn extension_for(media_type: &str) -> Option<&'static str> {
    ACCEPTED_MEDIA_TYPES
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(media_type))
        .and_then(|(_, exts)| exts.first().copied())
}

/// Whether `media_type` is in the accepted image set.
pub fn is_accepted(media_type: &str) -> bool {
    extension_for(media_type).is_some()
}

fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded-image".to_string()
}
