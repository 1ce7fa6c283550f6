//! Preview references: revocable handles to a locally renderable copy of a
//! not-yet-uploaded image.
//!
//! A [`PreviewRegistry`] hands out URLs; a [`PreviewHandle`] owns exactly one
//! of them and gives it back exactly once, either through
//! [`PreviewHandle::revoke`] or, failing that, on `Drop`. A batch future
//! dropped mid-flight therefore still releases its previews.

use crate::error::UploaderError;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, warn};

/// Creates and releases preview URLs.
pub trait PreviewRegistry: Send + Sync {
    /// Materialise `bytes` somewhere renderable and return its URL.
    fn create(&self, bytes: &[u8], media_type: &str, name: &str) -> std::io::Result<String>;

    /// Release a URL previously returned by [`PreviewRegistry::create`].
    fn revoke(&self, url: &str);
}

/// Owns one preview URL and revokes it exactly once.
pub struct PreviewHandle {
    url: String,
    registry: Arc<dyn PreviewRegistry>,
    revoked: bool,
}

impl PreviewHandle {
    /// Create a preview through `registry`.
    pub fn create(
        registry: Arc<dyn PreviewRegistry>,
        bytes: &[u8],
        media_type: &str,
        name: &str,
    ) -> std::io::Result<Self> {
        let url = registry.create(bytes, media_type, name)?;
        debug!("Preview created for '{}': {}", name, url);
        Ok(Self {
            url,
            registry,
            revoked: false,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Release the preview now.
    pub fn revoke(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.revoked {
            self.revoked = true;
            self.registry.revoke(&self.url);
        }
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewHandle")
            .field("url", &self.url)
            .field("revoked", &self.revoked)
            .finish()
    }
}

/// Default registry: one file per preview inside a private temp directory.
///
/// URLs are `file://` URLs. Revoking deletes the file; dropping the registry
/// removes the directory and anything still in it.
pub struct TempDirPreviews {
    dir: TempDir,
    next_id: AtomicU64,
}

impl TempDirPreviews {
    pub fn new() -> Result<Self, UploaderError> {
        let dir = tempfile::Builder::new()
            .prefix("image-ingest-previews-")
            .tempdir()
            .map_err(|source| UploaderError::PreviewDir { source })?;
        Ok(Self {
            dir,
            next_id: AtomicU64::new(0),
        })
    }

    fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let path = PathBuf::from(url.strip_prefix("file://")?);
        path.starts_with(self.dir.path()).then_some(path)
    }
}

impl PreviewRegistry for TempDirPreviews {
    fn create(&self, bytes: &[u8], media_type: &str, _name: &str) -> std::io::Result<String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let ext = crate::pipeline::input::extension_for(media_type).unwrap_or("bin");
        let path = self.dir.path().join(format!("preview-{id}.{ext}"));
        std::fs::write(&path, bytes)?;
        Ok(format!("file://{}", path.display()))
    }

    fn revoke(&self, url: &str) {
        let Some(path) = self.path_for_url(url) else {
            warn!("Ignoring revoke of foreign preview URL: {}", url);
            return;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("Preview revoked: {}", url),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove preview {}: {}", path.display(), e),
        }
    }
}
