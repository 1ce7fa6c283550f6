//! Configuration for the ingestion pipeline.
//!
//! All environment-level secrets and constants live in [`UploaderConfig`],
//! built via its [`UploaderConfigBuilder`]. The signer and upload client
//! receive the config at construction time; nothing below this module reads
//! the environment.

use crate::error::UploaderError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of images accepted from one drop in multi-image mode.
pub const DEFAULT_MAX_FILES: usize = 2;

/// Default per-file byte limit (5 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Default output edge length in pixels.
pub const DEFAULT_TARGET_EDGE: u32 = 800;

/// Environment variables read by [`UploaderConfigBuilder::from_env`].
pub const ENV_UPLOAD_URL: &str = "IMAGE_UPLOAD_URL";
pub const ENV_API_KEY: &str = "IMAGE_UPLOAD_API_KEY";
pub const ENV_UPLOAD_PRESET: &str = "IMAGE_UPLOAD_PRESET";
pub const ENV_API_SECRET: &str = "IMAGE_UPLOAD_API_SECRET";
pub const ENV_FOLDER: &str = "IMAGE_UPLOAD_FOLDER";
pub const ENV_MAX_FILES: &str = "IMAGE_UPLOAD_MAX_FILES";

/// Configuration for the signer, the upload client and the controller.
///
/// # Example
/// ```rust
/// use image_ingest::UploaderConfig;
///
/// let config = UploaderConfig::builder()
///     .upload_url("https://api.example.com/v1_1/demo/image/upload")
///     .api_key("1234")
///     .upload_preset("products")
///     .api_secret("s3cr3t")
///     .folder("catalog")
///     .build()
///     .unwrap();
/// assert_eq!(config.target_width, 800);
/// ```
#[derive(Clone)]
pub struct UploaderConfig {
    /// Remote upload endpoint (HTTP POST, multipart/form-data).
    pub upload_url: String,

    /// Public API key sent with every upload.
    pub api_key: String,

    /// Upload preset name; part of the signed string.
    pub upload_preset: String,

    /// Signing secret. Only ever appended to the signed string, never sent.
    pub api_secret: String,

    /// Destination folder on the remote side. Default: empty.
    pub folder: String,

    /// Maximum images accepted from one drop in multi-image mode. Default: 2.
    pub max_files: usize,

    /// Maximum size of a single dropped file in bytes. Default: 5 MiB.
    pub max_file_size: u64,

    /// Output width in pixels. Default: 800.
    pub target_width: u32,

    /// Output height in pixels. Default: 800.
    pub target_height: u32,

    /// How the input aspect ratio is reconciled with the target box.
    pub fit: FitPolicy,

    /// JPEG re-encode quality (1–100). Default: 90.
    pub jpeg_quality: u8,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            upload_url: String::new(),
            api_key: String::new(),
            upload_preset: String::new(),
            api_secret: String::new(),
            folder: String::new(),
            max_files: DEFAULT_MAX_FILES,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            target_width: DEFAULT_TARGET_EDGE,
            target_height: DEFAULT_TARGET_EDGE,
            fit: FitPolicy::default(),
            jpeg_quality: 90,
        }
    }
}

impl fmt::Debug for UploaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploaderConfig")
            .field("upload_url", &self.upload_url)
            .field("api_key", &"<redacted>")
            .field("upload_preset", &self.upload_preset)
            .field("api_secret", &"<redacted>")
            .field("folder", &self.folder)
            .field("max_files", &self.max_files)
            .field("max_file_size", &self.max_file_size)
            .field("target_width", &self.target_width)
            .field("target_height", &self.target_height)
            .field("fit", &self.fit)
            .field("jpeg_quality", &self.jpeg_quality)
            .finish()
    }
}

impl UploaderConfig {
    /// Create a new builder for `UploaderConfig`.
    pub fn builder() -> UploaderConfigBuilder {
        UploaderConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`UploaderConfig`].
#[derive(Debug)]
pub struct UploaderConfigBuilder {
    config: UploaderConfig,
}

impl UploaderConfigBuilder {
    /// Start from the environment.
    ///
    /// Endpoint, API key, preset and secret are required; folder and
    /// `max_files` are optional.
    pub fn from_env() -> Result<Self, UploaderError> {
        let mut builder = UploaderConfig::builder()
            .upload_url(required_env(ENV_UPLOAD_URL)?)
            .api_key(required_env(ENV_API_KEY)?)
            .upload_preset(required_env(ENV_UPLOAD_PRESET)?)
            .api_secret(required_env(ENV_API_SECRET)?);

        if let Some(folder) = optional_env(ENV_FOLDER) {
            builder = builder.folder(folder);
        }
        if let Some(raw) = optional_env(ENV_MAX_FILES) {
            let n = raw.trim().parse::<usize>().map_err(|_| {
                UploaderError::InvalidConfig(format!("{ENV_MAX_FILES} must be a number, got '{raw}'"))
            })?;
            builder = builder.max_files(n);
        }
        Ok(builder)
    }

    pub fn upload_url(mut self, url: impl Into<String>) -> Self {
        self.config.upload_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn upload_preset(mut self, preset: impl Into<String>) -> Self {
        self.config.upload_preset = preset.into();
        self
    }

    pub fn api_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.api_secret = secret.into();
        self
    }

    pub fn folder(mut self, folder: impl Into<String>) -> Self {
        self.config.folder = folder.into();
        self
    }

    pub fn max_files(mut self, n: usize) -> Self {
        self.config.max_files = n;
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn target_size(mut self, width: u32, height: u32) -> Self {
        self.config.target_width = width;
        self.config.target_height = height;
        self
    }

    pub fn fit(mut self, fit: FitPolicy) -> Self {
        self.config.fit = fit;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<UploaderConfig, UploaderError> {
        let c = &self.config;
        for (field, value) in [
            ("upload_url", &c.upload_url),
            ("api_key", &c.api_key),
            ("upload_preset", &c.upload_preset),
            ("api_secret", &c.api_secret),
        ] {
            if value.trim().is_empty() {
                return Err(UploaderError::InvalidConfig(format!("{field} must not be empty")));
            }
        }
        if !(c.upload_url.starts_with("https://") || c.upload_url.starts_with("http://")) {
            return Err(UploaderError::InvalidConfig(format!(
                "upload_url must be an HTTP/HTTPS URL, got '{}'",
                c.upload_url
            )));
        }
        if c.target_width == 0 || c.target_height == 0 {
            return Err(UploaderError::InvalidConfig(format!(
                "target size must be at least 1x1, got {}x{}",
                c.target_width, c.target_height
            )));
        }
        if c.max_files == 0 {
            return Err(UploaderError::InvalidConfig("max_files must be ≥ 1".into()));
        }
        if c.max_file_size == 0 {
            return Err(UploaderError::InvalidConfig("max_file_size must be ≥ 1".into()));
        }
        if !(1..=100).contains(&c.jpeg_quality) {
            return Err(UploaderError::InvalidConfig(format!(
                "jpeg_quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        Ok(self.config)
    }
}

fn required_env(name: &'static str) -> Result<String, UploaderError> {
    optional_env(name).ok_or(UploaderError::MissingEnv { name })
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How an input whose aspect ratio differs from the target is fitted.
///
/// The policy is fixed per configuration; it is never inferred from the
/// input. Either way the output is exactly `target_width × target_height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitPolicy {
    /// Scale each axis independently; the image may be distorted. (default)
    #[default]
    Stretch,
    /// Scale to cover the target box, then centre-crop the overflow.
    Cover,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> UploaderConfigBuilder {
        UploaderConfig::builder()
            .upload_url("https://upload.example.com/image/upload")
            .api_key("key")
            .upload_preset("preset")
            .api_secret("secret")
    }

    #[test]
    fn defaults() {
        let c = valid().build().unwrap();
        assert_eq!(c.max_files, 2);
        assert_eq!(c.max_file_size, 5_242_880);
        assert_eq!((c.target_width, c.target_height), (800, 800));
        assert_eq!(c.fit, FitPolicy::Stretch);
        assert_eq!(c.jpeg_quality, 90);
    }

    #[test]
    fn rejects_missing_secret() {
        let err = UploaderConfig::builder()
            .upload_url("https://upload.example.com")
            .api_key("key")
            .upload_preset("preset")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("api_secret"), "got: {err}");
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let err = valid().upload_url("ftp://example.com").build().unwrap_err();
        assert!(matches!(err, UploaderError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_zero_dimensions_and_limits() {
        assert!(valid().target_size(0, 800).build().is_err());
        assert!(valid().max_files(0).build().is_err());
        assert!(valid().max_file_size(0).build().is_err());
        assert!(valid().jpeg_quality(0).build().is_err());
        assert!(valid().jpeg_quality(101).build().is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let c = valid().build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret\""), "got: {dbg}");
        assert!(dbg.contains("<redacted>"));
    }

    /// The only test touching these variables, so no cross-test races.
    #[test]
    fn from_env_reads_required_and_optional_vars() {
        let vars = [
            (ENV_UPLOAD_URL, "https://upload.example.com/image/upload"),
            (ENV_API_KEY, "key"),
            (ENV_UPLOAD_PRESET, "preset"),
            (ENV_API_SECRET, "secret"),
            (ENV_FOLDER, "products"),
            (ENV_MAX_FILES, "4"),
        ];
        for (k, v) in vars {
            std::env::set_var(k, v);
        }
        let c = UploaderConfigBuilder::from_env().unwrap().build().unwrap();
        assert_eq!(c.folder, "products");
        assert_eq!(c.max_files, 4);

        std::env::set_var(ENV_MAX_FILES, "many");
        assert!(matches!(
            UploaderConfigBuilder::from_env(),
            Err(UploaderError::InvalidConfig(_))
        ));

        std::env::remove_var(ENV_API_SECRET);
        assert!(matches!(
            UploaderConfigBuilder::from_env(),
            Err(UploaderError::MissingEnv { name: ENV_API_SECRET })
        ));

        for (k, _) in vars {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn fit_policy_serde_names() {
        assert_eq!(serde_json::to_string(&FitPolicy::Cover).unwrap(), "\"cover\"");
    }
}
