//! Signed multipart upload of a normalised image.
//!
//! Each call captures its own timestamp (seconds since the epoch), derives
//! the `public_id` from the original filename, signs, and POSTs:
//!
//! ```text
//! file, upload_preset, api_key, timestamp, signature, folder, [public_id]
//! ```
//!
//! `public_id` is only sent when non-empty. The endpoint answers JSON with
//! `secure_url` on success or `error.message` on failure.
//!
//! ## No retries, no timeout
//!
//! A failed upload is reported once and left alone; a stalled connection
//! keeps that file unsettled for as long as the transport allows. Adding
//! either would change which URLs end up in the caller's state, so neither
//! is done here.

use crate::config::UploaderConfig;
use crate::error::{UploadError, UploaderError};
use crate::pipeline::resample::NormalizedImage;
use crate::pipeline::sign::{public_id_from_filename, Signer};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, warn};

/// A finished upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    /// Durable HTTPS URL of the stored image.
    pub secure_url: String,
    /// `public_id` sent with the upload (may be empty).
    pub public_id: String,
    /// Timestamp the upload was signed with.
    pub timestamp: i64,
}

/// Pushes one normalised image to remote storage.
///
/// The controller only talks to this trait, so batches can be driven
/// against an in-memory implementation in tests.
#[async_trait]
pub trait ImageUploader: Send + Sync {
    async fn upload(&self, image: &NormalizedImage, folder: &str) -> Result<UploadResult, UploadError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    error: Option<RemoteError>,
}

#[derive(Debug, Deserialize)]
struct RemoteError {
    message: String,
}

/// HTTP implementation of [`ImageUploader`].
#[derive(Clone)]
pub struct UploadClient {
    http: reqwest::Client,
    config: UploaderConfig,
}

impl fmt::Debug for UploadClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadClient")
            .field("endpoint", &self.config.upload_url)
            .finish()
    }
}

impl UploadClient {
    pub fn new(config: &UploaderConfig) -> Result<Self, UploaderError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| UploaderError::HttpClient(e.to_string()))?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    /// Text fields of the multipart body, in send order.
    pub fn upload_fields(&self, name: &str, folder: &str, timestamp: i64) -> Vec<(&'static str, String)> {
        let public_id = public_id_from_filename(name);
        let signature = Signer::for_folder(&self.config, folder).sign(&public_id, timestamp);

        let mut fields = vec![
            ("upload_preset", self.config.upload_preset.clone()),
            ("api_key", self.config.api_key.clone()),
            ("timestamp", timestamp.to_string()),
            ("signature", signature),
            ("folder", folder.to_string()),
        ];
        if !public_id.is_empty() {
            fields.push(("public_id", public_id));
        }
        fields
    }

    /// Upload with an explicit timestamp.
    pub async fn upload_at(
        &self,
        image: &NormalizedImage,
        folder: &str,
        timestamp: i64,
    ) -> Result<UploadResult, UploadError> {
        let start = Instant::now();
        let fields = self.upload_fields(&image.name, folder, timestamp);
        let public_id = fields
            .iter()
            .find(|(k, _)| *k == "public_id")
            .map(|(_, v)| v.clone())
            .unwrap_or_default();

        let file_part = Part::bytes(image.encoded.clone())
            .file_name(image.name.clone())
            .mime_str(&image.media_type)
            .map_err(|e| UploadError::Request {
                detail: format!("media type '{}': {e}", image.media_type),
            })?;
        let form = fields
            .into_iter()
            .fold(Form::new().part("file", file_part), |form, (k, v)| form.text(k, v));

        let response = self
            .http
            .post(&self.config.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Network {
                detail: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| UploadError::Network {
            detail: e.to_string(),
        })?;
        let parsed: Option<UploadResponse> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let message = parsed.and_then(|r| r.error).map(|e| e.message);
            warn!(
                "Upload of '{}' rejected: HTTP {} {:?}",
                image.name, status, message
            );
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed = parsed.ok_or_else(|| UploadError::InvalidResponse {
            detail: "response body is not JSON".to_string(),
        })?;
        if let Some(err) = parsed.error {
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                message: Some(err.message),
            });
        }
        let secure_url = parsed
            .secure_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| UploadError::InvalidResponse {
                detail: "response has no secure_url".to_string(),
            })?;

        debug!(
            "Uploaded '{}' → {} in {:?}",
            image.name,
            secure_url,
            start.elapsed()
        );

        Ok(UploadResult {
            secure_url,
            public_id,
            timestamp,
        })
    }
}

#[async_trait]
impl ImageUploader for UploadClient {
    async fn upload(&self, image: &NormalizedImage, folder: &str) -> Result<UploadResult, UploadError> {
        let timestamp = chrono::Utc::now().timestamp();
        self.upload_at(image, folder, timestamp).await
    }
}
