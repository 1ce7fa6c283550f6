//! Upload signatures.
//!
//! The remote verifier recomputes SHA-256 over
//! `folder=<F>&public_id=<id>&timestamp=<ts>&upload_preset=<P><secret>` and
//! compares hex digests. The field order is fixed; reordering it invalidates
//! every upload.

use crate::config::UploaderConfig;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// The canonical parameter set covered by a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignaturePayload {
    pub folder: String,
    pub public_id: String,
    pub timestamp: i64,
    pub upload_preset: String,
}

impl SignaturePayload {
    /// `folder=…&public_id=…&timestamp=…&upload_preset=…`, without the secret.
    pub fn canonical_string(&self) -> String {
        format!(
            "folder={}&public_id={}&timestamp={}&upload_preset={}",
            self.folder, self.public_id, self.timestamp, self.upload_preset
        )
    }
}

/// Signs uploads for one destination folder.
#[derive(Clone)]
pub struct Signer {
    folder: String,
    upload_preset: String,
    secret: String,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("folder", &self.folder)
            .field("upload_preset", &self.upload_preset)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl Signer {
    pub fn new(
        folder: impl Into<String>,
        upload_preset: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            folder: folder.into(),
            upload_preset: upload_preset.into(),
            secret: secret.into(),
        }
    }

    /// Signer for `folder` using the preset and secret from `config`.
    pub fn for_folder(config: &UploaderConfig, folder: impl Into<String>) -> Self {
        Self::new(folder, config.upload_preset.clone(), config.api_secret.clone())
    }

    pub fn payload(&self, public_id: &str, timestamp: i64) -> SignaturePayload {
        SignaturePayload {
            folder: self.folder.clone(),
            public_id: public_id.to_string(),
            timestamp,
            upload_preset: self.upload_preset.clone(),
        }
    }

    /// Lower-case hex SHA-256 of the canonical string followed by the secret.
    pub fn sign(&self, public_id: &str, timestamp: i64) -> String {
        self.sign_payload(&self.payload(public_id, timestamp))
    }

    pub fn sign_payload(&self, payload: &SignaturePayload) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload.canonical_string().as_bytes());
        hasher.update(self.secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Derive the remote `public_id` from a filename: strip all whitespace,
/// then drop everything from the last `.` on. Names without a `.` are used
/// whole.
pub fn public_id_from_filename(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| !c.is_whitespace()).collect();
    match cleaned.rfind('.') {
        Some(dot) => cleaned[..dot].to_string(),
        None => cleaned,
    }
}
