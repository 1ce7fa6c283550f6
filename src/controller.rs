//! Ingestion controller: drop → validate → resample → sign+upload → reconcile.
//!
//! ```text
//! Idle ─▶ Validating ─▶ Resampling ─▶ Uploading ─▶ Reconciling ─▶ Idle
//!            │               │
//!            └─ refused      └─ nothing accepted
//! ```
//!
//! Every stage fans out over the batch and waits for all members to settle
//! before the next stage starts. A failing member never cancels its
//! siblings. Batches are independent: a second drop while one is in flight
//! runs alongside it and both merge into the URL state in completion order.
//!
//! Nothing here returns an error for a batch. Refusals and per-file failures
//! become notifications and entries in the [`BatchReport`].

use crate::config::UploaderConfig;
use crate::error::{FileError, StateInvariantError, UploadError, UploaderError, ValidationError};
use crate::notify::{Notifier, TracingNotifier, DELETE_MESSAGE, UPLOAD_SUCCESS_MESSAGE};
use crate::pipeline::input::{self, IncomingFile};
use crate::pipeline::resample::{NormalizedImage, Resampler};
use crate::pipeline::upload::{ImageUploader, UploadClient, UploadResult};
use crate::preview::{PreviewRegistry, TempDirPreviews};
use crate::state::{ImageUrls, UploadMode};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

// ── Drop source types ────────────────────────────────────────────────────

/// Reason code attached to a file the drop source refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RejectionCode {
    TooManyFiles,
    FileInvalidType,
    FileTooLarge,
    FileTooSmall,
    Other(String),
}

impl RejectionCode {
    /// Parse a drop-zone style code (`too-many-files`, `file-too-large`, …).
    pub fn parse(code: &str) -> Self {
        match code {
            "too-many-files" => RejectionCode::TooManyFiles,
            "file-invalid-type" => RejectionCode::FileInvalidType,
            "file-too-large" => RejectionCode::FileTooLarge,
            "file-too-small" => RejectionCode::FileTooSmall,
            other => RejectionCode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RejectionCode::TooManyFiles => "too-many-files",
            RejectionCode::FileInvalidType => "file-invalid-type",
            RejectionCode::FileTooLarge => "file-too-large",
            RejectionCode::FileTooSmall => "file-too-small",
            RejectionCode::Other(code) => code,
        }
    }
}

impl fmt::Display for RejectionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reason the drop source gave for refusing a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectionReason {
    pub code: RejectionCode,
    /// Message supplied by the drop source; may be empty.
    pub message: String,
}

/// A file the drop source refused, with every reason it gave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRejection {
    pub name: String,
    pub reasons: Vec<RejectionReason>,
}

impl FileRejection {
    pub fn new(name: impl Into<String>, code: RejectionCode) -> Self {
        Self {
            name: name.into(),
            reasons: vec![RejectionReason {
                code,
                message: String::new(),
            }],
        }
    }
}

/// Everything a single drop hands to the controller.
#[derive(Debug, Clone, Default)]
pub struct DropEvent {
    pub accepted: Vec<IncomingFile>,
    pub rejected: Vec<FileRejection>,
}

impl DropEvent {
    pub fn new(accepted: Vec<IncomingFile>) -> Self {
        Self {
            accepted,
            rejected: Vec::new(),
        }
    }

    pub fn with_rejection(mut self, rejection: FileRejection) -> Self {
        self.rejected.push(rejection);
        self
    }

    pub fn len(&self) -> usize {
        self.accepted.len() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Batch report ─────────────────────────────────────────────────────────

/// Where a batch ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "violations")]
pub enum BatchOutcome {
    /// Validation refused the batch; nothing was resampled or uploaded.
    Rejected(Vec<ValidationError>),
    /// The drop carried no files.
    Empty,
    /// Every accepted file was attempted (some may have failed).
    Completed,
}

/// What happened to one batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub outcome: BatchOutcome,
    /// URLs the endpoint returned for this batch, in completion order.
    ///
    /// Lists every successful upload, including URLs the state already held
    /// and therefore did not gain again; read [`IngestionController::urls`]
    /// for what was actually merged.
    pub uploaded: Vec<String>,
    /// Per-file failures (decode, encode, preview, upload).
    pub failures: Vec<FileError>,
    /// Previews created (and, by the time this report exists, revoked).
    pub previews_created: usize,
    pub duration_ms: u64,
}

impl BatchReport {
    fn finished(outcome: BatchOutcome, start: Instant) -> Self {
        Self {
            outcome,
            uploaded: Vec::new(),
            failures: Vec::new(),
            previews_created: 0,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Whether every dropped file ended up uploaded.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Completed) && self.failures.is_empty()
    }
}

/// Stage of a batch, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchPhase {
    Validating,
    Resampling,
    Uploading,
    Reconciling,
    Idle,
}

// ── Controller ───────────────────────────────────────────────────────────

/// Drives ingestion batches and owns the URL state.
pub struct IngestionController {
    config: UploaderConfig,
    resampler: Resampler,
    uploader: Arc<dyn ImageUploader>,
    notifier: Notifier,
    urls: watch::Sender<ImageUrls>,
}

impl fmt::Debug for IngestionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionController")
            .field("config", &self.config)
            .field("urls", &*self.urls.borrow())
            .finish()
    }
}

impl IngestionController {
    pub fn builder(config: UploaderConfig) -> IngestionControllerBuilder {
        IngestionControllerBuilder {
            config,
            urls: ImageUrls::empty(UploadMode::Single),
            uploader: None,
            notifier: None,
            previews: None,
        }
    }

    pub fn mode(&self) -> UploadMode {
        self.urls.borrow().mode()
    }

    /// Files accepted from one drop: `max_files` in multi mode, one otherwise.
    pub fn max_files(&self) -> usize {
        match self.mode() {
            UploadMode::Multi => self.config.max_files,
            UploadMode::Single => 1,
        }
    }

    /// Snapshot of the current URL state.
    pub fn urls(&self) -> ImageUrls {
        self.urls.borrow().clone()
    }

    /// Observe every change to the URL state.
    pub fn subscribe(&self) -> watch::Receiver<ImageUrls> {
        self.urls.subscribe()
    }

    /// Run one batch to completion.
    pub async fn ingest(&self, event: DropEvent) -> BatchReport {
        let start = Instant::now();
        info!("Ingesting drop of {} file(s)", event.len());

        // ── Validating ───────────────────────────────────────────────────
        enter(BatchPhase::Validating);
        let violations = self.validate(&event);
        if !violations.is_empty() {
            for v in &violations {
                self.notifier.error(&v.to_string());
            }
            warn!("Batch refused: {} violation(s)", violations.len());
            enter(BatchPhase::Idle);
            return BatchReport::finished(BatchOutcome::Rejected(violations), start);
        }
        if event.accepted.is_empty() {
            enter(BatchPhase::Idle);
            return BatchReport::finished(BatchOutcome::Empty, start);
        }

        // ── Resampling ───────────────────────────────────────────────────
        enter(BatchPhase::Resampling);
        let mut failures = Vec::new();
        let pending = self.resample_all(event.accepted, &mut failures).await;
        let previews_created = pending.len();

        // ── Signing + Uploading ──────────────────────────────────────────
        enter(BatchPhase::Uploading);
        let settled = self.upload_all(pending).await;

        // ── Reconciling ──────────────────────────────────────────────────
        enter(BatchPhase::Reconciling);
        let mut uploaded = Vec::new();
        for (image, result) in settled {
            let name = image.name.clone();
            image.release();
            match result {
                Ok(r) => uploaded.push(r.secure_url),
                Err(error) => failures.push(FileError::Upload { name, error }),
            }
        }
        self.urls.send_if_modified(|state| state.merge(&uploaded));

        enter(BatchPhase::Idle);
        let report = BatchReport {
            outcome: BatchOutcome::Completed,
            uploaded,
            failures,
            previews_created,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Batch complete: {} uploaded, {} failed, {}ms",
            report.uploaded.len(),
            report.failures.len(),
            report.duration_ms
        );
        report
    }

    /// Remove `target` from the URL state by exact match.
    ///
    /// Absent or empty targets leave the state untouched and return the
    /// reason; nothing is notified in that case.
    pub fn remove_image(&self, target: &str) -> Result<(), StateInvariantError> {
        let mut outcome = Ok(());
        self.urls.send_if_modified(|state| match state.remove(target) {
            Ok(()) => true,
            Err(e) => {
                outcome = Err(e);
                false
            }
        });
        match &outcome {
            Ok(()) => {
                info!("Removed image {}", target);
                self.notifier.success(DELETE_MESSAGE);
            }
            Err(e) => debug!("remove_image ignored: {}", e),
        }
        outcome
    }

    fn validate(&self, event: &DropEvent) -> Vec<ValidationError> {
        let mut violations = Vec::new();
        let limit = self.max_files();

        let source_says_too_many = event
            .rejected
            .iter()
            .flat_map(|r| &r.reasons)
            .any(|r| r.code == RejectionCode::TooManyFiles);
        if event.len() > limit || source_says_too_many {
            violations.push(ValidationError::TooManyFiles { limit });
        }

        for rejection in &event.rejected {
            for reason in &rejection.reasons {
                if reason.code == RejectionCode::TooManyFiles {
                    continue;
                }
                violations.push(ValidationError::Rejected {
                    name: rejection.name.clone(),
                    message: self.rejection_message(reason),
                });
            }
        }

        for file in &event.accepted {
            if file.size() > self.config.max_file_size {
                violations.push(ValidationError::TooLarge {
                    name: file.name.clone(),
                    size: file.size(),
                    max: self.config.max_file_size,
                });
            }
            if !input::is_accepted(&file.media_type) {
                violations.push(ValidationError::UnsupportedType {
                    name: file.name.clone(),
                    media_type: file.media_type.clone(),
                });
            }
        }
        violations
    }

    fn rejection_message(&self, reason: &RejectionReason) -> String {
        if !reason.message.is_empty() {
            return reason.message.clone();
        }
        match &reason.code {
            RejectionCode::FileInvalidType => {
                "File type must be image/jpeg, image/png or image/webp".to_string()
            }
            RejectionCode::FileTooLarge => {
                format!("File is larger than {} bytes", self.config.max_file_size)
            }
            RejectionCode::FileTooSmall => "File is too small".to_string(),
            RejectionCode::TooManyFiles => format!("Maximum {} images can be uploaded!", self.max_files()),
            RejectionCode::Other(code) => code.clone(),
        }
    }

    async fn resample_all(
        &self,
        files: Vec<IncomingFile>,
        failures: &mut Vec<FileError>,
    ) -> Vec<NormalizedImage> {
        let (width, height) = (self.config.target_width, self.config.target_height);
        let fan_out = files.len().max(1);

        let results: Vec<Result<NormalizedImage, FileError>> = stream::iter(
            files
                .into_iter()
                .map(|file| self.resampler.resize(file, width, height)),
        )
        .buffer_unordered(fan_out)
        .collect()
        .await;

        let mut pending = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(image) => pending.push(image),
                Err(e) => {
                    warn!("Dropping file from batch: {}", e);
                    self.notifier.error(&e.to_string());
                    failures.push(e);
                }
            }
        }
        pending
    }

    async fn upload_all(
        &self,
        pending: Vec<NormalizedImage>,
    ) -> Vec<(NormalizedImage, Result<UploadResult, UploadError>)> {
        let folder = self.config.folder.as_str();
        let fan_out = pending.len().max(1);

        stream::iter(pending.into_iter().map(move |image| async move {
            let result = self.uploader.upload(&image, folder).await;
            match &result {
                Ok(r) => {
                    debug!("'{}' uploaded as {}", image.name, r.secure_url);
                    self.notifier.success(UPLOAD_SUCCESS_MESSAGE);
                }
                Err(e) => {
                    warn!("Upload of '{}' failed: {}", image.name, e);
                    self.notifier.error(&e.user_message());
                }
            }
            (image, result)
        }))
        .buffer_unordered(fan_out)
        .collect()
        .await
    }
}

fn enter(phase: BatchPhase) {
    debug!("Batch phase → {:?}", phase);
}

/// Builder for [`IngestionController`].
pub struct IngestionControllerBuilder {
    config: UploaderConfig,
    urls: ImageUrls,
    uploader: Option<Arc<dyn ImageUploader>>,
    notifier: Option<Notifier>,
    previews: Option<Arc<dyn PreviewRegistry>>,
}

impl IngestionControllerBuilder {
    /// Start with an empty state in `mode`.
    pub fn mode(mut self, mode: UploadMode) -> Self {
        self.urls = ImageUrls::empty(mode);
        self
    }

    /// Start from existing URLs; the mode follows their shape.
    pub fn initial_urls(mut self, urls: ImageUrls) -> Self {
        self.urls = urls;
        self
    }

    /// Replace the HTTP upload client.
    pub fn uploader(mut self, uploader: Arc<dyn ImageUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn previews(mut self, previews: Arc<dyn PreviewRegistry>) -> Self {
        self.previews = Some(previews);
        self
    }

    pub fn build(self) -> Result<IngestionController, UploaderError> {
        let uploader = match self.uploader {
            Some(u) => u,
            None => Arc::new(UploadClient::new(&self.config)?),
        };
        let previews = match self.previews {
            Some(p) => p,
            None => Arc::new(TempDirPreviews::new()?),
        };
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier));
        let resampler = Resampler::new(self.config.fit, self.config.jpeg_quality, previews);

        Ok(IngestionController {
            config: self.config,
            resampler,
            uploader,
            notifier,
            urls: watch::Sender::new(self.urls),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_codes_round_trip_text() {
        for code in ["too-many-files", "file-invalid-type", "file-too-large", "file-too-small", "weird"] {
            assert_eq!(RejectionCode::parse(code).as_str(), code);
        }
        assert_eq!(RejectionCode::parse("weird"), RejectionCode::Other("weird".into()));
    }

    #[test]
    fn drop_event_len_counts_rejected() {
        let drop = DropEvent::new(vec![IncomingFile::new("a.png", "image/png", vec![1])])
            .with_rejection(FileRejection::new("b.gif", RejectionCode::FileInvalidType));
        assert_eq!(drop.len(), 2);
        assert!(!drop.is_empty());
        assert!(DropEvent::default().is_empty());
    }

    #[test]
    fn report_success_requires_no_failures() {
        let mut report = BatchReport::finished(BatchOutcome::Completed, Instant::now());
        assert!(report.is_success());
        report.failures.push(FileError::Decode {
            name: "x".into(),
            detail: "y".into(),
        });
        assert!(!report.is_success());
        assert!(!BatchReport::finished(BatchOutcome::Empty, Instant::now()).is_success());
    }

    #[test]
    fn outcome_serializes_with_kind_tag() {
        let json = serde_json::to_value(BatchOutcome::Rejected(vec![ValidationError::TooManyFiles {
            limit: 2,
        }]))
        .unwrap();
        assert_eq!(json["kind"], "rejected");
    }
}
