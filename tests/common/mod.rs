//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};
use image_ingest::{
    public_id_from_filename, ImageUploader, IncomingFile, NormalizedImage, NotificationKind,
    NotificationSink, PreviewRegistry, UploadError, UploadResult, UploaderConfig,
};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Route library logs through the test harness; `RUST_LOG=debug` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn config(max_files: usize) -> UploaderConfig {
    UploaderConfig::builder()
        .upload_url("https://upload.invalid/v1_1/demo/image/upload")
        .api_key("123456")
        .upload_preset("shop_preset")
        .api_secret("topsecret")
        .folder("products")
        .max_files(max_files)
        .target_size(64, 64)
        .build()
        .expect("valid test config")
}

/// Encoded test image with a simple gradient.
pub fn image_bytes(w: u32, h: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbaImage::from_fn(w, h, |x, y| {
        Rgba([(x * 5 % 256) as u8, (y * 3 % 256) as u8, 90, 255])
    });
    let mut buf = Vec::new();
    match format {
        ImageFormat::Jpeg => image::DynamicImage::ImageRgba8(img)
            .to_rgb8()
            .write_to(&mut Cursor::new(&mut buf), format)
            .expect("encode fixture"),
        _ => img
            .write_to(&mut Cursor::new(&mut buf), format)
            .expect("encode fixture"),
    }
    buf
}

pub fn png(name: &str) -> IncomingFile {
    IncomingFile::new(name, "image/png", image_bytes(120, 80, ImageFormat::Png))
}

pub fn jpeg(name: &str) -> IncomingFile {
    IncomingFile::new(name, "image/jpeg", image_bytes(90, 160, ImageFormat::Jpeg))
}

// ── Notifications ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<(NotificationKind, String)>>,
}

impl RecordingNotifier {
    pub fn all(&self) -> Vec<(NotificationKind, String)> {
        self.seen.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.of_kind(NotificationKind::Error)
    }

    pub fn successes(&self) -> Vec<String> {
        self.of_kind(NotificationKind::Success)
    }

    fn of_kind(&self, kind: NotificationKind) -> Vec<String> {
        self.all()
            .into_iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, m)| m)
            .collect()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        self.seen.lock().unwrap().push((kind, message.to_string()));
    }
}

// ── Previews ─────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct CountingPreviews {
    next: AtomicUsize,
    created: Mutex<Vec<String>>,
    revoked: Mutex<Vec<String>>,
}

impl CountingPreviews {
    pub fn created(&self) -> Vec<String> {
        let mut v = self.created.lock().unwrap().clone();
        v.sort();
        v
    }

    pub fn revoked(&self) -> Vec<String> {
        let mut v = self.revoked.lock().unwrap().clone();
        v.sort();
        v
    }

    /// Every created preview was revoked exactly once.
    pub fn assert_balanced(&self) {
        assert_eq!(self.created(), self.revoked(), "created vs revoked previews");
    }
}

impl PreviewRegistry for CountingPreviews {
    fn create(&self, _bytes: &[u8], _media_type: &str, name: &str) -> std::io::Result<String> {
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        let url = format!("blob:preview/{id}/{name}");
        self.created.lock().unwrap().push(url.clone());
        Ok(url)
    }

    fn revoke(&self, url: &str) {
        self.revoked.lock().unwrap().push(url.to_string());
    }
}

// ── Uploads ──────────────────────────────────────────────────────────────

/// Per-file scripted behaviour.
#[derive(Clone)]
pub enum Script {
    Ok { delay_ms: u64 },
    Fail { delay_ms: u64, error: UploadError },
    Stall,
}

/// Uploader that follows a script keyed by filename. Unscripted files
/// succeed immediately.
#[derive(Default)]
pub struct ScriptedUploader {
    script: HashMap<String, Script>,
    started: AtomicUsize,
}

impl ScriptedUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, script: Script) -> Self {
        self.script.insert(name.to_string(), script);
        self
    }

    pub fn calls(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn url_for(folder: &str, name: &str) -> String {
        format!(
            "https://res.example.com/demo/image/upload/{folder}/{}",
            public_id_from_filename(name)
        )
    }
}

#[async_trait]
impl ImageUploader for ScriptedUploader {
    async fn upload(&self, image: &NormalizedImage, folder: &str) -> Result<UploadResult, UploadError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let script = self
            .script
            .get(&image.name)
            .cloned()
            .unwrap_or(Script::Ok { delay_ms: 0 });

        match script {
            Script::Ok { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(UploadResult {
                    secure_url: Self::url_for(folder, &image.name),
                    public_id: public_id_from_filename(&image.name),
                    timestamp: 0,
                })
            }
            Script::Fail { delay_ms, error } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Err(error)
            }
            Script::Stall => futures::future::pending().await,
        }
    }
}
