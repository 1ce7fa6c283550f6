//! User-visible notifications emitted by the ingestion pipeline.
//!
//! Inject an [`Arc<dyn NotificationSink>`] via
//! [`crate::controller::IngestionControllerBuilder::notifier`] to receive
//! every success and error message the pipeline wants to show the user.
//! Delivery is fire-and-forget: the pipeline never waits for, or reads back,
//! anything from the sink.
//!
//! # Example
//!
//! ```rust
//! use image_ingest::{NotificationKind, NotificationSink};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct Toasts(Mutex<Vec<String>>);
//!
//! impl NotificationSink for Toasts {
//!     fn notify(&self, kind: NotificationKind, message: &str) {
//!         if let Ok(mut list) = self.0.lock() {
//!             list.push(format!("{kind}: {message}"));
//!         }
//!     }
//! }
//!
//! let toasts = Toasts::default();
//! toasts.success("Image Uploaded successfully!");
//! assert_eq!(toasts.0.lock().unwrap().len(), 1);
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Success notification for a finished upload.
pub const UPLOAD_SUCCESS_MESSAGE: &str = "Image Uploaded successfully!";

/// Notification emitted by `remove_image`.
pub const DELETE_MESSAGE: &str = "Image deleted successfully!";

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Success => f.write_str("success"),
            NotificationKind::Error => f.write_str("error"),
        }
    }
}

/// Receives user-visible notifications.
///
/// Implementations must be `Send + Sync`: uploads inside a batch settle
/// concurrently and each one notifies on its own.
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification.
    fn notify(&self, kind: NotificationKind, message: &str);

    fn success(&self, message: &str) {
        self.notify(NotificationKind::Success, message);
    }

    fn error(&self, message: &str) {
        self.notify(NotificationKind::Error, message);
    }
}

/// Forwards notifications to `tracing`. This is the default sink.
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        match kind {
            NotificationKind::Success => info!(target: "image_ingest::notify", "{message}"),
            NotificationKind::Error => warn!(target: "image_ingest::notify", "{message}"),
        }
    }
}

/// Convenience alias matching the type stored in the controller.
pub type Notifier = Arc<dyn NotificationSink>;
