//! Caller-visible URL state.
//!
//! A product form keeps an ordered list of image URLs; every other form keeps
//! at most one. The controller is the only writer: reconciliation appends or
//! replaces, removal filters or clears.

use crate::error::StateInvariantError;
use serde::{Deserialize, Serialize};

/// Single-image or multi-image (product) mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    Single,
    Multi,
}

/// The uploaded image URLs, shaped by mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageUrls {
    Single(Option<String>),
    Multi(Vec<String>),
}

impl ImageUrls {
    /// Empty state for `mode`.
    pub fn empty(mode: UploadMode) -> Self {
        match mode {
            UploadMode::Single => ImageUrls::Single(None),
            UploadMode::Multi => ImageUrls::Multi(Vec::new()),
        }
    }

    pub fn mode(&self) -> UploadMode {
        match self {
            ImageUrls::Single(_) => UploadMode::Single,
            ImageUrls::Multi(_) => UploadMode::Multi,
        }
    }

    /// All URLs in display order.
    pub fn urls(&self) -> Vec<&str> {
        match self {
            ImageUrls::Single(url) => url.as_deref().into_iter().collect(),
            ImageUrls::Multi(urls) => urls.iter().map(String::as_str).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ImageUrls::Single(url) => usize::from(url.is_some()),
            ImageUrls::Multi(urls) => urls.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, url: &str) -> bool {
        match self {
            ImageUrls::Single(current) => current.as_deref() == Some(url),
            ImageUrls::Multi(urls) => urls.iter().any(|u| u == url),
        }
    }

    /// Merge one batch of uploaded URLs, given in completion order.
    ///
    /// Multi: appends every URL not already present. Single: the first
    /// non-empty URL replaces the current one. Empty URLs are ignored.
    /// Returns whether the state changed.
    pub(crate) fn merge(&mut self, batch: &[String]) -> bool {
        let mut changed = false;
        match self {
            ImageUrls::Multi(urls) => {
                for url in batch.iter().filter(|u| !u.is_empty()) {
                    if !urls.contains(url) {
                        urls.push(url.clone());
                        changed = true;
                    }
                }
            }
            ImageUrls::Single(current) => {
                if let Some(url) = batch.iter().find(|u| !u.is_empty()) {
                    changed = current.as_deref() != Some(url.as_str());
                    *current = Some(url.clone());
                }
            }
        }
        changed
    }

    /// Remove `target` by exact match. Leaves the state untouched on error.
    pub(crate) fn remove(&mut self, target: &str) -> Result<(), StateInvariantError> {
        if target.is_empty() {
            return Err(StateInvariantError::EmptyUrl);
        }
        if !self.contains(target) {
            return Err(StateInvariantError::NotPresent {
                url: target.to_string(),
            });
        }
        match self {
            ImageUrls::Multi(urls) => urls.retain(|u| u != target),
            ImageUrls::Single(current) => *current = None,
        }
        Ok(())
    }
}
