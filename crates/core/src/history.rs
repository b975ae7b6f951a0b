//! Persisted history of past requests.
//!
//! The serialized layout (camelCase, `queryType` tag) matches what earlier
//! releases wrote under the `analysisHistory` key, so existing histories load
//! unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisMode, AnalysisResult, ImageAnalysis, TextAnalysis};
use crate::location::Location;

/// Reconciliation state of a history item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Recorded offline, not yet sent.
    Pending,
    /// Analyzed; the item carries its result.
    Synced,
    /// A reconciliation attempt failed.
    Error,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match *self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}

/// History entry for a photo.
///
/// Status and result are private: constructors keep `result.is_some()`
/// equivalent to `status == Synced`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageHistoryItem {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    sync_status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<ImageAnalysis>,
    /// Self-contained data URL of the photo.
    pub image_preview: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl ImageHistoryItem {
    #[must_use]
    pub fn pending(id: String, image_preview: String, mime_type: String, location: Option<Location>) -> Self {
        Self {
            id,
            timestamp: Utc::now(),
            sync_status: SyncStatus::Pending,
            result: None,
            image_preview,
            mime_type,
            location,
        }
    }

    #[must_use]
    pub fn synced(
        id: String,
        image_preview: String,
        mime_type: String,
        location: Option<Location>,
        result: ImageAnalysis,
    ) -> Self {
        Self { sync_status: SyncStatus::Synced, result: Some(result), ..Self::pending(id, image_preview, mime_type, location) }
    }

    #[must_use]
    pub const fn sync_status(&self) -> SyncStatus {
        self.sync_status
    }

    #[must_use]
    pub const fn result(&self) -> Option<&ImageAnalysis> {
        self.result.as_ref()
    }

    /// Attaches a result, moving the item to `Synced`.
    #[must_use]
    pub fn into_synced(mut self, result: ImageAnalysis) -> Self {
        self.sync_status = SyncStatus::Synced;
        self.result = Some(result);
        self
    }
}

/// History entry for a free-text question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextHistoryItem {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    sync_status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<TextAnalysis>,
    /// The question exactly as the user typed it.
    pub original_query: String,
}

impl TextHistoryItem {
    #[must_use]
    pub fn pending(id: String, original_query: String) -> Self {
        Self { id, timestamp: Utc::now(), sync_status: SyncStatus::Pending, result: None, original_query }
    }

    #[must_use]
    pub fn synced(id: String, original_query: String, result: TextAnalysis) -> Self {
        Self { sync_status: SyncStatus::Synced, result: Some(result), ..Self::pending(id, original_query) }
    }

    #[must_use]
    pub const fn sync_status(&self) -> SyncStatus {
        self.sync_status
    }

    #[must_use]
    pub const fn result(&self) -> Option<&TextAnalysis> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn into_synced(mut self, result: TextAnalysis) -> Self {
        self.sync_status = SyncStatus::Synced;
        self.result = Some(result);
        self
    }
}

/// One past request and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "queryType", rename_all = "lowercase")]
pub enum HistoryItem {
    Image(ImageHistoryItem),
    Text(TextHistoryItem),
}

impl HistoryItem {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Image(item) => &item.id,
            Self::Text(item) => &item.id,
        }
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Image(item) => item.timestamp,
            Self::Text(item) => item.timestamp,
        }
    }

    #[must_use]
    pub const fn sync_status(&self) -> SyncStatus {
        match self {
            Self::Image(item) => item.sync_status,
            Self::Text(item) => item.sync_status,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> AnalysisMode {
        match *self {
            Self::Image(_) => AnalysisMode::Image,
            Self::Text(_) => AnalysisMode::Text,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.sync_status() == SyncStatus::Pending
    }

    /// The stored result as an `AnalysisResult`, present only when synced.
    #[must_use]
    pub fn result(&self) -> Option<AnalysisResult> {
        match self {
            Self::Image(item) => item.result.clone().map(AnalysisResult::Image),
            Self::Text(item) => item.result.clone().map(AnalysisResult::Text),
        }
    }

    /// Cache key of the stored input: preview for images, trimmed query for text.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        match self {
            Self::Image(item) => &item.image_preview,
            Self::Text(item) => item.original_query.trim(),
        }
    }

    /// Drops any result and marks the item as failed.
    #[must_use]
    pub fn into_error(mut self) -> Self {
        self.set_status(SyncStatus::Error);
        self.clear_result();
        self
    }

    /// Restores the result-iff-synced invariant on data read from storage.
    ///
    /// Returns `true` when the item had to be repaired.
    pub fn normalize(&mut self) -> bool {
        let has_result = match self {
            Self::Image(item) => item.result.is_some(),
            Self::Text(item) => item.result.is_some(),
        };
        match (self.sync_status(), has_result) {
            (SyncStatus::Synced, false) => {
                self.set_status(SyncStatus::Error);
                true
            },
            (SyncStatus::Pending | SyncStatus::Error, true) => {
                self.clear_result();
                true
            },
            _ => false,
        }
    }

    fn set_status(&mut self, status: SyncStatus) {
        match self {
            Self::Image(item) => item.sync_status = status,
            Self::Text(item) => item.sync_status = status,
        }
    }

    fn clear_result(&mut self) {
        match self {
            Self::Image(item) => item.result = None,
            Self::Text(item) => item.result = None,
        }
    }
}

impl From<ImageHistoryItem> for HistoryItem {
    fn from(item: ImageHistoryItem) -> Self {
        Self::Image(item)
    }
}

impl From<TextHistoryItem> for HistoryItem {
    fn from(item: TextHistoryItem) -> Self {
        Self::Text(item)
    }
}
