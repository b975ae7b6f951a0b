//! Session-scoped memoization of analysis results.

use std::collections::HashMap;

use tokio::sync::RwLock;
use wastewise_core::AnalysisResult;

/// Maps a request fingerprint to its result.
///
/// Unbounded and never evicts; lives as long as the session that owns it.
/// Later writes for the same fingerprint win.
#[derive(Debug, Default)]
pub struct AnalysisCache {
    entries: RwLock<HashMap<String, AnalysisResult>>,
}

impl AnalysisCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, fingerprint: &str) -> Option<AnalysisResult> {
        self.entries.read().await.get(fingerprint).cloned()
    }

    pub async fn set(&self, fingerprint: String, result: AnalysisResult) {
        self.entries.write().await.insert(fingerprint, result);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
