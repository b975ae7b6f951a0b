//! Ordered, persisted log of past requests (newest first).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use wastewise_core::{HISTORY_STORAGE_KEY, HistoryItem};

use crate::error::StorageError;
use crate::traits::KeyValueStore;

/// Outcome of merging a reconciled snapshot into the live history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Entries overwritten by their reconciled version.
    pub updated: usize,
    /// Entries present in the live history but not in the snapshot.
    pub retained: usize,
    /// Snapshot entries whose id no longer exists (history was cleared).
    pub dropped: usize,
}

/// The history sequence plus its persistent mirror.
///
/// Every mutation writes the complete sequence under `analysisHistory` while
/// the write lock is held, so snapshots reach the store in mutation order.
/// The in-memory sequence is updated even when persisting fails.
pub struct HistoryStore {
    kv: Arc<dyn KeyValueStore>,
    items: RwLock<Vec<HistoryItem>>,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore").finish_non_exhaustive()
    }
}

impl HistoryStore {
    /// Loads the persisted history.
    ///
    /// Unreadable data starts an empty history rather than failing; items that
    /// break the result-iff-synced invariant are repaired.
    ///
    /// # Errors
    /// Returns an error only if the store itself cannot be read.
    pub async fn load(kv: Arc<dyn KeyValueStore>) -> Result<Self, StorageError> {
        let items = match kv.get(HISTORY_STORAGE_KEY).await? {
            None => Vec::new(),
            Some(value) => match serde_json::from_value::<Vec<HistoryItem>>(value) {
                Ok(mut items) => {
                    let repaired = items.iter_mut().map(HistoryItem::normalize).filter(|r| *r).count();
                    if repaired > 0 {
                        tracing::warn!(repaired, "Repaired history items with inconsistent status");
                    }
                    items
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Stored history is unreadable, starting empty");
                    Vec::new()
                },
            },
        };
        tracing::debug!(count = items.len(), "History loaded");
        Ok(Self { kv, items: RwLock::new(items) })
    }

    /// Copy of the whole sequence, newest first.
    pub async fn snapshot(&self) -> Vec<HistoryItem> {
        self.items.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    pub async fn get(&self, id: &str) -> Option<HistoryItem> {
        self.items.read().await.iter().find(|item| item.id() == id).cloned()
    }

    pub async fn pending_count(&self) -> usize {
        self.items.read().await.iter().filter(|item| item.is_pending()).count()
    }

    /// Prepends `item`.
    ///
    /// # Errors
    /// Returns an error if the snapshot could not be persisted.
    pub async fn append(&self, item: HistoryItem) -> Result<(), StorageError> {
        let mut items = self.items.write().await;
        tracing::debug!(item_id = %item.id(), status = item.sync_status().as_str(), "History append");
        items.insert(0, item);
        self.persist(&items).await
    }

    /// Swaps the whole sequence.
    ///
    /// # Errors
    /// Returns an error if the snapshot could not be persisted.
    pub async fn replace(&self, replacement: Vec<HistoryItem>) -> Result<(), StorageError> {
        let mut items = self.items.write().await;
        *items = replacement;
        self.persist(&items).await
    }

    /// Applies a reconciled snapshot by id in a single write.
    ///
    /// Entries appended after the snapshot was taken keep their place, and
    /// entries removed since are not brought back.
    ///
    /// # Errors
    /// Returns an error if the merged sequence could not be persisted.
    pub async fn merge_by_id(&self, reconciled: Vec<HistoryItem>) -> Result<MergeStats, StorageError> {
        let mut by_id: HashMap<String, HistoryItem> =
            reconciled.into_iter().map(|item| (item.id().to_owned(), item)).collect();
        let mut items = self.items.write().await;
        let mut stats = MergeStats::default();
        for slot in items.iter_mut() {
            match by_id.remove(slot.id()) {
                Some(updated) => {
                    *slot = updated;
                    stats.updated += 1;
                },
                None => stats.retained += 1,
            }
        }
        stats.dropped = by_id.len();
        if stats.dropped > 0 {
            tracing::debug!(dropped = stats.dropped, "Reconciled items no longer in history");
        }
        self.persist(&items).await?;
        Ok(stats)
    }

    /// Empties the history.
    ///
    /// # Errors
    /// Returns an error if the empty sequence could not be persisted.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let mut items = self.items.write().await;
        items.clear();
        self.persist(&items).await
    }

    async fn persist(&self, items: &[HistoryItem]) -> Result<(), StorageError> {
        let value: Value = serde_json::to_value(items)
            .map_err(|e| StorageError::corrupt(HISTORY_STORAGE_KEY, e))?;
        self.kv.set(HISTORY_STORAGE_KEY, &value).await.inspect_err(|e| {
            tracing::error!(error = %e, "Failed to persist history snapshot");
        })
    }
}
