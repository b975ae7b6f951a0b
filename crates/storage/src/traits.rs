use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;

/// Get/set contract of the persistent collaborator.
///
/// No transactional guarantee spans keys; each `set` replaces the whole value.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the JSON stored under `key`, or `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Stores `value` under `key`, overwriting any previous value.
    async fn set(&self, key: &str, value: &Value) -> Result<(), StorageError>;
}
