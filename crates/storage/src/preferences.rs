//! Scalar user preferences, one persistent entry per key.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StorageError;
use crate::traits::KeyValueStore;

/// Preference key for the colour theme.
pub const THEME_KEY: &str = "theme";
/// Preference key for the interface language.
pub const LANGUAGE_KEY: &str = "language";

/// Typed access to scalar preference entries.
#[derive(Clone)]
pub struct Preferences {
    kv: Arc<dyn KeyValueStore>,
}

impl Preferences {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Reads a preference, falling back to `default` when absent or unreadable.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub async fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, StorageError> {
        let Some(value) = self.kv.get(key).await? else {
            return Ok(default);
        };
        Ok(serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "Unreadable preference, using default");
            default
        }))
    }

    /// # Errors
    /// Returns an error if the value cannot be serialized or stored.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let value = serde_json::to_value(value).map_err(|e| StorageError::corrupt(key, e))?;
        self.kv.set(key, &value).await
    }
}
