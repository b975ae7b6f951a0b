//! Typed error enum for the storage layer.

use thiserror::Error;

/// Storage-layer error covering every expected failure mode of the
/// persistent store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQL execution failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No connection could be checked out of the pool.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A stored value could not be (de)serialized.
    #[error("data corruption in {key}: {source}")]
    DataCorruption {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The blocking worker running a database call panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Join(String),
}

impl StorageError {
    /// Whether this error is likely transient (worth retrying).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Pool(_) => true,
            Self::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    pub(crate) fn corrupt(key: &str, source: serde_json::Error) -> Self {
        Self::DataCorruption { key: key.to_owned(), source }
    }
}
