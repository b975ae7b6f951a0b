//! `SQLite`-backed key/value store.
//!
//! Calls are synchronous rusqlite work moved onto the tokio blocking pool.

use std::path::Path;

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension as _, params};
use serde_json::Value;

use crate::error::StorageError;
use crate::migrations;
use crate::traits::KeyValueStore;

type PooledConn = PooledConnection<SqliteConnectionManager>;

/// Key/value store persisted in a single `SQLite` table.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

fn init_connection(conn: &mut Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA busy_timeout = 5000;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )
}

/// Run a blocking closure on the tokio blocking pool.
async fn blocking<F, T>(f: F) -> Result<T, StorageError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::Join(e.to_string()))?
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `db_path` and migrates it.
    ///
    /// # Errors
    /// Returns an error if the pool cannot be built or a migration fails.
    pub fn open(db_path: &Path) -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::file(db_path).with_init(init_connection);
        let pool = Pool::builder().max_size(4).build(manager)?;
        migrations::run_migrations(&*pool.get()?)?;
        tracing::info!(path = %db_path.display(), "Key/value store opened");
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConn, StorageError> {
        Ok(self.pool.get()?)
    }

    fn get_blocking(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row("SELECT value FROM kv_entries WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        raw.map(|text| serde_json::from_str(&text).map_err(|e| StorageError::corrupt(key, e)))
            .transpose()
    }

    fn set_blocking(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let text = serde_json::to_string(value).map_err(|e| StorageError::corrupt(key, e))?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, strftime('%s','now'))
               ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, text],
        )?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let store = self.clone();
        let key = key.to_owned();
        blocking(move || store.get_blocking(&key)).await
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let store = self.clone();
        let key = key.to_owned();
        let value = value.clone();
        blocking(move || store.set_blocking(&key, &value)).await
    }
}
