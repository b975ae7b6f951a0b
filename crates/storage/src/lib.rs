//! Storage layer for wastewise
//!
//! A get/set JSON contract (`KeyValueStore`) with `SQLite` and in-memory
//! implementations, and the persisted `HistoryStore` built on top of it.

mod error;
mod history;
mod memory;
mod migrations;
mod preferences;
mod sqlite;
pub mod traits;

pub use error::StorageError;
pub use history::{HistoryStore, MergeStats};
pub use memory::MemoryStore;
pub use preferences::{LANGUAGE_KEY, Preferences, THEME_KEY};
pub use sqlite::SqliteStore;
pub use traits::KeyValueStore;
