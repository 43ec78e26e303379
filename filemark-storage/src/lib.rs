//! Local persistence for Filemark.
//!
//! # Architecture
//!
//! - [`KeyValueStore`] is the persistence seam: two string blobs, `bookmarks`
//!   and `sync_metadata`, are all the store ever reads or writes
//! - [`DuckDbKeyValueStore`] keeps those blobs in a single DuckDB table;
//!   [`MemoryKeyValueStore`] keeps them in memory for tests and previews
//! - [`BookmarkStore`] owns the authoritative in-memory collection, funnels
//!   every mutation through one critical section and publishes snapshots

mod bookmark_store;
mod error;
mod kv;

pub use bookmark_store::{BookmarkSnapshot, BookmarkStore, KEY_BOOKMARKS, KEY_SYNC_METADATA};
pub use error::{StorageError, StorageResult};
pub use kv::{DuckDbKeyValueStore, KeyValueStore, MemoryKeyValueStore};

/// Open a DuckDB connection with stale WAL recovery.
///
/// If the initial open fails and a `.wal` file exists alongside the database,
/// it is removed and the open is retried once. This handles the common case
/// where an unclean shutdown leaves a WAL file that prevents reopening.
pub fn open_duckdb_with_wal_recovery(path: &std::path::Path) -> StorageResult<duckdb::Connection> {
    match duckdb::Connection::open(path) {
        Ok(conn) => Ok(conn),
        Err(first_err) => {
            let wal_path = path.with_extension(
                path.extension()
                    .map(|ext| format!("{}.wal", ext.to_string_lossy()))
                    .unwrap_or_else(|| "wal".to_string()),
            );
            if wal_path.exists() {
                tracing::warn!(
                    "DuckDB open failed, removing stale WAL and retrying: {}",
                    wal_path.display()
                );
                if std::fs::remove_file(&wal_path).is_ok() {
                    return Ok(duckdb::Connection::open(path)?);
                }
            }
            Err(first_err.into())
        }
    }
}
