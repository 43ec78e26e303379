//! Key-value persistence backends.

use crate::error::{StorageError, StorageResult};
use duckdb::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Persistent string-blob storage used by [`crate::BookmarkStore`].
///
/// Implementations are blocking; async callers dispatch through
/// `tokio::task::spawn_blocking`.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn put(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Writes every entry or none of them.
    fn put_all(&self, entries: &[(&str, &str)]) -> StorageResult<()>;
}

/// In-memory key-value store.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
    read_only: AtomicBool,
    failing_key: RwLock<Option<String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given entries.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: RwLock::new(map),
            ..Self::default()
        }
    }

    /// Rejects every subsequent `put` (simulates a full or locked disk).
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Rejects writes that touch `key` while leaving other keys writable.
    pub fn fail_writes_to(&self, key: Option<&str>) {
        if let Ok(mut failing) = self.failing_key.write() {
            *failing = key.map(str::to_string);
        }
    }

    fn check_writable(&self, key: &str) -> StorageResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("store is read-only, cannot write {key}")));
        }
        let failing = self
            .failing_key
            .read()
            .map_err(|_| StorageError::Backend("failure lock poisoned".into()))?;
        if failing.as_deref() == Some(key) {
            return Err(StorageError::Backend(format!("write to {key} rejected")));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::Backend("entries lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        self.put_all(&[(key, value)])
    }

    fn put_all(&self, entries: &[(&str, &str)]) -> StorageResult<()> {
        for (key, _) in entries {
            self.check_writable(key)?;
        }
        let mut stored = self
            .entries
            .write()
            .map_err(|_| StorageError::Backend("entries lock poisoned".into()))?;
        for (key, value) in entries {
            stored.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

/// Key-value store backed by a single DuckDB table.
#[derive(Clone)]
pub struct DuckDbKeyValueStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbKeyValueStore {
    /// Opens or creates a key-value store at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = crate::open_duckdb_with_wal_recovery(path)?;
        initialize_kv_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory key-value store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_kv_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Lists stored keys in lexical order.
    pub fn keys(&self) -> StorageResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key FROM kv_entries ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Backend("connection lock poisoned".into()))
    }
}

impl KeyValueStore for DuckDbKeyValueStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT value FROM kv_entries WHERE key = ?")?;
        let mut rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
        let value = rows.next().transpose()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv_entries (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)",
            params![key, value],
        )?;
        Ok(())
    }

    fn put_all(&self, entries: &[(&str, &str)]) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN TRANSACTION")?;
        let written = entries.iter().try_for_each(|&(key, value)| {
            conn.execute(
                "INSERT OR REPLACE INTO kv_entries (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)",
                params![key, value],
            )
            .map(|_| ())
        });
        match written {
            Ok(()) => {
                conn.execute_batch("COMMIT")?;
                Ok(())
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(StorageError::Database(e))
            }
        }
    }
}

fn initialize_kv_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS kv_entries (
            key VARCHAR PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )?;
    Ok(())
}
