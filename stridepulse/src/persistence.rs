//! Key-value blob persistence.
//!
//! The app stores exactly two JSON documents: the in-progress run and the
//! lifetime stats. Each is written whole after every change and read once at
//! startup, so the store only needs get/put/clear over string blobs.

use std::collections::HashMap;
use std::path::Path;

use log::{debug, info, warn};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{StoreError, StoreResult};
use crate::migrations;

/// Key for the in-progress run document.
pub const TODAY_KEY: &str = "stride_pulse_today_v7";

/// Key for the lifetime stats document.
pub const STATS_KEY: &str = "stride_pulse_stats_v7";

/// A string blob store keyed by name.
pub trait BlobStore: Send {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    fn put(&mut self, key: &str, value: &str) -> StoreResult<()>;
    /// Remove every stored blob.
    fn clear(&mut self) -> StoreResult<()>;
}

/// Read and decode a JSON document. `Ok(None)` if the key is absent.
pub fn load_json<T: DeserializeOwned>(store: &dyn BlobStore, key: &str) -> StoreResult<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StoreError::Serde {
            key: key.to_string(),
            source,
        })
}

/// Encode and write a JSON document.
pub fn save_json<T: Serialize>(store: &mut dyn BlobStore, key: &str, value: &T) -> StoreResult<()> {
    let raw = serde_json::to_string(value).map_err(|source| StoreError::Serde {
        key: key.to_string(),
        source,
    })?;
    store.put(key, &raw)
}

/// Load a document, falling back to the default when it is missing or
/// unreadable. Unreadable documents are logged, not propagated.
pub fn load_or_default<T: DeserializeOwned + Default>(store: &dyn BlobStore, key: &str) -> T {
    match load_json(store, key) {
        Ok(Some(value)) => value,
        Ok(None) => {
            debug!("[Store] No document for {}, starting fresh", key);
            T::default()
        }
        Err(e) => {
            warn!("[Store] Discarding unreadable {}: {}", key, e);
            T::default()
        }
    }
}

// ============================================================================
// SQLite
// ============================================================================

/// Blob store backed by a single SQLite table.
pub struct SqliteBlobStore {
    db: Connection,
}

impl SqliteBlobStore {
    /// Open (or create) a database file and migrate it.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let mut db = Connection::open(path)?;
        migrations::migrate(&mut db)?;
        info!("[Store] Opened {}", path.display());
        Ok(Self { db })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> StoreResult<Self> {
        let mut db = Connection::open_in_memory()?;
        migrations::migrate(&mut db)?;
        Ok(Self { db })
    }
}

impl BlobStore for SqliteBlobStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .db
            .query_row("SELECT value FROM blobs WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn put(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.db.execute(
            "INSERT INTO blobs (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE
             SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    fn clear(&mut self) -> StoreResult<()> {
        let removed = self.db.execute("DELETE FROM blobs", [])?;
        info!("[Store] Cleared {} documents", removed);
        Ok(())
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Blob store held in a map. Nothing survives the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryBlobStore {
    blobs: HashMap<String, String>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.blobs.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.blobs.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&mut self) -> StoreResult<()> {
        self.blobs.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stridetrack::{LifetimeStats, RunRecord};

    fn exercise(store: &mut dyn BlobStore) {
        assert_eq!(store.get("missing").unwrap(), None);
        store.put("k", "one").unwrap();
        store.put("k", "two").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("two"));
        store.put("other", "x").unwrap();
        store.clear().unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        assert_eq!(store.get("other").unwrap(), None);
    }

    #[test]
    fn test_memory_store() {
        exercise(&mut MemoryBlobStore::new());
    }

    #[test]
    fn test_sqlite_store() {
        exercise(&mut SqliteBlobStore::in_memory().unwrap());
    }

    #[test]
    fn test_json_round_trip_through_sqlite() {
        let mut store = SqliteBlobStore::in_memory().unwrap();
        let run = RunRecord::fresh(1_717_000_000_000);
        save_json(&mut store, TODAY_KEY, &run).unwrap();
        let loaded: Option<RunRecord> = load_json(&store, TODAY_KEY).unwrap();
        assert_eq!(loaded, Some(run));
    }

    #[test]
    fn test_unreadable_document_falls_back() {
        let mut store = MemoryBlobStore::new();
        store.put(STATS_KEY, "{not json").unwrap();
        assert!(matches!(
            load_json::<LifetimeStats>(&store, STATS_KEY),
            Err(StoreError::Serde { .. })
        ));
        let stats: LifetimeStats = load_or_default(&store, STATS_KEY);
        assert_eq!(stats, LifetimeStats::default());
    }
}
