//! Typed store handle with automatic serialization.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use crate::{MemoryBackend, SqliteBackend, StorageConfig, StoreBackend, StoreError, StoreResult};

/// Type-safe store handle.
///
/// Cheap to clone; all clones share the same backend. Values are stored as
/// JSON, so any type implementing `Serialize` and `DeserializeOwned` can be
/// persisted.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn StoreBackend>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Wrap a backend.
    pub fn new(backend: impl StoreBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Wrap a shared backend.
    pub fn from_backend(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    /// Volatile in-memory store.
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Open a SQLite-backed store.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let store = Store::open_sqlite("offline.db")?;
    /// ```
    pub fn open_sqlite(path: impl AsRef<std::path::Path>) -> StoreResult<Self> {
        Ok(Self::new(SqliteBackend::open(path)?))
    }

    /// Open the store described by a configuration.
    pub fn open(config: &StorageConfig) -> StoreResult<Self> {
        match config {
            StorageConfig::Memory => Ok(Self::in_memory()),
            StorageConfig::Sqlite { path } => Self::open_sqlite(path),
        }
    }

    /// Get a value.
    ///
    /// Returns `None` if the key doesn't exist.
    pub async fn get<T: DeserializeOwned>(
        &self,
        partition: &str,
        key: &str,
    ) -> StoreResult<Option<T>> {
        match self.backend.get(partition, key).await? {
            Some(bytes) => decode(partition, key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Insert or replace a value.
    ///
    /// A replaced key moves to the newest position of the partition.
    pub async fn put<T: Serialize>(&self, partition: &str, key: &str, value: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.backend.put(partition, key, bytes).await
    }

    /// Delete a value. Returns whether it existed.
    pub async fn delete(&self, partition: &str, key: &str) -> StoreResult<bool> {
        self.backend.delete(partition, key).await
    }

    /// Check if a key exists.
    pub async fn exists(&self, partition: &str, key: &str) -> StoreResult<bool> {
        Ok(self.backend.get(partition, key).await?.is_some())
    }

    /// Keys of a partition, oldest first.
    pub async fn keys(&self, partition: &str) -> StoreResult<Vec<String>> {
        self.backend.keys(partition).await
    }

    /// Number of entries in a partition.
    pub async fn count(&self, partition: &str) -> StoreResult<usize> {
        self.backend.count(partition).await
    }

    /// All decoded values of a partition, oldest first.
    pub async fn values<T: DeserializeOwned>(&self, partition: &str) -> StoreResult<Vec<(String, T)>> {
        self.backend
            .entries(partition)
            .await?
            .into_iter()
            .map(|(key, bytes)| decode(partition, &key, &bytes).map(|value| (key, value)))
            .collect()
    }

    /// Values of a partition decoded one by one, oldest first.
    ///
    /// Unlike [`Store::values`], an undecodable entry yields an error in its
    /// own slot instead of failing the whole read.
    pub async fn try_values<T: DeserializeOwned>(
        &self,
        partition: &str,
    ) -> StoreResult<Vec<(String, StoreResult<T>)>> {
        Ok(self
            .backend
            .entries(partition)
            .await?
            .into_iter()
            .map(|(key, bytes)| {
                let value = decode(partition, &key, &bytes);
                (key, value)
            })
            .collect())
    }

    /// Names of all non-empty partitions.
    pub async fn partitions(&self) -> StoreResult<Vec<String>> {
        self.backend.partitions().await
    }

    /// Delete a whole partition.
    pub async fn delete_partition(&self, partition: &str) -> StoreResult<bool> {
        self.backend.delete_partition(partition).await
    }

    /// Delete the oldest entries until at most `max_entries` remain.
    ///
    /// Returns the evicted keys, oldest first.
    pub async fn evict_oldest(&self, partition: &str, max_entries: usize) -> StoreResult<Vec<String>> {
        let keys = self.backend.keys(partition).await?;
        if keys.len() <= max_entries {
            return Ok(Vec::new());
        }

        let excess = keys.len() - max_entries;
        let evicted: Vec<String> = keys.into_iter().take(excess).collect();
        for key in &evicted {
            self.backend.delete(partition, key).await?;
        }

        tracing::debug!(partition, evicted = evicted.len(), "evicted oldest entries");
        Ok(evicted)
    }

    /// Delete every entry for which `keep` returns false.
    ///
    /// Entries that no longer decode as `T` are removed as well. Returns the
    /// number of deleted entries.
    pub async fn retain<T, F>(&self, partition: &str, mut keep: F) -> StoreResult<usize>
    where
        T: DeserializeOwned,
        F: FnMut(&str, &T) -> bool,
    {
        let mut removed = 0;
        for (key, bytes) in self.backend.entries(partition).await? {
            let drop_entry = match decode::<T>(partition, &key, &bytes) {
                Ok(value) => !keep(&key, &value),
                Err(e) => {
                    tracing::warn!(partition, key = %key, error = %e, "removing undecodable record");
                    true
                }
            };

            if drop_entry && self.backend.delete(partition, &key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn decode<T: DeserializeOwned>(partition: &str, key: &str, bytes: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::CorruptRecord {
        partition: partition.to_string(),
        key: key.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: String,
        quantity: u32,
    }

    fn item(id: &str, quantity: u32) -> Item {
        Item {
            id: id.to_string(),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_typed_roundtrip() {
        let store = Store::in_memory();
        store.put("cart", "a", &item("a", 2)).await.unwrap();

        let loaded: Option<Item> = store.get("cart", "a").await.unwrap();
        assert_eq!(loaded, Some(item("a", 2)));
        assert!(store.exists("cart", "a").await.unwrap());
        assert!(!store.exists("cart", "b").await.unwrap());
    }

    #[tokio::test]
    async fn test_evict_oldest_is_fifo() {
        let store = Store::in_memory();
        for id in ["a", "b", "c"] {
            store.put("p", id, &item(id, 1)).await.unwrap();
        }

        let evicted = store.evict_oldest("p", 2).await.unwrap();
        assert_eq!(evicted, vec!["a"]);
        assert_eq!(store.keys("p").await.unwrap(), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_evict_oldest_noop_under_limit() {
        let store = Store::in_memory();
        store.put("p", "a", &item("a", 1)).await.unwrap();

        assert!(store.evict_oldest("p", 5).await.unwrap().is_empty());
        assert_eq!(store.count("p").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_retain_removes_rejected_and_corrupt() {
        let store = Store::in_memory();
        store.put("p", "keep", &item("keep", 5)).await.unwrap();
        store.put("p", "drop", &item("drop", 0)).await.unwrap();
        store.put("p", "junk", &"not an item").await.unwrap();

        let removed = store
            .retain::<Item, _>("p", |_, it| it.quantity > 0)
            .await
            .unwrap();

        assert_eq!(removed, 2);
        assert_eq!(store.keys("p").await.unwrap(), vec!["keep"]);
    }

    #[tokio::test]
    async fn test_values_reports_corrupt_record() {
        let store = Store::in_memory();
        store.put("p", "junk", &42).await.unwrap();

        let err = store.values::<Item>("p").await.unwrap_err();
        assert!(matches!(err, StoreError::CorruptRecord { .. }));
    }

    #[tokio::test]
    async fn test_try_values_isolates_corrupt_record() {
        let store = Store::in_memory();
        store.put("p", "a", &item("a", 1)).await.unwrap();
        store.put("p", "junk", &42).await.unwrap();
        store.put("p", "b", &item("b", 2)).await.unwrap();

        let entries = store.try_values::<Item>("p").await.unwrap();
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "junk", "b"]);
        assert_eq!(entries[0].1.as_ref().unwrap(), &item("a", 1));
        assert!(matches!(entries[1].1, Err(StoreError::CorruptRecord { .. })));
        assert_eq!(entries[2].1.as_ref().unwrap(), &item("b", 2));
    }

    #[tokio::test]
    async fn test_open_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::Sqlite {
            path: dir.path().join("offline.db"),
        };

        let store = Store::open(&config).unwrap();
        store.put("orders", "o1", &item("o1", 1)).await.unwrap();
        assert_eq!(store.partitions().await.unwrap(), vec!["orders"]);
    }
}
