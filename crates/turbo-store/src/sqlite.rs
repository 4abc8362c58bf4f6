//! SQLite backend.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::{StoreBackend, StoreError, StoreResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    seq       INTEGER PRIMARY KEY AUTOINCREMENT,
    partition TEXT NOT NULL,
    key       TEXT NOT NULL,
    value     BLOB NOT NULL,
    UNIQUE (partition, key)
);
CREATE INDEX IF NOT EXISTS idx_entries_partition_seq ON entries (partition, seq);
"#;

/// SQLite-backed store.
///
/// Insertion order is tracked by an autoincrement sequence, so replacing a
/// key deletes the old row and inserts a new one.
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Open or create a database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::OpenError(format!(
                        "failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|e| {
            StoreError::OpenError(format!("failed to open {}: {}", path.display(), e))
        })?;
        Self::with_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::OpenError(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError::OpenError(format!("failed to run migrations: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn call<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::BackendError("connection lock poisoned".to_string()))?;
            f(&mut guard).map_err(StoreError::from)
        })
        .await
        .map_err(|e| StoreError::BackendError(format!("sqlite task failed: {}", e)))?
    }
}

#[async_trait]
impl StoreBackend for SqliteBackend {
    async fn get(&self, partition: &str, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let (partition, key) = (partition.to_string(), key.to_string());
        self.call(move |conn| {
            conn.query_row(
                "SELECT value FROM entries WHERE partition = ?1 AND key = ?2",
                params![partition, key],
                |row| row.get(0),
            )
            .optional()
        })
        .await
    }

    async fn put(&self, partition: &str, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let (partition, key) = (partition.to_string(), key.to_string());
        self.call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM entries WHERE partition = ?1 AND key = ?2",
                params![partition, key],
            )?;
            tx.execute(
                "INSERT INTO entries (partition, key, value) VALUES (?1, ?2, ?3)",
                params![partition, key, value],
            )?;
            tx.commit()
        })
        .await
    }

    async fn delete(&self, partition: &str, key: &str) -> StoreResult<bool> {
        let (partition, key) = (partition.to_string(), key.to_string());
        self.call(move |conn| {
            conn.execute(
                "DELETE FROM entries WHERE partition = ?1 AND key = ?2",
                params![partition, key],
            )
            .map(|n| n > 0)
        })
        .await
    }

    async fn keys(&self, partition: &str) -> StoreResult<Vec<String>> {
        let partition = partition.to_string();
        self.call(move |conn| {
            let mut stmt =
                conn.prepare("SELECT key FROM entries WHERE partition = ?1 ORDER BY seq")?;
            let rows = stmt.query_map(params![partition], |row| row.get(0))?;
            rows.collect()
        })
        .await
    }

    async fn entries(&self, partition: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let partition = partition.to_string();
        self.call(move |conn| {
            let mut stmt = conn
                .prepare("SELECT key, value FROM entries WHERE partition = ?1 ORDER BY seq")?;
            let rows = stmt.query_map(params![partition], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })
        .await
    }

    async fn count(&self, partition: &str) -> StoreResult<usize> {
        let partition = partition.to_string();
        self.call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM entries WHERE partition = ?1",
                params![partition],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n.max(0) as usize)
        })
        .await
    }

    async fn partitions(&self) -> StoreResult<Vec<String>> {
        self.call(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT partition FROM entries ORDER BY partition")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect()
        })
        .await
    }

    async fn delete_partition(&self, partition: &str) -> StoreResult<bool> {
        let partition = partition.to_string();
        self.call(move |conn| {
            conn.execute("DELETE FROM entries WHERE partition = ?1", params![partition])
                .map(|n| n > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend.put("cart", "prod-1", b"{}".to_vec()).await.unwrap();

        assert_eq!(backend.get("cart", "prod-1").await.unwrap(), Some(b"{}".to_vec()));
        assert_eq!(backend.get("orders", "prod-1").await.unwrap(), None);
        assert!(backend.delete("cart", "prod-1").await.unwrap());
        assert_eq!(backend.get("cart", "prod-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_replace_moves_key_to_newest() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend.put("p", "a", b"1".to_vec()).await.unwrap();
        backend.put("p", "b", b"2".to_vec()).await.unwrap();
        backend.put("p", "a", b"3".to_vec()).await.unwrap();

        assert_eq!(backend.keys("p").await.unwrap(), vec!["b", "a"]);
        let entries = backend.entries("p").await.unwrap();
        assert_eq!(entries[1], ("a".to_string(), b"3".to_vec()));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("offline.db");

        {
            let backend = SqliteBackend::open(&path).unwrap();
            backend.put("sync_queue", "m1", b"1".to_vec()).await.unwrap();
            backend.put("cart", "c1", b"2".to_vec()).await.unwrap();
        }

        let backend = SqliteBackend::open(&path).unwrap();
        assert_eq!(backend.count("sync_queue").await.unwrap(), 1);
        assert_eq!(backend.partitions().await.unwrap(), vec!["cart", "sync_queue"]);
    }

    #[tokio::test]
    async fn test_delete_partition_leaves_others() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend.put("a", "k", b"1".to_vec()).await.unwrap();
        backend.put("b", "k", b"1".to_vec()).await.unwrap();

        assert!(backend.delete_partition("a").await.unwrap());
        assert_eq!(backend.partitions().await.unwrap(), vec!["b"]);
    }
}
