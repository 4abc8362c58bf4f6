//! Storage backend trait.

use async_trait::async_trait;

use crate::StoreResult;

/// Raw byte-level storage backend.
///
/// Implementations must enumerate the keys of a partition in insertion
/// order, oldest first. Writing an existing key replaces the value and moves
/// the key to the newest position.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Read a value.
    async fn get(&self, partition: &str, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Insert or replace a value.
    async fn put(&self, partition: &str, key: &str, value: Vec<u8>) -> StoreResult<()>;

    /// Delete a value. Returns whether it existed.
    async fn delete(&self, partition: &str, key: &str) -> StoreResult<bool>;

    /// Keys of a partition, oldest first.
    async fn keys(&self, partition: &str) -> StoreResult<Vec<String>>;

    /// All entries of a partition, oldest first.
    async fn entries(&self, partition: &str) -> StoreResult<Vec<(String, Vec<u8>)>>;

    /// Number of entries in a partition.
    async fn count(&self, partition: &str) -> StoreResult<usize>;

    /// Names of all non-empty partitions.
    async fn partitions(&self) -> StoreResult<Vec<String>>;

    /// Delete a whole partition. Returns whether it existed.
    async fn delete_partition(&self, partition: &str) -> StoreResult<bool>;
}
