//! In-memory backend.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{StoreBackend, StoreResult};

#[derive(Debug, Default)]
struct Partition {
    next_seq: u64,
    entries: HashMap<String, (u64, Vec<u8>)>,
}

impl Partition {
    fn ordered(&self) -> Vec<(&String, &Vec<u8>)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(key, (seq, value))| (*seq, key, value))
            .collect();
        entries.sort_by_key(|(seq, _, _)| *seq);
        entries.into_iter().map(|(_, k, v)| (k, v)).collect()
    }
}

/// In-memory backend for tests and volatile deployments.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    partitions: RwLock<HashMap<String, Partition>>,
}

impl MemoryBackend {
    /// Create an empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn get(&self, partition: &str, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(partition)
            .and_then(|p| p.entries.get(key))
            .map(|(_, value)| value.clone()))
    }

    async fn put(&self, partition: &str, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let mut partitions = self.partitions.write().await;
        let p = partitions.entry(partition.to_string()).or_default();
        let seq = p.next_seq;
        p.next_seq += 1;
        p.entries.insert(key.to_string(), (seq, value));
        Ok(())
    }

    async fn delete(&self, partition: &str, key: &str) -> StoreResult<bool> {
        let mut partitions = self.partitions.write().await;
        let Some(p) = partitions.get_mut(partition) else {
            return Ok(false);
        };
        let removed = p.entries.remove(key).is_some();
        if p.entries.is_empty() {
            partitions.remove(partition);
        }
        Ok(removed)
    }

    async fn keys(&self, partition: &str) -> StoreResult<Vec<String>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(partition)
            .map(|p| p.ordered().into_iter().map(|(k, _)| k.clone()).collect())
            .unwrap_or_default())
    }

    async fn entries(&self, partition: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(partition)
            .map(|p| {
                p.ordered()
                    .into_iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, partition: &str) -> StoreResult<usize> {
        let partitions = self.partitions.read().await;
        Ok(partitions.get(partition).map_or(0, |p| p.entries.len()))
    }

    async fn partitions(&self) -> StoreResult<Vec<String>> {
        let partitions = self.partitions.read().await;
        let mut names: Vec<String> = partitions
            .iter()
            .filter(|(_, p)| !p.entries.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn delete_partition(&self, partition: &str) -> StoreResult<bool> {
        let mut partitions = self.partitions.write().await;
        Ok(partitions.remove(partition).is_some())
    }
}
