//! Aggregate counts of the offline partitions.

use serde::{Deserialize, Serialize};
use turbo_store::Store;

use crate::partitions::{CART, DEAD_LETTER, ORDERS, PRODUCTS, SYNC_QUEUE, USER_PREFERENCES};

/// Record counts per offline partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineStats {
    pub pending_mutations: usize,
    pub cart_items: usize,
    pub cached_orders: usize,
    pub recent_products: usize,
    pub preferences: usize,
    pub dead_letters: usize,
}

impl OfflineStats {
    /// Count every partition. A partition that cannot be read counts as zero.
    pub async fn collect(store: &Store) -> Self {
        Self {
            pending_mutations: count(store, SYNC_QUEUE).await,
            cart_items: count(store, CART).await,
            cached_orders: count(store, ORDERS).await,
            recent_products: count(store, PRODUCTS).await,
            preferences: count(store, USER_PREFERENCES).await,
            dead_letters: count(store, DEAD_LETTER).await,
        }
    }
}

async fn count(store: &Store, partition: &str) -> usize {
    store.count(partition).await.unwrap_or_else(|e| {
        tracing::warn!(partition, error = %e, "could not count partition");
        0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collect_counts_partitions() {
        let store = Store::in_memory();
        store.put(CART, "a", &1).await.unwrap();
        store.put(CART, "b", &2).await.unwrap();
        store.put(PRODUCTS, "p", &3).await.unwrap();

        let stats = OfflineStats::collect(&store).await;
        assert_eq!(stats.cart_items, 2);
        assert_eq!(stats.recent_products, 1);
        assert_eq!(stats.pending_mutations, 0);
    }
}
