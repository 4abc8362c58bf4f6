//! Offline mutation queue and snapshot stores for the storefront.
//!
//! This crate provides:
//! - `OfflineQueue` - Durable write-intent queue with single-flight, chronological replay
//! - `ReplayTransport` / `HttpReplayTransport` - How a mutation reaches the server
//! - `ConnectivityBridge` - Online, background-sync and timer triggers for the drain
//! - `Snapshots` - Cart, order, product and preference snapshots for offline rendering
//! - `purge_expired` - Retention cleanup across every offline partition
//! - `OfflineStats` - Record counts per partition
//!
//! # Example
//!
//! ```rust,ignore
//! use turbo_sync::{MutationKind, OfflineQueue, QueueConfig};
//!
//! let queue = OfflineQueue::new(store, transport, QueueConfig::default())?;
//! queue.add_to_queue(MutationKind::CartUpdate, json!({"sku": "tee", "qty": 2})).await?;
//!
//! // Later, when back online:
//! let report = queue.process_queue().await?;
//! ```

mod cleanup;
mod config;
mod connectivity;
mod error;
mod queue;
mod record;
mod snapshots;
mod stats;
mod transport;

/// Store partitions owned by this crate.
pub mod partitions {
    /// Cart item snapshots.
    pub const CART: &str = "cart";
    /// Order snapshots.
    pub const ORDERS: &str = "orders";
    /// Recently viewed product snapshots.
    pub const PRODUCTS: &str = "products";
    /// Pending mutations.
    pub const SYNC_QUEUE: &str = "sync_queue";
    /// User preferences.
    pub const USER_PREFERENCES: &str = "user_preferences";
    /// Mutations dropped after their final attempt.
    pub const DEAD_LETTER: &str = "sync_dead_letter";
}

pub use cleanup::*;
pub use config::*;
pub use connectivity::*;
pub use error::*;
pub use queue::*;
pub use record::*;
pub use snapshots::*;
pub use stats::*;
pub use transport::*;
