//! Partitioned persistent key-value store for the storefront offline layer.
//!
//! A single [`Store`] handle is constructed at startup and passed to every
//! component that persists state. Values are JSON-serialized; keys inside a
//! partition are enumerated in insertion order, which is what FIFO eviction
//! relies on.
//!
//! # Example
//!
//! ```rust,ignore
//! use turbo_store::Store;
//!
//! let store = Store::in_memory();
//!
//! store.put("cart", "prod-1", &item).await?;
//! let item: Option<CartItem> = store.get("cart", "prod-1").await?;
//! store.delete("cart", "prod-1").await?;
//! ```

mod backend;
mod config;
mod error;
mod memory;
mod sqlite;
mod store;

pub use backend::StoreBackend;
pub use config::StorageConfig;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;
pub use store::Store;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{Store, StoreBackend, StoreError, StoreResult};
}
