//! Edge cache proxy for the storefront.
//!
//! This crate provides:
//! - `EdgeCacheProxy` - Classifies intercepted GET requests and serves them
//!   through one of five strategies
//! - `CacheRule` / `UrlPattern` - The ordered rule table
//! - `CachePartition` - Bounded FIFO buckets of cached responses
//! - `CacheGeneration` - Versioned partition naming and the activation sweep
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use edge_cache::{CacheConfig, EdgeCacheProxy};
//! use edge_data::{FetchClient, HttpRequest};
//! use turbo_store::Store;
//!
//! let proxy = EdgeCacheProxy::new(
//!     CacheConfig::default(),
//!     Store::in_memory(),
//!     Arc::new(FetchClient::new()?),
//! )?;
//!
//! proxy.install().await;
//! proxy.activate().await?;
//!
//! let outcome = proxy.handle_fetch(&HttpRequest::get("http://localhost:3000/")?).await?;
//! println!("{}", outcome.status);
//! ```

mod classify;
mod config;
mod error;
mod headers;
mod key;
mod lifecycle;
mod partition;
mod pattern;
mod proxy;
mod rule;
mod strategy;

pub use classify::*;
pub use config::*;
pub use error::*;
pub use headers::*;
pub use key::*;
pub use lifecycle::*;
pub use partition::*;
pub use pattern::*;
pub use proxy::*;
pub use rule::*;
pub use strategy::{FetchOutcome, Revalidation};
