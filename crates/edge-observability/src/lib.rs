//! Observability infrastructure for the storefront offline layer.
//!
//! This crate provides:
//! - `init_logging` - `tracing` subscriber setup (JSON or human output)
//! - `ProxyMetrics` - Cache proxy counters
//! - `DrainMetrics` - Offline queue replay counters

mod logging;
mod metrics;

pub use logging::*;
pub use metrics::*;
