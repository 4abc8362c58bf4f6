//! Network boundary for the storefront offline layer.
//!
//! This crate provides:
//! - `HttpRequest` / `HttpResponse` - Owned request/response values that can be cached
//! - `Fetcher` - The seam every network call goes through
//! - `FetchClient` - `reqwest`-backed fetcher with timeout and retry
//! - `RetryPolicy` / `BackoffStrategy` - Retry strategies
//! - `TimeoutConfig` - Connect/response/total timeouts

mod client;
mod error;
mod request;
mod response;
mod retry;
mod timeout;

pub use client::*;
pub use error::*;
pub use request::*;
pub use response::*;
pub use retry::*;
pub use timeout::*;
