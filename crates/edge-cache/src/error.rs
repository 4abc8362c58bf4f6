//! Proxy error types.

use edge_data::FetchError;

/// Result type for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Errors surfaced by [`crate::EdgeCacheProxy::handle_fetch`].
///
/// Storage failures never appear here; they degrade to a network
/// pass-through.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The network failed and no usable cached entry exists.
    #[error("network error: {0}")]
    Network(#[from] FetchError),

    /// A cache-only rule found nothing.
    #[error("not cached: {0}")]
    NotCached(String),
}

impl ProxyError {
    /// Whether the failure came from the network.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
