//! Queue error types.

use edge_data::FetchError;
use turbo_store::StoreError;

/// Result type for local queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors from local queue and snapshot operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The store could not be read or written.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A payload could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Why a single replay failed. Never surfaced from a drain.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// The request failed or the server answered with a non-2xx status.
    #[error("transport error: {0}")]
    Transport(#[from] FetchError),

    /// No endpoint exists for the mutation kind.
    #[error("unknown mutation kind: {0}")]
    UnknownKind(String),
}
