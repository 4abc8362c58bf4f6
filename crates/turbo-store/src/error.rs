//! Store error types.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur when using the store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the store.
    #[error("Failed to open store: {0}")]
    OpenError(String),

    /// Failed to serialize value.
    #[error("Serialization error: {0}")]
    SerializeError(#[from] serde_json::Error),

    /// Failed to perform backend operation.
    #[error("Store operation failed: {0}")]
    BackendError(String),

    /// A stored value could not be decoded.
    #[error("Corrupt record {partition}/{key}: {message}")]
    CorruptRecord {
        partition: String,
        key: String,
        message: String,
    },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::BackendError(e.to_string())
    }
}
