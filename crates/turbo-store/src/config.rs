//! Storage configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where the store keeps its data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Volatile in-process storage.
    Memory,
    /// SQLite database file.
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("storefront-offline.db"),
        }
    }
}
