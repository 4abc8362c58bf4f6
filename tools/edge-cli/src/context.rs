//! CLI execution context.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use edge_cache::EdgeCacheProxy;
use edge_data::{FetchClient, Fetcher};
use turbo_store::Store;
use turbo_sync::{HttpReplayTransport, OfflineQueue};

use crate::config::{OfflineConfig, CONFIG_NAMES};
use crate::output::Output;

/// Execution context for CLI commands.
pub struct Context {
    /// Loaded configuration.
    pub config: OfflineConfig,
    /// File the configuration came from, if any.
    pub config_path: Option<PathBuf>,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
}

impl Context {
    /// Load context from an explicit config file, or search for one.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let (config, config_path) = match config_path {
            Some(path) => {
                let path = PathBuf::from(path);
                (OfflineConfig::load(&path)?, Some(path))
            }
            None => match Self::find_config(&cwd) {
                Some(path) => (OfflineConfig::load(&path)?, Some(path)),
                None => (OfflineConfig::default(), None),
            },
        };

        Ok(Self {
            config,
            config_path,
            output,
            cwd,
        })
    }

    /// Find a config file in the directory tree.
    fn find_config(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            for name in CONFIG_NAMES {
                let candidate = current.join(name);
                if candidate.exists() {
                    return Some(candidate);
                }
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Open the configured store.
    pub fn store(&self) -> Result<Store> {
        Store::open(&self.config.storage).context("Failed to open offline store")
    }

    /// Create the network client.
    pub fn fetcher(&self) -> Result<Arc<dyn Fetcher>> {
        let client = FetchClient::new().context("Failed to create HTTP client")?;
        Ok(Arc::new(client))
    }

    /// Build the cache proxy.
    pub fn proxy(&self) -> Result<EdgeCacheProxy> {
        EdgeCacheProxy::new(self.config.cache.clone(), self.store()?, self.fetcher()?)
            .context("Invalid cache configuration")
    }

    /// Build the offline queue with the HTTP replay transport.
    pub fn queue(&self) -> Result<OfflineQueue> {
        let queue_config = &self.config.queue;
        let transport = HttpReplayTransport::new(
            self.fetcher()?,
            queue_config.base_url.clone(),
            queue_config.endpoints.clone(),
        );
        OfflineQueue::new(self.store()?, Arc::new(transport), queue_config.clone())
            .context("Invalid queue configuration")
    }
}
