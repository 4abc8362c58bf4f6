//! CLI command implementations.

pub mod cache;
pub mod config;
pub mod queue;

use clap::{Args, Subcommand};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration.
    Show,
    /// Write a default config file.
    Init {
        /// Write edge.json instead of edge.toml.
        #[arg(long)]
        json: bool,
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the configuration.
    Validate,
}

/// Arguments for the cache command.
#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Show which rule handles a URL.
    Classify {
        /// Absolute URL or origin-relative path.
        url: String,
        /// Treat the request as a page navigation.
        #[arg(short, long)]
        navigate: bool,
    },
    /// Fetch a URL through the proxy.
    Fetch {
        /// Absolute URL or origin-relative path.
        url: String,
        /// Treat the request as a page navigation.
        #[arg(short, long)]
        navigate: bool,
        /// Print the response body.
        #[arg(long)]
        body: bool,
    },
    /// Precache the critical pages.
    Install,
    /// Delete old cache generations.
    Activate,
    /// Enforce partition bounds.
    Sweep,
    /// Show entry counts per partition.
    Stats,
    /// Delete every partition of the current generation.
    Clear {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the queue command.
#[derive(Args)]
pub struct QueueArgs {
    #[command(subcommand)]
    pub command: QueueCommand,
}

#[derive(Subcommand)]
pub enum QueueCommand {
    /// Queue a mutation.
    Add {
        /// Mutation kind (cart_update, order_create, user_action).
        kind: String,
        /// JSON payload.
        payload: String,
    },
    /// List pending mutations, oldest first.
    List {
        /// Show only the first N mutations.
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Replay pending mutations.
    Drain,
    /// Show record counts.
    Stats,
    /// Purge records past the retention window.
    Cleanup,
    /// List dropped mutations.
    DeadLetters,
}
