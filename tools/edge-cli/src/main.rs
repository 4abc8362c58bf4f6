//! Edge CLI - Operator tool for the storefront offline layer.
//!
//! Commands:
//! - `edge config` - Create, show and validate configuration
//! - `edge cache` - Classify, fetch, install, activate, sweep and inspect the edge cache
//! - `edge queue` - Queue, list, drain and clean up offline mutations

mod commands;
mod config;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{CacheArgs, ConfigArgs, QueueArgs};
use edge_observability::{init_logging, LogFormat};

/// Edge CLI - Inspect and operate the storefront offline layer
#[derive(Parser)]
#[command(name = "edge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config(ConfigArgs),

    /// Operate the edge cache proxy
    Cache(CacheArgs),

    /// Operate the offline mutation queue
    Queue(QueueArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let output = output::Output::new(cli.verbose, cli.json);
    let ctx = context::Context::load(cli.config.as_deref(), output)?;

    let mut logging = ctx.config.logging.clone();
    if cli.verbose {
        logging = logging.with_level("debug");
    }
    if cli.json {
        logging = logging.with_format(LogFormat::Json);
    }
    if let Err(e) = init_logging(&logging) {
        ctx.output.warn(&format!("Logging disabled: {}", e));
    }
    ctx.output.debug(&format!(
        "config: {}",
        ctx.config_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(defaults)".to_string())
    ));

    let result = match cli.command {
        Commands::Config(args) => commands::config::run(args, &ctx).await,
        Commands::Cache(args) => commands::cache::run(args, &ctx).await,
        Commands::Queue(args) => commands::queue::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
