//! Configuration management commands.

use std::fs;

use anyhow::{bail, Result};
use edge_cache::UrlPattern;
use turbo_store::StorageConfig;

use super::{ConfigArgs, ConfigCommand};
use crate::config::{generate_default_config, OfflineConfig};
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx),
        ConfigCommand::Init { json, force } => init_config(json, force, ctx),
        ConfigCommand::Validate => validate_config(ctx),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    let config = &ctx.config;

    if ctx.output.is_json() {
        ctx.output.json(config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults)"),
    }

    ctx.output.info("");
    ctx.output.info("[cache]");
    ctx.output.kv("origin", config.cache.origin.as_str());
    ctx.output.kv("generation", &config.cache.generation().to_string());
    ctx.output.kv("offline_page", &config.cache.offline_page);
    ctx.output.kv("precache_urls", &config.cache.precache_urls.join(", "));
    ctx.output.kv("allowed_hosts", &config.cache.allowed_hosts.join(", "));
    ctx.output.kv("rules", &config.cache.rules.len().to_string());

    ctx.output.info("");
    ctx.output.info("[queue]");
    ctx.output.kv("base_url", config.queue.base_url.as_str());
    ctx.output.kv("max_attempts", &config.queue.max_attempts.to_string());
    ctx.output.kv("retention_days", &config.queue.retention_days.to_string());
    ctx.output.kv("dead_letter", &config.queue.dead_letter.to_string());
    for (kind, endpoint) in config.queue.endpoints.iter() {
        ctx.output.kv(&format!("endpoint.{}", kind), endpoint);
    }

    ctx.output.info("");
    ctx.output.info("[storage]");
    match &config.storage {
        StorageConfig::Memory => ctx.output.kv("kind", "memory"),
        StorageConfig::Sqlite { path } => {
            ctx.output.kv("kind", "sqlite");
            ctx.output.kv("path", &path.display().to_string());
        }
    }

    ctx.output.info("");
    ctx.output.info("[logging]");
    ctx.output.kv("level", &config.logging.level);

    Ok(())
}

fn init_config(json: bool, force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join(if json { "edge.json" } else { "edge.toml" });

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    if json {
        OfflineConfig::default().save(&config_path)?;
    } else {
        fs::write(&config_path, generate_default_config()?)?;
    }

    ctx.output.success(&format!("Created: {}", config_path.display()));
    Ok(())
}

fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    let mut warnings: Vec<String> = Vec::new();
    if let StorageConfig::Memory = ctx.config.storage {
        warnings.push("storage.kind = \"memory\" keeps nothing between runs".to_string());
    }
    if !ctx.config.cache.rules.iter().any(|r| r.pattern == UrlPattern::Navigation) {
        warnings.push("no rule handles page navigations; the fallback rule will".to_string());
    }
    if !ctx.config.cache.precache_urls.contains(&ctx.config.cache.offline_page) {
        warnings.push(format!(
            "cache.offline_page '{}' is not precached; offline navigations get a generic page",
            ctx.config.cache.offline_page
        ));
    }

    if let Err(e) = ctx.config.validate() {
        ctx.output.error(&format!("Error: {}", e));
        bail!("Configuration is invalid");
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }

    if warnings.is_empty() {
        ctx.output.success("Configuration is valid");
    } else {
        ctx.output.success("Configuration is valid (with warnings)");
    }
    Ok(())
}
