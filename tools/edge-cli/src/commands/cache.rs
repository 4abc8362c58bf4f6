//! Edge cache commands.

use anyhow::{bail, Context as _, Result};
use dialoguer::Confirm;
use edge_cache::{age_ms, Classification, RequestClassifier};
use edge_core::{Clock, SystemClock};
use edge_data::HttpRequest;
use serde_json::json;

use super::{CacheArgs, CacheCommand};
use crate::context::Context;
use crate::output::{cache_status_badge, format_age, format_bytes, state_badge};

/// Run the cache command.
pub async fn run(args: CacheArgs, ctx: &Context) -> Result<()> {
    match args.command {
        CacheCommand::Classify { url, navigate } => classify(&url, navigate, ctx),
        CacheCommand::Fetch { url, navigate, body } => fetch(&url, navigate, body, ctx).await,
        CacheCommand::Install => install(ctx).await,
        CacheCommand::Activate => activate(ctx).await,
        CacheCommand::Sweep => sweep(ctx).await,
        CacheCommand::Stats => stats(ctx).await,
        CacheCommand::Clear { yes } => clear(yes, ctx).await,
    }
}

/// Build a request from an absolute URL or an origin-relative path.
fn request_for(url: &str, navigate: bool, ctx: &Context) -> Result<HttpRequest> {
    let url = if url.starts_with('/') {
        ctx.config.cache.resolve(url)?.to_string()
    } else {
        url.to_string()
    };

    let request = if navigate {
        HttpRequest::navigate(&url)
    } else {
        HttpRequest::get(&url)
    };
    request.with_context(|| format!("Invalid URL: {}", url))
}

fn classify(url: &str, navigate: bool, ctx: &Context) -> Result<()> {
    ctx.config.cache.validate()?;
    let request = request_for(url, navigate, ctx)?;
    let classifier = RequestClassifier::from_config(&ctx.config.cache);

    match classifier.classify(&request) {
        Classification::Bypass(reason) => {
            if ctx.output.is_json() {
                ctx.output.json(&json!({ "url": request.url, "bypass": reason }));
            } else {
                ctx.output.info(&format!("{} bypasses the proxy ({})", request.url, reason));
            }
        }
        Classification::Rule { rule, fallback } => {
            if ctx.output.is_json() {
                ctx.output.json(&json!({ "url": request.url, "rule": rule, "fallback": fallback }));
                return Ok(());
            }

            ctx.output.header(request.url.as_str());
            ctx.output.kv("strategy", &rule.strategy.to_string());
            if rule.strategy.uses_cache() {
                ctx.output.kv(
                    "partition",
                    &ctx.config.cache.generation().partition_name(&rule.partition),
                );
                ctx.output.kv("max_age", &format_age(rule.max_age_ms));
                ctx.output.kv("max_entries", &rule.max_entries.to_string());
            }
            if fallback {
                ctx.output.kv("matched", "fallback rule");
            } else {
                ctx.output.kv("pattern", &serde_json::to_string(&rule.pattern)?);
            }
        }
    }
    Ok(())
}

async fn fetch(url: &str, navigate: bool, show_body: bool, ctx: &Context) -> Result<()> {
    let proxy = ctx.proxy()?;
    let request = request_for(url, navigate, ctx)?;

    let outcome = proxy
        .handle_fetch(&request)
        .await
        .with_context(|| format!("Failed to fetch {}", request.url))?;

    if let Some(revalidation) = outcome.revalidation {
        let spinner = ctx.output.spinner("Revalidating in the background...");
        let refreshed = revalidation.wait().await;
        spinner.finish_and_clear();
        if let Err(e) = refreshed {
            ctx.output.warn(&format!("Revalidation failed: {}", e));
        }
    }

    let response = &outcome.response;
    let age = age_ms(response, SystemClock.now_ms());

    if ctx.output.is_json() {
        ctx.output.json(&json!({
            "url": request.url,
            "cache_status": outcome.status,
            "http_status": response.status.as_u16(),
            "bytes": response.body.len(),
            "age_ms": age,
        }));
        return Ok(());
    }

    ctx.output.header(request.url.as_str());
    ctx.output.kv("cache", &cache_status_badge(outcome.status));
    ctx.output.kv("status", &response.status.to_string());
    ctx.output.kv("size", &format_bytes(response.body.len() as u64));
    if let Some(age) = age {
        ctx.output.kv("age", &format_age(age));
    }

    if show_body {
        println!();
        println!("{}", String::from_utf8_lossy(&response.body));
    }
    Ok(())
}

async fn install(ctx: &Context) -> Result<()> {
    let proxy = ctx.proxy()?;

    let spinner = ctx
        .output
        .spinner(&format!("Precaching {} pages...", proxy.config().precache_urls.len()));
    let report = proxy.install().await;
    spinner.finish_and_clear();

    if ctx.output.is_json() {
        ctx.output.json(&report);
        return Ok(());
    }

    for url in &report.cached {
        ctx.output.success(&format!("Cached {}", url));
    }
    for failure in &report.failed {
        ctx.output.warn(&format!("Skipped {}: {}", failure.url, failure.reason));
    }
    ctx.output.kv("state", &state_badge(proxy.state().await));
    Ok(())
}

async fn activate(ctx: &Context) -> Result<()> {
    let proxy = ctx.proxy()?;
    let report = proxy.activate().await.context("Activation failed")?;

    if ctx.output.is_json() {
        ctx.output.json(&report);
        return Ok(());
    }

    if report.deleted.is_empty() {
        ctx.output.info("No previous generations to delete");
    }
    for name in &report.deleted {
        ctx.output.list_item(&format!("deleted {}", name));
    }
    ctx.output.success(&format!("Activated {}", proxy.generation()));
    Ok(())
}

async fn sweep(ctx: &Context) -> Result<()> {
    let proxy = ctx.proxy()?;
    let report = proxy.sweep().await.context("Sweep failed")?;

    if ctx.output.is_json() {
        ctx.output.json(&report);
        return Ok(());
    }
    ctx.output.success(&format!(
        "Checked {} partition(s), evicted {} entr{}",
        report.partitions,
        report.evicted,
        if report.evicted == 1 { "y" } else { "ies" }
    ));
    Ok(())
}

async fn stats(ctx: &Context) -> Result<()> {
    let proxy = ctx.proxy()?;
    let stats = proxy.partition_stats().await.context("Failed to read partitions")?;

    if ctx.output.is_json() {
        ctx.output.json(&stats);
        return Ok(());
    }

    ctx.output.header(&format!("Cache partitions ({})", proxy.generation()));
    if stats.is_empty() {
        ctx.output.info("Nothing cached yet. Run `edge cache install`.");
        return Ok(());
    }

    ctx.output.table_row(&["PARTITION", "ENTRIES", "LIMIT", "GENERATION"], &[36, 8, 8, 10]);
    for partition in &stats {
        let limit = partition
            .max_entries
            .map(|m| m.to_string())
            .unwrap_or_else(|| "-".to_string());
        let generation = if partition.current { "current" } else { "old" };
        ctx.output.table_row(
            &[&partition.name, &partition.entries.to_string(), &limit, generation],
            &[36, 8, 8, 10],
        );
    }
    Ok(())
}

async fn clear(yes: bool, ctx: &Context) -> Result<()> {
    let proxy = ctx.proxy()?;

    if !yes {
        if ctx.output.is_json() {
            bail!("Refusing to clear without --yes in JSON mode");
        }
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete every partition of {}?", proxy.generation()))
            .default(false)
            .interact()?;
        if !confirmed {
            ctx.output.warn("Clear cancelled");
            return Ok(());
        }
    }

    let removed = proxy.clear().await.context("Failed to clear cache")?;
    if ctx.output.is_json() {
        ctx.output.json(&json!({ "removed_partitions": removed }));
    } else {
        ctx.output.success(&format!("Removed {} partition(s)", removed));
    }
    Ok(())
}
