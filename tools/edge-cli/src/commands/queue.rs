//! Offline queue commands.

use anyhow::{bail, Context as _, Result};
use serde_json::json;
use turbo_sync::MutationKind;

use super::{QueueArgs, QueueCommand};
use crate::context::Context;
use crate::output::format_timestamp;

/// Run the queue command.
pub async fn run(args: QueueArgs, ctx: &Context) -> Result<()> {
    match args.command {
        QueueCommand::Add { kind, payload } => add(&kind, &payload, ctx).await,
        QueueCommand::List { limit } => list(limit, ctx).await,
        QueueCommand::Drain => drain(ctx).await,
        QueueCommand::Stats => stats(ctx).await,
        QueueCommand::Cleanup => cleanup(ctx).await,
        QueueCommand::DeadLetters => dead_letters(ctx).await,
    }
}

async fn add(kind: &str, payload: &str, ctx: &Context) -> Result<()> {
    let kind = MutationKind::from(kind);
    if !kind.is_known() {
        bail!(
            "Unknown mutation kind '{}'. Expected cart_update, order_create or user_action",
            kind
        );
    }
    let payload: serde_json::Value = serde_json::from_str(payload).context("Payload is not valid JSON")?;

    let queue = ctx.queue()?;
    let id = queue.add_to_queue(kind.clone(), payload).await?;

    if ctx.output.is_json() {
        ctx.output.json(&json!({ "id": id, "kind": kind }));
    } else {
        ctx.output.success(&format!("Queued {} ({})", id, kind));
    }
    Ok(())
}

async fn list(limit: Option<usize>, ctx: &Context) -> Result<()> {
    let queue = ctx.queue()?;
    let mut pending = queue.pending().await?;
    if let Some(limit) = limit {
        pending.truncate(limit);
    }

    if ctx.output.is_json() {
        ctx.output.json(&pending);
        return Ok(());
    }

    ctx.output.header("Pending mutations");
    if pending.is_empty() {
        ctx.output.info("Queue is empty");
        return Ok(());
    }

    let widths = [48, 14, 25, 8];
    ctx.output.table_row(&["ID", "KIND", "ENQUEUED", "ATTEMPTS"], &widths);
    for record in &pending {
        ctx.output.table_row(
            &[
                record.id.as_str(),
                record.kind.as_str(),
                &format_timestamp(record.enqueued_at),
                &record.attempt_count.to_string(),
            ],
            &widths,
        );
        ctx.output.debug(&format!("  payload: {}", record.payload));
    }
    Ok(())
}

async fn drain(ctx: &Context) -> Result<()> {
    let queue = ctx.queue()?;
    let pending = queue.pending().await?.len();

    let spinner = ctx
        .output
        .spinner(&format!("Replaying {} mutation(s) to {}...", pending, queue.config().base_url));
    let report = queue.process_queue().await;
    spinner.finish_and_clear();
    let report = report?;

    if ctx.output.is_json() {
        ctx.output.json(&report);
        return Ok(());
    }

    ctx.output.kv("replayed", &report.replayed.to_string());
    ctx.output.kv("failed", &report.failed.to_string());
    ctx.output.kv("dropped", &report.dropped.to_string());
    if report.skipped > 0 {
        ctx.output.kv("waiting for backoff", &report.skipped.to_string());
    }
    if report.discarded > 0 {
        ctx.output.kv("discarded (undecodable)", &report.discarded.to_string());
    }

    if report.failed == 0 {
        ctx.output.success("Queue drained");
    } else {
        ctx.output.warn("Some mutations failed and will be retried on the next drain");
    }
    Ok(())
}

async fn stats(ctx: &Context) -> Result<()> {
    let queue = ctx.queue()?;
    let stats = queue.stats().await;

    if ctx.output.is_json() {
        ctx.output.json(&stats);
        return Ok(());
    }

    ctx.output.header("Offline store");
    ctx.output.kv("pending mutations", &stats.pending_mutations.to_string());
    ctx.output.kv("dead letters", &stats.dead_letters.to_string());
    ctx.output.kv("cart items", &stats.cart_items.to_string());
    ctx.output.kv("cached orders", &stats.cached_orders.to_string());
    ctx.output.kv("recent products", &stats.recent_products.to_string());
    ctx.output.kv("preferences", &stats.preferences.to_string());
    Ok(())
}

async fn cleanup(ctx: &Context) -> Result<()> {
    let queue = ctx.queue()?;
    let report = queue.cleanup().await?;

    if ctx.output.is_json() {
        ctx.output.json(&report);
        return Ok(());
    }

    ctx.output.success(&format!(
        "Purged {} record(s) older than {} days",
        report.total(),
        queue.config().retention_days
    ));
    ctx.output.kv("snapshots", &report.snapshots.to_string());
    ctx.output.kv("mutations", &report.mutations.to_string());
    ctx.output.kv("dead letters", &report.dead_letters.to_string());
    Ok(())
}

async fn dead_letters(ctx: &Context) -> Result<()> {
    let queue = ctx.queue()?;
    let letters = queue.dead_letters().await?;

    if ctx.output.is_json() {
        ctx.output.json(&letters);
        return Ok(());
    }

    ctx.output.header("Dropped mutations");
    if letters.is_empty() {
        ctx.output.info("None");
        return Ok(());
    }

    for letter in &letters {
        ctx.output.list_item(&format!(
            "{} ({}) dropped {} after {} attempt(s)",
            letter.record.id,
            letter.record.kind,
            format_timestamp(letter.dropped_at),
            letter.record.attempt_count
        ));
        ctx.output.kv("error", &letter.last_error);
    }
    Ok(())
}
