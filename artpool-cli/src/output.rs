//! Text and JSON rendering for command results. Everything goes to stdout;
//! logs go to stderr.

use artpool_core::pass::Promotion;
use artpool_core::{PoolDetails, PoolSummary, PurgeReport};
use artpool_model::{ItemOutcome, RunSummary};
use serde::Serialize;

fn json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn summary(summary: &RunSummary, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        return json(summary);
    }
    for report in &summary.items {
        let detail = match &report.outcome {
            ItemOutcome::Rotated {
                member,
                added,
                topped_up,
            } => {
                let topped = if *topped_up { " topped-up" } else { "" };
                format!("rotated  {member} (+{added}{topped})")
            }
            ItemOutcome::Skipped { reason, added } => format!("skipped  {reason} (+{added})"),
            ItemOutcome::Failed { error } => format!("FAILED   {error}"),
        };
        println!("{:<38} {:<40} {}", report.id, truncate(&report.title, 40), detail);
    }
    println!("{summary}");
    Ok(())
}

pub fn pool_list(pools: &[PoolSummary], as_json: bool) -> anyhow::Result<()> {
    if as_json {
        return json(pools);
    }
    if pools.is_empty() {
        println!("no pools");
        return Ok(());
    }
    for pool in pools {
        let rotated = pool
            .last_rotated
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        let lock = if pool.locked { " locked" } else { "" };
        println!(
            "{:<38} {:<40} {:>2} members  last rotated {rotated}{lock}",
            pool.item_id,
            truncate(&pool.title, 40),
            pool.members
        );
    }
    Ok(())
}

pub fn pool_details(details: &PoolDetails, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        return json(details);
    }
    let summary = &details.summary;
    println!("{} ({})", summary.title, summary.item_id);
    println!("pool:   {}", summary.pool_dir.display());
    println!(
        "cursor: {}  order: {}  locked: {}",
        details
            .cursor
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string()),
        if details.custom_order { "custom" } else { "default" },
        summary.locked
    );
    for (index, member) in details.members.iter().enumerate() {
        println!(
            "{index:>3}  {:<32} {:>9} bytes  {:<8} {}{}",
            member.name,
            member.size,
            member.language.as_deref().unwrap_or("-"),
            member.fingerprint.as_deref().unwrap_or("-"),
            if member.is_snapshot { "  (snapshot)" } else { "" }
        );
    }
    Ok(())
}

pub fn promotion(promotion: &Promotion, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        return json(&serde_json::json!({
            "member": promotion.member,
            "destination": promotion.destination,
            "notify_failed": promotion.notify_failed,
        }));
    }
    println!("promoted {} -> {}", promotion.member, promotion.destination.display());
    if promotion.notify_failed {
        println!("warning: the catalog was not notified");
    }
    Ok(())
}

pub fn purge(report: &PurgeReport, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        return json(report);
    }
    println!("removed {} pool(s); rotation state cleared", report.pools_removed);
    Ok(())
}

pub fn line(text: &str, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        return json(&serde_json::json!({ "result": text }));
    }
    println!("{text}");
    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
