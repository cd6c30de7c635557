//! Cache maintenance command implementations (sweep, invalidate, janitor, stats)

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use rival_core::{AIBackend, AIClient, CacheJanitor, Database, EngineConfig};

pub async fn cmd_sweep(db: &Database, config: &EngineConfig) -> Result<()> {
    let janitor = CacheJanitor::new(db.clone(), config.janitor.clone());
    let removed = janitor
        .sweep_expired()
        .await
        .context("Failed to sweep expired suggestions")?;

    println!("🧹 Removed {} expired suggestion(s)", removed);
    Ok(())
}

pub fn cmd_invalidate(db: &Database, config: &EngineConfig, country: &str) -> Result<()> {
    let janitor = CacheJanitor::new(db.clone(), config.janitor.clone());
    let removed = janitor
        .invalidate_country(country)
        .with_context(|| format!("Failed to invalidate suggestions for {}", country))?;

    println!(
        "🗑️  Removed {} suggestion(s) for {}",
        removed,
        country.trim().to_uppercase()
    );
    Ok(())
}

/// Run periodic sweeps until Ctrl-C
pub async fn cmd_janitor(db: &Database, config: &EngineConfig) -> Result<()> {
    let handle = CacheJanitor::new(db.clone(), config.janitor.clone()).start();

    println!(
        "🧹 Janitor running (every {} h). Press Ctrl-C to stop.",
        config.janitor.interval.as_secs() / 3600
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    handle.abort();
    tracing::info!("Janitor stopped");
    Ok(())
}

/// Print cache and search statistics
///
/// When a backend is configured, its reachability is checked as well.
pub async fn cmd_stats(db: &Database, days: i64, backend: Option<&AIClient>) -> Result<()> {
    let now = Utc::now();
    let stats = db.cache_stats(now)?;
    let metrics = db.search_metric_summary(now - Duration::days(days.max(1)))?;

    println!();
    println!("📊 Suggestion Cache");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Database: {}", db.path());
    if db.is_encrypted() {
        println!("   🔒 Encryption: ENABLED");
    } else {
        println!("   ⚠️  Encryption: DISABLED");
    }
    println!("   Entries: {} ({} live, {} expired)", stats.total, stats.live, stats.expired);

    if !stats.by_country.is_empty() {
        println!();
        println!("   {:8} │ {:>7}", "Country", "Entries");
        println!("   ─────────┼────────");
        for (country, count) in &stats.by_country {
            println!("   {:8} │ {:>7}", country, count);
        }
    }

    println!();
    println!("🤖 Competitor Searches (last {} days)", days.max(1));
    println!("   ─────────────────────────────────────────────────────────────");
    if metrics.total_calls == 0 {
        println!("   No searches recorded.");
    } else {
        println!("   Calls: {}", metrics.total_calls);
        println!("   Succeeded: {}", metrics.successful);
        println!("   Failed: {}", metrics.failed);
        println!("   Average latency: {:.0} ms", metrics.avg_latency_ms);
    }

    match backend {
        Some(client) => {
            let status = if client.health_check().await {
                "✅ reachable"
            } else {
                "❌ unreachable"
            };
            println!("   Backend: {} @ {} ({})", client.model(), client.host(), status);
        }
        None => println!("   Backend: not configured"),
    }
    println!();

    Ok(())
}
