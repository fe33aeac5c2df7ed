// =============================================================================
// Swing Scanner — Main Entry Point
// =============================================================================
//
// Scans the configured ticker universe once, or repeatedly every
// `scan_interval_secs` until Ctrl+C.  A trade-memory persistence failure
// ends the process with an error after the scan log has been written.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod error;
mod indicators;
mod market_data;
mod notify;
mod scan_log;
mod scanner;
mod scanner_config;
mod setups;
mod trade_memory;
mod types;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::market_data::{MarketDataProvider, YahooClient};
use crate::notify::{DiscordWebhook, LogNotifier, Notifier};
use crate::scanner::{ScanReport, Scanner};
use crate::scanner_config::ScannerConfig;
use crate::trade_memory::TradeMemory;

const DEFAULT_CONFIG_PATH: &str = "scanner_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Swing Scanner starting up");

    let config_path =
        std::env::var("SCANNER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = ScannerConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %format!("{e:#}"), "Failed to load config, using defaults");
        ScannerConfig::default()
    });
    config.apply_env_overrides();
    config.validate()?;

    info!(
        tickers = config.tickers.len(),
        max_workers = config.max_workers,
        trend_tf = %config.trend.timeframe,
        meanrev_tf = %config.mean_reversion.timeframe,
        interval_secs = config.scan_interval_secs,
        "Scanner configured"
    );

    // ── 2. Collaborators ─────────────────────────────────────────────────
    let provider: Arc<dyn MarketDataProvider> = Arc::new(YahooClient::new()?);

    let notifier: Arc<dyn Notifier> = match std::env::var("DISCORD_WEBHOOK") {
        Ok(url) if !url.trim().is_empty() => {
            info!("Discord notifications enabled");
            Arc::new(DiscordWebhook::new(url.trim())?)
        }
        _ => {
            warn!("DISCORD_WEBHOOK not set — notifications go to the log only");
            Arc::new(LogNotifier)
        }
    };

    let memory = Arc::new(TradeMemory::load(config.paths.memory_file.clone())?);

    let interval_secs = config.scan_interval_secs;
    let scanner = Scanner::new(config, provider, notifier, Arc::clone(&memory));

    // ── 3. Single pass ───────────────────────────────────────────────────
    if interval_secs == 0 {
        let report = scanner.run().await?;
        return finish(&report, &memory);
    }

    // ── 4. Periodic mode ─────────────────────────────────────────────────
    let mut ticker = scan_interval(interval_secs);
    info!(interval_secs, "Periodic scanning. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = scanner.run().await?;
                finish(&report, &memory)?;
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Shutdown signal received — stopping");
                break;
            }
        }
    }

    info!("Swing Scanner shut down complete.");
    Ok(())
}

/// Scan cadence.  A scan that overruns the interval delays the next one
/// instead of triggering catch-up scans.
fn scan_interval(secs: u64) -> Interval {
    let mut interval = tokio::time::interval(Duration::from_secs(secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Log the outcome of one pass and turn persistence failures into an error.
fn finish(report: &ScanReport, memory: &TradeMemory) -> anyhow::Result<()> {
    let summary = &report.summary;
    let elapsed = chrono::Local::now() - report.started_at;
    info!(
        run_id = %report.run_id,
        rows = report.results.len(),
        tickers = summary.total(),
        trend = summary.trend.len(),
        meanrev = summary.meanrev.len(),
        suppressed = summary.suppressed.len(),
        failed = summary.failed.len(),
        elapsed_ms = elapsed.num_milliseconds(),
        remembered = memory.len(),
        log = %report.log_path.display(),
        "Scan finished"
    );

    if report.persistence_failures.is_empty() {
        return Ok(());
    }
    for (ticker, reason) in &report.persistence_failures {
        error!(ticker = %ticker, reason = %reason, "Trade memory not persisted");
    }
    anyhow::bail!(
        "trade memory could not be persisted for {} ticker(s): {:?}",
        report.persistence_failures.len(),
        report.persistence_failures.keys().collect::<Vec<_>>()
    )
}
