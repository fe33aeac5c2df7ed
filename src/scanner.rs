// =============================================================================
// Scan Orchestrator
// =============================================================================
//
// One scan pass:
//   1. Spawn one task per ticker; a semaphore caps how many run at once.
//   2. Each task loads both timeframes, evaluates the setups, consults the
//      trade memory, notifies on a novel detection and appends exactly one
//      row to the shared scan log.
//   3. Barrier: await every task (a panicked task still yields a Failed row).
//   4. Write the CSV artifact, build the summary and send it.
//
// Per-ticker failures never abort the pass.  Trade-memory persistence
// failures are collected and surfaced to the caller after the log is written.
// =============================================================================

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::ScanError;
use crate::market_data::{MarketDataProvider, PriceBar};
use crate::notify::Notifier;
use crate::scan_log::{self, ScanLog, ScanResult};
use crate::scanner_config::ScannerConfig;
use crate::setups::{self, Signal};
use crate::trade_memory::TradeMemory;
use crate::types::{ScanModule, ScanStatus, SetupKind};

// =============================================================================
// Summary
// =============================================================================

/// Tickers per outcome category for one scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanSummary {
    pub trend: Vec<String>,
    pub meanrev: Vec<String>,
    pub suppressed: Vec<String>,
    pub no_setup: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

impl ScanSummary {
    pub fn from_results(results: &[ScanResult]) -> Self {
        let mut summary = Self::default();
        for row in results {
            let bucket = match (row.status, row.module) {
                (ScanStatus::Detected, ScanModule::Trend) => &mut summary.trend,
                (ScanStatus::Detected, _) => &mut summary.meanrev,
                (ScanStatus::Suppressed, _) => &mut summary.suppressed,
                (ScanStatus::NoSetup, _) => &mut summary.no_setup,
                (ScanStatus::Skipped, _) => &mut summary.skipped,
                (ScanStatus::Failed, _) => &mut summary.failed,
            };
            bucket.push(row.ticker.clone());
        }
        for bucket in [
            &mut summary.trend,
            &mut summary.meanrev,
            &mut summary.suppressed,
            &mut summary.no_setup,
            &mut summary.skipped,
            &mut summary.failed,
        ] {
            bucket.sort();
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.trend.len()
            + self.meanrev.len()
            + self.suppressed.len()
            + self.no_setup.len()
            + self.skipped.len()
            + self.failed.len()
    }

    /// End-of-scan notification text.
    pub fn message(&self, log_name: &str) -> String {
        format!(
            "📊 **SCAN COMPLETE**\n\
             📈 Trend: {} → {:?}\n\
             ⚡ MeanRev: {} → {:?}\n\
             🔁 Repeats: {}\n\
             ➖ No setup: {}\n\
             ⏭ Skipped: {}\n\
             ❌ Errors: {}\n\
             🗂 Log: `{}`",
            self.trend.len(),
            self.trend,
            self.meanrev.len(),
            self.meanrev,
            self.suppressed.len(),
            self.no_setup.len(),
            self.skipped.len(),
            self.failed.len(),
            log_name,
        )
    }
}

/// Everything a finished scan produced.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Local>,
    /// One row per ticker, sorted by ticker.
    pub results: Vec<ScanResult>,
    pub summary: ScanSummary,
    pub log_path: PathBuf,
    /// Trade-memory persistence failures, keyed by ticker.
    pub persistence_failures: BTreeMap<String, String>,
}

// =============================================================================
// Scanner
// =============================================================================

#[derive(Clone)]
pub struct Scanner {
    config: Arc<ScannerConfig>,
    provider: Arc<dyn MarketDataProvider>,
    notifier: Arc<dyn Notifier>,
    memory: Arc<TradeMemory>,
}

impl Scanner {
    pub fn new(
        config: ScannerConfig,
        provider: Arc<dyn MarketDataProvider>,
        notifier: Arc<dyn Notifier>,
        memory: Arc<TradeMemory>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            provider,
            notifier,
            memory,
        }
    }

    /// Run one full scan over the configured ticker universe.
    ///
    /// Only a failure to write the scan log is returned as an error; every
    /// per-ticker problem is captured in the report.
    pub async fn run(&self) -> Result<ScanReport> {
        let run_id = Uuid::new_v4();
        self.run_inner(run_id)
            .instrument(info_span!("scan", run_id = %run_id))
            .await
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<ScanReport> {
        let started_at = Local::now();
        let tickers = unique_tickers(&self.config.tickers);
        let total = tickers.len();
        info!(tickers = total, max_workers = self.config.max_workers, "scan started");

        let log = Arc::new(ScanLog::new());
        let permits = Arc::new(Semaphore::new(self.config.max_workers.max(1)));

        // ── Fan-out ──────────────────────────────────────────────────────
        let mut handles = Vec::with_capacity(total);
        for ticker in tickers {
            let scanner = self.clone();
            let log = Arc::clone(&log);
            let permits = Arc::clone(&permits);
            let task_ticker = ticker.clone();

            let handle = tokio::spawn(
                async move {
                    // The semaphore is never closed.
                    let _permit = permits.acquire_owned().await.ok();
                    let (row, fatal) = scanner.scan_ticker(&task_ticker).await;
                    log.push(row);
                    fatal
                }
                .in_current_span(),
            );
            handles.push((ticker, handle));
        }

        // ── Barrier ──────────────────────────────────────────────────────
        let mut persistence_failures = BTreeMap::new();
        for (done, (ticker, handle)) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(Some(fatal)) => {
                    persistence_failures.insert(ticker.clone(), fatal);
                }
                Ok(None) => {}
                Err(join_err) => {
                    error!(ticker = %ticker, error = %join_err, "ticker task aborted");
                    let err = ScanError::Unexpected(format!("task aborted: {join_err}"));
                    log.push(ScanResult::new(
                        ticker.as_str(),
                        ScanModule::Error,
                        err.status(),
                        err.to_string(),
                    ));
                }
            }
            debug!(ticker = %ticker, done = done + 1, total, "ticker joined");
        }

        // ── Aggregate ────────────────────────────────────────────────────
        let mut results = log.snapshot();
        results.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        let summary = ScanSummary::from_results(&results);

        let log_path = scan_log::write_csv(&self.config.paths.log_dir, started_at, &results)?;

        info!(
            trend = summary.trend.len(),
            meanrev = summary.meanrev.len(),
            suppressed = summary.suppressed.len(),
            no_setup = summary.no_setup.len(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            "scan complete"
        );

        self.send_summary(&summary, &log_path).await;

        Ok(ScanReport {
            run_id,
            started_at,
            results,
            summary,
            log_path,
            persistence_failures,
        })
    }

    async fn send_summary(&self, summary: &ScanSummary, log_path: &std::path::Path) {
        let log_name = log_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let message = summary.message(&log_name);

        let sent = if self.config.notify.attach_log {
            self.notifier.send_file(&message, log_path).await
        } else {
            self.notifier.send(&message).await
        };
        if let Err(e) = sent {
            warn!(error = %format!("{e:#}"), "summary notification failed");
        }
    }

    /// Evaluate one ticker into its scan row.  The second element carries a
    /// run-fatal error description, if any.
    async fn scan_ticker(&self, ticker: &str) -> (ScanResult, Option<String>) {
        match self.evaluate_ticker(ticker).await {
            Ok(row) => (row, None),
            Err(err) => {
                let module = match err {
                    ScanError::DataUnavailable { .. } => ScanModule::Data,
                    _ => ScanModule::Error,
                };
                match err.status() {
                    ScanStatus::Skipped => debug!(ticker, reason = %err, "ticker skipped"),
                    _ => warn!(ticker, error = %err, "ticker failed"),
                }
                let fatal = err.is_run_fatal().then(|| err.to_string());
                (ScanResult::new(ticker, module, err.status(), err.to_string()), fatal)
            }
        }
    }

    async fn evaluate_ticker(&self, ticker: &str) -> Result<ScanResult, ScanError> {
        let cfg = &self.config;

        // Both histories load together; a lower-timeframe failure only
        // counts if the trend rule falls through to mean reversion.
        let (trend_bars, meanrev_bars) = tokio::join!(
            self.fetch(ticker, &cfg.trend.timeframe),
            self.fetch(ticker, &cfg.mean_reversion.timeframe),
        );
        let trend_bars = trend_bars?;

        let signal = setups::evaluate_bars(
            ticker,
            &trend_bars,
            meanrev_bars.as_deref().map_err(|e| e.clone()),
            cfg,
        )?;

        let Some(kind) = signal.kind() else {
            return Ok(ScanResult::new(
                ticker,
                ScanModule::Scan,
                ScanStatus::NoSetup,
                signal.details(),
            ));
        };

        let novel = self.record(ticker, kind).await?;

        if !novel {
            debug!(ticker, kind = %kind, "setup already alerted");
            return Ok(ScanResult::new(
                ticker,
                kind.into(),
                ScanStatus::Suppressed,
                signal.details(),
            ));
        }

        info!(ticker, kind = %kind, bias = ?signal.bias(), details = %signal.details(), "setup detected");
        self.notify_detection(ticker, &signal).await;

        Ok(ScanResult::new(
            ticker,
            kind.into(),
            ScanStatus::Detected,
            signal.details(),
        ))
    }

    /// Check-and-record in the trade memory.  The file write blocks, so it
    /// runs off the async worker threads.
    async fn record(&self, ticker: &str, kind: SetupKind) -> Result<bool, ScanError> {
        let memory = Arc::clone(&self.memory);
        let owned = ticker.to_string();
        tokio::task::spawn_blocking(move || memory.record_if_new(&owned, kind))
            .await
            .map_err(|e| ScanError::Unexpected(format!("trade memory task aborted: {e}")))?
            .map_err(|e| ScanError::Persistence(format!("{e:#}")))
    }

    async fn notify_detection(&self, ticker: &str, signal: &Signal) {
        if !self.config.notify.notify_on_detection {
            return;
        }
        let Some(message) = signal.message() else {
            return;
        };
        if let Err(e) = self.notifier.send(&message).await {
            warn!(ticker, error = %format!("{e:#}"), "detection notification failed");
        }
    }

    async fn fetch(&self, ticker: &str, timeframe: &str) -> Result<Vec<PriceBar>, ScanError> {
        self.provider
            .fetch_bars(ticker, timeframe, &self.config.lookback)
            .await
            .map_err(|e| ScanError::MarketData(format!("{timeframe}: {e:#}")))
    }
}

/// Drop repeated tickers, keeping first occurrence order.
fn unique_tickers(tickers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tickers
        .iter()
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        crashing_hourly, daily, flat_daily, neutral_hourly, trend_pullback_daily,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Clone)]
    enum Feed {
        Bars(Vec<PriceBar>),
        Fail(&'static str),
        Panic,
    }

    /// Provider keyed by (ticker, timeframe) that records peak concurrency.
    #[derive(Default)]
    struct MockProvider {
        feeds: HashMap<(String, String), Feed>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MockProvider {
        fn with(mut self, ticker: &str, timeframe: &str, feed: Feed) -> Self {
            self.feeds.insert((ticker.to_string(), timeframe.to_string()), feed);
            self
        }

        fn setup(self, ticker: &str, trend: Vec<PriceBar>, meanrev: Vec<PriceBar>) -> Self {
            self.with(ticker, "1d", Feed::Bars(trend))
                .with(ticker, "1h", Feed::Bars(meanrev))
        }
    }

    #[async_trait]
    impl MarketDataProvider for MockProvider {
        async fn fetch_bars(&self, ticker: &str, timeframe: &str, _lookback: &str) -> Result<Vec<PriceBar>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            // Vary completion order across tickers.
            let jitter = ticker.bytes().map(u64::from).sum::<u64>() % 7;
            tokio::time::sleep(Duration::from_millis(1 + jitter)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.feeds.get(&(ticker.to_string(), timeframe.to_string())) {
                Some(Feed::Bars(bars)) => Ok(bars.clone()),
                Some(Feed::Fail(msg)) => anyhow::bail!("{msg}"),
                Some(Feed::Panic) => panic!("provider exploded"),
                None => Ok(Vec::new()),
            }
        }
    }

    #[derive(Default)]
    struct MockNotifier {
        sent: Mutex<Vec<String>>,
        files: Mutex<Vec<PathBuf>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, message: &str) -> Result<()> {
            if self.fail {
                anyhow::bail!("webhook down");
            }
            self.sent.lock().push(message.to_string());
            Ok(())
        }

        async fn send_file(&self, message: &str, path: &Path) -> Result<()> {
            if self.fail {
                anyhow::bail!("webhook down");
            }
            self.sent.lock().push(message.to_string());
            self.files.lock().push(path.to_path_buf());
            Ok(())
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        memory: Arc<TradeMemory>,
        notifier: Arc<MockNotifier>,
        provider: Arc<MockProvider>,
        config: ScannerConfig,
    }

    impl Harness {
        fn new(provider: MockProvider, tickers: &[&str]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut config = ScannerConfig::default();
            config.tickers = tickers.iter().map(|t| t.to_string()).collect();
            config.max_workers = 4;
            config.paths.log_dir = dir.path().join("logs");
            config.paths.memory_file = dir.path().join("trade_memory.json");
            let memory = Arc::new(TradeMemory::load(&config.paths.memory_file).unwrap());
            Self {
                _dir: dir,
                memory,
                notifier: Arc::new(MockNotifier::default()),
                provider: Arc::new(provider),
                config,
            }
        }

        fn scanner(&self) -> Scanner {
            Scanner::new(
                self.config.clone(),
                self.provider.clone(),
                self.notifier.clone(),
                self.memory.clone(),
            )
        }
    }

    fn row<'a>(report: &'a ScanReport, ticker: &str) -> &'a ScanResult {
        report.results.iter().find(|r| r.ticker == ticker).unwrap()
    }

    #[tokio::test]
    async fn every_ticker_yields_exactly_one_row() {
        let tickers: Vec<String> = (0..20).map(|i| format!("T{i:02}")).collect();
        let mut provider = MockProvider::default();
        for t in &tickers {
            provider = provider.setup(t, flat_daily(), neutral_hourly());
        }
        let refs: Vec<&str> = tickers.iter().map(String::as_str).collect();
        let h = Harness::new(provider, &refs);

        let report = h.scanner().run().await.unwrap();

        assert_eq!(report.results.len(), 20);
        let unique: HashSet<&str> = report.results.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(unique.len(), 20);
        assert_eq!(report.summary.no_setup.len(), 20);
        assert_eq!(report.summary.total(), 20);
        assert!(h.provider.peak.load(Ordering::SeqCst) <= 4 * 2);
        assert!(report.results.windows(2).all(|w| w[0].ticker < w[1].ticker));
    }

    #[tokio::test]
    async fn mixed_outcomes_are_classified() {
        let provider = MockProvider::default()
            .setup("TRND", trend_pullback_daily(), neutral_hourly())
            .setup("MREV", flat_daily(), crashing_hourly())
            .setup("FLAT", flat_daily(), neutral_hourly())
            .setup("TINY", daily(&[10.0; 40]), neutral_hourly())
            .with("DOWN", "1d", Feed::Fail("HTTP 503"))
            .with("DOWN", "1h", Feed::Bars(neutral_hourly()));
        let h = Harness::new(provider, &["TRND", "MREV", "FLAT", "TINY", "DOWN", "NONE"]);

        let report = h.scanner().run().await.unwrap();

        assert_eq!(report.summary.trend, vec!["TRND"]);
        assert_eq!(report.summary.meanrev, vec!["MREV"]);
        assert_eq!(report.summary.no_setup, vec!["FLAT"]);
        assert_eq!(report.summary.skipped, vec!["NONE", "TINY"]);
        assert_eq!(report.summary.failed, vec!["DOWN"]);
        assert!(report.persistence_failures.is_empty());

        assert_eq!(row(&report, "TINY").module, ScanModule::Data);
        assert!(row(&report, "DOWN").details.contains("HTTP 503"));
        assert!(row(&report, "MREV").details.contains("LONG"));

        // Two detections plus the summary.
        let sent = h.notifier.sent.lock().clone();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().any(|m| m.contains("TREND SETUP") && m.contains("TRND")));
        assert!(sent.iter().any(|m| m.contains("MEAN REVERSION") && m.contains("MREV")));
        assert!(sent.last().unwrap().contains("SCAN COMPLETE"));
        assert_eq!(h.notifier.files.lock().as_slice(), &[report.log_path.clone()]);

        let mut reader = csv::Reader::from_path(&report.log_path).unwrap();
        assert_eq!(reader.records().count(), 6);
        assert!(h.memory.seen("TRND", SetupKind::Trend));
        assert!(h.memory.seen("MREV", SetupKind::MeanRev));
    }

    #[tokio::test]
    async fn repeat_scan_is_suppressed() {
        let provider = MockProvider::default().setup("MREV", flat_daily(), crashing_hourly());
        let h = Harness::new(provider, &["MREV"]);

        let first = h.scanner().run().await.unwrap();
        assert_eq!(first.summary.meanrev, vec!["MREV"]);

        let second = h.scanner().run().await.unwrap();
        assert_eq!(second.summary.suppressed, vec!["MREV"]);
        assert_eq!(row(&second, "MREV").status, ScanStatus::Suppressed);

        // One detection message and two summaries.
        let sent = h.notifier.sent.lock().clone();
        assert_eq!(sent.iter().filter(|m| m.contains("MEAN REVERSION")).count(), 1);
        assert_eq!(sent.iter().filter(|m| m.contains("SCAN COMPLETE")).count(), 2);
    }

    #[tokio::test]
    async fn hourly_outage_does_not_hide_trend_detection() {
        let provider = MockProvider::default()
            .with("TRND", "1d", Feed::Bars(trend_pullback_daily()))
            .with("TRND", "1h", Feed::Fail("HTTP 503 on hourly"))
            .with("FLAT", "1d", Feed::Bars(flat_daily()))
            .with("FLAT", "1h", Feed::Fail("HTTP 503 on hourly"));
        let h = Harness::new(provider, &["TRND", "FLAT"]);

        let report = h.scanner().run().await.unwrap();

        let trnd = row(&report, "TRND");
        assert_eq!(trnd.status, ScanStatus::Detected);
        assert_eq!(trnd.module, ScanModule::Trend);
        assert!(h.memory.seen("TRND", SetupKind::Trend));

        // Without a trend match the hourly failure decides the row.
        let flat = row(&report, "FLAT");
        assert_eq!(flat.status, ScanStatus::Failed);
        assert!(flat.details.contains("HTTP 503 on hourly"));
    }

    #[tokio::test]
    async fn suppressed_trend_still_short_circuits_meanrev() {
        let provider =
            MockProvider::default().setup("TRND", trend_pullback_daily(), crashing_hourly());
        let h = Harness::new(provider, &["TRND"]);
        h.memory.remember("TRND", SetupKind::Trend).unwrap();

        let report = h.scanner().run().await.unwrap();

        let trnd = row(&report, "TRND");
        assert_eq!(trnd.status, ScanStatus::Suppressed);
        assert_eq!(trnd.module, ScanModule::Trend);
        assert_eq!(report.summary.suppressed, vec!["TRND"]);
        assert!(report.summary.meanrev.is_empty());
        assert!(h.memory.seen("TRND", SetupKind::Trend));
        assert!(!h.memory.seen("TRND", SetupKind::MeanRev));

        let sent = h.notifier.sent.lock().clone();
        assert!(sent.iter().all(|m| !m.contains("MEAN REVERSION")));
        assert!(sent.iter().all(|m| !m.contains("TREND SETUP")));
    }

    #[tokio::test]
    async fn notification_failure_does_not_change_outcome() {
        let provider = MockProvider::default().setup("MREV", flat_daily(), crashing_hourly());
        let mut h = Harness::new(provider, &["MREV"]);
        h.notifier = Arc::new(MockNotifier {
            fail: true,
            ..Default::default()
        });

        let report = h.scanner().run().await.unwrap();
        assert_eq!(row(&report, "MREV").status, ScanStatus::Detected);
        assert!(report.log_path.exists());
    }

    #[tokio::test]
    async fn persistence_failure_is_reported_as_fatal() {
        let provider = MockProvider::default()
            .setup("MREV", flat_daily(), crashing_hourly())
            .setup("FLAT", flat_daily(), neutral_hourly());
        let mut h = Harness::new(provider, &["MREV", "FLAT"]);
        let bad_path = h._dir.path().join("no_such_dir").join("mem.json");
        h.memory = Arc::new(TradeMemory::load(bad_path).unwrap());

        let report = h.scanner().run().await.unwrap();
        assert_eq!(row(&report, "MREV").status, ScanStatus::Failed);
        assert_eq!(row(&report, "FLAT").status, ScanStatus::NoSetup);
        assert!(report.persistence_failures.contains_key("MREV"));
        assert_eq!(report.persistence_failures.len(), 1);
    }

    #[tokio::test]
    async fn panicking_ticker_is_recorded_and_others_finish() {
        let provider = MockProvider::default()
            .with("BOOM", "1d", Feed::Panic)
            .setup("FLAT", flat_daily(), neutral_hourly());
        let h = Harness::new(provider, &["BOOM", "FLAT"]);

        let report = h.scanner().run().await.unwrap();
        assert_eq!(report.results.len(), 2);
        assert_eq!(row(&report, "BOOM").status, ScanStatus::Failed);
        assert_eq!(row(&report, "FLAT").status, ScanStatus::NoSetup);
    }

    #[test]
    fn unique_tickers_normalises_and_dedups() {
        let raw: Vec<String> = ["aapl", "MSFT", " AAPL ", "", "msft", "NVDA"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(unique_tickers(&raw), vec!["AAPL", "MSFT", "NVDA"]);
    }

    #[test]
    fn summary_message_lists_detections() {
        let summary = ScanSummary {
            trend: vec!["AAPL".into()],
            meanrev: vec!["TSLA".into(), "XOM".into()],
            skipped: vec!["TINY".into()],
            ..Default::default()
        };
        let msg = summary.message("scan_2025-01-01_093000.csv");
        assert!(msg.contains("Trend: 1"));
        assert!(msg.contains("MeanRev: 2"));
        assert!(msg.contains("TSLA"));
        assert!(msg.contains("Skipped: 1"));
        assert!(msg.contains("scan_2025-01-01_093000.csv"));
        assert_eq!(summary.total(), 4);
    }
}
