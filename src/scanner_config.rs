// =============================================================================
// Scanner Configuration — ticker universe, rule thresholds, paths
// =============================================================================
//
// Every tunable of the scanner lives here.  The struct is loaded from a JSON
// file; all fields carry serde defaults so that a partial (or empty) file
// still loads.  A handful of fields can be overridden from the environment,
// and the notification credential is only ever read from the environment.
//
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_tickers() -> Vec<String> {
    [
        "AAPL", "MSFT", "NVDA", "AMZN", "GOOGL", "META", "TSLA", "AMD", "AVGO", "NFLX", "JPM",
        "V", "MA", "UNH", "XOM", "LLY", "COST", "HD", "CRM", "ORCL",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_lookback() -> String {
    "1y".to_string()
}

fn default_max_workers() -> usize {
    8
}

fn default_trend_timeframe() -> String {
    "1d".to_string()
}

fn default_trend_min_bars() -> usize {
    250
}

fn default_ema_fast() -> usize {
    20
}

fn default_ema_slow() -> usize {
    50
}

fn default_sma_long() -> usize {
    200
}

fn default_rsi_period() -> usize {
    14
}

fn default_trend_rsi_min() -> f64 {
    40.0
}

fn default_trend_rsi_max() -> f64 {
    55.0
}

fn default_meanrev_timeframe() -> String {
    "1h".to_string()
}

fn default_meanrev_min_bars() -> usize {
    30
}

fn default_oversold() -> f64 {
    10.0
}

fn default_overbought() -> f64 {
    90.0
}

fn default_stop_lookback() -> usize {
    10
}

fn default_stop_buffer() -> f64 {
    0.995
}

fn default_reward_multiples() -> Vec<f64> {
    vec![2.0, 3.0]
}

fn default_memory_file() -> PathBuf {
    PathBuf::from("trade_memory.json")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

// =============================================================================
// TrendParams
// =============================================================================

/// Trend-pullback rule on the higher timeframe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendParams {
    #[serde(default = "default_trend_timeframe")]
    pub timeframe: String,

    /// Bars required before the trend timeframe is evaluated at all.
    #[serde(default = "default_trend_min_bars")]
    pub min_bars: usize,

    #[serde(default = "default_ema_fast")]
    pub ema_fast: usize,

    #[serde(default = "default_ema_slow")]
    pub ema_slow: usize,

    #[serde(default = "default_sma_long")]
    pub sma_long: usize,

    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    /// Inclusive lower edge of the RSI band.
    #[serde(default = "default_trend_rsi_min")]
    pub rsi_min: f64,

    /// Inclusive upper edge of the RSI band.
    #[serde(default = "default_trend_rsi_max")]
    pub rsi_max: f64,

    /// Also accept a pullback through the slow EMA.
    #[serde(default)]
    pub allow_ema_slow_pullback: bool,

    /// Tickers whose last close is below this price skip the trend rule.
    /// `0.0` disables the filter.
    #[serde(default)]
    pub min_price: f64,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self {
            timeframe: default_trend_timeframe(),
            min_bars: default_trend_min_bars(),
            ema_fast: default_ema_fast(),
            ema_slow: default_ema_slow(),
            sma_long: default_sma_long(),
            rsi_period: default_rsi_period(),
            rsi_min: default_trend_rsi_min(),
            rsi_max: default_trend_rsi_max(),
            allow_ema_slow_pullback: false,
            min_price: 0.0,
        }
    }
}

// =============================================================================
// MeanReversionParams
// =============================================================================

/// RSI-extreme rule on the lower timeframe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeanReversionParams {
    #[serde(default = "default_meanrev_timeframe")]
    pub timeframe: String,

    #[serde(default = "default_meanrev_min_bars")]
    pub min_bars: usize,

    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    /// RSI strictly below this is oversold (long bias).
    #[serde(default = "default_oversold")]
    pub oversold: f64,

    /// RSI strictly above this is overbought (short bias).
    #[serde(default = "default_overbought")]
    pub overbought: f64,
}

impl Default for MeanReversionParams {
    fn default() -> Self {
        Self {
            timeframe: default_meanrev_timeframe(),
            min_bars: default_meanrev_min_bars(),
            rsi_period: default_rsi_period(),
            oversold: default_oversold(),
            overbought: default_overbought(),
        }
    }
}

// =============================================================================
// RiskParams
// =============================================================================

/// Stop / target enrichment attached to trend detections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskParams {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Number of trailing bars whose lowest low anchors the stop.
    #[serde(default = "default_stop_lookback")]
    pub stop_lookback: usize,

    /// Multiplier applied to that low (0.995 = half a percent below).
    #[serde(default = "default_stop_buffer")]
    pub stop_buffer: f64,

    /// Reward-to-risk multiples, one target per entry.
    #[serde(default = "default_reward_multiples")]
    pub reward_multiples: Vec<f64>,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            enabled: true,
            stop_lookback: default_stop_lookback(),
            stop_buffer: default_stop_buffer(),
            reward_multiples: default_reward_multiples(),
        }
    }
}

// =============================================================================
// PathParams / NotifyParams
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathParams {
    /// Persisted dedup memory.
    #[serde(default = "default_memory_file")]
    pub memory_file: PathBuf,

    /// Directory receiving one CSV log per scan.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for PathParams {
    fn default() -> Self {
        Self {
            memory_file: default_memory_file(),
            log_dir: default_log_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyParams {
    /// Attach the CSV log to the end-of-scan summary.
    #[serde(default = "default_true")]
    pub attach_log: bool,

    /// Send one message per novel detection.
    #[serde(default = "default_true")]
    pub notify_on_detection: bool,
}

impl Default for NotifyParams {
    fn default() -> Self {
        Self {
            attach_log: true,
            notify_on_detection: true,
        }
    }
}

// =============================================================================
// ScannerConfig
// =============================================================================

/// Top-level scanner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Ticker universe scanned on every pass.
    #[serde(default = "default_tickers")]
    pub tickers: Vec<String>,

    /// History window requested from the provider (e.g. "1y", "6mo").
    #[serde(default = "default_lookback")]
    pub lookback: String,

    /// Maximum number of tickers evaluated concurrently.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Seconds between scans; `0` runs a single scan and exits.
    #[serde(default)]
    pub scan_interval_secs: u64,

    #[serde(default)]
    pub trend: TrendParams,

    #[serde(default)]
    pub mean_reversion: MeanReversionParams,

    #[serde(default)]
    pub risk: RiskParams,

    #[serde(default)]
    pub paths: PathParams,

    #[serde(default)]
    pub notify: NotifyParams,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            tickers: default_tickers(),
            lookback: default_lookback(),
            max_workers: default_max_workers(),
            scan_interval_secs: 0,
            trend: TrendParams::default(),
            mean_reversion: MeanReversionParams::default(),
            risk: RiskParams::default(),
            paths: PathParams::default(),
            notify: NotifyParams::default(),
        }
    }
}

impl ScannerConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// Returns an error when the file is missing or malformed so the caller
    /// can fall back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scanner config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse scanner config from {}", path.display()))?;

        info!(
            path = %path.display(),
            tickers = config.tickers.len(),
            max_workers = config.max_workers,
            "scanner config loaded"
        );

        Ok(config)
    }

    /// Apply `SCANNER_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("SCANNER_TICKERS") {
            let tickers = parse_tickers(&raw);
            if !tickers.is_empty() {
                self.tickers = tickers;
            }
        }
        if let Some(n) = lookup("SCANNER_MAX_WORKERS").and_then(|v| v.trim().parse().ok()) {
            self.max_workers = n;
        }
        if let Some(n) = lookup("SCANNER_INTERVAL_SECS").and_then(|v| v.trim().parse().ok()) {
            self.scan_interval_secs = n;
        }
    }

    /// Reject settings that would make the rules meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.tickers.is_empty() {
            anyhow::bail!("ticker universe is empty");
        }
        if self.max_workers == 0 {
            anyhow::bail!("max_workers must be at least 1");
        }

        let t = &self.trend;
        if t.ema_fast == 0 || t.ema_slow == 0 || t.sma_long == 0 || t.rsi_period == 0 {
            anyhow::bail!("trend indicator periods must be non-zero");
        }
        if t.rsi_min > t.rsi_max {
            anyhow::bail!("trend RSI band is inverted: {} > {}", t.rsi_min, t.rsi_max);
        }

        let m = &self.mean_reversion;
        if m.rsi_period == 0 {
            anyhow::bail!("mean-reversion RSI period must be non-zero");
        }
        if m.oversold >= m.overbought {
            anyhow::bail!(
                "mean-reversion thresholds are inverted: oversold {} >= overbought {}",
                m.oversold,
                m.overbought
            );
        }

        let r = &self.risk;
        if r.stop_lookback == 0 {
            anyhow::bail!("risk.stop_lookback must be at least 1");
        }
        if !(r.stop_buffer > 0.0 && r.stop_buffer <= 1.0) {
            anyhow::bail!("risk.stop_buffer must be in (0, 1], got {}", r.stop_buffer);
        }
        if r.reward_multiples.iter().any(|m| !(*m > 0.0)) {
            anyhow::bail!("risk.reward_multiples must all be positive");
        }

        Ok(())
    }
}

/// Split a comma-separated ticker list, trimming and uppercasing entries.
pub fn parse_tickers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
