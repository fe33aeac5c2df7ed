// =============================================================================
// Market Data — price bars and the provider seam
// =============================================================================

pub mod yahoo;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use yahoo::YahooClient;

/// A single OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Source of historical price bars.
///
/// Implementations return bars ascending by timestamp.  A symbol or timeframe
/// with no data is an empty `Vec`, not an error.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_bars(
        &self,
        ticker: &str,
        timeframe: &str,
        lookback: &str,
    ) -> Result<Vec<PriceBar>>;
}

/// Sort bars ascending and drop duplicate timestamps, keeping the last one
/// received for each timestamp.
pub fn normalize_bars(mut bars: Vec<PriceBar>) -> Vec<PriceBar> {
    // Stable sort keeps arrival order among equal timestamps.
    bars.sort_by_key(|b| b.timestamp);
    let mut out: Vec<PriceBar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(prev) if prev.timestamp == bar.timestamp => *prev = bar,
            _ => out.push(bar),
        }
    }
    out
}
