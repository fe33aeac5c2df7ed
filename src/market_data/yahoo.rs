// =============================================================================
// Yahoo Finance chart API client
// =============================================================================
//
// Public endpoint, no credentials:
//   GET /v8/finance/chart/{symbol}?range={lookback}&interval={timeframe}
//
// The response carries parallel arrays (timestamps plus one quote block of
// open/high/low/close/volume).  Any of the price slots may be `null` for
// halted or partial periods; those rows are dropped.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{normalize_bars, MarketDataProvider, PriceBar};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Yahoo rejects requests without a browser-like agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) swing-scanner/1.0";

// -----------------------------------------------------------------------------
// Wire format
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

// -----------------------------------------------------------------------------
// Client
// -----------------------------------------------------------------------------

#[derive(Clone)]
pub struct YahooClient {
    base_url: String,
    client: reqwest::Client,
}

impl YahooClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to build reqwest client")?;

        let base_url = base_url.into();
        debug!(base_url = %base_url, "YahooClient initialised");

        Ok(Self { base_url, client })
    }
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    #[instrument(skip(self), name = "yahoo::fetch_bars")]
    async fn fetch_bars(
        &self,
        ticker: &str,
        timeframe: &str,
        lookback: &str,
    ) -> Result<Vec<PriceBar>> {
        let symbol = yahoo_symbol(ticker);
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("range", lookback),
                ("interval", timeframe),
                ("includePrePost", "false"),
            ])
            .send()
            .await
            .with_context(|| format!("GET chart for {symbol} failed"))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .with_context(|| format!("failed to read chart body for {symbol}"))?;

        if status == StatusCode::NOT_FOUND {
            warn!(ticker, timeframe, "symbol not found; treating as no data");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            anyhow::bail!("Yahoo chart for {symbol} returned {status}: {body}");
        }

        let bars = parse_chart(&body)?;
        debug!(ticker, timeframe, count = bars.len(), "bars fetched");
        Ok(bars)
    }
}

impl std::fmt::Debug for YahooClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Parsing
// -----------------------------------------------------------------------------

/// Yahoo writes share classes with a dash (`BRK-B`).
fn yahoo_symbol(ticker: &str) -> String {
    ticker.trim().to_uppercase().replace('.', "-")
}

/// Parse a chart response body into ascending, de-duplicated bars.
///
/// An empty `result` yields no bars.  A populated `error` object is an error
/// unless it is Yahoo's "Not Found", which means no data.
fn parse_chart(body: &str) -> Result<Vec<PriceBar>> {
    let envelope: ChartEnvelope =
        serde_json::from_str(body).context("failed to parse chart response")?;

    if let Some(err) = envelope.chart.error {
        if err.code.eq_ignore_ascii_case("not found") {
            return Ok(Vec::new());
        }
        anyhow::bail!("Yahoo chart error {}: {}", err.code, err.description);
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let at = |v: &Vec<Option<f64>>, i: usize| v.get(i).copied().flatten();

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, &ts) in result.timestamp.iter().enumerate() {
        let (Some(open), Some(high), Some(low), Some(close)) = (
            at(&quote.open, i),
            at(&quote.high, i),
            at(&quote.low, i),
            at(&quote.close, i),
        ) else {
            continue;
        };
        let Some(timestamp) = Utc.timestamp_opt(ts, 0).single() else {
            warn!(ts, "skipping bar with invalid timestamp");
            continue;
        };
        bars.push(PriceBar {
            timestamp,
            open,
            high,
            low,
            close,
            volume: at(&quote.volume, i).unwrap_or(0.0),
        });
    }

    Ok(normalize_bars(bars))
}
