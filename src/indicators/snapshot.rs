// =============================================================================
// Indicator snapshots — per-bar rows fed to the setup evaluator
// =============================================================================
//
// Each builder computes its indicator series over the full bar history and
// keeps only rows where every indicator is defined, so warm-up rows never
// reach the evaluator.

use chrono::{DateTime, Utc};

use super::{ema::calculate_ema, rsi::calculate_rsi, sma::calculate_sma};
use crate::market_data::PriceBar;
use crate::scanner_config::{MeanReversionParams, TrendParams};

/// One fully-populated row on the trend timeframe.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendSnapshot {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub low: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub sma_long: f64,
    pub rsi: f64,
}

/// One fully-populated row on the mean-reversion timeframe.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanRevSnapshot {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub rsi: f64,
}

pub fn trend_snapshots(bars: &[PriceBar], params: &TrendParams) -> Vec<TrendSnapshot> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema_fast = calculate_ema(&closes, params.ema_fast);
    let ema_slow = calculate_ema(&closes, params.ema_slow);
    let sma_long = calculate_sma(&closes, params.sma_long);
    let rsi = calculate_rsi(&closes, params.rsi_period);

    bars.iter()
        .enumerate()
        .filter_map(|(i, bar)| {
            Some(TrendSnapshot {
                timestamp: bar.timestamp,
                close: bar.close,
                low: bar.low,
                ema_fast: ema_fast[i]?,
                ema_slow: ema_slow[i]?,
                sma_long: sma_long[i]?,
                rsi: rsi[i]?,
            })
        })
        .collect()
}

pub fn meanrev_snapshots(bars: &[PriceBar], params: &MeanReversionParams) -> Vec<MeanRevSnapshot> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let rsi = calculate_rsi(&closes, params.rsi_period);

    bars.iter()
        .zip(rsi)
        .filter_map(|(bar, rsi)| {
            Some(MeanRevSnapshot {
                timestamp: bar.timestamp,
                close: bar.close,
                rsi: rsi?,
            })
        })
        .collect()
}
