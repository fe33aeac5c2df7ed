// =============================================================================
// Trend Pullback Setup
// =============================================================================
//
// Long-only continuation entry on the trend timeframe.
//
// Decision rule (all three must hold on the latest row):
//   trend_ok  = close > SMA_long  AND  EMA_fast > EMA_slow > SMA_long
//   pullback  = prev.close > prev.EMA_fast  AND  last.close <= last.EMA_fast
//               (optionally the same cross through EMA_slow)
//   rsi_ok    = rsi_min <= RSI <= rsi_max
//
// Risk model (optional enrichment):
//   stop  = min(low of last N rows) * stop_buffer
//   risk  = entry - stop
//   tp_k  = entry + risk * RR_k
// =============================================================================

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::indicators::TrendSnapshot;
use crate::scanner_config::{RiskParams, TrendParams};

/// Which moving average the pullback crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pullback {
    FastEma,
    SlowEma,
}

impl std::fmt::Display for Pullback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FastEma => write!(f, "fast EMA"),
            Self::SlowEma => write!(f, "slow EMA"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskModel {
    pub stop: f64,
    pub risk: f64,
    /// One target per configured reward multiple, in configuration order.
    pub targets: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RiskAssessment {
    Disabled,
    /// Stop at or above entry; the detection stands without levels.
    Invalid,
    Valid(RiskModel),
}

impl RiskAssessment {
    pub fn model(&self) -> Option<&RiskModel> {
        match self {
            Self::Valid(model) => Some(model),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendSetup {
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
    pub entry: f64,
    pub rsi: f64,
    pub pullback: Pullback,
    pub risk: RiskAssessment,
}

/// Apply the trend pullback rule to the last two rows of `series`.
///
/// Returns `None` when fewer than two rows exist, when the last close is below
/// the configured minimum price, or when any leg of the rule fails.
pub fn evaluate_trend(
    ticker: &str,
    series: &[TrendSnapshot],
    params: &TrendParams,
    risk: &RiskParams,
) -> Option<TrendSetup> {
    let [.., prev, last] = series else {
        return None;
    };

    if params.min_price > 0.0 && last.close < params.min_price {
        debug!(ticker, close = last.close, min_price = params.min_price, "below minimum price");
        return None;
    }

    let trend_ok = last.close > last.sma_long
        && last.ema_fast > last.ema_slow
        && last.ema_slow > last.sma_long;

    let pullback = if prev.close > prev.ema_fast && last.close <= last.ema_fast {
        Some(Pullback::FastEma)
    } else if params.allow_ema_slow_pullback
        && prev.close > prev.ema_slow
        && last.close <= last.ema_slow
    {
        Some(Pullback::SlowEma)
    } else {
        None
    };

    let rsi_ok = (params.rsi_min..=params.rsi_max).contains(&last.rsi);

    debug!(
        ticker,
        trend_ok,
        pullback = ?pullback,
        rsi = format!("{:.1}", last.rsi),
        rsi_ok,
        "trend rule evaluated"
    );

    let pullback = pullback.filter(|_| trend_ok && rsi_ok)?;

    Some(TrendSetup {
        ticker: ticker.to_string(),
        timestamp: last.timestamp,
        entry: last.close,
        rsi: last.rsi,
        pullback,
        risk: assess_risk(series, last.close, risk),
    })
}

/// Build stop and targets from the trailing lows.
pub fn assess_risk(series: &[TrendSnapshot], entry: f64, params: &RiskParams) -> RiskAssessment {
    if !params.enabled {
        return RiskAssessment::Disabled;
    }

    let start = series.len().saturating_sub(params.stop_lookback);
    let lowest = series[start..]
        .iter()
        .map(|s| s.low)
        .fold(f64::INFINITY, f64::min);

    let stop = lowest * params.stop_buffer;
    let risk = entry - stop;
    if !(risk > 0.0) || !stop.is_finite() {
        return RiskAssessment::Invalid;
    }

    let targets = params
        .reward_multiples
        .iter()
        .map(|rr| entry + risk * rr)
        .collect();

    RiskAssessment::Valid(RiskModel { stop, risk, targets })
}
