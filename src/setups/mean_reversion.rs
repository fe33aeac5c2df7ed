// =============================================================================
// Mean Reversion Extreme Setup
// =============================================================================
//
// Single-row RSI check on the lower timeframe:
//   RSI < oversold    => long bias
//   RSI > overbought  => short bias
// Values on a threshold or strictly between them carry no bias.
// =============================================================================

use chrono::{DateTime, Utc};

use crate::indicators::MeanRevSnapshot;
use crate::scanner_config::MeanReversionParams;
use crate::types::Bias;

#[derive(Debug, Clone, PartialEq)]
pub struct MeanReversionSetup {
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
    pub entry: f64,
    pub rsi: f64,
    pub bias: Bias,
}

/// Classify an RSI reading against the configured thresholds.
pub fn rsi_bias(rsi: f64, params: &MeanReversionParams) -> Option<Bias> {
    if rsi < params.oversold {
        Some(Bias::Long)
    } else if rsi > params.overbought {
        Some(Bias::Short)
    } else {
        None
    }
}

pub fn evaluate_mean_reversion(
    ticker: &str,
    series: &[MeanRevSnapshot],
    params: &MeanReversionParams,
) -> Option<MeanReversionSetup> {
    let last = series.last()?;
    let bias = rsi_bias(last.rsi, params)?;

    Some(MeanReversionSetup {
        ticker: ticker.to_string(),
        timestamp: last.timestamp,
        entry: last.close,
        rsi: last.rsi,
        bias,
    })
}
