// =============================================================================
// Setup Evaluator
// =============================================================================
//
// Pure decision layer: price bars in, typed signal out.
//
// Order of evaluation:
//   1. Trend pullback on the trend timeframe.
//   2. Mean-reversion extreme on the lower timeframe, only when (1) did not
//      match.  A trend match always short-circuits the second rule.
//
// Too little history is reported as `ScanError::DataUnavailable`, which the
// orchestrator records as Skipped, distinct from `Signal::None`.
// =============================================================================

pub mod mean_reversion;
pub mod trend;

use crate::error::ScanError;
use crate::indicators::{meanrev_snapshots, trend_snapshots};
use crate::market_data::PriceBar;
use crate::scanner_config::ScannerConfig;
use crate::types::{Bias, SetupKind};

pub use mean_reversion::MeanReversionSetup;
pub use trend::{RiskAssessment, TrendSetup};

/// Rows the trend rule needs (`prev` and `last`).
const TREND_MIN_ROWS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Trend(TrendSetup),
    MeanReversion(MeanReversionSetup),
    None,
}

impl Signal {
    pub fn kind(&self) -> Option<SetupKind> {
        match self {
            Self::Trend(_) => Some(SetupKind::Trend),
            Self::MeanReversion(_) => Some(SetupKind::MeanRev),
            Self::None => None,
        }
    }

    pub fn bias(&self) -> Option<Bias> {
        match self {
            Self::Trend(_) => Some(Bias::Long),
            Self::MeanReversion(s) => Some(s.bias),
            Self::None => None,
        }
    }

    /// Evidence string written to the scan log.
    pub fn details(&self) -> String {
        match self {
            Self::Trend(s) => {
                let mut out = format!(
                    "entry {:.2} | RSI {:.1} | pullback to {}",
                    s.entry, s.rsi, s.pullback
                );
                match &s.risk {
                    RiskAssessment::Valid(m) => {
                        out.push_str(&format!(" | stop {:.2} | risk {:.2}", m.stop, m.risk));
                        for (i, tp) in m.targets.iter().enumerate() {
                            out.push_str(&format!(" | TP{} {:.2}", i + 1, tp));
                        }
                    }
                    RiskAssessment::Invalid => out.push_str(" | no valid risk model"),
                    RiskAssessment::Disabled => {}
                }
                out
            }
            Self::MeanReversion(s) => format!("RSI {:.1} | {} | close {:.2}", s.rsi, s.bias, s.entry),
            Self::None => "no setup".to_string(),
        }
    }

    /// Notification text for a novel detection.
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Trend(s) => {
                let mut msg = format!(
                    "📈 **TREND SETUP** | {} | entry {:.2} | RSI {:.1}",
                    s.ticker, s.entry, s.rsi
                );
                if let Some(m) = s.risk.model() {
                    msg.push_str(&format!("\nstop {:.2}", m.stop));
                    for (i, tp) in m.targets.iter().enumerate() {
                        msg.push_str(&format!(" | TP{} {:.2}", i + 1, tp));
                    }
                }
                Some(msg)
            }
            Self::MeanReversion(s) => Some(format!(
                "⚡ **MEAN REVERSION** | {} | RSI {:.1} | {}",
                s.ticker, s.rsi, s.bias
            )),
            Self::None => None,
        }
    }
}

/// Trend rule over a raw bar history.
///
/// `Ok(None)` means the history was long enough and the rule did not match.
pub fn evaluate_trend_bars(
    ticker: &str,
    bars: &[PriceBar],
    config: &ScannerConfig,
) -> Result<Option<TrendSetup>, ScanError> {
    let params = &config.trend;
    if bars.len() < params.min_bars {
        return Err(ScanError::insufficient(&params.timeframe, bars.len(), params.min_bars));
    }

    let rows = trend_snapshots(bars, params);
    if rows.len() < TREND_MIN_ROWS {
        return Err(ScanError::insufficient(&params.timeframe, rows.len(), TREND_MIN_ROWS));
    }

    Ok(trend::evaluate_trend(ticker, &rows, params, &config.risk))
}

/// Mean-reversion rule over a raw bar history.
pub fn evaluate_meanrev_bars(
    ticker: &str,
    bars: &[PriceBar],
    config: &ScannerConfig,
) -> Result<Option<MeanReversionSetup>, ScanError> {
    let params = &config.mean_reversion;
    if bars.len() < params.min_bars {
        return Err(ScanError::insufficient(&params.timeframe, bars.len(), params.min_bars));
    }

    let rows = meanrev_snapshots(bars, params);
    if rows.is_empty() {
        return Err(ScanError::insufficient(&params.timeframe, 0, 1));
    }

    Ok(mean_reversion::evaluate_mean_reversion(ticker, &rows, params))
}

/// Evaluate both rules, trend first.
///
/// `meanrev_bars` carries the lower-timeframe history or the error that
/// prevented loading it.  It is only consulted when the trend rule does not
/// match, so neither a short history nor a fetch failure there can mask a
/// trend detection.
pub fn evaluate_bars(
    ticker: &str,
    trend_bars: &[PriceBar],
    meanrev_bars: Result<&[PriceBar], ScanError>,
    config: &ScannerConfig,
) -> Result<Signal, ScanError> {
    if let Some(setup) = evaluate_trend_bars(ticker, trend_bars, config)? {
        return Ok(Signal::Trend(setup));
    }

    Ok(evaluate_meanrev_bars(ticker, meanrev_bars?, config)?
        .map_or(Signal::None, Signal::MeanReversion))
}
