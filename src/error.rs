// =============================================================================
// Per-ticker error taxonomy
// =============================================================================
//
// Everything that can go wrong while a single ticker is evaluated.  The
// orchestrator maps each variant onto a scan row status; none of them aborts
// the scan of other tickers.

use thiserror::Error;

use crate::types::ScanStatus;

#[derive(Debug, Clone, Error)]
pub enum ScanError {
    /// Empty or too-short price history.
    #[error("insufficient data on {timeframe}: {bars} bars < {required}")]
    DataUnavailable {
        timeframe: String,
        bars: usize,
        required: usize,
    },

    /// The market data provider failed (network, HTTP status, bad payload).
    #[error("market data: {0}")]
    MarketData(String),

    /// The trade memory could not be persisted.
    #[error("trade memory persistence failed: {0}")]
    Persistence(String),

    #[error("{0}")]
    Unexpected(String),
}

impl ScanError {
    pub fn insufficient(timeframe: impl Into<String>, bars: usize, required: usize) -> Self {
        Self::DataUnavailable {
            timeframe: timeframe.into(),
            bars,
            required,
        }
    }

    /// Row status this error is recorded under.
    pub fn status(&self) -> ScanStatus {
        match self {
            Self::DataUnavailable { .. } => ScanStatus::Skipped,
            _ => ScanStatus::Failed,
        }
    }

    /// Whether the error compromises future dedup correctness.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}
