// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators used by the
// setup rules.  Every series function returns a `Vec<Option<f64>>` aligned
// 1:1 with its input; `None` marks warm-up positions where the indicator is
// not yet defined.

pub mod ema;
pub mod rsi;
pub mod sma;
pub mod snapshot;

pub use snapshot::{meanrev_snapshots, trend_snapshots, MeanRevSnapshot, TrendSnapshot};
