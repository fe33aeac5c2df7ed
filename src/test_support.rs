// Synthetic bar series shared by unit tests.

use chrono::{Duration, TimeZone, Utc};

use crate::indicators::ema::calculate_ema;
use crate::market_data::PriceBar;

pub fn bars(closes: &[f64], step: Duration) -> Vec<PriceBar> {
    let start = Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| PriceBar {
            timestamp: start + step * i as i32,
            open: c,
            high: c * 1.01,
            low: c * 0.99,
            close: c,
            volume: 10_000.0,
        })
        .collect()
}

pub fn daily(closes: &[f64]) -> Vec<PriceBar> {
    bars(closes, Duration::days(1))
}

pub fn hourly(closes: &[f64]) -> Vec<PriceBar> {
    bars(closes, Duration::hours(1))
}

/// Oscillating hourly closes keep RSI near 50.
pub fn neutral_hourly() -> Vec<PriceBar> {
    hourly(&(0..60).map(|i| if i % 2 == 0 { 50.0 } else { 50.5 }).collect::<Vec<_>>())
}

/// Strictly falling hourly closes drive RSI to 0.
pub fn crashing_hourly() -> Vec<PriceBar> {
    hourly(&(0..60).map(|i| 100.0 - i as f64).collect::<Vec<_>>())
}

/// 300 flat daily bars: no EMA stack, RSI 50.
pub fn flat_daily() -> Vec<PriceBar> {
    daily(&[100.0; 300])
}

/// Long uptrend with a zig-zag, ending in a one-bar dip just under the fast
/// EMA.  The dip lands RSI near 51 and keeps EMA20 > EMA50 > SMA200.
pub fn trend_pullback_daily() -> Vec<PriceBar> {
    let mut closes: Vec<f64> = (0..300)
        .map(|i| 100.0 + i as f64 * 0.5 + if i % 2 == 0 { 1.5 } else { -1.5 })
        .collect();
    let last = closes.len() - 1;
    // close <= close*m + prev_ema*(1-m)  holds exactly when  close <= prev_ema.
    let prev_ema = calculate_ema(&closes[..last], 20)[last - 1].unwrap();
    closes[last] = prev_ema - 0.5;
    daily(&closes)
}
