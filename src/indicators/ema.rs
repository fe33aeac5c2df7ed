// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The very first EMA value is seeded with the SMA of the first `period` closes.
// =============================================================================

/// Compute the EMA series for `closes`, aligned 1:1 with the input.
///
/// The first `period - 1` entries are `None` (warm-up).
///
/// # Edge cases
/// - `period == 0` => all `None`
/// - `closes.len() < period` => all `None`
/// - A non-finite intermediate value ends the series; later entries stay `None`.
pub fn calculate_ema(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; closes.len()];
    if period == 0 || closes.len() < period {
        return result;
    }

    let multiplier = 2.0 / (period + 1) as f64;

    // Seed: SMA of the first `period` values.
    let sma: f64 = closes[..period].iter().sum::<f64>() / period as f64;
    if !sma.is_finite() {
        return result;
    }
    result[period - 1] = Some(sma);

    let mut prev_ema = sma;
    for (i, &close) in closes.iter().enumerate().skip(period) {
        let ema = close * multiplier + prev_ema * (1.0 - multiplier);
        if !ema.is_finite() {
            // Downstream consumers should not trust a broken series.
            break;
        }
        result[i] = Some(ema);
        prev_ema = ema;
    }

    result
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_empty_input() {
        assert!(calculate_ema(&[], 5).is_empty());
    }

    #[test]
    fn ema_period_zero() {
        assert_eq!(calculate_ema(&[1.0, 2.0, 3.0], 0), vec![None, None, None]);
    }

    #[test]
    fn ema_insufficient_data() {
        assert_eq!(calculate_ema(&[1.0, 2.0], 5), vec![None, None]);
    }

    #[test]
    fn ema_period_equals_length() {
        let ema = calculate_ema(&[2.0, 4.0, 6.0], 3);
        assert_eq!(ema.len(), 3);
        assert!(ema[0].is_none() && ema[1].is_none());
        // Should be the SMA = (2+4+6)/3 = 4.0
        assert!((ema[2].unwrap() - 4.0).abs() < 1e-10);
    }

    #[test]
    fn ema_known_values() {
        // 5-period EMA of [1..=10]: SMA seed of first 5 = 3.0, multiplier = 1/3.
        let closes: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let ema = calculate_ema(&closes, 5);
        assert_eq!(ema.len(), 10);
        assert_eq!(ema.iter().filter(|v| v.is_none()).count(), 4);

        let mult = 2.0 / 6.0;
        let mut expected = 3.0;
        assert!((ema[4].unwrap() - expected).abs() < 1e-10);
        for (i, &c) in closes.iter().enumerate().skip(5) {
            expected = c * mult + expected * (1.0 - mult);
            let got = ema[i].unwrap();
            assert!((got - expected).abs() < 1e-10, "got {got}, expected {expected}");
        }
    }

    #[test]
    fn ema_handles_nan_in_input() {
        let ema = calculate_ema(&[1.0, 2.0, 3.0, f64::NAN, 5.0], 3);
        // Seed at index 2, then NaN breaks the series.
        assert_eq!(ema.iter().flatten().count(), 1);
        assert!(ema[3].is_none() && ema[4].is_none());
    }

    #[test]
    fn ema_lags_rising_series() {
        let closes: Vec<f64> = (1..=100).map(|x| x as f64).collect();
        let fast = calculate_ema(&closes, 20);
        let slow = calculate_ema(&closes, 50);
        let (f, s) = (fast[99].unwrap(), slow[99].unwrap());
        assert!(f > s);
        assert!(f < 100.0);
    }
}
