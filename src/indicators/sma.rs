// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// Arithmetic mean of the trailing `period` values, maintained as a running
// window sum.
// =============================================================================

/// Compute the SMA series for `values`, aligned 1:1 with the input.
///
/// The first `period - 1` entries are `None`.  A window containing a
/// non-finite value yields `None` for that position.
pub fn calculate_sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return result;
    }

    let period_f = period as f64;
    let mut window_sum: f64 = values[..period].iter().sum();

    for i in (period - 1)..values.len() {
        if i >= period {
            window_sum += values[i] - values[i - period];
        }
        // Resum after a non-finite value leaves the window, otherwise the
        // running sum stays poisoned forever.
        if !window_sum.is_finite() {
            window_sum = values[i + 1 - period..=i].iter().sum();
        }
        let mean = window_sum / period_f;
        if mean.is_finite() {
            result[i] = Some(mean);
        }
    }

    result
}
