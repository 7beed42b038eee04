//! Fit window selection.
//!
//! Exponential and logistic curves are undefined or unstable on zero/negative
//! baselines, so leading observations below a minimum count are trimmed before
//! fitting. Optionally only a trailing number of observations is kept (useful
//! once a series is long and the early phase no longer matters).

use std::ops::Range;

/// Select the index range of `values` to fit on.
///
/// Rules, applied in order:
/// 1. drop leading entries with `value < min_count` (or non-finite values)
/// 2. if `trailing` is set, keep only the last `trailing` entries
///
/// The returned range may be empty; callers decide whether the remaining
/// observation count is sufficient for their model.
pub fn select_window(values: &[f64], min_count: f64, trailing: Option<usize>) -> Range<usize> {
    let end = values.len();
    let mut start = values
        .iter()
        .position(|&v| v.is_finite() && v >= min_count)
        .unwrap_or(end);

    if let Some(n) = trailing {
        if n > 0 && end - start > n {
            start = end - n;
        }
    }

    start..end
}
