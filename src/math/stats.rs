//! Small descriptive statistics over `f64` slices.
//!
//! NaN handling is explicit per function: the pooling helpers skip non-finite
//! values, the standard deviation propagates them.

use crate::domain::Average;

/// Median of the finite values. `None` when there are none.
pub fn median_finite(values: &[f64]) -> Option<f64> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    median_mut(&mut finite)
}

/// Mean of the finite values. `None` when there are none.
pub fn mean_finite(values: &[f64]) -> Option<f64> {
    let (sum, n) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), &v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Pool `values` with the chosen estimator.
pub fn average(kind: Average, values: &[f64]) -> Option<f64> {
    match kind {
        Average::Median => median_finite(values),
        Average::Mean => mean_finite(values),
    }
}

/// Population standard deviation (divides by `n`).
///
/// Returns NaN for an empty slice; NaN entries propagate.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    var.sqrt()
}

fn median_mut(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}
