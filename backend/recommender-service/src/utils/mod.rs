// Utility functions for recommender-service

pub mod linalg;

pub use linalg::solve_symmetric;

/// Normalize a score to [0, 1] range
pub fn normalize_score(score: f64, min: f64, max: f64) -> f64 {
    if max - min < f64::EPSILON {
        0.0
    } else {
        ((score - min) / (max - min)).clamp(0.0, 1.0)
    }
}

/// Linearly map `value` from `[cur_min, cur_max]` onto `[new_min, new_max]`.
/// A degenerate source range maps to the middle of the target range.
pub fn scale_value(value: f64, new_min: f64, new_max: f64, cur_min: f64, cur_max: f64) -> f64 {
    let cur_range = cur_max - cur_min;
    if cur_range.abs() < f64::EPSILON {
        return new_min + (new_max - new_min) / 2.0;
    }
    new_min + (value - cur_min) * (new_max - new_min) / cur_range
}

/// Min-max scale each value into [0, 1]; constant input scales to zeros.
pub fn min_max_scale(values: &[f64]) -> Vec<f64> {
    let (min, max) = min_max(values).unwrap_or((0.0, 0.0));
    values
        .iter()
        .map(|&v| normalize_score(v, min, max))
        .collect()
}

pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Mean over non-NaN values.
pub fn nan_mean(values: &[f64]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Population variance over non-NaN values.
pub fn nan_variance(values: &[f64]) -> Option<f64> {
    let mean = nan_mean(values)?;
    let (sum_sq, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + (v - mean) * (v - mean), c + 1));
    Some(sum_sq / count as f64)
}

/// Population standard deviation over non-NaN values.
pub fn nan_std(values: &[f64]) -> Option<f64> {
    nan_variance(values).map(f64::sqrt)
}

pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Number of decimal digits in `n` (at least 1).
pub fn digit_count(n: u64) -> u32 {
    n.checked_ilog10().map_or(1, |d| d + 1)
}
