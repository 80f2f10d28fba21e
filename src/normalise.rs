/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Vector normalisers.
//!
//! Every normaliser returns a vector of the same length as its input. A
//! degenerate input (zero sum, zero range, zero spread) yields the uniform
//! distribution instead of dividing by zero.
//!
//! [`NormMethod::apply`] always returns a distribution: min-max and tanh
//! scores are sum-normalised after scoring.

use crate::config::NormMethod;

impl NormMethod {
    /// Normalise `values` with this method.
    pub fn apply(self, values: &[f64]) -> Vec<f64> {
        match self {
            NormMethod::Sum => normalise_sum(values),
            NormMethod::Softmax => softmax(values),
            NormMethod::MinMax => normalise_sum(&min_max(values)),
            NormMethod::Tanh => normalise_sum(&tanh_score(values)),
        }
    }
}

/// Uniform distribution of length `len`.
pub fn uniform(len: usize) -> Vec<f64> {
    if len == 0 {
        return Vec::new();
    }
    vec![1.0 / len as f64; len]
}

/// Divide each value by the sum.
pub fn normalise_sum(values: &[f64]) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total == 0.0 || !total.is_finite() {
        return uniform(values.len());
    }
    values.iter().map(|v| v / total).collect()
}

/// `exp(x) / Σ exp(x)`.
///
/// The exponent is not shifted by the maximum, so very large inputs overflow
/// to infinity and fall back to uniform. Probability-valued inputs stay far
/// from that range.
pub fn softmax(values: &[f64]) -> Vec<f64> {
    let exps: Vec<f64> = values.iter().map(|v| v.exp()).collect();
    normalise_sum(&exps)
}

/// `(x - min) / (max - min)`. Not a distribution on its own.
pub fn min_max(values: &[f64]) -> Vec<f64> {
    let Some(lo) = values.iter().copied().reduce(f64::min) else {
        return Vec::new();
    };
    let hi = values.iter().copied().fold(lo, f64::max);
    let range = hi - lo;
    if range == 0.0 {
        return uniform(values.len());
    }
    values.iter().map(|v| (v - lo) / range).collect()
}

/// `0.5 * (tanh(0.01 * (x - mean) / std) + 1)` with the population std.
pub fn tanh_score(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    let std = var.sqrt();
    if std == 0.0 {
        return uniform(values.len());
    }
    values
        .iter()
        .map(|v| 0.5 * ((0.01 * (v - mean) / std).tanh() + 1.0))
        .collect()
}

/// Round to `decimals` places, half away from zero.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Index of the largest value; the first one wins ties.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum(v: &[f64]) -> f64 {
        v.iter().sum()
    }

    #[test]
    fn test_sum_normalises() {
        let out = normalise_sum(&[1.0, 3.0]);
        assert!((out[0] - 0.25).abs() < 1e-12);
        assert!((out[1] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_zero_sum_is_uniform() {
        let out = normalise_sum(&[0.0, 0.0, 0.0, 0.0]);
        assert!(out.iter().all(|v| (v - 0.25).abs() < 1e-12), "got {out:?}");
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let out = softmax(&[0.1, 0.2, 0.7]);
        assert!((sum(&out) - 1.0).abs() < 1e-12);
        assert!(out[2] > out[1] && out[1] > out[0]);
    }

    #[test]
    fn test_min_max_range() {
        let out = min_max(&[2.0, 4.0, 6.0]);
        assert_eq!(out, vec![0.0, 0.5, 1.0]);
        let flat = min_max(&[3.0, 3.0]);
        assert_eq!(flat, vec![0.5, 0.5]);
    }

    #[test]
    fn test_tanh_centres_on_half() {
        let out = tanh_score(&[1.0, 2.0, 3.0]);
        assert!((out[1] - 0.5).abs() < 1e-12);
        assert!(out[0] < 0.5 && out[2] > 0.5);
        let flat = tanh_score(&[0.2, 0.2]);
        assert_eq!(flat, vec![0.5, 0.5]);
    }

    #[test]
    fn test_apply_dispatch() {
        let v = [1.0, 1.0, 2.0];
        assert_eq!(NormMethod::Sum.apply(&v), normalise_sum(&v));
        assert_eq!(NormMethod::Tanh.apply(&v), normalise_sum(&tanh_score(&v)));
    }

    #[test]
    fn test_score_methods_yield_distributions() {
        let v = [0.1, 4.0, 2.5, 0.7];
        for method in [NormMethod::MinMax, NormMethod::Tanh] {
            let out = method.apply(&v);
            assert!((sum(&out) - 1.0).abs() < 1e-12, "{method:?} sums to {}", sum(&out));
            assert_eq!(argmax(&out), Some(1), "{method:?} must keep the ordering");
        }
    }

    #[test]
    fn test_round_and_argmax() {
        assert!((round_to(0.123456, 4) - 0.1235).abs() < 1e-12);
        assert_eq!(argmax(&[0.2, 0.5, 0.5]), Some(1));
        assert_eq!(argmax(&[]), None);
    }
}
