/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Discretised Gaussian curves over integer state ranges.
//!
//! Age, height and time nodes all carry a range of integer states. Both
//! likelihood rows and evidence vectors for those nodes are a normal pdf
//! evaluated at each integer, floored, weighted and normalised.

use statrs::distribution::{Continuous, ContinuousCDF, Normal};

use crate::config::{NormMethod, RecogniserConfig};
use crate::normalise::uniform;

/// Standard deviation under which one unit either side of the mean holds
/// `confidence` of the probability mass: `0.5 / Φ⁻¹(c + (1 - c) / 2)`.
///
/// Returns `f64::INFINITY` for a confidence of zero, which the curve builder
/// never reaches because low confidences short-circuit to uniform.
pub fn stddev_from_confidence(confidence: f64) -> f64 {
    let Ok(standard) = Normal::new(0.0, 1.0) else {
        return f64::INFINITY;
    };
    let z = standard.inverse_cdf(confidence + (1.0 - confidence) / 2.0);
    if z <= 0.0 {
        return f64::INFINITY;
    }
    0.5 / z
}

/// Uniform distribution over the integer states `[min, max]`.
pub fn uniform_distribution(min: i32, max: i32) -> Vec<f64> {
    uniform((max - min + 1).max(0) as usize)
}

/// Parameters of one discretised curve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurveSpec {
    /// Sensor confidence in the mean.
    pub confidence: f64,
    /// Centre of the curve.
    pub mean: f64,
    /// Spread. `0.0` derives it from `confidence`.
    pub stddev: f64,
    /// First integer state.
    pub min: i32,
    /// Last integer state.
    pub max: i32,
    /// Modality weight.
    pub weight: f64,
    /// Normaliser applied after weighting.
    pub norm: NormMethod,
}

/// Build the curve described by `spec`.
///
/// Confidence is clamped to `max_threshold`. A confidence under
/// `conf_threshold` or a zero weight yields uniform.
pub fn curve(cfg: &RecogniserConfig, spec: &CurveSpec) -> Vec<f64> {
    let conf = spec.confidence.min(cfg.max_threshold);
    let conf_threshold = cfg.conf_threshold();

    let mut stddev = spec.stddev;
    if stddev.abs() < 1e-8 && conf >= conf_threshold {
        stddev = stddev_from_confidence(conf);
    }

    if conf < conf_threshold || spec.weight == 0.0 {
        return uniform_distribution(spec.min, spec.max);
    }

    let dist = match Normal::new(spec.mean, stddev.abs()) {
        Ok(d) => d,
        Err(e) => {
            log::warn!(
                "degenerate curve (mean={}, stddev={stddev}): {e}; using uniform",
                spec.mean
            );
            return uniform_distribution(spec.min, spec.max);
        }
    };

    let raw: Vec<f64> = (spec.min..=spec.max)
        .map(|j| {
            let pdf = dist.pdf(j as f64).max(cfg.prob_threshold);
            cfg.weight_method.apply(pdf, spec.weight)
        })
        .collect();
    spec.norm.apply(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(conf: f64, mean: f64, stddev: f64) -> CurveSpec {
        CurveSpec {
            confidence: conf,
            mean,
            stddev,
            min: 50,
            max: 240,
            weight: 1.0,
            norm: NormMethod::Sum,
        }
    }

    #[test]
    fn test_stddev_from_confidence() {
        // z(0.975) ≈ 1.95996
        let s = stddev_from_confidence(0.95);
        assert!((s - 0.5 / 1.959964).abs() < 1e-4, "s={s}");
    }

    #[test]
    fn test_curve_peaks_at_mean() {
        let cfg = RecogniserConfig::default();
        let c = curve(&cfg, &spec(0.9, 170.0, 6.3));
        assert_eq!(c.len(), 191);
        let peak = crate::normalise::argmax(&c).expect("non-empty");
        assert_eq!(peak as i32 + 50, 170);
        assert!((c.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_low_confidence_is_uniform() {
        let cfg = RecogniserConfig::default();
        let c = curve(&cfg, &spec(0.001, 170.0, 6.3));
        assert!(c.iter().all(|v| (v - 1.0 / 191.0).abs() < 1e-12));
    }

    #[test]
    fn test_zero_weight_is_uniform() {
        let cfg = RecogniserConfig::default();
        let mut s = spec(0.9, 170.0, 6.3);
        s.weight = 0.0;
        let c = curve(&cfg, &s);
        assert!(c.iter().all(|v| (v - 1.0 / 191.0).abs() < 1e-12));
    }

    #[test]
    fn test_zero_stddev_derived_from_confidence() {
        let cfg = RecogniserConfig::default();
        let s = CurveSpec {
            confidence: 0.5,
            mean: 30.0,
            stddev: 0.0,
            min: 0,
            max: 75,
            weight: 1.0,
            norm: NormMethod::Sum,
        };
        let c = curve(&cfg, &s);
        // Half the mass within ±0.5 means a wide-ish curve: neighbours are non-trivial.
        assert!(c[30] > c[29] && c[29] > 0.05, "c[29]={} c[30]={}", c[29], c[30]);
    }

    #[test]
    fn test_floor_applies_far_from_mean() {
        let cfg = RecogniserConfig::default();
        let c = curve(&cfg, &spec(0.99, 50.0, 1.0));
        assert!(c[190] > 0.0, "far tail must be floored, not zero");
    }
}
