/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Modality weight and face accuracy transforms.

use crate::config::{AccuracyMethod, WeightMethod};

impl WeightMethod {
    /// Fold `weight` into `value`.
    ///
    /// Callers never pass a zero weight to [`WeightMethod::InvPow`];
    /// configuration validation rejects it.
    pub fn apply(self, value: f64, weight: f64) -> f64 {
        match self {
            WeightMethod::Pow => value.powf(weight),
            WeightMethod::InvPow => value.powf(1.0 / weight),
            WeightMethod::Mult => value * weight,
        }
    }

    /// Apply [`WeightMethod::apply`] element-wise.
    pub fn apply_all(self, values: &[f64], weight: f64) -> Vec<f64> {
        values.iter().map(|&v| self.apply(v, weight)).collect()
    }
}

impl AccuracyMethod {
    /// Fold a sensor-reported accuracy into a similarity score.
    ///
    /// An accuracy of zero leaves the value untouched under the inverse
    /// power rule.
    pub fn apply(self, value: f64, accuracy: f64) -> f64 {
        match self {
            AccuracyMethod::None => value,
            AccuracyMethod::Pow => value.powf(accuracy),
            AccuracyMethod::InvPow if accuracy == 0.0 => value,
            AccuracyMethod::InvPow => value.powf(1.0 / accuracy),
            AccuracyMethod::Mult => value * accuracy,
        }
    }
}
