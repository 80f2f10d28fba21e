/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Likelihood rows: `P(modality | I = i)` for one identity.
//!
//! A row is built once when its identity is enrolled, rewritten in place by
//! online learning, and its face vector gains one entry every time another
//! identity joins the network.
//!
//! Initial rows are always sum-normalised regardless of the evidence
//! normalisation assignment.

use crate::config::{Modality, NormMethod, RecogniserConfig, UpdateMethod};
use crate::curve::{curve, uniform_distribution, CurveSpec};
use crate::database::{IdentityRecord, Occurrences};
use crate::normalise::{normalise_sum, uniform};

/// One identity's conditional distributions over the five observation nodes.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LikelihoodRow {
    /// `P(F | I = i)` over identity ids.
    pub face: Vec<f64>,
    /// `P(G | I = i)` over `[Female, Male]`.
    pub gender: Vec<f64>,
    /// `P(A | I = i)` over the age range.
    pub age: Vec<f64>,
    /// `P(H | I = i)` over the height range.
    pub height: Vec<f64>,
    /// `P(T | I = i)` over the weekly time slots.
    pub time: Vec<f64>,
}

impl LikelihoodRow {
    /// Vector of `modality`.
    pub fn get(&self, modality: Modality) -> &[f64] {
        match modality {
            Modality::Face => &self.face,
            Modality::Gender => &self.gender,
            Modality::Age => &self.age,
            Modality::Height => &self.height,
            Modality::Time => &self.time,
        }
    }

    /// Vector of `modality`, mutably.
    pub fn get_mut(&mut self, modality: Modality) -> &mut Vec<f64> {
        match modality {
            Modality::Face => &mut self.face,
            Modality::Gender => &mut self.gender,
            Modality::Age => &mut self.age,
            Modality::Height => &mut self.height,
            Modality::Time => &mut self.time,
        }
    }

    /// Check lengths against `identities` and every vector is a distribution.
    pub fn check(&self, identities: usize, cfg: &RecogniserConfig) -> Result<(), String> {
        for modality in Modality::ALL {
            let v = self.get(modality);
            let expected = cfg.state_count(modality).unwrap_or(identities);
            if v.len() != expected {
                return Err(format!(
                    "{modality:?} vector has {} states, expected {expected}",
                    v.len()
                ));
            }
            if v.iter().any(|p| !p.is_finite() || *p < 0.0) {
                return Err(format!("{modality:?} vector has a negative or non-finite entry"));
            }
            let total: f64 = v.iter().sum();
            if (total - 1.0).abs() > 1e-6 {
                return Err(format!("{modality:?} vector sums to {total}"));
            }
        }
        Ok(())
    }
}

/// Canonical face row: `r^w` at `index`, `((1 - r) / (n - 1))^w` elsewhere,
/// sum-normalised.
pub fn equal_face_likelihoods(cfg: &RecogniserConfig, index: usize, identities: usize) -> Vec<f64> {
    let w = cfg.weight(Modality::Face);
    let r = cfg.face_recognition_rate;
    let miss = cfg
        .weight_method
        .apply(unseen_face_probability(cfg, identities), w);
    let mut row = vec![miss; identities];
    if let Some(own) = row.get_mut(index) {
        *own = cfg.weight_method.apply(r, w);
    }
    normalise_sum(&row)
}

/// `(1 - r) / (n - 1)`: initial face likelihood of an identity that has not
/// been seen yet.
pub fn unseen_face_probability(cfg: &RecogniserConfig, identities: usize) -> f64 {
    (1.0 - cfg.face_recognition_rate) / identities.saturating_sub(1).max(1) as f64
}

/// Fresh row for the enrolled identity `record` sitting at `index`.
pub fn known_row(
    cfg: &RecogniserConfig,
    record: &IdentityRecord,
    index: usize,
    identities: usize,
) -> LikelihoodRow {
    let gender = match record.gender {
        Some(g) => {
            let w = cfg.weight(Modality::Gender);
            let rate = cfg.gender_recognition_rate;
            let mut v = vec![cfg.weight_method.apply(1.0 - rate, w); 2];
            v[g.index()] = cfg.weight_method.apply(rate, w);
            normalise_sum(&v)
        }
        None => uniform(2),
    };

    let age = curve(
        cfg,
        &CurveSpec {
            confidence: 1.0,
            mean: f64::from(record.age),
            stddev: cfg.stddev_age,
            min: cfg.age_min,
            max: cfg.age_max,
            weight: cfg.weight(Modality::Age),
            norm: NormMethod::Sum,
        },
    );

    let height = curve(
        cfg,
        &CurveSpec {
            confidence: 1.0,
            mean: record.height,
            stddev: cfg.stddev_height,
            min: cfg.height_min,
            max: cfg.height_max,
            weight: cfg.weight(Modality::Height),
            norm: NormMethod::Sum,
        },
    );

    LikelihoodRow {
        face: equal_face_likelihoods(cfg, index, identities),
        gender,
        age,
        height,
        time: time_likelihood(cfg, record),
    }
}

/// Sum of one time curve per recorded interaction, renormalised.
fn time_likelihood(cfg: &RecogniserConfig, record: &IdentityRecord) -> Vec<f64> {
    let mut total: Option<Vec<f64>> = None;
    for t in &record.times {
        let c = curve(
            cfg,
            &CurveSpec {
                confidence: 1.0,
                mean: f64::from(t.time_slot(cfg.period)),
                stddev: cfg.stddev_time,
                min: cfg.time_min(),
                max: cfg.time_max(),
                weight: cfg.weight(Modality::Time),
                norm: NormMethod::Sum,
            },
        );
        total = Some(match total {
            None => c,
            Some(acc) => acc.iter().zip(&c).map(|(a, b)| a + b).collect(),
        });
    }
    match total {
        Some(acc) => normalise_sum(&acc),
        None => uniform_distribution(cfg.time_min(), cfg.time_max()),
    }
}

/// Row of the unknown identity (index 0): canonical face row, everything else
/// uniform.
pub fn unknown_row(cfg: &RecogniserConfig, identities: usize) -> LikelihoodRow {
    LikelihoodRow {
        face: equal_face_likelihoods(cfg, 0, identities),
        gender: uniform(2),
        age: uniform_distribution(cfg.age_min, cfg.age_max),
        height: uniform_distribution(cfg.height_min, cfg.height_max),
        time: uniform_distribution(cfg.time_min(), cfg.time_max()),
    }
}

// ─── Face-row growth ────────────────────────────────────────────────────────

/// How an existing identity's face row gains the new identity's entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceGrowth {
    /// Reset to [`equal_face_likelihoods`] at the new size.
    Equal,
    /// Rescale learned mass, append the unseen entry, renormalise.
    CarryForward,
}

impl FaceGrowth {
    /// Pick the growth policy for one existing row.
    ///
    /// The equal-update flag is checked first, then the unknown-row and
    /// no-learning conditions, then the partial update scope.
    pub fn for_row(cfg: &RecogniserConfig, is_unknown: bool) -> Self {
        let unknown_fixed = cfg.unknown_update_method == UpdateMethod::None && is_unknown;
        let learning_off = cfg.update_method == UpdateMethod::None;
        let face_excluded = cfg
            .update_modalities
            .as_ref()
            .map_or(false, |scope| !scope.contains(&Modality::Face));

        if cfg.update_face_likelihoods_equally {
            if unknown_fixed || learning_off || face_excluded {
                return FaceGrowth::Equal;
            }
        } else if is_unknown && (cfg.unknown_update_method == UpdateMethod::None || learning_off) {
            return FaceGrowth::Equal;
        }
        FaceGrowth::CarryForward
    }
}

/// Grow one existing face row from `identities - 1` to `identities` entries.
pub fn grow_face_row(
    cfg: &RecogniserConfig,
    row: &[f64],
    index: usize,
    occurrences: Occurrences,
    is_unknown: bool,
    identities: usize,
) -> Vec<f64> {
    match FaceGrowth::for_row(cfg, is_unknown) {
        FaceGrowth::Equal => equal_face_likelihoods(cfg, index, identities),
        FaceGrowth::CarryForward => {
            let fresh = unseen_face_probability(cfg, identities);
            let mut grown: Vec<f64> = if occurrences.sightings == 0 {
                let stale = unseen_face_probability(cfg, identities - 1);
                row.iter()
                    .map(|&p| if is_close(p, stale) { fresh } else { p })
                    .collect()
            } else {
                let scale = match cfg.update_method {
                    UpdateMethod::Avg => occurrences.sightings + 1,
                    _ => occurrences.observations + 1,
                };
                row.iter().map(|&p| p * f64::from(scale)).collect()
            };
            grown.push(fresh);
            normalise_sum(&grown)
        }
    }
}

fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{Gender, InteractionTime};

    fn record(age: u32, height: f64) -> IdentityRecord {
        IdentityRecord::new(
            "1",
            "Jane",
            Some(Gender::Female),
            age,
            height,
            vec![InteractionTime::parse("10:00:00", 1).expect("valid")],
        )
    }

    fn assert_distribution(v: &[f64]) {
        let total: f64 = v.iter().sum();
        assert!((total - 1.0).abs() < 1e-9, "sum={total}");
        assert!(v.iter().all(|p| *p >= 0.0));
    }

    #[test]
    fn test_equal_face_row() {
        let cfg = RecogniserConfig::default();
        let row = equal_face_likelihoods(&cfg, 1, 3);
        // Face weight 1.0: 0.9 at own index, 0.05 elsewhere.
        assert!((row[1] - 0.9).abs() < 1e-12, "row={row:?}");
        assert!((row[0] - 0.05).abs() < 1e-12);
        assert!((row[2] - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_known_row_shapes_and_peaks() {
        let cfg = RecogniserConfig::default();
        let row = known_row(&cfg, &record(25, 168.0), 1, 2);
        assert_eq!(row.face.len(), 2);
        assert_eq!(row.age.len(), 76);
        assert_eq!(row.height.len(), 191);
        assert_eq!(row.time.len(), 336);
        for m in Modality::ALL {
            assert_distribution(row.get(m));
        }
        assert!(row.gender[0] > row.gender[1], "female favoured");
        assert_eq!(crate::normalise::argmax(&row.age), Some(25));
        assert_eq!(crate::normalise::argmax(&row.height), Some(118));
        assert_eq!(crate::normalise::argmax(&row.time), Some(20));
        assert!(row.check(2, &cfg).is_ok());
    }

    #[test]
    fn test_unknown_gender_is_uniform() {
        let cfg = RecogniserConfig::default();
        let mut r = record(25, 168.0);
        r.gender = None;
        let row = known_row(&cfg, &r, 1, 2);
        assert_eq!(row.gender, vec![0.5, 0.5]);
    }

    #[test]
    fn test_unknown_row_is_flat_except_face() {
        let cfg = RecogniserConfig::default();
        let row = unknown_row(&cfg, 3);
        assert!((row.face[0] - 0.9).abs() < 1e-12);
        assert_eq!(row.gender, vec![0.5, 0.5]);
        assert!(row.age.iter().all(|p| (p - 1.0 / 76.0).abs() < 1e-12));
    }

    #[test]
    fn test_growth_policy_precedence() {
        let cfg = RecogniserConfig::default();
        assert_eq!(FaceGrowth::for_row(&cfg, true), FaceGrowth::Equal);
        assert_eq!(FaceGrowth::for_row(&cfg, false), FaceGrowth::CarryForward);

        let cfg = cfg.with_face_likelihoods_equally(true);
        assert_eq!(FaceGrowth::for_row(&cfg, false), FaceGrowth::Equal, "learning off");

        let cfg = cfg
            .with_update_method(UpdateMethod::Sum, None)
            .with_update_modalities(Some(vec![Modality::Time]));
        assert_eq!(FaceGrowth::for_row(&cfg, false), FaceGrowth::Equal, "face excluded");

        let cfg = cfg.with_update_modalities(None);
        assert_eq!(FaceGrowth::for_row(&cfg, false), FaceGrowth::CarryForward);
        assert_eq!(FaceGrowth::for_row(&cfg, true), FaceGrowth::CarryForward);
    }

    #[test]
    fn test_carry_forward_unseen_replaces_stale_entries() {
        let cfg = RecogniserConfig::default();
        let old = equal_face_likelihoods(&cfg, 1, 3);
        let grown = grow_face_row(&cfg, &old, 1, Occurrences::enrolled(1), false, 4);
        assert_eq!(grown.len(), 4);
        assert_distribution(&grown);
        // 0.05 entries become 0.1/3 and the appended one matches them.
        assert!((grown[0] - grown[3]).abs() < 1e-12, "grown={grown:?}");
        assert!((grown[0] - grown[2]).abs() < 1e-12);
    }

    #[test]
    fn test_carry_forward_seen_keeps_learned_ratio() {
        let cfg = RecogniserConfig::default().with_update_method(UpdateMethod::Sum, None);
        let old = vec![0.1, 0.7, 0.2];
        let occ = Occurrences {
            sightings: 3,
            enrollment_images: 1,
            observations: 3,
        };
        let grown = grow_face_row(&cfg, &old, 1, occ, false, 4);
        assert_distribution(&grown);
        assert!((grown[1] / grown[0] - 7.0).abs() < 1e-9);
        // 4 * 1.0 scaled mass plus 0.1/3 appended.
        let expected_new = (0.1 / 3.0) / (4.0 + 0.1 / 3.0);
        assert!((grown[3] - expected_new).abs() < 1e-12);
    }
}
