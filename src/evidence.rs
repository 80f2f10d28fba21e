/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Evidence builder: one raw [`Observation`] in, five normalised evidence
//! vectors out.
//!
//! Each vector lives on the same support as the matching likelihood column,
//! so inference can take the inner product of the two.

use crate::config::{Modality, RecogniserConfig, MODALITY_COUNT};
use crate::curve::{curve, CurveSpec};
use crate::database::UNKNOWN_ID;
use crate::observation::{FaceReading, GenderReading, Observation};

/// Five evidence vectors in [`Modality`] order.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Evidence {
    vectors: [Vec<f64>; MODALITY_COUNT],
}

impl Evidence {
    /// Wrap five vectors given in [`Modality`] order.
    pub fn from_vectors(vectors: [Vec<f64>; MODALITY_COUNT]) -> Self {
        Self { vectors }
    }

    /// Vector of `modality`.
    pub fn get(&self, modality: Modality) -> &[f64] {
        &self.vectors[modality.index()]
    }

    /// All five vectors.
    pub fn vectors(&self) -> &[Vec<f64>; MODALITY_COUNT] {
        &self.vectors
    }
}

/// Turns observations into evidence against a fixed label order.
#[derive(Clone, Copy, Debug)]
pub struct EvidenceBuilder<'a> {
    cfg: &'a RecogniserConfig,
    labels: &'a [String],
}

impl<'a> EvidenceBuilder<'a> {
    /// Builder for the identity ids `labels`, unknown first.
    pub fn new(cfg: &'a RecogniserConfig, labels: &'a [String]) -> Self {
        Self { cfg, labels }
    }

    /// Evidence weighted by the configured modality weights.
    pub fn build(&self, obs: &Observation) -> Evidence {
        self.build_with_weights(obs, &self.cfg.weights)
    }

    /// Evidence with every weight at 1.
    pub fn unweighted(&self, obs: &Observation) -> Evidence {
        self.build_with_weights(obs, &[1.0; MODALITY_COUNT])
    }

    /// Evidence under explicit per-modality weights.
    pub fn build_with_weights(&self, obs: &Observation, weights: &[f64; MODALITY_COUNT]) -> Evidence {
        let cfg = self.cfg;
        let norms = &cfg.evidence_norms;

        let age = curve(
            cfg,
            &CurveSpec {
                confidence: obs.age.confidence,
                mean: obs.age.value,
                stddev: 0.0,
                min: cfg.age_min,
                max: cfg.age_max,
                weight: weights[Modality::Age.index()],
                norm: norms.get(Modality::Age),
            },
        );
        let height = curve(
            cfg,
            &CurveSpec {
                confidence: obs.height.confidence,
                mean: obs.height.value,
                stddev: cfg.stddev_height,
                min: cfg.height_min,
                max: cfg.height_max,
                weight: weights[Modality::Height.index()],
                norm: norms.get(Modality::Height),
            },
        );
        let time = curve(
            cfg,
            &CurveSpec {
                confidence: 1.0,
                mean: f64::from(obs.time.time_slot(cfg.period)),
                stddev: cfg.stddev_time,
                min: cfg.time_min(),
                max: cfg.time_max(),
                weight: weights[Modality::Time.index()],
                norm: norms.get(Modality::Time),
            },
        );

        Evidence {
            vectors: [
                self.face(&obs.face, weights[Modality::Face.index()]),
                self.gender(&obs.gender, weights[Modality::Gender.index()]),
                age,
                height,
                time,
            ],
        }
    }

    /// Face evidence in label order.
    ///
    /// No candidates at all means the recogniser saw a stranger: unknown gets
    /// all the mass. Otherwise a missing unknown entry is injected at the
    /// face recognition threshold, and ids the recogniser does not report get
    /// the probability floor.
    pub fn face(&self, reading: &FaceReading, weight: f64) -> Vec<f64> {
        let cfg = self.cfg;
        let unknown_score = if reading.candidates.is_empty() {
            1.0
        } else {
            reading
                .similarity(UNKNOWN_ID)
                .unwrap_or(cfg.face_recog_threshold)
        };

        let raw: Vec<f64> = self
            .labels
            .iter()
            .map(|id| {
                let similarity = if id == UNKNOWN_ID {
                    Some(unknown_score)
                } else {
                    reading.similarity(id)
                };
                let fr = similarity.unwrap_or(cfg.prob_threshold).max(cfg.prob_threshold);
                let acc = cfg.accuracy_method.apply(fr, reading.accuracy);
                cfg.weight_method.apply(acc, weight)
            })
            .collect();
        cfg.evidence_norms.get(Modality::Face).apply(&raw)
    }

    /// Gender evidence over `[Female, Male]`.
    pub fn gender(&self, reading: &GenderReading, weight: f64) -> Vec<f64> {
        let cfg = self.cfg;
        let gr = reading.confidence.min(1.0 - cfg.prob_threshold);
        let comp = cfg.weight_method.apply(1.0 - gr, weight);
        let gr = cfg.weight_method.apply(gr, weight);
        let total = gr + comp;
        if total == 0.0 {
            return vec![0.5, 0.5];
        }
        let mut v = vec![comp / total; 2];
        v[reading.gender.index()] = gr / total;
        v
    }
}
