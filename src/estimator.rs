/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Decision rule: arg-max identity behind a cold-start gate and a quality
//! gate, plus the face-only comparison estimate.

use crate::config::RecogniserConfig;
use crate::database::UNKNOWN_ID;
use crate::normalise::{argmax, round_to};
use crate::observation::FaceReading;

/// Outcome of one identity estimate.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Estimate {
    /// Estimated identity id, [`UNKNOWN_ID`] when gated.
    pub identity: String,
    /// Quality score, `-1` when the model cannot discriminate yet.
    pub quality: f64,
    /// The quality gate overrode the arg-max.
    pub unknown_condition: bool,
    /// Posterior the decision was taken on, rounded to 4 decimals.
    pub posterior: Vec<f64>,
}

impl Estimate {
    /// Whether the estimate names an enrolled identity.
    pub fn is_known(&self) -> bool {
        self.identity != UNKNOWN_ID
    }
}

/// `(p1 - p2) * C` on the two largest posterior values, rounded to 5 decimals.
///
/// `C` is the configured quality coefficient or the identity count. Returns
/// `-1` with fewer than two identities.
pub fn quality(cfg: &RecogniserConfig, posterior: &[f64]) -> f64 {
    if posterior.len() < 2 {
        return -1.0;
    }
    let (mut p1, mut p2) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &p in posterior {
        if p > p1 {
            p2 = p1;
            p1 = p;
        } else if p > p2 {
            p2 = p;
        }
    }
    let coefficient = cfg
        .quality_coefficient
        .unwrap_or(posterior.len() as f64);
    round_to((p1 - p2) * coefficient, 5)
}

/// Decide on `posterior` over `labels`.
///
/// `posterior` is `None` when no network exists yet. Before
/// `num_recog_min` confirmations, or with a single identity, the answer is
/// always unknown with quality `-1`.
pub fn estimate(
    cfg: &RecogniserConfig,
    labels: &[String],
    posterior: Option<&[f64]>,
    num_recognitions: u32,
) -> Estimate {
    let posterior = match posterior {
        Some(p) if labels.len() > 1 && p.len() == labels.len() => p,
        _ => {
            return Estimate {
                identity: UNKNOWN_ID.to_owned(),
                quality: -1.0,
                unknown_condition: false,
                posterior: posterior.map_or_else(|| vec![1.0], <[f64]>::to_vec),
            }
        }
    };
    let rounded: Vec<f64> = posterior.iter().map(|&p| round_to(p, 4)).collect();

    if num_recognitions < cfg.num_recog_min {
        log::debug!(
            "cold start: {num_recognitions} of {} recognitions, estimating unknown",
            cfg.num_recog_min
        );
        return Estimate {
            identity: UNKNOWN_ID.to_owned(),
            quality: -1.0,
            unknown_condition: false,
            posterior: rounded,
        };
    }

    let best = argmax(&rounded).unwrap_or(0);
    let q = quality(cfg, &rounded);
    if q < cfg.quality_threshold || q == 0.0 {
        log::debug!("quality {q} below {}, estimating unknown", cfg.quality_threshold);
        return Estimate {
            identity: UNKNOWN_ID.to_owned(),
            quality: q,
            unknown_condition: true,
            posterior: rounded,
        };
    }
    Estimate {
        identity: labels[best].clone(),
        quality: q,
        unknown_condition: false,
        posterior: rounded,
    }
}

// ─── Face-only estimate ─────────────────────────────────────────────────────

/// Identity named by raw face similarity alone.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FaceEstimate {
    /// Estimated id, [`UNKNOWN_ID`] when undecided.
    pub identity: String,
    /// Averaged similarity per label, unknown slot included.
    pub scores: Vec<f64>,
}

/// Threshold the averaged face similarity of `readings` over `labels`.
///
/// Never feeds back into the Bayesian estimate.
pub fn face_only_estimate(
    cfg: &RecogniserConfig,
    labels: &[String],
    readings: &[&FaceReading],
    num_recognitions: u32,
) -> FaceEstimate {
    let known: Vec<&String> = labels.iter().filter(|l| l.as_str() != UNKNOWN_ID).collect();
    let unknown = |scores: Vec<f64>| FaceEstimate {
        identity: UNKNOWN_ID.to_owned(),
        scores,
    };
    if known.is_empty() || readings.is_empty() {
        return unknown(vec![cfg.face_recog_threshold]);
    }

    let count = readings.len() as f64;
    let mut scores: Vec<f64> = known
        .iter()
        .map(|id| {
            readings
                .iter()
                .map(|r| r.similarity(id).unwrap_or(0.0))
                .sum::<f64>()
                / count
        })
        .collect();

    if num_recognitions < cfg.num_recog_min {
        scores.insert(0, cfg.face_recog_threshold);
        return unknown(scores);
    }

    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let best = argmax(&scores).unwrap_or(0);
    if max < cfg.face_recog_threshold {
        scores.insert(0, cfg.face_recog_threshold);
        return unknown(scores);
    }

    scores.insert(0, 0.0);
    let ties = scores
        .iter()
        .filter(|&&s| (s - max).abs() <= 1e-8 + 1e-5 * max.abs())
        .count();
    if ties > 1 {
        return unknown(scores);
    }
    FaceEstimate {
        identity: known[best].clone(),
        scores,
    }
}
