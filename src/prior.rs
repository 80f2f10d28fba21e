/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Identity prior policies.
//!
//! [`PriorMethod::Equal`] is the production choice. The sequential and
//! occurrence-weighted policies bias the network towards people it has met
//! often and are kept for experiments.

use crate::config::{PriorMethod, RecogniserConfig};
use crate::database::Occurrences;
use crate::likelihood::unseen_face_probability;
use crate::normalise::{normalise_sum, uniform};

impl PriorMethod {
    /// Prior after the network is built or grown to `occurrences.len()`
    /// identities.
    ///
    /// `previous` is the prior before growth, one entry shorter; it is only
    /// read by [`PriorMethod::Sequential`].
    pub fn on_growth(
        self,
        cfg: &RecogniserConfig,
        occurrences: &[Occurrences],
        previous: Option<&[f64]>,
    ) -> Vec<f64> {
        let n = occurrences.len();
        match self {
            PriorMethod::Equal => uniform(n),
            PriorMethod::Sequential => match previous {
                Some(prev) if prev.len() + 1 == n => {
                    let mut grown = prev.to_vec();
                    grown.push(unseen_face_probability(cfg, n));
                    normalise_sum(&grown)
                }
                _ => uniform(n),
            },
            PriorMethod::Occurrences => {
                let counts: Vec<f64> = occurrences.iter().map(|o| f64::from(o.sightings)).collect();
                if counts.iter().all(|&c| c == 0.0) {
                    return uniform(n);
                }
                let floored: Vec<f64> = counts
                    .iter()
                    .map(|&c| if c == 0.0 { cfg.prob_threshold } else { c })
                    .collect();
                normalise_sum(&floored)
            }
        }
    }

    /// Prior after `confirmed` was confirmed, before its counters move.
    ///
    /// Returns `None` for [`PriorMethod::Equal`], which never changes between
    /// growths.
    pub fn on_confirmation(
        self,
        cfg: &RecogniserConfig,
        occurrences: &[Occurrences],
        confirmed: usize,
        posterior: Option<&[f64]>,
    ) -> Option<Vec<f64>> {
        match self {
            PriorMethod::Equal => None,
            PriorMethod::Sequential => posterior
                .filter(|p| p.len() == occurrences.len())
                .map(normalise_sum),
            PriorMethod::Occurrences => {
                let all_zero = occurrences.iter().all(|o| o.sightings == 0);
                let counts: Vec<f64> = occurrences
                    .iter()
                    .enumerate()
                    .map(|(i, o)| {
                        if i == confirmed {
                            if all_zero {
                                1.0
                            } else {
                                f64::from(o.sightings) + 1.0
                            }
                        } else if o.sightings == 0 {
                            cfg.prob_threshold
                        } else {
                            f64::from(o.sightings)
                        }
                    })
                    .collect();
                Some(normalise_sum(&counts))
            }
        }
    }
}
