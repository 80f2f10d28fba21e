/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Multi-observation fusion.
//!
//! A batch of readings is gathered in parallel, one task per index. Each task
//! reads, builds evidence and runs inference without touching shared state.
//! The join is a barrier: readings with no face are dropped, and if every
//! reading is dropped the batch yields nothing.

use heapless::Vec as BoundedVec;
use rayon::prelude::*;

use crate::config::{RecogniserConfig, MAX_FUSION_BATCH};
use crate::evidence::{Evidence, EvidenceBuilder};
use crate::network::RecogniserNetwork;
use crate::normalise::{normalise_sum, round_to};
use crate::observation::{Observation, ObservationSource};

/// One surviving reading of a batch.
#[derive(Clone, Debug, PartialEq)]
pub struct FusedReading {
    /// Position of the reading in the batch.
    pub index: usize,
    /// The raw observation.
    pub observation: Observation,
    /// Weighted evidence.
    pub evidence: Evidence,
    /// Identity posterior for this reading alone, if a network exists.
    pub posterior: Option<Vec<f64>>,
}

/// Joined result of one batch.
#[derive(Clone, Debug, PartialEq)]
pub struct FusedBatch {
    /// Readings that produced evidence, in batch order.
    pub readings: BoundedVec<FusedReading, MAX_FUSION_BATCH>,
    /// Indices of dropped readings.
    pub discarded: BoundedVec<usize, MAX_FUSION_BATCH>,
    /// Averaged posterior rounded to 4 decimals, if a network exists.
    pub posterior: Option<Vec<f64>>,
}

impl FusedBatch {
    /// Evidence of the surviving readings.
    pub fn evidences(&self) -> Vec<Evidence> {
        self.readings.iter().map(|r| r.evidence.clone()).collect()
    }
}

/// Read and evaluate `batch_size` observations from `source` in parallel.
///
/// Returns `None` when every reading came back empty.
pub fn fuse<S>(
    cfg: &RecogniserConfig,
    labels: &[String],
    network: Option<&RecogniserNetwork>,
    source: &S,
    batch_size: usize,
) -> Option<FusedBatch>
where
    S: ObservationSource + ?Sized,
{
    let batch_size = batch_size.clamp(1, MAX_FUSION_BATCH);
    let builder = EvidenceBuilder::new(cfg, labels);

    let results: Vec<(usize, Option<FusedReading>)> = (0..batch_size)
        .into_par_iter()
        .map(|index| {
            let reading = source.read(index).map(|observation| {
                let evidence = builder.build(&observation);
                let posterior = network.map(|net| net.posterior(&evidence));
                FusedReading {
                    index,
                    observation,
                    evidence,
                    posterior,
                }
            });
            (index, reading)
        })
        .collect();

    let mut readings = BoundedVec::new();
    let mut discarded = BoundedVec::new();
    for (index, reading) in results {
        match reading {
            Some(r) => {
                if readings.push(r).is_err() {
                    break;
                }
            }
            None => {
                log::warn!("reading {index} of {batch_size} has no face, discarding it");
                if discarded.push(index).is_err() {
                    break;
                }
            }
        }
    }

    if readings.is_empty() {
        log::warn!("all {batch_size} readings discarded, no estimate");
        return None;
    }

    let posterior = network.map(|net| {
        let mut total = vec![0.0; net.cardinality()];
        for p in readings.iter().filter_map(|r: &FusedReading| r.posterior.as_ref()) {
            for (t, v) in total.iter_mut().zip(p) {
                *t += v;
            }
        }
        normalise_sum(&total)
            .into_iter()
            .map(|p| round_to(p, 4))
            .collect()
    });

    Some(FusedBatch {
        readings,
        discarded,
        posterior,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{IdentityDatabase, IdentityRecord};
    use crate::observation::{FaceReading, Gender, GenderReading, InteractionTime, RangeReading};

    fn observation(face_id: &str) -> Observation {
        Observation {
            face: FaceReading {
                accuracy: 1.0,
                candidates: vec![(face_id.to_string(), 0.9)],
            },
            gender: GenderReading {
                gender: Gender::Male,
                confidence: 0.7,
            },
            age: RangeReading {
                value: 30.0,
                confidence: 0.5,
            },
            height: RangeReading {
                value: 180.0,
                confidence: 0.5,
            },
            time: InteractionTime::parse("12:00:00", 2).expect("valid"),
        }
    }

    fn network(cfg: &RecogniserConfig) -> (IdentityDatabase, RecogniserNetwork) {
        let mut db = IdentityDatabase::new();
        for i in 1..=2 {
            db.add_identity(
                IdentityRecord::new(i.to_string(), "p", Some(Gender::Male), 30, 180.0, vec![]),
                cfg,
            );
        }
        let net = RecogniserNetwork::build(&db, cfg);
        (db, net)
    }

    #[test]
    fn test_drops_empty_readings() {
        let cfg = RecogniserConfig::default();
        let (db, net) = network(&cfg);
        let source = vec![Some(observation("1")), None, Some(observation("1"))];
        let fused = fuse(&cfg, &db.labels(), Some(&net), &source, 3).expect("two readings survive");
        assert_eq!(fused.readings.len(), 2);
        assert_eq!(fused.discarded.as_slice(), &[1]);
        assert_eq!(fused.readings[1].index, 2);
        let post = fused.posterior.expect("network present");
        assert_eq!(post.len(), 3);
        assert!((post.iter().sum::<f64>() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_all_dropped_is_none() {
        let cfg = RecogniserConfig::default();
        let (db, net) = network(&cfg);
        let source: Vec<Option<Observation>> = vec![None, None];
        assert!(fuse(&cfg, &db.labels(), Some(&net), &source, 2).is_none());
    }

    #[test]
    fn test_without_network_has_no_posterior() {
        let cfg = RecogniserConfig::default();
        let labels = vec!["0".to_string()];
        let source = vec![Some(observation("1"))];
        let fused = fuse(&cfg, &labels, None, &source, 1).expect("one reading");
        assert!(fused.posterior.is_none());
        assert_eq!(fused.evidences().len(), 1);
    }

    #[test]
    fn test_fused_posterior_matches_single_when_identical() {
        let cfg = RecogniserConfig::default();
        let (db, net) = network(&cfg);
        let source = vec![Some(observation("2")); 4];
        let fused = fuse(&cfg, &db.labels(), Some(&net), &source, 4).expect("readings");
        let single = net.posterior(&fused.readings[0].evidence);
        for (f, s) in fused.posterior.expect("posterior").iter().zip(single) {
            assert!((f - round_to(s, 4)).abs() < 1e-12);
        }
    }
}
