/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Online learning from confirmed identities.
//!
//! A learned row is the old row scaled back to pseudo-counts, plus this
//! confirmation's contribution, renormalised. The unknown identity only ever
//! learns its face vector, and modalities with zero weight are skipped
//! because their evidence is flat.
//!
//! # Rules
//!
//! | Method | Single reading | Fused batch |
//! |---|---|---|
//! | `Sum` | `row·(s+1) + e` | `row·(o+1) + Σe` |
//! | `Avg` | `row·(s+1) + e` | `row·(s+1) + norm(Σe)` |
//! | `Evidence` | `row·(s+1) + P(m \| e, I)` | `row·(o+1) + Σ P(m \| e, I)` |
//!
//! where `s` counts sightings and `o` counts learned observations.

use crate::config::{Modality, RecogniserConfig, UpdateMethod};
use crate::database::IdentityDatabase;
use crate::error::{IdentityError, IdentityResult};
use crate::evidence::Evidence;
use crate::network::RecogniserNetwork;
use crate::normalise::normalise_sum;

/// Applies one confirmation to the network and the roster counters.
#[derive(Clone, Copy, Debug)]
pub struct OnlineLearner<'a> {
    cfg: &'a RecogniserConfig,
}

impl<'a> OnlineLearner<'a> {
    /// Learner under `cfg`.
    pub fn new(cfg: &'a RecogniserConfig) -> Self {
        Self { cfg }
    }

    /// Rule applied to identity `index`.
    pub fn method_for(&self, index: usize) -> UpdateMethod {
        if index == 0 {
            self.cfg.unknown_update_method
        } else {
            self.cfg.update_method
        }
    }

    /// Modalities identity `index` learns.
    pub fn scope_for(&self, index: usize) -> Vec<Modality> {
        Modality::ALL
            .iter()
            .copied()
            .filter(|&m| {
                if index == 0 {
                    m == Modality::Face
                } else {
                    self.cfg.learns(m)
                }
            })
            .filter(|&m| self.cfg.weight(m) > 0.0)
            .collect()
    }

    /// Learn that `evidences` were readings of identity `index`.
    ///
    /// `posterior` is the identity posterior the estimate was taken on; the
    /// sequential prior adopts it. With fusion enabled the batch rules apply
    /// and the observation counter advances by the batch length.
    ///
    /// Evidence must be laid out for the network's current cardinality;
    /// vectors taken before a growth are rejected before anything changes.
    pub fn learn(
        &self,
        network: &mut RecogniserNetwork,
        db: &mut IdentityDatabase,
        index: usize,
        evidences: &[Evidence],
        posterior: Option<&[f64]>,
    ) -> IdentityResult<()> {
        let method = self.method_for(index);
        let batch = self.cfg.fusion.enabled;
        let observed = if batch { evidences.len().max(1) as u32 } else { 1 };

        let Some(occurrences) = db.record(index).map(|r| r.occurrences) else {
            log::warn!("cannot learn for identity index {index}: not in the roster");
            return Ok(());
        };

        if method != UpdateMethod::None && !evidences.is_empty() {
            self.check_shapes(network, index, evidences)?;
            if let Some(prior) = self.cfg.prior_method.on_confirmation(
                self.cfg,
                &db.occurrences(),
                index,
                posterior,
            ) {
                network.set_prior(prior);
            }

            for modality in self.scope_for(index) {
                let contributions: Vec<Vec<f64>> = evidences
                    .iter()
                    .map(|ev| match method {
                        UpdateMethod::Evidence => {
                            network.modality_posterior_given_identity(index, modality, ev)
                        }
                        _ => ev.get(modality).to_vec(),
                    })
                    .collect();
                let Some(row) = network.row_mut(index) else {
                    continue;
                };
                let old = row.get(modality);
                let sightings = f64::from(occurrences.sightings + 1);
                let observations = f64::from(occurrences.observations + 1);

                let merged = if batch {
                    let total = sum(&contributions, old.len());
                    match method {
                        UpdateMethod::Avg => add(&scale(old, sightings), &normalise_sum(&total)),
                        _ => add(&scale(old, observations), &total),
                    }
                } else {
                    add(&scale(old, sightings), &contributions[0])
                };
                *row.get_mut(modality) = normalise_sum(&merged);
            }
        }

        if let Some(occ) = db.occurrences_mut(index) {
            occ.record(observed);
        }
        Ok(())
    }

    fn check_shapes(
        &self,
        network: &RecogniserNetwork,
        index: usize,
        evidences: &[Evidence],
    ) -> IdentityResult<()> {
        let Some(row) = network.row(index) else {
            return Err(IdentityError::MalformedModel(format!(
                "no likelihood row for identity index {index}"
            )));
        };
        for modality in self.scope_for(index) {
            let expected = row.get(modality).len();
            if let Some(ev) = evidences.iter().find(|ev| ev.get(modality).len() != expected) {
                return Err(IdentityError::MalformedModel(format!(
                    "{modality:?} evidence has {} states, identity {index} row has {expected}",
                    ev.get(modality).len()
                )));
            }
        }
        Ok(())
    }
}

fn scale(v: &[f64], k: f64) -> Vec<f64> {
    v.iter().map(|x| x * k).collect()
}

fn add(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

fn sum(vectors: &[Vec<f64>], len: usize) -> Vec<f64> {
    vectors.iter().fold(vec![0.0; len], |acc, v| add(&acc, v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::IdentityRecord;
    use crate::evidence::EvidenceBuilder;
    use crate::observation::{
        FaceReading, Gender, GenderReading, InteractionTime, Observation, RangeReading,
    };

    fn setup(cfg: &RecogniserConfig) -> (IdentityDatabase, RecogniserNetwork) {
        let mut db = IdentityDatabase::new();
        for (i, age) in [(1, 25), (2, 40)] {
            db.add_identity(
                IdentityRecord::new(
                    i.to_string(),
                    format!("p{i}"),
                    Some(Gender::Female),
                    age,
                    168.0,
                    vec![InteractionTime::parse("09:00:00", 1).expect("valid")],
                ),
                cfg,
            );
        }
        let net = RecogniserNetwork::build(&db, cfg);
        (db, net)
    }

    fn reading() -> Observation {
        Observation {
            face: FaceReading {
                accuracy: 1.0,
                candidates: vec![("1".into(), 0.9), ("2".into(), 0.1)],
            },
            gender: GenderReading {
                gender: Gender::Female,
                confidence: 0.9,
            },
            age: RangeReading {
                value: 26.0,
                confidence: 0.8,
            },
            height: RangeReading {
                value: 170.0,
                confidence: 0.8,
            },
            time: InteractionTime::parse("18:00:00", 4).expect("valid"),
        }
    }

    fn evidence(cfg: &RecogniserConfig, db: &IdentityDatabase) -> Evidence {
        let labels = db.labels();
        EvidenceBuilder::new(cfg, &labels).build(&reading())
    }

    #[test]
    fn test_none_only_counts() {
        let cfg = RecogniserConfig::default();
        let (mut db, mut net) = setup(&cfg);
        let before = net.clone();
        let ev = evidence(&cfg, &db);
        OnlineLearner::new(&cfg).learn(&mut net, &mut db, 1, &[ev], None).expect("matching shapes");
        assert_eq!(net, before);
        let occ = db.record(1).expect("present").occurrences;
        assert_eq!((occ.sightings, occ.observations), (1, 1));
    }

    #[test]
    fn test_sum_moves_row_towards_evidence() {
        let cfg = RecogniserConfig::default().with_update_method(UpdateMethod::Sum, None);
        let (mut db, mut net) = setup(&cfg);
        let before = net.row(1).expect("row").time.clone();
        let ev = evidence(&cfg, &db);
        let ev_time = ev.get(Modality::Time).to_vec();
        let slot = InteractionTime::parse("18:00:00", 4).expect("valid").time_slot(30) as usize;
        OnlineLearner::new(&cfg).learn(&mut net, &mut db, 1, &[ev], None).expect("matching shapes");
        let after = &net.row(1).expect("row").time;
        assert!(after[slot] > before[slot], "time mass must move to the new slot");
        assert!((after.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        // No sightings yet: old row and evidence weigh the same.
        let expected = (before[slot] + ev_time[slot]) / 2.0;
        assert!((after[slot] - expected).abs() < 1e-12, "after={} expected={expected}", after[slot]);
    }

    #[test]
    fn test_unknown_learns_face_only() {
        let cfg = RecogniserConfig::default().with_update_method(UpdateMethod::Sum, None);
        let (mut db, mut net) = setup(&cfg);
        let before = net.row(0).expect("row").clone();
        let ev = evidence(&cfg, &db);
        OnlineLearner::new(&cfg).learn(&mut net, &mut db, 0, &[ev], None).expect("matching shapes");
        let after = net.row(0).expect("row");
        assert_ne!(after.face, before.face);
        assert_eq!(after.gender, before.gender);
        assert_eq!(after.age, before.age);
        assert_eq!(after.height, before.height);
        assert_eq!(after.time, before.time);
    }

    #[test]
    fn test_partial_scope_and_zero_weight() {
        let cfg = RecogniserConfig::default()
            .with_update_method(UpdateMethod::Evidence, None)
            .with_update_modalities(Some(vec![Modality::Age, Modality::Gender]))
            .with_weight(Modality::Gender, 0.0);
        let learner = OnlineLearner::new(&cfg);
        assert_eq!(learner.scope_for(1), vec![Modality::Age]);
        assert_eq!(learner.scope_for(0), vec![Modality::Face]);

        let (mut db, mut net) = setup(&cfg);
        let before = net.row(1).expect("row").clone();
        let ev = evidence(&cfg, &db);
        learner.learn(&mut net, &mut db, 1, &[ev], None).expect("matching shapes");
        let after = net.row(1).expect("row");
        assert_ne!(after.age, before.age);
        assert_eq!(after.face, before.face);
        assert_eq!(after.time, before.time);
    }

    #[test]
    fn test_batch_counts_observations() {
        let cfg = RecogniserConfig::default()
            .with_update_method(UpdateMethod::Avg, None)
            .with_fusion(true, 3);
        let (mut db, mut net) = setup(&cfg);
        let ev = evidence(&cfg, &db);
        OnlineLearner::new(&cfg)
            .learn(&mut net, &mut db, 2, &[ev.clone(), ev.clone(), ev], None)
            .expect("matching shapes");
        let occ = db.record(2).expect("present").occurrences;
        assert_eq!((occ.sightings, occ.observations), (1, 3));
        for m in Modality::ALL {
            let v = net.row(2).expect("row").get(m);
            assert!((v.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_sequential_prior_adopts_posterior() {
        let cfg = RecogniserConfig::default()
            .with_update_method(UpdateMethod::Sum, None)
            .with_prior_method(crate::config::PriorMethod::Sequential);
        let (mut db, mut net) = setup(&cfg);
        let ev = evidence(&cfg, &db);
        let post = [0.2, 0.7, 0.1];
        OnlineLearner::new(&cfg)
            .learn(&mut net, &mut db, 1, &[ev], Some(&post))
            .expect("matching shapes");
        for (got, want) in net.prior().iter().zip(post) {
            assert!((got - want).abs() < 1e-12, "prior={:?}", net.prior());
        }
    }

    #[test]
    fn test_evidence_from_before_growth_is_rejected() {
        let cfg = RecogniserConfig::default().with_update_method(UpdateMethod::Sum, None);
        let (mut db, mut net) = setup(&cfg);
        let stale = evidence(&cfg, &db);
        db.add_identity(
            IdentityRecord::new("3", "p3", Some(Gender::Male), 60, 180.0, vec![]),
            &cfg,
        );
        net.grow(&db, &cfg);
        let before = net.clone();

        let result = OnlineLearner::new(&cfg).learn(&mut net, &mut db, 1, &[stale], None);
        assert!(matches!(result, Err(IdentityError::MalformedModel(_))), "{result:?}");
        assert_eq!(net, before, "a rejected update must leave the rows alone");
        assert_eq!(db.record(1).expect("present").occurrences.sightings, 0);
    }
}
