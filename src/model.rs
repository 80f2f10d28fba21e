/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! The identity model: roster, network and session in one place.
//!
//! Per interaction:
//!
//! ```text
//! begin_session → estimate_identity → [caller confirms] → confirm_identity
//!                    │                                        │
//!              evidence + posterior               enroll / grow, re-evaluate,
//!              + decision rule                    learn, count recognition
//! ```
//!
//! The model holds no locks. Callers serialise every `&mut self` call;
//! the only parallel work is the read fan-out inside one estimate.

use heapless::Vec as BoundedVec;

use crate::config::{RecogniserConfig, UpdateMethod, MAX_FUSION_BATCH};
use crate::database::{IdentityDatabase, IdentityRecord, UNKNOWN_ID};
use crate::error::{IdentityError, IdentityResult};
use crate::estimator::{estimate, face_only_estimate, Estimate, FaceEstimate};
use crate::evidence::Evidence;
use crate::fusion::{fuse, FusedBatch};
use crate::learner::OnlineLearner;
use crate::likelihood::LikelihoodRow;
use crate::network::RecogniserNetwork;
use crate::observation::{FaceReading, Observation, ObservationSource};

// ─── Session ────────────────────────────────────────────────────────────────

/// State of the interaction in progress.
#[derive(Clone, Debug, Default)]
pub struct Session {
    registering: bool,
    pending: Option<IdentityRecord>,
    observations: BoundedVec<Observation, MAX_FUSION_BATCH>,
    evidences: BoundedVec<Evidence, MAX_FUSION_BATCH>,
    discarded: usize,
    posterior: Option<Vec<f64>>,
    estimate: Option<Estimate>,
    face_estimate: Option<FaceEstimate>,
}

impl Session {
    /// The subject said they are a new person.
    pub fn is_registering(&self) -> bool {
        self.registering
    }

    /// Record to enroll if the confirmed id is new.
    pub fn pending(&self) -> Option<&IdentityRecord> {
        self.pending.as_ref()
    }

    /// Readings that produced evidence.
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Evidence of those readings.
    pub fn evidences(&self) -> &[Evidence] {
        &self.evidences
    }

    /// Readings dropped for having no face.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Identity posterior of the last evaluation.
    pub fn posterior(&self) -> Option<&[f64]> {
        self.posterior.as_deref()
    }

    /// Last estimate.
    pub fn estimate(&self) -> Option<&Estimate> {
        self.estimate.as_ref()
    }

    /// Last face-only estimate.
    pub fn face_estimate(&self) -> Option<&FaceEstimate> {
        self.face_estimate.as_ref()
    }

    fn clear_readings(&mut self) {
        self.observations.clear();
        self.evidences.clear();
        self.discarded = 0;
        self.posterior = None;
        self.estimate = None;
        self.face_estimate = None;
    }

    fn store(&mut self, batch: FusedBatch) {
        self.discarded = batch.discarded.len();
        self.posterior = batch.posterior;
        // Same capacity as the batch, so the bound carries over.
        let (observations, evidences): (
            BoundedVec<Observation, MAX_FUSION_BATCH>,
            BoundedVec<Evidence, MAX_FUSION_BATCH>,
        ) = batch
            .readings
            .into_iter()
            .map(|r| (r.observation, r.evidence))
            .unzip();
        self.observations = observations;
        self.evidences = evidences;
    }

    fn stored_readings(&self) -> Vec<Option<Observation>> {
        self.observations.iter().cloned().map(Some).collect()
    }
}

// ─── Confirmation ───────────────────────────────────────────────────────────

/// What a confirmation did.
#[derive(Clone, Debug, PartialEq)]
pub struct Confirmation {
    /// Confirmed identity id.
    pub identity: String,
    /// Its display name.
    pub name: String,
    /// The id had no confirmed sighting before.
    pub registration: bool,
    /// The id was added to the roster by this confirmation.
    pub enrolled: bool,
}

// ─── Replay ─────────────────────────────────────────────────────────────────

/// One recorded interaction for [`IdentityModel::replay`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecordedInteraction {
    /// Ground-truth identity.
    pub identity: String,
    /// Enrollment record when this interaction registered the person.
    pub enrollment: Option<IdentityRecord>,
    /// Raw readings, `None` where no face was detected.
    pub readings: Vec<Option<Observation>>,
}

/// Counters gathered while replaying a history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Interactions estimated and confirmed.
    pub interactions: usize,
    /// Interactions skipped because every reading was empty.
    pub discarded: usize,
    /// Confirmations that registered a new person.
    pub registrations: usize,
    /// Estimates that named the ground-truth identity.
    pub correct: usize,
}

// ─── IdentityModel ──────────────────────────────────────────────────────────

/// Open-world identity model.
#[derive(Clone, Debug)]
pub struct IdentityModel {
    config: RecogniserConfig,
    db: IdentityDatabase,
    network: Option<RecogniserNetwork>,
    num_recognitions: u32,
    session: Session,
}

impl IdentityModel {
    /// Empty model holding only the unknown identity.
    pub fn new(config: RecogniserConfig) -> IdentityResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            db: IdentityDatabase::new(),
            network: None,
            num_recognitions: 0,
            session: Session::default(),
        })
    }

    /// Model over a persisted roster, with likelihood rows rebuilt from the
    /// roster's ground truth.
    pub fn from_roster(config: RecogniserConfig, records: Vec<IdentityRecord>) -> IdentityResult<Self> {
        config.validate()?;
        let db = IdentityDatabase::load(records, &config)?;
        let network = (db.len() > 1).then(|| RecogniserNetwork::build(&db, &config));
        let num_recognitions = db.total_recognitions();
        Ok(Self {
            config,
            db,
            network,
            num_recognitions,
            session: Session::default(),
        })
    }

    /// Model over a persisted roster and persisted network.
    ///
    /// `rows` holds one row per identity, unknown first. Shapes and
    /// distributions are checked against the roster.
    pub fn from_parts(
        config: RecogniserConfig,
        records: Vec<IdentityRecord>,
        prior: Vec<f64>,
        rows: Vec<LikelihoodRow>,
        num_recognitions: u32,
    ) -> IdentityResult<Self> {
        config.validate()?;
        let db = IdentityDatabase::load(records, &config)?;
        let network = if db.len() > 1 {
            Some(RecogniserNetwork::from_parts(prior, rows, &db, &config)?)
        } else if rows.is_empty() {
            None
        } else {
            return Err(IdentityError::MalformedModel(format!(
                "{} likelihood rows for an empty roster",
                rows.len()
            )));
        };
        Ok(Self {
            config,
            db,
            network,
            num_recognitions,
            session: Session::default(),
        })
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    /// Configuration.
    pub fn config(&self) -> &RecogniserConfig {
        &self.config
    }

    /// Identity roster.
    pub fn database(&self) -> &IdentityDatabase {
        &self.db
    }

    /// Network, once two identities exist.
    pub fn network(&self) -> Option<&RecogniserNetwork> {
        self.network.as_ref()
    }

    /// Confirmed recognitions so far.
    pub fn num_recognitions(&self) -> u32 {
        self.num_recognitions
    }

    #[cfg_attr(not(feature = "serde"), allow(dead_code))]
    pub(crate) fn set_num_recognitions(&mut self, n: u32) {
        self.num_recognitions = n;
    }

    /// Identities including unknown.
    pub fn num_identities(&self) -> usize {
        self.db.len()
    }

    /// Identity ids, unknown first.
    pub fn labels(&self) -> Vec<String> {
        self.db.labels()
    }

    /// Current session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    // ── Session ────────────────────────────────────────────────────────────

    /// Start an interaction.
    ///
    /// `registering` records whether the subject claims to be new.
    /// `pending` is enrolled if the confirmed id turns out to be unknown to
    /// the roster.
    pub fn begin_session(&mut self, registering: bool, pending: Option<IdentityRecord>) {
        self.session = Session {
            registering,
            pending,
            ..Session::default()
        };
    }

    /// Attach an enrollment record to the running session.
    pub fn set_pending_enrollment(&mut self, record: IdentityRecord) {
        self.session.registering = true;
        self.session.pending = Some(record);
    }

    // ── Estimation ─────────────────────────────────────────────────────────

    /// Estimate the identity behind one observation.
    ///
    /// `None` in, `None` out: an interaction without a face yields no
    /// estimate and nothing to confirm.
    pub fn estimate_identity(&mut self, observation: Option<Observation>) -> Option<Estimate> {
        let source = [observation];
        self.estimate_batch(&source[..], 1)
    }

    /// Estimate from a batch of readings, fused when fusion is enabled.
    pub fn estimate_identity_from<S>(&mut self, source: &S) -> Option<Estimate>
    where
        S: ObservationSource + ?Sized,
    {
        self.estimate_batch(source, self.batch_size())
    }

    fn batch_size(&self) -> usize {
        if self.config.fusion.enabled {
            self.config.fusion.batch_size
        } else {
            1
        }
    }

    fn estimate_batch<S>(&mut self, source: &S, batch_size: usize) -> Option<Estimate>
    where
        S: ObservationSource + ?Sized,
    {
        self.session.clear_readings();
        let labels = self.db.labels();
        let Some(batch) = fuse(&self.config, &labels, self.network.as_ref(), source, batch_size) else {
            self.session.discarded = batch_size;
            return None;
        };

        let faces: Vec<&FaceReading> = batch.readings.iter().map(|r| &r.observation.face).collect();
        let face_estimate = face_only_estimate(&self.config, &labels, &faces, self.num_recognitions);
        let decision = estimate(
            &self.config,
            &labels,
            batch.posterior.as_deref(),
            self.num_recognitions,
        );

        self.session.store(batch);
        self.session.face_estimate = Some(face_estimate);
        self.session.estimate = Some(decision.clone());
        Some(decision)
    }

    // ── Confirmation ───────────────────────────────────────────────────────

    /// Confirm the identity of the last estimate.
    ///
    /// `None` accepts the model's own estimate. An id without a confirmed
    /// sighting turns the session into a registration: the unknown state
    /// learns the readings if its update method is not `None`, the pending
    /// record is enrolled if the id is new to the roster, and the stored
    /// readings are re-evaluated on the grown network before learning.
    pub fn confirm_identity(&mut self, id: Option<&str>) -> IdentityResult<Confirmation> {
        self.confirm(id, None::<&[Option<Observation>]>)
    }

    /// As [`IdentityModel::confirm_identity`], re-reading `refreshed` instead
    /// of the stored readings when the session turns into a registration.
    pub fn confirm_identity_with<S>(&mut self, id: Option<&str>, refreshed: &S) -> IdentityResult<Confirmation>
    where
        S: ObservationSource + ?Sized,
    {
        self.confirm(id, Some(refreshed))
    }

    fn confirm<S>(&mut self, id: Option<&str>, refreshed: Option<&S>) -> IdentityResult<Confirmation>
    where
        S: ObservationSource + ?Sized,
    {
        let estimated = self
            .session
            .estimate
            .as_ref()
            .map(|e| e.identity.clone())
            .ok_or(IdentityError::NoPendingEstimate)?;
        let identity = id.map_or(estimated, str::to_owned);

        let registration = identity != UNKNOWN_ID && !self.db.is_already_registered(&identity);
        let needs_enrollment = !self.db.contains(&identity);
        if needs_enrollment && self.session.pending.as_ref().map(|r| r.id.as_str()) != Some(identity.as_str()) {
            return Err(IdentityError::UnknownIdentity(identity));
        }
        if !registration && !self.session.registering {
            log::debug!("identity {identity} is already registered");
        }

        let mut enrolled = false;
        if registration {
            if self.config.unknown_update_method != UpdateMethod::None {
                if let Some(net) = self.network.as_mut() {
                    OnlineLearner::new(&self.config).learn(
                        net,
                        &mut self.db,
                        0,
                        &self.session.evidences,
                        self.session.posterior.as_deref(),
                    )?;
                }
            }
            if needs_enrollment {
                if let Some(record) = self.session.pending.take() {
                    enrolled = self.add_identity(record);
                }
            }
            self.reevaluate(refreshed);
        }

        if let Some(net) = self.network.as_mut() {
            let index = self
                .db
                .index_of(&identity)
                .ok_or_else(|| IdentityError::UnknownIdentity(identity.clone()))?;
            OnlineLearner::new(&self.config).learn(
                net,
                &mut self.db,
                index,
                &self.session.evidences,
                self.session.posterior.as_deref(),
            )?;
        }
        self.num_recognitions += 1;

        let name = self
            .db
            .get(&identity)
            .map(|r| r.name.clone())
            .unwrap_or_default();
        self.session.estimate = None;
        Ok(Confirmation {
            identity,
            name,
            registration,
            enrolled,
        })
    }

    /// Recompute evidence and posterior after the roster changed.
    fn reevaluate<S>(&mut self, refreshed: Option<&S>)
    where
        S: ObservationSource + ?Sized,
    {
        let labels = self.db.labels();
        let batch_size = self.batch_size();
        let fresh = refreshed.and_then(|src| fuse(&self.config, &labels, self.network.as_ref(), src, batch_size));
        let batch = match fresh {
            Some(b) => Some(b),
            None => {
                if refreshed.is_some() {
                    log::warn!("refreshed readings all discarded, re-evaluating the stored ones");
                }
                let stored = self.session.stored_readings();
                fuse(&self.config, &labels, self.network.as_ref(), &stored, stored.len())
            }
        };
        if let Some(batch) = batch {
            self.session.store(batch);
        }
    }

    // ── Enrollment ─────────────────────────────────────────────────────────

    /// Register an identity outside of a recognition.
    ///
    /// Returns `false` and changes nothing if the id already exists. Readings
    /// of an estimate still awaiting confirmation are re-evaluated on the
    /// grown network, so the confirmation learns from vectors of the new
    /// cardinality.
    pub fn enroll_identity(&mut self, record: IdentityRecord) -> bool {
        if !self.add_identity(record) {
            return false;
        }
        if !self.session.observations.is_empty() {
            self.reevaluate(None::<&[Option<Observation>]>);
        }
        true
    }

    fn add_identity(&mut self, record: IdentityRecord) -> bool {
        if !self.db.add_identity(record, &self.config) {
            return false;
        }
        let n = self.db.len();
        if n < 2 {
            return true;
        }
        let grown = match self.network.as_mut() {
            Some(net) if n > 2 => {
                net.grow(&self.db, &self.config);
                true
            }
            _ => false,
        };
        if !grown {
            self.network = Some(RecogniserNetwork::build(&self.db, &self.config));
        }
        true
    }

    /// The id the next enrollment should use.
    pub fn next_identifier(&self) -> String {
        self.db.next_identifier()
    }

    // ── Replay ─────────────────────────────────────────────────────────────

    /// Rebuild a model by replaying recorded interactions on top of `roster`.
    pub fn replay(
        config: RecogniserConfig,
        roster: Vec<IdentityRecord>,
        history: &[RecordedInteraction],
    ) -> IdentityResult<(Self, ReplayStats)> {
        let mut model = Self::from_roster(config, roster)?;
        let mut stats = ReplayStats::default();
        for interaction in history {
            model.begin_session(interaction.enrollment.is_some(), interaction.enrollment.clone());
            let Some(est) = model.estimate_identity_from(interaction.readings.as_slice()) else {
                stats.discarded += 1;
                continue;
            };
            if est.identity == interaction.identity {
                stats.correct += 1;
            }
            let confirmation = model.confirm_identity(Some(&interaction.identity))?;
            stats.interactions += 1;
            if confirmation.registration {
                stats.registrations += 1;
            }
        }
        log::info!(
            "replayed {} interactions ({} discarded, {} registrations)",
            stats.interactions,
            stats.discarded,
            stats.registrations
        );
        Ok((model, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{Gender, GenderReading, InteractionTime, RangeReading};

    fn person(id: &str, age: u32) -> IdentityRecord {
        IdentityRecord::new(
            id,
            format!("person {id}"),
            Some(Gender::Female),
            age,
            165.0,
            vec![InteractionTime::parse("11:00:00", 2).expect("valid")],
        )
    }

    fn seen(id: &str, age: f64) -> Observation {
        Observation {
            face: FaceReading {
                accuracy: 1.0,
                candidates: vec![(id.to_string(), 0.9)],
            },
            gender: GenderReading {
                gender: Gender::Female,
                confidence: 0.8,
            },
            age: RangeReading {
                value: age,
                confidence: 0.7,
            },
            height: RangeReading {
                value: 165.0,
                confidence: 0.7,
            },
            time: InteractionTime::parse("11:00:00", 2).expect("valid"),
        }
    }

    #[test]
    fn test_first_registration_builds_network() {
        let mut model = IdentityModel::new(RecogniserConfig::default()).expect("valid config");
        model.begin_session(true, Some(person("1", 30)));
        let est = model.estimate_identity(Some(seen("1", 30.0))).expect("face present");
        assert_eq!(est.identity, UNKNOWN_ID);
        assert_eq!(est.quality, -1.0);

        let c = model.confirm_identity(Some("1")).expect("pending record");
        assert!(c.registration && c.enrolled);
        assert_eq!(c.name, "person 1");
        assert_eq!(model.num_identities(), 2);
        assert_eq!(model.network().map(|n| n.cardinality()), Some(2));
        assert_eq!(model.num_recognitions(), 1);
        assert!(model.database().is_already_registered("1"));
    }

    #[test]
    fn test_no_face_means_no_estimate() {
        let mut model = IdentityModel::new(RecogniserConfig::default()).expect("valid config");
        model.begin_session(false, None);
        assert!(model.estimate_identity(None).is_none());
        assert_eq!(model.session().discarded(), 1);
        assert_eq!(
            model.confirm_identity(Some("1")),
            Err(IdentityError::NoPendingEstimate)
        );
    }

    #[test]
    fn test_unknown_id_without_pending_record_fails() {
        let mut model = IdentityModel::new(RecogniserConfig::default()).expect("valid config");
        model.begin_session(true, None);
        model.estimate_identity(Some(seen("1", 30.0)));
        assert_eq!(
            model.confirm_identity(Some("7")),
            Err(IdentityError::UnknownIdentity("7".into()))
        );
        assert_eq!(model.num_recognitions(), 0);
    }

    #[test]
    fn test_enroll_duplicate_is_noop() {
        let mut model = IdentityModel::new(RecogniserConfig::default()).expect("valid config");
        assert!(model.enroll_identity(person("1", 30)));
        assert!(!model.enroll_identity(person("1", 40)));
        assert!(!model.enroll_identity(person(UNKNOWN_ID, 40)));
        assert_eq!(model.num_identities(), 2);
        assert_eq!(model.next_identifier(), "2");
    }

    #[test]
    fn test_recognises_after_warm_up() {
        let cfg = RecogniserConfig::default().with_num_recog_min(2);
        let mut model = IdentityModel::from_roster(cfg, vec![person("1", 25), person("2", 60)])
            .expect("valid roster");
        for _ in 0..2 {
            model.begin_session(false, None);
            model.estimate_identity(Some(seen("2", 60.0)));
            model.confirm_identity(Some("2")).expect("enrolled");
        }
        model.begin_session(false, None);
        let est = model.estimate_identity(Some(seen("2", 60.0))).expect("face present");
        assert_eq!(est.identity, "2", "est={est:?}");
        let c = model.confirm_identity(None).expect("accept estimate");
        assert_eq!(c.identity, "2");
        assert!(!c.registration);
        assert_eq!(model.database().get("2").map(|r| r.occurrences.sightings), Some(3));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let cfg = RecogniserConfig::default().with_prob_threshold(0.0);
        assert!(matches!(IdentityModel::new(cfg), Err(IdentityError::Config(_))));
    }
}
