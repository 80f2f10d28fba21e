/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! In-memory identity roster.
//!
//! Index 0 always holds the synthetic unknown identity; enrolled people follow
//! in enrollment order. Identities are never removed, so an index handed out
//! once stays valid for the lifetime of the database and lines up with the
//! likelihood row of the same index.

use chrono::{Datelike, Local};
use hashbrown::HashMap;

use crate::config::RecogniserConfig;
use crate::error::{IdentityError, IdentityResult};
use crate::observation::{Gender, InteractionTime};

/// Identifier of the unknown identity.
pub const UNKNOWN_ID: &str = "0";

/// Display name of the unknown identity.
pub const UNKNOWN_NAME: &str = "unknown";

/// Age values above this are birth years.
const BIRTH_YEAR_CUTOFF: u32 = 1900;

// ─── Occurrences ────────────────────────────────────────────────────────────

/// Occurrence counters of one identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Occurrences {
    /// Confirmed recognitions of this identity.
    pub sightings: u32,
    /// Images contributed when the identity was enrolled.
    pub enrollment_images: u32,
    /// Observations that fed online learning for this identity.
    pub observations: u32,
}

impl Occurrences {
    /// Counters of a freshly enrolled identity.
    pub fn enrolled(images: u32) -> Self {
        Self {
            sightings: 0,
            enrollment_images: images,
            observations: 0,
        }
    }

    /// Record one confirmation backed by `observations` readings.
    pub fn record(&mut self, observations: u32) {
        self.sightings += 1;
        self.observations += observations;
    }
}

// ─── IdentityRecord ─────────────────────────────────────────────────────────

/// Ground truth for one identity.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IdentityRecord {
    /// Stable identifier, `"1"`, `"2"`, ... in enrollment order.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Gender, if known.
    pub gender: Option<Gender>,
    /// Age in years. Values above 1900 are read as a birth year on enrollment.
    pub age: u32,
    /// Height in cm.
    pub height: f64,
    /// Recorded interaction times.
    pub times: Vec<InteractionTime>,
    /// Occurrence counters.
    pub occurrences: Occurrences,
}

impl IdentityRecord {
    /// A record with a single enrollment image and no sightings.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        gender: Option<Gender>,
        age: u32,
        height: f64,
        times: Vec<InteractionTime>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            gender,
            age,
            height,
            times,
            occurrences: Occurrences::enrolled(1),
        }
    }

    /// The synthetic unknown identity.
    pub fn unknown() -> Self {
        Self {
            id: UNKNOWN_ID.to_owned(),
            name: UNKNOWN_NAME.to_owned(),
            gender: None,
            age: 35,
            height: 165.0,
            times: vec![InteractionTime::week_start()],
            occurrences: Occurrences::default(),
        }
    }

    /// Whether this is the unknown identity.
    pub fn is_unknown(&self) -> bool {
        self.id == UNKNOWN_ID
    }
}

/// Age in years from an enrollment input that may be a birth year.
pub fn age_from_input(value: u32, age_max: i32) -> u32 {
    if value <= BIRTH_YEAR_CUTOFF {
        return value;
    }
    let this_year = Local::now().year();
    let age = (this_year - value as i32).clamp(0, age_max.max(0));
    age as u32
}

// ─── IdentityDatabase ───────────────────────────────────────────────────────

/// Ordered roster with id lookup.
#[derive(Clone, Debug)]
pub struct IdentityDatabase {
    records: Vec<IdentityRecord>,
    index: HashMap<String, usize>,
}

impl Default for IdentityDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityDatabase {
    /// A database holding only the unknown identity.
    pub fn new() -> Self {
        let mut index = HashMap::new();
        index.insert(UNKNOWN_ID.to_owned(), 0);
        Self {
            records: vec![IdentityRecord::unknown()],
            index,
        }
    }

    /// Populate from persisted records of known identities.
    ///
    /// The unknown identity is inserted first and its counters are derived:
    /// the number of roster entries after the first with at least one
    /// sighting, and the enrollment images of those entries. Birth-year ages
    /// are converted.
    pub fn load(records: Vec<IdentityRecord>, cfg: &RecogniserConfig) -> IdentityResult<Self> {
        let mut db = Self::new();
        let mut unknown = Occurrences::default();
        for (i, mut record) in records.into_iter().enumerate() {
            if record.is_unknown() || db.index.contains_key(&record.id) {
                return Err(IdentityError::DuplicateIdentity(record.id));
            }
            if i > 0 && record.occurrences.sightings > 0 {
                unknown.sightings += 1;
                unknown.observations += record.occurrences.enrollment_images;
            }
            record.age = age_from_input(record.age, cfg.age_max);
            db.index.insert(record.id.clone(), db.records.len());
            db.records.push(record);
        }
        db.records[0].occurrences = unknown;
        Ok(db)
    }

    /// Append a newly enrolled identity.
    ///
    /// Returns `false`, leaving the database untouched, when the id is already
    /// present. Counters start at zero sightings with one enrollment image, or
    /// one per fused reading when fusion is enabled.
    pub fn add_identity(&mut self, mut record: IdentityRecord, cfg: &RecogniserConfig) -> bool {
        if self.index.contains_key(&record.id) {
            log::debug!("identity {} is already in the database", record.id);
            return false;
        }
        let images = if cfg.fusion.enabled {
            cfg.fusion.batch_size as u32
        } else {
            1
        };
        record.occurrences = Occurrences::enrolled(images);
        record.age = age_from_input(record.age, cfg.age_max);
        self.index.insert(record.id.clone(), self.records.len());
        self.records.push(record);
        true
    }

    /// Whether `id` exists and has at least one confirmed sighting.
    pub fn is_already_registered(&self, id: &str) -> bool {
        self.get(id).map_or(false, |r| r.occurrences.sightings > 0)
    }

    /// Whether `id` exists.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Position of `id`.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Record of `id`.
    pub fn get(&self, id: &str) -> Option<&IdentityRecord> {
        self.index_of(id).map(|i| &self.records[i])
    }

    /// Record at `index`.
    pub fn record(&self, index: usize) -> Option<&IdentityRecord> {
        self.records.get(index)
    }

    /// Counters at `index`, mutably.
    pub fn occurrences_mut(&mut self, index: usize) -> Option<&mut Occurrences> {
        self.records.get_mut(index).map(|r| &mut r.occurrences)
    }

    /// Counters of every identity in roster order.
    pub fn occurrences(&self) -> Vec<Occurrences> {
        self.records.iter().map(|r| r.occurrences).collect()
    }

    /// All records, unknown first.
    pub fn records(&self) -> &[IdentityRecord] {
        &self.records
    }

    /// Enrolled records, without the unknown identity.
    pub fn known_records(&self) -> &[IdentityRecord] {
        &self.records[1..]
    }

    /// Identity ids in roster order.
    pub fn labels(&self) -> Vec<String> {
        self.records.iter().map(|r| r.id.clone()).collect()
    }

    /// Number of identities including unknown.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always `false`: the unknown identity is always present.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The id the next enrollment would receive.
    pub fn next_identifier(&self) -> String {
        let mut n = self.records.len();
        while self.index.contains_key(&n.to_string()) {
            n += 1;
        }
        n.to_string()
    }

    /// Confirmed sightings summed over enrolled identities.
    pub fn total_recognitions(&self) -> u32 {
        self.known_records()
            .iter()
            .map(|r| r.occurrences.sightings)
            .sum()
    }
}
