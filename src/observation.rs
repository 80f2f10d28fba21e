/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Raw multi-modal observations as delivered by the sensor layer.
//!
//! One [`Observation`] bundles a face reading, a gender estimate, age and
//! height estimates with their confidences, and the time of the interaction.
//! A missing observation (no face in the frame) is `None` at every call site.
//!
//! [`ObservationSource`] is the seam the fusion step reads through: each index
//! of a batch is read independently and may come back empty.

use chrono::{Datelike, Local, NaiveDateTime, NaiveTime, Timelike};

use crate::error::{IdentityError, IdentityResult};

// ─── Gender ─────────────────────────────────────────────────────────────────

/// Gender states, in node order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Gender {
    /// State 0.
    Female,
    /// State 1.
    Male,
}

impl Gender {
    /// Position of this gender in the gender node.
    pub fn index(self) -> usize {
        match self {
            Gender::Female => 0,
            Gender::Male => 1,
        }
    }

    /// Parse `"Female"` / `"Male"` (case-insensitive, `F`/`M` accepted).
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "female" | "f" => Some(Gender::Female),
            "male" | "m" => Some(Gender::Male),
            _ => None,
        }
    }
}

// ─── Readings ───────────────────────────────────────────────────────────────

/// Face recogniser output: detector accuracy and per-candidate similarity.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FaceReading {
    /// Accuracy the detector reports for this frame.
    pub accuracy: f64,
    /// `(identity id, similarity)` pairs. May omit identities and may or may
    /// not include the unknown id.
    pub candidates: Vec<(String, f64)>,
}

impl FaceReading {
    /// Similarity reported for `id`, if any.
    pub fn similarity(&self, id: &str) -> Option<f64> {
        self.candidates
            .iter()
            .find(|(cid, _)| cid == id)
            .map(|&(_, s)| s)
    }
}

/// Gender estimate with its confidence.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenderReading {
    /// Estimated gender.
    pub gender: Gender,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Scalar estimate (age in years, height in cm) with its confidence.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangeReading {
    /// Point estimate.
    pub value: f64,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

// ─── Interaction time ───────────────────────────────────────────────────────

/// Wall-clock time of an interaction plus ISO weekday (1 = Monday).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InteractionTime {
    /// Time of day.
    pub time: NaiveTime,
    /// ISO weekday, 1 = Monday through 7 = Sunday.
    pub weekday: u8,
}

impl InteractionTime {
    /// Parse an `HH:MM:SS` string with an ISO weekday.
    pub fn parse(time: &str, weekday: u8) -> IdentityResult<Self> {
        if !(1..=7).contains(&weekday) {
            return Err(IdentityError::InvalidTime(format!(
                "weekday must be 1..=7, got {weekday}"
            )));
        }
        let time = NaiveTime::parse_from_str(time.trim(), "%H:%M:%S")
            .map_err(|e| IdentityError::InvalidTime(format!("{time:?}: {e}")))?;
        Ok(Self { time, weekday })
    }

    /// Interaction time of a calendar timestamp.
    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        Self {
            time: dt.time(),
            weekday: dt.weekday().number_from_monday() as u8,
        }
    }

    /// The current local time.
    pub fn now() -> Self {
        Self::from_datetime(Local::now().naive_local())
    }

    /// Monday 00:00:00, the placeholder time of the unknown identity.
    pub fn week_start() -> Self {
        Self {
            time: NaiveTime::MIN,
            weekday: 1,
        }
    }

    /// Index of the `period`-minute slot of the week this time falls in.
    ///
    /// Each term is floored separately, so with a period that does not
    /// divide an hour, minutes past the hour land in the slot their own
    /// quotient names.
    pub fn time_slot(&self, period: u32) -> i32 {
        let period = period.max(1);
        let day = u32::from(self.weekday.saturating_sub(1));
        let slot = day * 24 * 60 / period + self.time.hour() * 60 / period + self.time.minute() / period;
        let last = 7 * 24 * 60 / period - 1;
        slot.min(last) as i32
    }
}

// ─── Observation ────────────────────────────────────────────────────────────

/// One complete multi-modal reading of a person.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Observation {
    /// Face similarity scores.
    pub face: FaceReading,
    /// Gender estimate.
    pub gender: GenderReading,
    /// Age estimate in years.
    pub age: RangeReading,
    /// Height estimate in cm.
    pub height: RangeReading,
    /// When the reading was taken.
    pub time: InteractionTime,
}

/// Something that can produce the `index`-th reading of a fusion batch.
///
/// Reads happen concurrently, one per batch index, so implementors must be
/// `Sync`. Returning `None` drops that reading from the batch.
pub trait ObservationSource: Sync {
    /// Read the `index`-th observation of the current batch.
    fn read(&self, index: usize) -> Option<Observation>;
}

impl ObservationSource for [Option<Observation>] {
    fn read(&self, index: usize) -> Option<Observation> {
        self.get(index).cloned().flatten()
    }
}

impl ObservationSource for Vec<Option<Observation>> {
    fn read(&self, index: usize) -> Option<Observation> {
        self.as_slice().read(index)
    }
}
