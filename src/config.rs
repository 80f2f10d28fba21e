/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Recogniser configuration and the closed set of policy enums.
//!
//! [`RecogniserConfig`] is an immutable record passed by reference into every
//! component. Two models built from two configs never share state, which is
//! what lets tests run several independently tuned recognisers side by side.
//!
//! The defaults are the tuned production values: hybrid normalisation, power
//! weighting, no online learning and an equal identity prior.

use crate::curve::stddev_from_confidence;
use crate::error::{IdentityError, IdentityResult};

/// Upper bound on the number of sub-observations fused into one decision.
pub const MAX_FUSION_BATCH: usize = 16;

/// Number of observation nodes hanging off the identity node.
pub const MODALITY_COUNT: usize = 5;

// ─── Modality ───────────────────────────────────────────────────────────────

/// One of the five observation nodes of the network.
///
/// The discriminant is the modality's position in every per-modality array
/// (weights, evidence vectors, likelihood rows).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Modality {
    /// Face similarity over the identity labels.
    Face = 0,
    /// Gender over `[Female, Male]`.
    Gender = 1,
    /// Age in years over `[age_min, age_max]`.
    Age = 2,
    /// Height in cm over `[height_min, height_max]`.
    Height = 3,
    /// Weekly time slot over `[0, num_time_slots - 1]`.
    Time = 4,
}

impl Modality {
    /// All modalities in node order.
    pub const ALL: [Modality; MODALITY_COUNT] = [
        Modality::Face,
        Modality::Gender,
        Modality::Age,
        Modality::Height,
        Modality::Time,
    ];

    /// Position of this modality in per-modality arrays.
    pub fn index(self) -> usize {
        self as usize
    }
}

// ─── Policy enums ───────────────────────────────────────────────────────────

/// Vector normalisation strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NormMethod {
    /// Divide by the sum.
    Sum,
    /// Exponentiate, then divide by the sum.
    Softmax,
    /// `(x - min) / (max - min)`.
    MinMax,
    /// `0.5 * (tanh(0.01 * z) + 1)` on the z-score.
    Tanh,
}

/// Per-modality normalisation assignment used when building evidence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModalityNorms {
    methods: [NormMethod; MODALITY_COUNT],
}

impl ModalityNorms {
    /// The tuned hybrid assignment: sum for face, gender and height, tanh for
    /// age, softmax for time.
    pub fn hybrid() -> Self {
        Self {
            methods: [
                NormMethod::Sum,
                NormMethod::Sum,
                NormMethod::Tanh,
                NormMethod::Sum,
                NormMethod::Softmax,
            ],
        }
    }

    /// The same method for every modality.
    pub fn uniform(method: NormMethod) -> Self {
        Self {
            methods: [method; MODALITY_COUNT],
        }
    }

    /// Override the method of one modality.
    pub fn with(mut self, modality: Modality, method: NormMethod) -> Self {
        self.methods[modality.index()] = method;
        self
    }

    /// Method assigned to `modality`.
    pub fn get(&self, modality: Modality) -> NormMethod {
        self.methods[modality.index()]
    }
}

impl Default for ModalityNorms {
    fn default() -> Self {
        Self::hybrid()
    }
}

/// How a learned modality weight is folded into a probability value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WeightMethod {
    /// `value^weight`.
    Pow,
    /// `value^(1/weight)`.
    InvPow,
    /// `value * weight`.
    Mult,
}

/// How a sensor-reported face accuracy is folded into a similarity score.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AccuracyMethod {
    /// Leave the value untouched.
    None,
    /// `value^accuracy`.
    Pow,
    /// `value^(1/accuracy)`.
    InvPow,
    /// `value * accuracy`.
    Mult,
}

/// Online-learning rule applied after a confirmed identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UpdateMethod {
    /// Count occurrences only; likelihood rows stay fixed.
    None,
    /// Add the raw evidence to the occurrence-scaled row.
    Sum,
    /// Average a batch of evidence before merging it into the row.
    Avg,
    /// Add the modality posterior given all evidence and the confirmed identity.
    Evidence,
}

/// Policy for the identity node's prior.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PriorMethod {
    /// `1/n` for every identity.
    Equal,
    /// The previous posterior becomes the prior.
    Sequential,
    /// Proportional to confirmed sightings.
    Occurrences,
}

/// Multi-observation fusion settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FusionConfig {
    /// Fuse several readings into one decision.
    pub enabled: bool,
    /// Readings requested per decision, at most [`MAX_FUSION_BATCH`].
    pub batch_size: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            batch_size: 3,
        }
    }
}

// ─── RecogniserConfig ───────────────────────────────────────────────────────

/// Every tunable that changes the behaviour of the identity model.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecogniserConfig {
    /// Modality weights in [`Modality`] order.
    pub weights: [f64; MODALITY_COUNT],
    /// Similarity given to the unknown face entry when the sensor omits it,
    /// and the acceptance threshold of the face-only estimate.
    pub face_recog_threshold: f64,
    /// Floor applied to every probability so nothing reaches exact zero.
    pub prob_threshold: f64,
    /// Confidences above this are clamped to it.
    pub max_threshold: f64,
    /// Quality below this gates the estimate to unknown.
    pub quality_threshold: f64,
    /// Replaces the identity count in the quality formula when set.
    pub quality_coefficient: Option<f64>,
    /// `P(F=i | I=i)` used when a face row is initialised.
    pub face_recognition_rate: f64,
    /// `P(G=g | I=i)` for the identity's true gender.
    pub gender_recognition_rate: f64,
    /// Smallest age state.
    pub age_min: i32,
    /// Largest age state.
    pub age_max: i32,
    /// Spread of the age likelihood curve at enrollment.
    pub stddev_age: f64,
    /// Smallest height state (cm).
    pub height_min: i32,
    /// Largest height state (cm).
    pub height_max: i32,
    /// Spread of height curves.
    pub stddev_height: f64,
    /// Width of one time slot in minutes.
    pub period: u32,
    /// Spread of time curves, in slots.
    pub stddev_time: f64,
    /// Normalisation applied to each modality's evidence.
    pub evidence_norms: ModalityNorms,
    /// Weight transform.
    pub weight_method: WeightMethod,
    /// Face accuracy transform.
    pub accuracy_method: AccuracyMethod,
    /// Online-learning rule for known identities.
    pub update_method: UpdateMethod,
    /// Online-learning rule for the unknown identity.
    pub unknown_update_method: UpdateMethod,
    /// Restrict online learning to these modalities; `None` learns all five.
    pub update_modalities: Option<Vec<Modality>>,
    /// Reset every face row to the canonical shape on growth.
    pub update_face_likelihoods_equally: bool,
    /// Identity prior policy.
    pub prior_method: PriorMethod,
    /// Confirmed recognitions required before the model may name anyone.
    pub num_recog_min: u32,
    /// Multi-observation fusion.
    pub fusion: FusionConfig,
}

impl Default for RecogniserConfig {
    fn default() -> Self {
        let max_threshold = 0.99;
        let period = 30;
        Self {
            weights: [1.0, 0.044, 0.538, 0.136, 0.906],
            face_recog_threshold: 0.4,
            prob_threshold: 1.0e-75,
            max_threshold,
            quality_threshold: 0.037,
            quality_coefficient: None,
            face_recognition_rate: 0.9,
            gender_recognition_rate: max_threshold,
            age_min: 0,
            age_max: 75,
            stddev_age: stddev_from_confidence(max_threshold),
            height_min: 50,
            height_max: 240,
            stddev_height: 6.3,
            period,
            stddev_time: 60.0 / period as f64,
            evidence_norms: ModalityNorms::hybrid(),
            weight_method: WeightMethod::Pow,
            accuracy_method: AccuracyMethod::None,
            update_method: UpdateMethod::None,
            unknown_update_method: UpdateMethod::None,
            update_modalities: None,
            update_face_likelihoods_equally: false,
            prior_method: PriorMethod::Equal,
            num_recog_min: 5,
            fusion: FusionConfig::default(),
        }
    }
}

impl RecogniserConfig {
    /// Construct the default tuned configuration.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Derived values ─────────────────────────────────────────────────────

    /// Confidences below this produce a uniform curve.
    pub fn conf_threshold(&self) -> f64 {
        1.0 - self.max_threshold
    }

    /// Weight of `modality`.
    pub fn weight(&self, modality: Modality) -> f64 {
        self.weights[modality.index()]
    }

    /// First time slot.
    pub fn time_min(&self) -> i32 {
        0
    }

    /// Last time slot of the week.
    pub fn time_max(&self) -> i32 {
        (7 * 24 * 60 / self.period) as i32 - 1
    }

    /// Number of states of `modality` when it is not the face node.
    ///
    /// Returns `None` for [`Modality::Face`], whose cardinality is the
    /// identity count.
    pub fn state_count(&self, modality: Modality) -> Option<usize> {
        match modality {
            Modality::Face => None,
            Modality::Gender => Some(2),
            Modality::Age => Some((self.age_max - self.age_min + 1) as usize),
            Modality::Height => Some((self.height_max - self.height_min + 1) as usize),
            Modality::Time => Some((self.time_max() - self.time_min() + 1) as usize),
        }
    }

    /// Whether online learning touches `modality` for a known identity.
    pub fn learns(&self, modality: Modality) -> bool {
        self.update_modalities
            .as_ref()
            .map_or(true, |scope| scope.contains(&modality))
    }

    // ── Builders ───────────────────────────────────────────────────────────

    /// Replace all five weights.
    pub fn with_weights(mut self, weights: [f64; MODALITY_COUNT]) -> Self {
        self.weights = weights;
        self
    }

    /// Replace one modality's weight.
    pub fn with_weight(mut self, modality: Modality, weight: f64) -> Self {
        self.weights[modality.index()] = weight;
        self
    }

    /// Set the online-learning rule. The unknown state follows `method`
    /// unless `unknown` is given.
    pub fn with_update_method(mut self, method: UpdateMethod, unknown: Option<UpdateMethod>) -> Self {
        self.update_method = method;
        self.unknown_update_method = unknown.unwrap_or(method);
        self
    }

    /// Restrict online learning to a subset of modalities.
    pub fn with_update_modalities(mut self, modalities: Option<Vec<Modality>>) -> Self {
        self.update_modalities = modalities;
        self
    }

    /// Reset every face row to the canonical shape whenever the network grows.
    pub fn with_face_likelihoods_equally(mut self, equally: bool) -> Self {
        self.update_face_likelihoods_equally = equally;
        self
    }

    /// Set the evidence normalisation assignment.
    pub fn with_evidence_norms(mut self, norms: ModalityNorms) -> Self {
        self.evidence_norms = norms;
        self
    }

    /// Set the weight transform.
    pub fn with_weight_method(mut self, method: WeightMethod) -> Self {
        self.weight_method = method;
        self
    }

    /// Set the face accuracy transform.
    pub fn with_accuracy_method(mut self, method: AccuracyMethod) -> Self {
        self.accuracy_method = method;
        self
    }

    /// Set the identity prior policy.
    pub fn with_prior_method(mut self, method: PriorMethod) -> Self {
        self.prior_method = method;
        self
    }

    /// Set the quality gate threshold.
    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = threshold;
        self
    }

    /// Override the identity count in the quality formula.
    pub fn with_quality_coefficient(mut self, coefficient: Option<f64>) -> Self {
        self.quality_coefficient = coefficient;
        self
    }

    /// Set the cold-start recognition count.
    pub fn with_num_recog_min(mut self, count: u32) -> Self {
        self.num_recog_min = count;
        self
    }

    /// Set the face recognition rate used for face row initialisation.
    pub fn with_face_recognition_rate(mut self, rate: f64) -> Self {
        self.face_recognition_rate = rate;
        self
    }

    /// Set the gender recognition rate used for gender row initialisation.
    pub fn with_gender_recognition_rate(mut self, rate: f64) -> Self {
        self.gender_recognition_rate = rate;
        self
    }

    /// Set the face recognition threshold.
    pub fn with_face_recog_threshold(mut self, threshold: f64) -> Self {
        self.face_recog_threshold = threshold;
        self
    }

    /// Set the probability floor.
    pub fn with_prob_threshold(mut self, threshold: f64) -> Self {
        self.prob_threshold = threshold;
        self
    }

    /// Set the confidence clamp.
    pub fn with_max_threshold(mut self, threshold: f64) -> Self {
        self.max_threshold = threshold;
        self
    }

    /// Enable or disable multi-observation fusion.
    pub fn with_fusion(mut self, enabled: bool, batch_size: usize) -> Self {
        self.fusion = FusionConfig {
            enabled,
            batch_size,
        };
        self
    }

    // ── Validation ─────────────────────────────────────────────────────────

    /// Check every value against its valid range.
    pub fn validate(&self) -> IdentityResult<()> {
        fn unit_open(name: &str, value: f64) -> IdentityResult<()> {
            if value > 0.0 && value < 1.0 {
                Ok(())
            } else {
                Err(IdentityError::Config(format!(
                    "{name} must be in (0, 1), got {value}"
                )))
            }
        }

        unit_open("prob_threshold", self.prob_threshold)?;
        unit_open("max_threshold", self.max_threshold)?;
        unit_open("face_recognition_rate", self.face_recognition_rate)?;
        unit_open("gender_recognition_rate", self.gender_recognition_rate)?;

        for (modality, &w) in Modality::ALL.iter().zip(self.weights.iter()) {
            if !w.is_finite() || w < 0.0 {
                return Err(IdentityError::Config(format!(
                    "weight of {modality:?} must be finite and >= 0, got {w}"
                )));
            }
            if self.weight_method == WeightMethod::InvPow && w == 0.0 {
                return Err(IdentityError::Config(format!(
                    "weight of {modality:?} must be > 0 with inverse-power weighting"
                )));
            }
        }
        if self.age_min >= self.age_max {
            return Err(IdentityError::Config(format!(
                "age range is empty: [{}, {}]",
                self.age_min, self.age_max
            )));
        }
        if self.height_min >= self.height_max {
            return Err(IdentityError::Config(format!(
                "height range is empty: [{}, {}]",
                self.height_min, self.height_max
            )));
        }
        if self.period == 0 || self.period > 24 * 60 {
            return Err(IdentityError::Config(format!(
                "period must be in [1, 1440] minutes, got {}",
                self.period
            )));
        }
        for (name, s) in [
            ("stddev_age", self.stddev_age),
            ("stddev_height", self.stddev_height),
            ("stddev_time", self.stddev_time),
        ] {
            if !(s.is_finite() && s > 0.0) {
                return Err(IdentityError::Config(format!(
                    "{name} must be finite and > 0, got {s}"
                )));
            }
        }
        if let Some(c) = self.quality_coefficient {
            if !c.is_finite() {
                return Err(IdentityError::Config(format!(
                    "quality_coefficient must be finite, got {c}"
                )));
            }
        }
        if matches!(&self.update_modalities, Some(scope) if scope.is_empty()) {
            return Err(IdentityError::Config(
                "update_modalities must name at least one modality".into(),
            ));
        }
        if self.fusion.batch_size == 0 || self.fusion.batch_size > MAX_FUSION_BATCH {
            return Err(IdentityError::Config(format!(
                "fusion batch_size must be in [1, {MAX_FUSION_BATCH}], got {}",
                self.fusion.batch_size
            )));
        }
        Ok(())
    }
}
