/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! # mmibn-core
//!
//! Multi-modal incremental Bayesian network for open-world person
//! identification.
//!
//! A robot meets people one at a time. Each meeting yields a face
//! recogniser's similarity scores plus soft biometrics: estimated gender,
//! age and height, and the time of the interaction. None of these is
//! reliable alone. Fused in one Bayesian network they name the person, or
//! say "unknown" and let the robot enroll someone new.
//!
//! ---
//!
//! ## The network
//!
//! One identity node `I`, five children, no other arcs:
//!
//! ```text
//!                         I  (unknown, 1, 2, ..., N)
//!          ┌──────────┬───┴────┬──────────┬──────────┐
//!          F          G        A          H          T
//!        face      gender     age      height      time
//!      (N+1)         (2)    (age range) (height range) (week slots)
//! ```
//!
//! The face node grows with the roster. Every other node has a fixed state
//! count set by the configuration.
//!
//! ## The pipeline
//!
//! ```text
//! Observation → EvidenceBuilder → RecogniserNetwork::posterior → estimate
//!                     ↑                     ↑                        │
//!              RecogniserConfig       LikelihoodRow × N+1            ▼
//!                                           ↑               confirm_identity
//!                                    OnlineLearner  ←───────────────┘
//! ```
//!
//! ## Module overview
//!
//! | Module | Key types | What it does |
//! |--------|-----------|--------------|
//! | [`config`] | [`RecogniserConfig`], [`Modality`] | Every tunable, with validation |
//! | [`observation`] | [`Observation`], [`ObservationSource`] | One reading of the five modalities |
//! | [`database`] | [`IdentityDatabase`], [`IdentityRecord`] | Ordered roster with the unknown identity first |
//! | [`normalise`] | [`NormMethod`] | Sum, softmax, min-max and tanh normalisation |
//! | [`weighting`] | [`WeightMethod`], [`AccuracyMethod`] | Modality weights and recogniser accuracy |
//! | [`curve`] | [`curve::CurveSpec`] | Discretised normal curves over a range |
//! | [`likelihood`] | [`LikelihoodRow`] | Per-identity likelihood rows and their growth |
//! | [`prior`] | [`PriorMethod`] | Identity prior under growth and confirmation |
//! | [`evidence`] | [`Evidence`], [`EvidenceBuilder`] | Soft evidence from an observation |
//! | [`network`] | [`RecogniserNetwork`] | Prior, rows, inference and growth |
//! | [`estimator`] | [`Estimate`], [`FaceEstimate`] | Decision rule with cold-start and quality gates |
//! | [`learner`] | [`OnlineLearner`] | Online update of rows, prior and counters |
//! | [`fusion`] | [`fusion::FusedBatch`] | Parallel evaluation of a batch of readings |
//! | [`model`] | [`IdentityModel`] | The whole model behind one facade |
//! | `snapshot` | `ModelSnapshot` | Serialisable model state (requires `serde` feature) |
//! | `ffi` | | Python bindings (requires `python-ffi` feature) |
//!
//! ## Features
//!
//! - `serde`: serialisation for every persisted type and the `snapshot` module.
//! - `python-ffi`: PyO3 bindings, built with `maturin develop --features python-ffi`.
//!
//! ## License
//!
//! Business Source License 1.1. Free for evaluation and non-production use.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod curve;
pub mod database;
pub mod error;
pub mod estimator;
pub mod evidence;
pub mod fusion;
pub mod learner;
pub mod likelihood;
pub mod model;
pub mod network;
pub mod normalise;
pub mod observation;
pub mod prior;
pub mod weighting;

#[cfg(feature = "serde")]
pub mod snapshot;

#[cfg(feature = "python-ffi")]
pub mod ffi;

pub use config::{
    AccuracyMethod, FusionConfig, Modality, ModalityNorms, NormMethod, PriorMethod,
    RecogniserConfig, UpdateMethod, WeightMethod,
};
pub use database::{IdentityDatabase, IdentityRecord, Occurrences, UNKNOWN_ID};
pub use error::{IdentityError, IdentityResult};
pub use estimator::{Estimate, FaceEstimate};
pub use evidence::{Evidence, EvidenceBuilder};
pub use learner::OnlineLearner;
pub use likelihood::LikelihoodRow;
pub use model::{Confirmation, IdentityModel, RecordedInteraction, ReplayStats, Session};
pub use network::RecogniserNetwork;
pub use observation::{
    FaceReading, Gender, GenderReading, InteractionTime, Observation, ObservationSource,
    RangeReading,
};
