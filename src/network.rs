/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! The star-topology network: an identity prior and one likelihood row per
//! identity.
//!
//! There is no graph object. The five arcs `I → {F, G, A, H, T}` are implied
//! by the row layout, and growth appends a row and one face column instead of
//! recreating nodes.
//!
//! # Inference
//!
//! With soft evidence `e_m` on each child,
//!
//! ```text
//! P(I = i | e) ∝ P(I = i) · Π_m Σ_x P(m = x | I = i) · e_m[x]
//! ```
//!
//! computed in the log domain, then exponentiated after subtracting the
//! largest term and sum-normalised.

use crate::config::{Modality, RecogniserConfig};
use crate::database::{IdentityDatabase, UNKNOWN_ID};
use crate::error::{IdentityError, IdentityResult};
use crate::evidence::Evidence;
use crate::likelihood::{grow_face_row, known_row, unknown_row, LikelihoodRow};
use crate::normalise::{normalise_sum, uniform};

/// Prior and likelihood rows, indexed like the identity database.
#[derive(Clone, Debug, PartialEq)]
pub struct RecogniserNetwork {
    prior: Vec<f64>,
    rows: Vec<LikelihoodRow>,
}

impl RecogniserNetwork {
    /// Build every row from scratch from the roster.
    ///
    /// Used for the first two identities and when no rows were persisted.
    pub fn build(db: &IdentityDatabase, cfg: &RecogniserConfig) -> Self {
        let n = db.len();
        let rows = db
            .records()
            .iter()
            .enumerate()
            .map(|(i, r)| {
                if r.is_unknown() {
                    unknown_row(cfg, n)
                } else {
                    known_row(cfg, r, i, n)
                }
            })
            .collect();
        let prior = cfg.prior_method.on_growth(cfg, &db.occurrences(), None);
        log::info!("built identity network with {n} identities");
        Self { prior, rows }
    }

    /// Wrap persisted parts after checking them against the roster.
    pub fn from_parts(
        prior: Vec<f64>,
        rows: Vec<LikelihoodRow>,
        db: &IdentityDatabase,
        cfg: &RecogniserConfig,
    ) -> IdentityResult<Self> {
        let n = db.len();
        if rows.len() != n || prior.len() != n {
            return Err(IdentityError::MalformedModel(format!(
                "roster has {n} identities but {} likelihood rows and {} prior entries",
                rows.len(),
                prior.len()
            )));
        }
        let prior_total: f64 = prior.iter().sum();
        if prior.iter().any(|p| !p.is_finite() || *p < 0.0) || (prior_total - 1.0).abs() > 1e-6 {
            return Err(IdentityError::MalformedModel(format!(
                "identity prior is not a distribution (sum {prior_total})"
            )));
        }
        for (record, row) in db.records().iter().zip(&rows) {
            row.check(n, cfg)
                .map_err(|e| IdentityError::MalformedModel(format!("identity {}: {e}", record.id)))?;
        }
        Ok(Self { prior, rows })
    }

    /// Append the last identity of `db`, which must be exactly one longer
    /// than the network.
    ///
    /// Existing gender, age, height and time vectors are left untouched.
    /// Existing face vectors gain one entry under [`crate::likelihood::FaceGrowth`].
    pub fn grow(&mut self, db: &IdentityDatabase, cfg: &RecogniserConfig) {
        let n = db.len();
        debug_assert_eq!(n, self.rows.len() + 1, "grow adds one identity at a time");
        let occurrences = db.occurrences();

        for (i, row) in self.rows.iter_mut().enumerate() {
            let is_unknown = db.record(i).map_or(i == 0, |r| r.is_unknown());
            row.face = grow_face_row(cfg, &row.face, i, occurrences[i], is_unknown, n);
        }
        if let Some(record) = db.record(n - 1) {
            self.rows.push(known_row(cfg, record, n - 1, n));
        }
        self.prior = cfg
            .prior_method
            .on_growth(cfg, &occurrences, Some(self.prior.as_slice()));
        log::info!(
            "grew identity network to {n} identities (added {})",
            db.record(n - 1).map_or(UNKNOWN_ID, |r| r.id.as_str())
        );
    }

    /// States of the identity node.
    pub fn cardinality(&self) -> usize {
        self.prior.len()
    }

    /// States of the face node.
    pub fn face_cardinality(&self) -> usize {
        self.rows.first().map_or(0, |r| r.face.len())
    }

    /// Identity prior.
    pub fn prior(&self) -> &[f64] {
        &self.prior
    }

    /// Replace the identity prior. Ignored if the length does not match.
    pub fn set_prior(&mut self, prior: Vec<f64>) {
        if prior.len() == self.prior.len() {
            self.prior = prior;
        }
    }

    /// All rows, unknown first.
    pub fn rows(&self) -> &[LikelihoodRow] {
        &self.rows
    }

    /// Row of identity `index`.
    pub fn row(&self, index: usize) -> Option<&LikelihoodRow> {
        self.rows.get(index)
    }

    /// Row of identity `index`, mutably.
    pub fn row_mut(&mut self, index: usize) -> Option<&mut LikelihoodRow> {
        self.rows.get_mut(index)
    }

    /// `P(I | evidence)`.
    pub fn posterior(&self, evidence: &Evidence) -> Vec<f64> {
        let logs: Vec<f64> = self
            .rows
            .iter()
            .zip(&self.prior)
            .map(|(row, &prior)| {
                Modality::ALL.iter().fold(prior.ln(), |acc, &m| {
                    acc + dot(row.get(m), evidence.get(m)).ln()
                })
            })
            .collect();

        let max = logs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return uniform(logs.len());
        }
        let weights: Vec<f64> = logs.iter().map(|l| (l - max).exp()).collect();
        normalise_sum(&weights)
    }

    /// `P(modality | evidence, I = index)`: the row and the evidence
    /// multiplied element-wise and renormalised.
    pub fn modality_posterior_given_identity(
        &self,
        index: usize,
        modality: Modality,
        evidence: &Evidence,
    ) -> Vec<f64> {
        let Some(row) = self.rows.get(index) else {
            return Vec::new();
        };
        let product: Vec<f64> = row
            .get(modality)
            .iter()
            .zip(evidence.get(modality))
            .map(|(p, e)| p * e)
            .collect();
        normalise_sum(&product)
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
