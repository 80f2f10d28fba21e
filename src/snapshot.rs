/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Portable snapshot of an [`IdentityModel`] for persistence.
//!
//! # Layout
//!
//! ```text
//! version            u16, always MODEL_SNAPSHOT_VERSION when written
//! created_at         Unix seconds at snapshot time
//! num_recognitions   confirmed recognitions so far
//! roster             enrolled identities, enrollment order, unknown excluded
//! prior              identity prior, unknown first (empty without a network)
//! likelihoods        one row per identity, unknown first (empty without a network)
//! ```
//!
//! The unknown identity is never stored: its counters are derived from the
//! roster on restore. The configuration is not stored either; the caller
//! restores under the configuration it runs with and the rows are checked
//! against it.
//!
//! # Example
//!
//! ```rust,ignore
//! use mmibn_core::snapshot::ModelSnapshot;
//!
//! let snapshot = ModelSnapshot::from_model(&model);
//! let json = serde_json::to_string(&snapshot).unwrap();
//! let restored: ModelSnapshot = serde_json::from_str(&json).unwrap();
//! let model = restored.restore(config)?;
//! ```

use crate::config::RecogniserConfig;
use crate::database::IdentityRecord;
use crate::error::{IdentityError, IdentityResult};
use crate::likelihood::LikelihoodRow;
use crate::model::IdentityModel;

/// Current snapshot format version.
pub const MODEL_SNAPSHOT_VERSION: u16 = 1;

/// Serialisable state of an identity model.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct ModelSnapshot {
    /// Format version.
    pub version: u16,
    /// Unix timestamp (seconds) the snapshot was taken.
    pub created_at: i64,
    /// Confirmed recognitions so far.
    pub num_recognitions: u32,
    /// Enrolled identities without the unknown identity.
    pub roster: Vec<IdentityRecord>,
    /// Identity prior, unknown first.
    pub prior: Vec<f64>,
    /// Likelihood rows, unknown first.
    pub likelihoods: Vec<LikelihoodRow>,
}

impl ModelSnapshot {
    /// Capture `model`.
    pub fn from_model(model: &IdentityModel) -> Self {
        let (prior, likelihoods) = model
            .network()
            .map(|net| (net.prior().to_vec(), net.rows().to_vec()))
            .unwrap_or_default();
        Self {
            version: MODEL_SNAPSHOT_VERSION,
            created_at: chrono::Utc::now().timestamp(),
            num_recognitions: model.num_recognitions(),
            roster: model.database().known_records().to_vec(),
            prior,
            likelihoods,
        }
    }

    /// Enrolled identities in the snapshot.
    pub fn identity_count(&self) -> usize {
        self.roster.len()
    }

    /// Look up an enrolled identity by id.
    pub fn find_identity(&self, id: &str) -> Option<&IdentityRecord> {
        self.roster.iter().find(|r| r.id == id)
    }

    /// Rebuild the model under `config`.
    ///
    /// A snapshot taken before the network existed restores the roster
    /// alone. Otherwise the stored prior and rows are checked against the
    /// roster and used as they are.
    pub fn restore(self, config: RecogniserConfig) -> IdentityResult<IdentityModel> {
        if self.version != MODEL_SNAPSHOT_VERSION {
            return Err(IdentityError::MalformedModel(format!(
                "snapshot version {} is not {MODEL_SNAPSHOT_VERSION}",
                self.version
            )));
        }
        if self.likelihoods.is_empty() && !self.roster.is_empty() {
            log::info!("snapshot has no likelihood rows, rebuilding from roster");
            let mut model = IdentityModel::from_roster(config, self.roster)?;
            model.set_num_recognitions(self.num_recognitions);
            return Ok(model);
        }
        IdentityModel::from_parts(
            config,
            self.roster,
            self.prior,
            self.likelihoods,
            self.num_recognitions,
        )
    }
}
