/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Error type for the identity model.
//!
//! Only genuinely exceptional conditions are errors. A missing observation,
//! a duplicate enrollment or an all-zero vector handed to a normaliser are
//! ordinary outcomes and are handled without an `Err`.

use thiserror::Error;

/// Errors raised while configuring, loading or driving an identity model.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IdentityError {
    /// A configuration value is out of its valid range.
    #[error("config error: {0}")]
    Config(String),

    /// Persisted roster and likelihood tables disagree in shape, or a stored
    /// vector is not a probability distribution.
    #[error("malformed model: {0}")]
    MalformedModel(String),

    /// The same identifier appears twice in a persisted roster.
    #[error("duplicate identity in roster: {0}")]
    DuplicateIdentity(String),

    /// A confirmation names an identity that is neither enrolled nor pending
    /// enrollment in the current session.
    #[error("unknown identity: {0}")]
    UnknownIdentity(String),

    /// `confirm_identity` was called without an estimate that produced evidence.
    #[error("no pending estimate to confirm")]
    NoPendingEstimate,

    /// An interaction timestamp could not be parsed.
    #[error("invalid interaction time: {0}")]
    InvalidTime(String),
}

/// Result alias used throughout the crate.
pub type IdentityResult<T> = Result<T, IdentityError>;
