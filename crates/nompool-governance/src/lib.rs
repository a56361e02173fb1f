//! # nompool-governance
//!
//! Stake-weighted voting on replacement pool configurations.
//!
//! A proposal is identified by the content hash of its candidate
//! [`PoolConfig`](nompool_types::config::PoolConfig). Nominators vote for or
//! against it; each vote weighs the voter's current active deposit at the
//! time of resolution. A strict majority of the total active stake accepts.
//!
//! ## Modules
//!
//! - [`voting`]: Vote book, tally and resolution

pub mod voting;

use nompool_types::config::ConfigError;
use nompool_types::ErrorKind;

/// Error types for governance operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GovernanceError {
    /// Voter is not a nominator.
    #[error("unauthorized voter: {0}")]
    Unauthorized(String),

    /// Candidate config fails validation.
    #[error("config rejected: {0}")]
    ConfigRejected(#[from] ConfigError),

    /// A wire vote arrived while no proposal is open.
    #[error("no open proposal to vote on")]
    NoCurrentProposal,

    /// Proposal id not in the vote book.
    #[error("unknown proposal: {0}")]
    UnknownProposal(String),

    /// Arithmetic overflow in weight tally.
    #[error("arithmetic overflow in tally")]
    Overflow,
}

impl GovernanceError {
    /// Flat error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GovernanceError::Unauthorized(_) => ErrorKind::Unauthorized,
            GovernanceError::ConfigRejected(_) => ErrorKind::ConfigRejected,
            GovernanceError::NoCurrentProposal => ErrorKind::InvalidState,
            GovernanceError::UnknownProposal(_) => ErrorKind::InvalidState,
            GovernanceError::Overflow => ErrorKind::ArithmeticOverflow,
        }
    }
}

/// Convenience result type for governance operations.
pub type Result<T> = std::result::Result<T, GovernanceError>;
