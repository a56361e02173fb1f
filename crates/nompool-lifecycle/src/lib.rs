//! # nompool-lifecycle
//!
//! The stake lifecycle state machine and the message processor that drives
//! the whole pool.
//!
//! ```text
//! Idle --Stake--> StakeSent --StakeConfirmed--> Staked --RecoverStake--> Recovering
//!  ^                                                                        |
//!  +-------------------------- StakeReturned -------------------------------+
//! ```
//!
//! [`apply::apply`] is a pure function from `(PoolData, message)` to a new
//! `PoolData` plus effects. [`pool::Pool`] owns the data, commits successful
//! transitions, enforces fund conservation and talks to the counterparty.
//!
//! ## Modules
//!
//! - [`wire`]: Message body codec
//! - [`message`]: Inbound message envelope
//! - [`state`]: `PoolData` aggregate and operational settings
//! - [`effects`]: Transfers, counterparty requests, bookings
//! - [`apply`]: Pure transition function
//! - [`counterparty`]: Validator counterparty interface
//! - [`pool`]: Orchestrator

pub mod apply;
pub mod counterparty;
pub mod effects;
pub mod message;
pub mod pool;
pub mod state;
pub mod wire;

use nompool_governance::GovernanceError;
use nompool_ledger::LedgerError;
use nompool_types::config::ConfigError;
use nompool_types::state::PoolState;
use nompool_types::{Coins, ErrorKind, Timestamp};

use crate::counterparty::CounterpartyError;
use crate::wire::WireError;

/// Error types for message processing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Governance(#[from] GovernanceError),

    #[error("config rejected: {0}")]
    Config(#[from] ConfigError),

    #[error("unrecognized operation: {0}")]
    Wire(#[from] WireError),

    /// Operation not allowed in the current lifecycle state.
    #[error("{operation} not allowed in state {state}")]
    InvalidState {
        operation: &'static str,
        state: PoolState,
    },

    /// Recovery requested before the hold period elapsed.
    #[error("stake locked until {until}")]
    StakeLocked { until: Timestamp },

    /// Operator withdrawal with nothing accrued.
    #[error("no validator funds to withdraw")]
    NothingToWithdraw,

    #[error("{operation} not accepted from {sender}")]
    Unauthorized {
        operation: &'static str,
        sender: String,
    },

    /// Deposit does not cover the fee, or total deposit below the validator floor.
    #[error("insufficient stake: {amount} below minimum {minimum}")]
    InsufficientStake { amount: Coins, minimum: Coins },

    #[error("pool halted after conservation violation")]
    Halted,

    #[error("conservation violated: liabilities {liabilities} != assets {assets}")]
    ConservationViolated { liabilities: u128, assets: u128 },

    #[error("counterparty unavailable: {0}")]
    Counterparty(#[from] CounterpartyError),

    #[error("arithmetic overflow")]
    Overflow,
}

impl PoolError {
    /// Flat error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PoolError::Ledger(e) => e.kind(),
            PoolError::Governance(e) => e.kind(),
            PoolError::Config(_) => ErrorKind::ConfigRejected,
            PoolError::Wire(_) => ErrorKind::UnrecognizedOperation,
            PoolError::InvalidState { .. }
            | PoolError::StakeLocked { .. }
            | PoolError::NothingToWithdraw => ErrorKind::InvalidState,
            PoolError::Unauthorized { .. } => ErrorKind::Unauthorized,
            PoolError::InsufficientStake { .. } => ErrorKind::InsufficientStake,
            PoolError::Halted => ErrorKind::Halted,
            PoolError::ConservationViolated { .. } => ErrorKind::ConservationViolated,
            PoolError::Counterparty(_) => ErrorKind::CounterpartyUnavailable,
            PoolError::Overflow => ErrorKind::ArithmeticOverflow,
        }
    }
}

/// Convenience result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, PoolError>;

pub use apply::{apply, Transition};
pub use message::InboundMessage;
pub use pool::{Outcome, Pool};
pub use state::{PoolData, PoolSettings};
pub use wire::Operation;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            PoolError::from(LedgerError::NotLiquid(PoolState::Staked)).kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            PoolError::from(GovernanceError::NoCurrentProposal).kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            PoolError::from(WireError::UnknownTag(b'x')).kind(),
            ErrorKind::UnrecognizedOperation
        );
        assert_eq!(
            PoolError::StakeLocked { until: 5 }.kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            PoolError::from(CounterpartyError::Refused("x".into())).kind(),
            ErrorKind::CounterpartyUnavailable
        );
    }
}
