//! # nompool-ledger
//!
//! Per-address nominator accounting.
//!
//! ## Modules
//!
//! - [`ledger`]: Nominator balances with capacity and floor enforcement
//! - [`rewards`]: Exact pro-rata reward split and loss socialisation
//! - [`withdrawals`]: Withdrawal request set and settlement

pub mod ledger;
pub mod rewards;
pub mod withdrawals;

use nompool_types::state::PoolState;
use nompool_types::{Coins, ErrorKind};

/// Error types for ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// A new nominator's balance would sit below the floor.
    #[error("insufficient stake: {amount} below minimum {minimum}")]
    InsufficientStake {
        /// Resulting balance.
        amount: Coins,
        /// Configured `min_nominator_stake`.
        minimum: Coins,
    },

    /// Pool is at `max_nominators_count`.
    #[error("pool full: {max} nominators")]
    PoolFull {
        /// Configured capacity.
        max: u16,
    },

    /// Address has no ledger entry (or no balance).
    #[error("not a nominator: {0}")]
    NotANominator(String),

    /// Settlement attempted while funds are locked.
    #[error("funds not liquid in state {0:?}")]
    NotLiquid(PoolState),

    /// Reward share outside 0..=10000 bp.
    #[error("invalid reward share {0} bp")]
    InvalidRewardShare(u16),

    /// Arithmetic overflow or underflow on coin amounts.
    #[error("arithmetic overflow")]
    Overflow,
}

impl LedgerError {
    /// Flat error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InsufficientStake { .. } => ErrorKind::InsufficientStake,
            LedgerError::PoolFull { .. } => ErrorKind::PoolFull,
            LedgerError::NotANominator(_) => ErrorKind::NotANominator,
            LedgerError::NotLiquid(_) => ErrorKind::InvalidState,
            LedgerError::InvalidRewardShare(_) => ErrorKind::ConfigRejected,
            LedgerError::Overflow => ErrorKind::ArithmeticOverflow,
        }
    }
}

/// Convenience result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
