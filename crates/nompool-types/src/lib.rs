//! # nompool-types
//!
//! Shared domain types for the nominator pool workspace: coin and address
//! aliases, the governance-controlled [`config::PoolConfig`], the lifecycle
//! [`state::PoolState`], booking records and the flat error taxonomy every
//! crate reports through.

pub mod booking;
pub mod config;
pub mod hashing;
pub mod state;

use serde::{Deserialize, Serialize};

/// Nano-unit coin amount. All arithmetic on it must be checked.
pub type Coins = u64;

/// 32-byte account identifier (address hash).
pub type Address = [u8; 32];

/// 32-byte content hash.
pub type Hash = [u8; 32];

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Nano-units per whole coin.
pub const NANO_PER_COIN: Coins = 1_000_000_000;

/// Basis-point denominator for reward shares (100%).
pub const BASIS_POINTS: u16 = 10_000;

/// Checked coin addition.
pub fn coins_add(a: Coins, b: Coins) -> Option<Coins> {
    a.checked_add(b)
}

/// Checked coin subtraction.
pub fn coins_sub(a: Coins, b: Coins) -> Option<Coins> {
    a.checked_sub(b)
}

/// Render an address as lowercase hex.
pub fn address_hex(address: &Address) -> String {
    hex::encode(address)
}

/// Flat classification of every failure a message can produce.
///
/// Library errors map onto these kinds so that callers (and the reporting
/// layer) see one stable taxonomy regardless of which component failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InsufficientStake,
    PoolFull,
    NotANominator,
    InvalidState,
    Unauthorized,
    ConfigRejected,
    UnrecognizedOperation,
    ArithmeticOverflow,
    NegativeReward,
    /// Ledger totals no longer match tracked funds. Halts the pool.
    ConservationViolated,
    /// The pool refuses all mutation after a conservation violation.
    Halted,
    /// The validator counterparty refused a stake or recovery request.
    CounterpartyUnavailable,
}

impl ErrorKind {
    /// Stable snake_case code for logs and outcome records.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::InsufficientStake => "insufficient_stake",
            ErrorKind::PoolFull => "pool_full",
            ErrorKind::NotANominator => "not_a_nominator",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::ConfigRejected => "config_rejected",
            ErrorKind::UnrecognizedOperation => "unrecognized_operation",
            ErrorKind::ArithmeticOverflow => "arithmetic_overflow",
            ErrorKind::NegativeReward => "negative_reward",
            ErrorKind::ConservationViolated => "conservation_violated",
            ErrorKind::Halted => "halted",
            ErrorKind::CounterpartyUnavailable => "counterparty_unavailable",
        }
    }
}
