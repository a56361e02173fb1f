//! Interface to the external validator counterparty.
//!
//! The pool hands stake over with [`Counterparty::send_stake`] and asks for it
//! back with [`Counterparty::request_recovery`]. The funds themselves come
//! back later as an inbound `StakeReturned` message.

use nompool_types::{Address, Coins, Timestamp};

/// Counterparty refused or could not be reached.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CounterpartyError {
    #[error("stake refused: {0}")]
    Refused(String),

    #[error("counterparty unreachable: {0}")]
    Unreachable(String),
}

/// Acknowledgement of a stake hand-over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StakeAck {
    pub amount: Coins,
    pub accepted_at: Timestamp,
}

/// External validator system.
pub trait Counterparty {
    /// Accept `amount` from `pool` for the next validation round.
    fn send_stake(
        &mut self,
        pool: Address,
        amount: Coins,
        now: Timestamp,
    ) -> Result<StakeAck, CounterpartyError>;

    /// Begin returning the pool's stake.
    fn request_recovery(&mut self, pool: Address, now: Timestamp) -> Result<(), CounterpartyError>;
}

/// Counterparty that acknowledges everything and records what it was asked.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordingCounterparty {
    pub stakes: Vec<(Address, Coins, Timestamp)>,
    pub recoveries: Vec<(Address, Timestamp)>,
    /// When set, every request is refused.
    pub refuse: bool,
}

impl Counterparty for RecordingCounterparty {
    fn send_stake(
        &mut self,
        pool: Address,
        amount: Coins,
        now: Timestamp,
    ) -> Result<StakeAck, CounterpartyError> {
        if self.refuse {
            return Err(CounterpartyError::Refused("counterparty offline".into()));
        }
        self.stakes.push((pool, amount, now));
        Ok(StakeAck {
            amount,
            accepted_at: now,
        })
    }

    fn request_recovery(&mut self, pool: Address, now: Timestamp) -> Result<(), CounterpartyError> {
        if self.refuse {
            return Err(CounterpartyError::Unreachable("counterparty offline".into()));
        }
        self.recoveries.push((pool, now));
        Ok(())
    }
}
