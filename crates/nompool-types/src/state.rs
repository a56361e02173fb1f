//! Stake lifecycle states.

use serde::{Deserialize, Serialize};

use crate::Coins;

/// Where the pooled stake currently is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    /// All funds liquid in the pool.
    #[default]
    Idle,
    /// Stake handed to the counterparty, activation not yet confirmed.
    StakeSent,
    /// Actively backing validation; locked until the hold period passes.
    Staked,
    /// Recovery requested, waiting for the counterparty to return funds.
    Recovering,
}

impl PoolState {
    /// Whether pool funds are liquid (withdrawals may settle, deposits are active).
    pub fn is_liquid(self) -> bool {
        matches!(self, PoolState::Idle)
    }

    /// Numeric state code as stored in the pool data layout.
    pub fn code(self) -> u8 {
        match self {
            PoolState::Idle => 0,
            PoolState::StakeSent => 1,
            PoolState::Staked => 2,
            PoolState::Recovering => 3,
        }
    }

    /// Stable name for logs and storage.
    pub fn as_str(self) -> &'static str {
        match self {
            PoolState::Idle => "idle",
            PoolState::StakeSent => "stake_sent",
            PoolState::Staked => "staked",
            PoolState::Recovering => "recovering",
        }
    }

    /// Parse a stable name.
    pub fn parse(name: &str) -> Option<Self> {
        let state = match name {
            "idle" => PoolState::Idle,
            "stake_sent" => PoolState::StakeSent,
            "staked" => PoolState::Staked,
            "recovering" => PoolState::Recovering,
            _ => return None,
        };
        Some(state)
    }
}

impl std::fmt::Display for PoolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate pool figures recorded after each committed message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub seqno: u64,
    pub state: PoolState,
    pub liquid_balance: Coins,
    pub stake_amount_sent: Coins,
    pub validator_amount: Coins,
    pub nominators_count: u16,
}
