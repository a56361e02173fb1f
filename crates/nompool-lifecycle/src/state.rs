//! Pool aggregate root.

use nompool_governance::voting::GovernanceVoting;
pub use nompool_governance::voting::DEFAULT_PROPOSAL_TTL;
use nompool_ledger::ledger::NominatorLedger;
use nompool_ledger::withdrawals::WithdrawalQueue;
use nompool_types::config::PoolConfig;
use nompool_types::state::{PoolSnapshot, PoolState};
use nompool_types::{Address, Coins, Hash, Timestamp, NANO_PER_COIN};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::{PoolError, Result};

/// Default lock after the last validator-set change (36 hours).
pub const DEFAULT_STAKE_HELD_FOR: u64 = 36 * 3600;

/// Default processing fee withheld from each deposit.
pub const DEFAULT_DEPOSIT_FEE: Coins = NANO_PER_COIN;

/// Operational parameters fixed at deployment.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    /// The pool's own account, used on stake bookings.
    #[serde_as(as = "serde_with::hex::Hex")]
    pub pool_address: Address,
    /// The only sender accepted for counterparty confirmations.
    #[serde_as(as = "serde_with::hex::Hex")]
    pub elector_address: Address,
    /// Withheld from every deposit and credited to the operator.
    pub deposit_fee: Coins,
    /// Governance proposal expiry window in seconds.
    pub proposal_ttl: u64,
    /// Lock after the last validator-set change, in seconds.
    pub stake_held_for: u64,
}

impl PoolSettings {
    /// Settings with default timing and fee.
    pub fn new(pool_address: Address, elector_address: Address) -> Self {
        Self {
            pool_address,
            elector_address,
            deposit_fee: DEFAULT_DEPOSIT_FEE,
            proposal_ttl: DEFAULT_PROPOSAL_TTL,
            stake_held_for: DEFAULT_STAKE_HELD_FOR,
        }
    }
}

/// Everything the pool owns. Mutated only through [`crate::apply::apply`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolData {
    pub state: PoolState,
    /// Amount handed to the counterparty this round.
    pub stake_amount_sent: Coins,
    /// Operator's accrued balance (reward share, dust and deposit fees).
    pub validator_amount: Coins,
    /// Funds held by the pool itself.
    pub liquid_balance: Coins,
    pub config: PoolConfig,
    pub ledger: NominatorLedger,
    pub withdrawals: WithdrawalQueue,
    pub stake_at: Timestamp,
    pub saved_validator_set_hash: Option<Hash>,
    pub validator_set_changes_count: u32,
    pub validator_set_change_time: Timestamp,
    pub votings: GovernanceVoting,
    pub settings: PoolSettings,
    /// Number of committed messages.
    pub seqno: u64,
    /// Set after a conservation violation; every later message fails.
    pub halted: bool,
}

impl PoolData {
    /// Fresh idle pool.
    ///
    /// # Errors
    ///
    /// [`PoolError::Config`] if the genesis config fails validation.
    pub fn new(config: PoolConfig, settings: PoolSettings) -> Result<Self> {
        config.validate_static()?;
        Ok(Self {
            state: PoolState::Idle,
            stake_amount_sent: 0,
            validator_amount: 0,
            liquid_balance: 0,
            config,
            ledger: NominatorLedger::new(),
            withdrawals: WithdrawalQueue::new(),
            stake_at: 0,
            saved_validator_set_hash: None,
            validator_set_changes_count: 0,
            validator_set_change_time: 0,
            votings: GovernanceVoting::new(settings.proposal_ttl),
            settings,
            seqno: 0,
            halted: false,
        })
    }

    /// Number of ledger entries.
    pub fn nominators_count(&self) -> usize {
        self.ledger.len()
    }

    /// Lock duration after the last validator-set change.
    pub fn stake_held_for(&self) -> u64 {
        self.settings.stake_held_for
    }

    /// Earliest time stake recovery may be requested: the hold period after
    /// the last validator-set change.
    pub fn unlock_time(&self) -> Timestamp {
        self.validator_set_change_time
            .saturating_add(self.settings.stake_held_for)
    }

    /// Check `sum(balances) + validator_amount == liquid_balance + stake_amount_sent`.
    ///
    /// Sums are taken in 128-bit so an overflowing ledger reports a violation
    /// instead of wrapping.
    ///
    /// # Errors
    ///
    /// [`PoolError::ConservationViolated`] when the two sides differ.
    pub fn check_conservation(&self) -> Result<()> {
        let balances: u128 = self
            .ledger
            .iter()
            .map(|(_, n)| u128::from(n.deposit) + u128::from(n.pending_deposit))
            .sum();
        let liabilities = balances + u128::from(self.validator_amount);
        let assets = u128::from(self.liquid_balance) + u128::from(self.stake_amount_sent);
        if liabilities != assets {
            return Err(PoolError::ConservationViolated {
                liabilities,
                assets,
            });
        }
        Ok(())
    }

    /// Aggregate figures for the snapshot journal.
    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            seqno: self.seqno,
            state: self.state,
            liquid_balance: self.liquid_balance,
            stake_amount_sent: self.stake_amount_sent,
            validator_amount: self.validator_amount,
            nominators_count: u16::try_from(self.ledger.len()).unwrap_or(u16::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PoolConfig {
        PoolConfig {
            validator_address: [0xAA; 32],
            validator_reward_share: 1_000,
            max_nominators_count: 10,
            min_validator_stake: 100,
            min_nominator_stake: 10,
        }
    }

    #[test]
    fn test_new_pool_is_idle_and_balanced() {
        let data = PoolData::new(config(), PoolSettings::new([1; 32], [2; 32])).expect("pool");
        assert_eq!(data.state, PoolState::Idle);
        assert_eq!(data.nominators_count(), 0);
        assert_eq!(data.votings.ttl(), DEFAULT_PROPOSAL_TTL);
        data.check_conservation().expect("empty pool balances");
    }

    #[test]
    fn test_invalid_genesis_config_rejected() {
        let mut bad = config();
        bad.min_validator_stake = 1;
        let err = PoolData::new(bad, PoolSettings::new([1; 32], [2; 32])).expect_err("inverted floors");
        assert_eq!(err.kind(), nompool_types::ErrorKind::ConfigRejected);
    }

    #[test]
    fn test_conservation_detects_drift() {
        let mut data = PoolData::new(config(), PoolSettings::new([1; 32], [2; 32])).expect("pool");
        data.liquid_balance = 5;
        assert!(matches!(
            data.check_conservation(),
            Err(PoolError::ConservationViolated {
                liabilities: 0,
                assets: 5
            })
        ));
    }

    #[test]
    fn test_unlock_time_follows_last_validator_set_change() {
        let mut data = PoolData::new(config(), PoolSettings::new([1; 32], [2; 32])).expect("pool");
        data.settings.stake_held_for = 100;
        data.stake_at = 10;
        data.validator_set_change_time = 50;
        data.state = PoolState::Staked;
        assert_eq!(data.unlock_time(), 150);
        data.validator_set_change_time = 70;
        assert_eq!(data.unlock_time(), 170);
    }
}
