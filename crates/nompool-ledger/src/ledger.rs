//! Nominator balances.
//!
//! Each entry holds an active `deposit` (staked or stake-eligible) and a
//! `pending_deposit` accepted while stake was already committed for the
//! current round. Entries are created only by a deposit that clears the
//! nominator floor while capacity remains. They are removed by
//! [`NominatorLedger::debit_full`] on exit, or by
//! [`NominatorLedger::remove_empty`] once a loss has left nothing in them.

use std::collections::BTreeMap;

use nompool_types::config::PoolConfig;
use nompool_types::state::PoolState;
use nompool_types::{address_hex, Address, Coins};
use serde::{Deserialize, Serialize};

use crate::{LedgerError, Result};

/// One nominator's balances.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nominator {
    /// At-risk balance.
    pub deposit: Coins,
    /// Balance waiting for the next round boundary.
    pub pending_deposit: Coins,
}

impl Nominator {
    /// `deposit + pending_deposit`.
    pub fn balance(&self) -> Result<Coins> {
        self.deposit
            .checked_add(self.pending_deposit)
            .ok_or(LedgerError::Overflow)
    }
}

/// Which balance a deposit lands in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepositMode {
    /// Pool is liquid: credit `deposit` directly.
    Active,
    /// Stake already committed this round: credit `pending_deposit`.
    Pending,
}

impl DepositMode {
    /// Mode implied by the lifecycle state.
    pub fn for_state(state: PoolState) -> Self {
        if state.is_liquid() {
            DepositMode::Active
        } else {
            DepositMode::Pending
        }
    }
}

/// Address → nominator map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NominatorLedger {
    nominators: BTreeMap<Address, Nominator>,
}

impl NominatorLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit a deposit.
    ///
    /// Returns the nominator's balances after the credit.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InsufficientStake`] if a new address would hold less
    ///   than `min_nominator_stake`
    /// - [`LedgerError::PoolFull`] if a new address would exceed capacity
    /// - [`LedgerError::Overflow`] on arithmetic overflow
    pub fn deposit(
        &mut self,
        address: Address,
        amount: Coins,
        mode: DepositMode,
        config: &PoolConfig,
    ) -> Result<Nominator> {
        let mut entry = match self.nominators.get(&address) {
            Some(existing) => *existing,
            None => {
                if amount < config.min_nominator_stake {
                    return Err(LedgerError::InsufficientStake {
                        amount,
                        minimum: config.min_nominator_stake,
                    });
                }
                if self.nominators.len() >= config.max_nominators_count as usize {
                    return Err(LedgerError::PoolFull {
                        max: config.max_nominators_count,
                    });
                }
                Nominator::default()
            }
        };

        match mode {
            DepositMode::Active => {
                entry.deposit = entry
                    .deposit
                    .checked_add(amount)
                    .ok_or(LedgerError::Overflow)?;
            }
            DepositMode::Pending => {
                entry.pending_deposit = entry
                    .pending_deposit
                    .checked_add(amount)
                    .ok_or(LedgerError::Overflow)?;
            }
        }
        // Total balance must stay representable.
        entry.balance()?;

        self.nominators.insert(address, entry);

        tracing::debug!(
            nominator = %address_hex(&address),
            amount,
            ?mode,
            deposit = entry.deposit,
            pending = entry.pending_deposit,
            "ledger: deposit credited"
        );

        Ok(entry)
    }

    /// Add a reward to an existing nominator's `deposit`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotANominator`] if the address has no entry
    /// - [`LedgerError::Overflow`] on arithmetic overflow
    pub fn credit_reward(&mut self, address: &Address, amount: Coins) -> Result<()> {
        let entry = self
            .nominators
            .get_mut(address)
            .ok_or_else(|| LedgerError::NotANominator(address_hex(address)))?;
        let deposit = entry
            .deposit
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        deposit
            .checked_add(entry.pending_deposit)
            .ok_or(LedgerError::Overflow)?;
        entry.deposit = deposit;
        Ok(())
    }

    /// Take a loss share out of an existing nominator's `deposit`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotANominator`] if the address has no entry
    /// - [`LedgerError::Overflow`] if the loss exceeds the deposit
    pub fn debit_loss(&mut self, address: &Address, amount: Coins) -> Result<()> {
        let entry = self
            .nominators
            .get_mut(address)
            .ok_or_else(|| LedgerError::NotANominator(address_hex(address)))?;
        entry.deposit = entry
            .deposit
            .checked_sub(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// Remove a nominator and return its full balance.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotANominator`] if the address has no entry
    /// - [`LedgerError::Overflow`] if the balance does not fit in [`Coins`]
    pub fn debit_full(&mut self, address: &Address) -> Result<Coins> {
        let entry = self
            .nominators
            .get(address)
            .ok_or_else(|| LedgerError::NotANominator(address_hex(address)))?;
        let amount = entry.balance()?;
        self.nominators.remove(address);

        tracing::debug!(
            nominator = %address_hex(address),
            amount,
            "ledger: nominator removed"
        );

        Ok(amount)
    }

    /// Drop every entry whose balance is zero and return the removed
    /// addresses in ascending order.
    pub fn remove_empty(&mut self) -> Vec<Address> {
        let empty: Vec<Address> = self
            .nominators
            .iter()
            .filter(|(_, n)| n.deposit == 0 && n.pending_deposit == 0)
            .map(|(address, _)| *address)
            .collect();
        for address in &empty {
            self.nominators.remove(address);
            tracing::debug!(nominator = %address_hex(address), "ledger: empty entry removed");
        }
        empty
    }

    /// Move every `pending_deposit` into `deposit`.
    ///
    /// All-or-nothing: on overflow no entry is modified.
    pub fn promote_pending(&mut self) -> Result<()> {
        let mut promoted = Vec::new();
        for (address, entry) in &self.nominators {
            if entry.pending_deposit == 0 {
                continue;
            }
            let deposit = entry
                .deposit
                .checked_add(entry.pending_deposit)
                .ok_or(LedgerError::Overflow)?;
            promoted.push((*address, deposit));
        }

        let count = promoted.len();
        for (address, deposit) in promoted {
            if let Some(entry) = self.nominators.get_mut(&address) {
                entry.deposit = deposit;
                entry.pending_deposit = 0;
            }
        }

        if count > 0 {
            tracing::debug!(count, "ledger: pending deposits promoted");
        }
        Ok(())
    }

    /// Sum of all active deposits.
    pub fn total_deposit(&self) -> Result<Coins> {
        self.nominators.values().try_fold(0u64, |acc, n| {
            acc.checked_add(n.deposit).ok_or(LedgerError::Overflow)
        })
    }

    /// Sum of all pending deposits.
    pub fn total_pending(&self) -> Result<Coins> {
        self.nominators.values().try_fold(0u64, |acc, n| {
            acc.checked_add(n.pending_deposit)
                .ok_or(LedgerError::Overflow)
        })
    }

    /// Sum of all balances (`deposit + pending_deposit`).
    pub fn total_balance(&self) -> Result<Coins> {
        self.total_deposit()?
            .checked_add(self.total_pending()?)
            .ok_or(LedgerError::Overflow)
    }

    /// Look up a nominator.
    pub fn get(&self, address: &Address) -> Option<&Nominator> {
        self.nominators.get(address)
    }

    /// Whether the address has an entry.
    pub fn contains(&self, address: &Address) -> bool {
        self.nominators.contains_key(address)
    }

    /// Current `deposit` of an address, zero if absent.
    pub fn deposit_of(&self, address: &Address) -> Coins {
        self.nominators.get(address).map_or(0, |n| n.deposit)
    }

    /// Number of nominators.
    pub fn len(&self) -> usize {
        self.nominators.len()
    }

    /// Whether the ledger has no entries.
    pub fn is_empty(&self) -> bool {
        self.nominators.is_empty()
    }

    /// Iterate entries in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Nominator)> {
        self.nominators.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max: u16, min_nominator: Coins) -> PoolConfig {
        PoolConfig {
            validator_address: [0xEE; 32],
            validator_reward_share: 1_000,
            max_nominators_count: max,
            min_validator_stake: min_nominator * 10,
            min_nominator_stake: min_nominator,
        }
    }

    fn addr(n: u8) -> Address {
        [n; 32]
    }

    #[test]
    fn test_active_and_pending_deposits() {
        let cfg = config(10, 100);
        let mut ledger = NominatorLedger::new();
        ledger
            .deposit(addr(1), 150, DepositMode::Active, &cfg)
            .expect("first deposit");
        let entry = ledger
            .deposit(addr(1), 20, DepositMode::Pending, &cfg)
            .expect("pending top-up");
        assert_eq!(entry.deposit, 150);
        assert_eq!(entry.pending_deposit, 20);
        assert_eq!(ledger.total_deposit().expect("total"), 150);
        assert_eq!(ledger.total_balance().expect("total"), 170);
    }

    #[test]
    fn test_new_nominator_below_floor_creates_nothing() {
        let cfg = config(10, 100);
        let mut ledger = NominatorLedger::new();
        let err = ledger
            .deposit(addr(1), 99, DepositMode::Active, &cfg)
            .expect_err("below floor");
        assert_eq!(
            err,
            LedgerError::InsufficientStake {
                amount: 99,
                minimum: 100
            }
        );
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_existing_nominator_may_top_up_below_floor() {
        let cfg = config(10, 100);
        let mut ledger = NominatorLedger::new();
        ledger
            .deposit(addr(1), 100, DepositMode::Active, &cfg)
            .expect("first");
        ledger
            .deposit(addr(1), 1, DepositMode::Active, &cfg)
            .expect("small top-up");
        assert_eq!(ledger.deposit_of(&addr(1)), 101);
    }

    #[test]
    fn test_capacity_enforced() {
        let cfg = config(2, 10);
        let mut ledger = NominatorLedger::new();
        ledger.deposit(addr(1), 10, DepositMode::Active, &cfg).expect("1");
        ledger.deposit(addr(2), 10, DepositMode::Active, &cfg).expect("2");
        let err = ledger
            .deposit(addr(3), 10, DepositMode::Active, &cfg)
            .expect_err("full");
        assert_eq!(err, LedgerError::PoolFull { max: 2 });
        assert_eq!(ledger.len(), 2);
        assert!(!ledger.contains(&addr(3)));

        // Existing nominators can still add funds.
        ledger.deposit(addr(2), 5, DepositMode::Active, &cfg).expect("top-up");
    }

    #[test]
    fn test_overflow_detected() {
        let cfg = config(10, 1);
        let mut ledger = NominatorLedger::new();
        ledger
            .deposit(addr(1), Coins::MAX, DepositMode::Active, &cfg)
            .expect("max");
        let err = ledger
            .deposit(addr(1), 1, DepositMode::Pending, &cfg)
            .expect_err("balance overflow");
        assert_eq!(err, LedgerError::Overflow);
        assert_eq!(ledger.get(&addr(1)).expect("entry").pending_deposit, 0);
    }

    #[test]
    fn test_debit_full_removes_entry() {
        let cfg = config(10, 10);
        let mut ledger = NominatorLedger::new();
        ledger.deposit(addr(1), 40, DepositMode::Active, &cfg).expect("d");
        ledger.deposit(addr(1), 2, DepositMode::Pending, &cfg).expect("p");
        assert_eq!(ledger.debit_full(&addr(1)).expect("debit"), 42);
        assert!(ledger.is_empty());
        assert!(matches!(
            ledger.debit_full(&addr(1)),
            Err(LedgerError::NotANominator(_))
        ));
    }

    #[test]
    fn test_promote_pending() {
        let cfg = config(10, 10);
        let mut ledger = NominatorLedger::new();
        ledger.deposit(addr(1), 10, DepositMode::Pending, &cfg).expect("p1");
        ledger.deposit(addr(2), 30, DepositMode::Active, &cfg).expect("a2");
        ledger.deposit(addr(2), 5, DepositMode::Pending, &cfg).expect("p2");
        ledger.promote_pending().expect("promote");

        assert_eq!(ledger.get(&addr(1)).copied(), Some(Nominator { deposit: 10, pending_deposit: 0 }));
        assert_eq!(ledger.get(&addr(2)).copied(), Some(Nominator { deposit: 35, pending_deposit: 0 }));
        assert_eq!(ledger.total_pending().expect("pending"), 0);
    }

    #[test]
    fn test_reward_and_loss() {
        let cfg = config(10, 10);
        let mut ledger = NominatorLedger::new();
        ledger.deposit(addr(1), 10, DepositMode::Active, &cfg).expect("d");
        ledger.credit_reward(&addr(1), 5).expect("reward");
        assert_eq!(ledger.deposit_of(&addr(1)), 15);
        ledger.debit_loss(&addr(1), 15).expect("loss");
        assert_eq!(ledger.deposit_of(&addr(1)), 0);
        assert_eq!(ledger.debit_loss(&addr(1), 1), Err(LedgerError::Overflow));
        assert!(matches!(
            ledger.credit_reward(&addr(9), 1),
            Err(LedgerError::NotANominator(_))
        ));
    }

    #[test]
    fn test_remove_empty_frees_capacity() {
        let cfg = config(2, 10);
        let mut ledger = NominatorLedger::new();
        ledger.deposit(addr(1), 10, DepositMode::Active, &cfg).expect("1");
        ledger.deposit(addr(2), 10, DepositMode::Active, &cfg).expect("2");
        ledger.deposit(addr(3), 10, DepositMode::Active, &cfg).expect_err("full");

        ledger.debit_loss(&addr(1), 10).expect("wiped");
        ledger.debit_loss(&addr(2), 4).expect("partial");
        assert_eq!(ledger.remove_empty(), vec![addr(1)]);
        assert_eq!(ledger.len(), 1);
        assert!(ledger.remove_empty().is_empty());

        ledger.deposit(addr(3), 10, DepositMode::Active, &cfg).expect("seat freed");
    }

    #[test]
    fn test_remove_empty_keeps_pending_only_entries() {
        let cfg = config(10, 10);
        let mut ledger = NominatorLedger::new();
        ledger.deposit(addr(1), 10, DepositMode::Pending, &cfg).expect("pending");
        assert!(ledger.remove_empty().is_empty());
        assert!(ledger.contains(&addr(1)));
    }

    #[test]
    fn test_deposit_mode_for_state() {
        assert_eq!(DepositMode::for_state(PoolState::Idle), DepositMode::Active);
        assert_eq!(DepositMode::for_state(PoolState::StakeSent), DepositMode::Pending);
        assert_eq!(DepositMode::for_state(PoolState::Staked), DepositMode::Pending);
        assert_eq!(DepositMode::for_state(PoolState::Recovering), DepositMode::Pending);
    }
}
