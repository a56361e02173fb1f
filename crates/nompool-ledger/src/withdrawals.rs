//! Withdrawal requests.
//!
//! A request marks an address for full exit. Settlement debits the whole
//! balance and is only possible while the pool is liquid; while stake is
//! locked with the counterparty the request simply waits in the set.

use std::collections::BTreeSet;

use nompool_types::state::PoolState;
use nompool_types::{address_hex, Address, Coins};

use crate::ledger::NominatorLedger;
use crate::{LedgerError, Result};

/// One settled exit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settlement {
    pub address: Address,
    pub amount: Coins,
}

/// Set of addresses awaiting full exit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WithdrawalQueue {
    requests: BTreeSet<Address>,
}

impl WithdrawalQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an address for exit. Returns `false` if it was already queued.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotANominator`] if the address has no entry or a zero
    /// balance.
    pub fn request(&mut self, address: Address, ledger: &NominatorLedger) -> Result<bool> {
        let has_balance = match ledger.get(&address) {
            Some(nominator) => nominator.balance()? > 0,
            None => false,
        };
        if !has_balance {
            return Err(LedgerError::NotANominator(address_hex(&address)));
        }

        let inserted = self.requests.insert(address);
        if inserted {
            tracing::info!(nominator = %address_hex(&address), "withdrawal requested");
        }
        Ok(inserted)
    }

    /// Drop a pending request. Returns `true` if one was removed.
    pub fn cancel(&mut self, address: &Address) -> bool {
        let removed = self.requests.remove(address);
        if removed {
            tracing::info!(nominator = %address_hex(address), "withdrawal request cancelled");
        }
        removed
    }

    /// Settle every queued request, in ascending address order. An entry
    /// with nothing left is removed without producing a settlement.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotLiquid`] unless `state` is liquid
    /// - Ledger errors from [`NominatorLedger::debit_full`]
    pub fn settle_all(
        &mut self,
        ledger: &mut NominatorLedger,
        state: PoolState,
    ) -> Result<Vec<Settlement>> {
        if !state.is_liquid() {
            return Err(LedgerError::NotLiquid(state));
        }

        let mut settlements = Vec::with_capacity(self.requests.len());
        for address in &self.requests {
            let amount = ledger.debit_full(address)?;
            if amount == 0 {
                tracing::debug!(nominator = %address_hex(address), "empty withdrawal dropped");
                continue;
            }
            settlements.push(Settlement {
                address: *address,
                amount,
            });
        }
        self.requests.clear();

        if !settlements.is_empty() {
            tracing::info!(count = settlements.len(), "withdrawals settled");
        }
        Ok(settlements)
    }

    /// Whether an address is queued.
    pub fn contains(&self, address: &Address) -> bool {
        self.requests.contains(address)
    }

    /// Number of queued addresses.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Queued addresses in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.requests.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::DepositMode;
    use nompool_types::config::PoolConfig;

    fn cfg() -> PoolConfig {
        PoolConfig {
            validator_address: [0xEE; 32],
            validator_reward_share: 0,
            max_nominators_count: 10,
            min_validator_stake: 10,
            min_nominator_stake: 10,
        }
    }

    #[test]
    fn test_request_requires_nominator() {
        let ledger = NominatorLedger::new();
        let mut queue = WithdrawalQueue::new();
        assert!(matches!(
            queue.request([1; 32], &ledger),
            Err(LedgerError::NotANominator(_))
        ));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_request_is_idempotent() {
        let mut ledger = NominatorLedger::new();
        ledger.deposit([1; 32], 10, DepositMode::Active, &cfg()).expect("deposit");
        let mut queue = WithdrawalQueue::new();
        assert!(queue.request([1; 32], &ledger).expect("first"));
        assert!(!queue.request([1; 32], &ledger).expect("second"));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_cancel() {
        let mut ledger = NominatorLedger::new();
        ledger.deposit([1; 32], 10, DepositMode::Active, &cfg()).expect("deposit");
        let mut queue = WithdrawalQueue::new();
        queue.request([1; 32], &ledger).expect("request");
        assert!(queue.cancel(&[1; 32]));
        assert!(!queue.cancel(&[1; 32]));
        assert!(!queue.contains(&[1; 32]));
    }

    #[test]
    fn test_settle_all_pays_full_balance_in_order() {
        let mut ledger = NominatorLedger::new();
        ledger.deposit([2; 32], 20, DepositMode::Active, &cfg()).expect("d2");
        ledger.deposit([1; 32], 10, DepositMode::Active, &cfg()).expect("d1");
        ledger.deposit([1; 32], 3, DepositMode::Pending, &cfg()).expect("p1");
        ledger.deposit([3; 32], 30, DepositMode::Active, &cfg()).expect("d3");

        let mut queue = WithdrawalQueue::new();
        queue.request([2; 32], &ledger).expect("r2");
        queue.request([1; 32], &ledger).expect("r1");

        let settled = queue.settle_all(&mut ledger, PoolState::Idle).expect("settle");
        assert_eq!(
            settled,
            vec![
                Settlement { address: [1; 32], amount: 13 },
                Settlement { address: [2; 32], amount: 20 },
            ]
        );
        assert!(queue.is_empty());
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains(&[3; 32]));
    }

    #[test]
    fn test_settle_skips_empty_balance() {
        let mut ledger = NominatorLedger::new();
        ledger.deposit([1; 32], 10, DepositMode::Active, &cfg()).expect("d1");
        ledger.deposit([2; 32], 10, DepositMode::Active, &cfg()).expect("d2");
        let mut queue = WithdrawalQueue::new();
        queue.request([1; 32], &ledger).expect("r1");
        queue.request([2; 32], &ledger).expect("r2");
        ledger.debit_loss(&[1; 32], 10).expect("wiped");

        let settled = queue.settle_all(&mut ledger, PoolState::Idle).expect("settle");
        assert_eq!(settled, vec![Settlement { address: [2; 32], amount: 10 }]);
        assert!(ledger.is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_settle_refused_while_locked() {
        let mut ledger = NominatorLedger::new();
        ledger.deposit([1; 32], 10, DepositMode::Active, &cfg()).expect("deposit");
        let mut queue = WithdrawalQueue::new();
        queue.request([1; 32], &ledger).expect("request");

        let before_ledger = ledger.clone();
        let before_queue = queue.clone();
        assert_eq!(
            queue.settle_all(&mut ledger, PoolState::Staked),
            Err(LedgerError::NotLiquid(PoolState::Staked))
        );
        assert_eq!(ledger, before_ledger);
        assert_eq!(queue, before_queue);
    }
}
