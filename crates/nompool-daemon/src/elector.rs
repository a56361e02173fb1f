//! Loopback elector.
//!
//! Stands in for the external validator system. With `auto_reply` on it
//! confirms each stake immediately and answers a recovery request by
//! returning the stake plus a fixed per-round reward. The replies are queued
//! and fed back through the processor ahead of the next feed line.

use std::collections::VecDeque;

use nompool_lifecycle::counterparty::{Counterparty, CounterpartyError, StakeAck};
use nompool_lifecycle::{InboundMessage, Operation};
use nompool_types::{hashing, Address, Coins, Timestamp, BASIS_POINTS};

pub struct LoopbackElector {
    elector_address: Address,
    round_reward_bp: u16,
    auto_reply: bool,
    round: u64,
    staked: Option<Coins>,
    replies: VecDeque<InboundMessage>,
}

impl LoopbackElector {
    pub fn new(elector_address: Address, round_reward_bp: u16, auto_reply: bool) -> Self {
        Self {
            elector_address,
            round_reward_bp,
            auto_reply,
            round: 0,
            staked: None,
            replies: VecDeque::new(),
        }
    }

    /// Next queued elector message.
    pub fn next_reply(&mut self) -> Option<InboundMessage> {
        self.replies.pop_front()
    }

    fn returned_amount(&self, staked: Coins) -> Result<Coins, CounterpartyError> {
        let reward = u128::from(staked) * u128::from(self.round_reward_bp) / u128::from(BASIS_POINTS);
        Coins::try_from(u128::from(staked) + reward)
            .map_err(|_| CounterpartyError::Refused("returned amount overflows".into()))
    }
}

impl Counterparty for LoopbackElector {
    fn send_stake(
        &mut self,
        _pool: Address,
        amount: Coins,
        now: Timestamp,
    ) -> Result<StakeAck, CounterpartyError> {
        if self.staked.is_some() {
            return Err(CounterpartyError::Refused("stake already held".into()));
        }
        self.round += 1;
        self.staked = Some(amount);

        if self.auto_reply {
            let validator_set_hash = hashing::hash(&self.round.to_be_bytes());
            self.replies.push_back(InboundMessage::new(
                self.elector_address,
                0,
                now,
                &Operation::StakeConfirmed { validator_set_hash },
            ));
        }
        tracing::debug!(round = self.round, amount, "elector: stake accepted");

        Ok(StakeAck {
            amount,
            accepted_at: now,
        })
    }

    fn request_recovery(&mut self, _pool: Address, now: Timestamp) -> Result<(), CounterpartyError> {
        let staked = self
            .staked
            .ok_or_else(|| CounterpartyError::Refused("no stake held".into()))?;
        let returned = self.returned_amount(staked)?;
        self.staked = None;

        if self.auto_reply {
            self.replies.push_back(InboundMessage::new(
                self.elector_address,
                returned,
                now,
                &Operation::StakeReturned,
            ));
        }
        tracing::debug!(round = self.round, staked, returned, "elector: stake released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut elector = LoopbackElector::new([0x33; 32], 100, true);
        elector.send_stake([1; 32], 10_000, 5).expect("stake");
        let confirm = elector.next_reply().expect("confirmation");
        assert!(matches!(
            confirm.operation(),
            Ok(Operation::StakeConfirmed { .. })
        ));
        assert_eq!(confirm.sender, [0x33; 32]);

        elector.request_recovery([1; 32], 50).expect("recover");
        let returned = elector.next_reply().expect("return");
        assert_eq!(returned.operation(), Ok(Operation::StakeReturned));
        assert_eq!(returned.value, 10_100);
        assert!(elector.next_reply().is_none());
    }

    #[test]
    fn test_refuses_double_stake_and_empty_recovery() {
        let mut elector = LoopbackElector::new([0x33; 32], 0, false);
        assert!(elector.request_recovery([1; 32], 1).is_err());
        elector.send_stake([1; 32], 10, 1).expect("stake");
        assert!(elector.send_stake([1; 32], 10, 2).is_err());
        assert!(elector.next_reply().is_none());
    }
}
