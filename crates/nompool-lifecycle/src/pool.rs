//! Message processor.
//!
//! [`Pool`] owns the [`PoolData`] and processes one message at a time:
//!
//! 1. [`apply`] the message to a copy of the data
//! 2. check fund conservation on the result
//! 3. hand stake and recovery requests to the [`Counterparty`]
//! 4. commit
//!
//! Any failure leaves the data as it was and bounces the attached value. A
//! conservation failure additionally halts the pool.

use nompool_types::booking::Booking;
use nompool_types::{address_hex, ErrorKind};
use serde::{Deserialize, Serialize};

use crate::apply::{apply, Transition};
use crate::counterparty::Counterparty;
use crate::effects::{Effect, TransferReason};
use crate::message::InboundMessage;
use crate::state::PoolData;
use crate::wire::Operation;
use crate::{PoolError, Result};

/// What happened to one message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Committed {
        seqno: u64,
        operation: Operation,
        effects: Vec<Effect>,
    },
    Failed {
        kind: ErrorKind,
        reason: String,
        /// Return of the attached value, if any.
        bounce: Option<Effect>,
    },
}

impl Outcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed { .. })
    }

    /// Failure kind, if the message failed.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Outcome::Failed { kind, .. } => Some(*kind),
            Outcome::Committed { .. } => None,
        }
    }

    /// Committed effects (empty on failure).
    pub fn effects(&self) -> &[Effect] {
        match self {
            Outcome::Committed { effects, .. } => effects,
            Outcome::Failed { .. } => &[],
        }
    }

    /// Bookings among the committed effects.
    pub fn bookings(&self) -> impl Iterator<Item = &Booking> {
        self.effects().iter().filter_map(Effect::as_booking)
    }
}

/// The pool and its counterparty.
pub struct Pool<C> {
    data: PoolData,
    counterparty: C,
}

impl<C: Counterparty> Pool<C> {
    pub fn new(data: PoolData, counterparty: C) -> Self {
        Self { data, counterparty }
    }

    /// Process one message to completion.
    pub fn process(&mut self, msg: &InboundMessage) -> Outcome {
        match self.try_process(msg) {
            Ok(transition) => {
                let seqno = transition.data.seqno;
                tracing::info!(
                    seqno,
                    op = transition.operation.name(),
                    sender = %address_hex(&msg.sender),
                    state = %transition.data.state,
                    effects = transition.effects.len(),
                    "message committed"
                );
                self.data = transition.data;
                Outcome::Committed {
                    seqno,
                    operation: transition.operation,
                    effects: transition.effects,
                }
            }
            Err(e) => {
                if let PoolError::ConservationViolated { .. } = e {
                    self.data.halted = true;
                    tracing::error!(
                        error = %e,
                        seqno = self.data.seqno,
                        "conservation violated, pool halted"
                    );
                } else {
                    tracing::warn!(
                        error = %e,
                        kind = e.kind().code(),
                        sender = %address_hex(&msg.sender),
                        state = %self.data.state,
                        "message rejected"
                    );
                }
                let bounce = (msg.value > 0).then(|| Effect::Transfer {
                    to: msg.sender,
                    amount: msg.value,
                    reason: TransferReason::Bounce,
                });
                Outcome::Failed {
                    kind: e.kind(),
                    reason: e.to_string(),
                    bounce,
                }
            }
        }
    }

    fn try_process(&mut self, msg: &InboundMessage) -> Result<Transition> {
        let transition = apply(&self.data, msg)?;
        transition.data.check_conservation()?;

        let pool = self.data.settings.pool_address;
        for effect in &transition.effects {
            match effect {
                Effect::SendStake { amount } => {
                    let ack = self.counterparty.send_stake(pool, *amount, msg.now)?;
                    tracing::debug!(amount = ack.amount, at = ack.accepted_at, "stake acknowledged");
                }
                Effect::RequestRecovery => {
                    self.counterparty.request_recovery(pool, msg.now)?;
                }
                _ => {}
            }
        }
        Ok(transition)
    }

    pub fn data(&self) -> &PoolData {
        &self.data
    }

    pub fn counterparty(&self) -> &C {
        &self.counterparty
    }

    pub fn counterparty_mut(&mut self) -> &mut C {
        &mut self.counterparty
    }

    /// Whether a conservation violation stopped the pool.
    pub fn is_halted(&self) -> bool {
        self.data.halted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counterparty::RecordingCounterparty;
    use crate::state::PoolSettings;
    use nompool_types::config::PoolConfig;
    use nompool_types::state::PoolState;
    use nompool_types::Address;

    const OPERATOR: Address = [0xAA; 32];
    const ELECTOR: Address = [0xEE; 32];
    const POOL: Address = [0x50; 32];

    fn new_pool() -> Pool<RecordingCounterparty> {
        let config = PoolConfig {
            validator_address: OPERATOR,
            validator_reward_share: 1_000,
            max_nominators_count: 5,
            min_validator_stake: 100,
            min_nominator_stake: 10,
        };
        let mut settings = PoolSettings::new(POOL, ELECTOR);
        settings.deposit_fee = 0;
        settings.stake_held_for = 0;
        let data = PoolData::new(config, settings).expect("pool");
        Pool::new(data, RecordingCounterparty::default())
    }

    fn msg(sender: Address, value: u64, now: u64, op: Operation) -> InboundMessage {
        InboundMessage::new(sender, value, now, &op)
    }

    #[test]
    fn test_failure_bounces_value() {
        let mut pool = new_pool();
        let outcome = pool.process(&msg([1; 32], 5, 1, Operation::Deposit));
        assert_eq!(outcome.error_kind(), Some(ErrorKind::InsufficientStake));
        assert!(matches!(
            outcome,
            Outcome::Failed {
                bounce: Some(Effect::Transfer {
                    amount: 5,
                    reason: TransferReason::Bounce,
                    ..
                }),
                ..
            }
        ));
        assert_eq!(pool.data().seqno, 0);
        assert_eq!(pool.data().liquid_balance, 0);
    }

    #[test]
    fn test_seqno_counts_commits() {
        let mut pool = new_pool();
        let first = pool.process(&msg([1; 32], 50, 1, Operation::Deposit));
        let _ = pool.process(&msg([1; 32], 0, 2, Operation::Stake));
        let third = pool.process(&msg([2; 32], 50, 3, Operation::Deposit));
        assert!(matches!(first, Outcome::Committed { seqno: 1, .. }));
        assert!(matches!(third, Outcome::Committed { seqno: 2, .. }));
        assert!(third.bookings().all(|b| b.seqno == 2));
    }

    #[test]
    fn test_counterparty_receives_requests() {
        let mut pool = new_pool();
        pool.process(&msg([1; 32], 150, 1, Operation::Deposit));
        assert!(pool.process(&msg(OPERATOR, 0, 2, Operation::Stake)).is_committed());
        assert_eq!(pool.counterparty().stakes, vec![(POOL, 150, 2)]);

        pool.process(&msg(
            ELECTOR,
            0,
            3,
            Operation::StakeConfirmed {
                validator_set_hash: [9; 32],
            },
        ));
        assert!(pool.process(&msg(OPERATOR, 0, 4, Operation::RecoverStake)).is_committed());
        assert_eq!(pool.counterparty().recoveries, vec![(POOL, 4)]);
        assert_eq!(pool.data().state, PoolState::Recovering);
    }

    #[test]
    fn test_counterparty_refusal_rolls_back() {
        let mut pool = new_pool();
        pool.process(&msg([1; 32], 150, 1, Operation::Deposit));
        pool.counterparty_mut().refuse = true;
        let before = pool.data().clone();

        let outcome = pool.process(&msg(OPERATOR, 0, 2, Operation::Stake));
        assert_eq!(outcome.error_kind(), Some(ErrorKind::CounterpartyUnavailable));
        assert_eq!(pool.data(), &before);
        assert_eq!(pool.data().state, PoolState::Idle);
    }

    #[test]
    fn test_conservation_violation_halts() {
        let mut pool = new_pool();
        pool.process(&msg([1; 32], 150, 1, Operation::Deposit));
        // Simulate corrupted bookkeeping.
        pool.data.liquid_balance += 1;

        let outcome = pool.process(&msg([2; 32], 20, 2, Operation::Deposit));
        assert_eq!(outcome.error_kind(), Some(ErrorKind::ConservationViolated));
        assert!(pool.is_halted());

        let outcome = pool.process(&msg([3; 32], 20, 3, Operation::Deposit));
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Halted));
        assert!(!pool.data().ledger.contains(&[2; 32]));
    }

    #[test]
    fn test_outcome_json() {
        let mut pool = new_pool();
        let outcome = pool.process(&msg([1; 32], 50, 1, Operation::Deposit));
        let json = serde_json::to_value(&outcome).expect("serialize");
        assert_eq!(json["status"], "committed");
        assert_eq!(json["operation"]["op"], "deposit");
        assert_eq!(json["effects"][0]["effect"], "booking");
        assert_eq!(json["effects"][0]["kind"], "nominator_deposit");
    }
}
