//! Pure transition function.
//!
//! [`apply`] clones the input, runs one operation against the clone and
//! returns it with the produced effects. The caller decides whether to commit;
//! on error nothing has changed.
//!
//! Every successful message finishes with a governance pass: open proposals
//! are resolved against the live stake (expiry is lazy), and latched
//! acceptances are swapped in whenever the pool is idle.

use nompool_governance::voting::Resolution;
use nompool_ledger::ledger::DepositMode;
use nompool_ledger::rewards;
use nompool_types::booking::{Booking, BookingKind};
use nompool_types::config::PoolConfig;
use nompool_types::state::PoolState;
use nompool_types::{address_hex, Address, Coins, ErrorKind, Hash};

use crate::effects::{Effect, TransferReason};
use crate::message::InboundMessage;
use crate::state::PoolData;
use crate::wire::Operation;
use crate::{PoolError, Result};

/// Result of a successful [`apply`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    /// State after the message.
    pub data: PoolData,
    /// Decoded operation.
    pub operation: Operation,
    /// Effects in production order.
    pub effects: Vec<Effect>,
}

/// Run one inbound message against `data`.
///
/// # Errors
///
/// Any [`PoolError`]; `data` is never modified.
pub fn apply(data: &PoolData, msg: &InboundMessage) -> Result<Transition> {
    if data.halted {
        return Err(PoolError::Halted);
    }
    let operation = msg.operation()?;

    let mut step = Step {
        seqno: data.seqno.checked_add(1).ok_or(PoolError::Overflow)?,
        data: data.clone(),
        msg,
        effects: Vec::new(),
    };
    step.data.seqno = step.seqno;

    match &operation {
        Operation::Deposit => step.deposit()?,
        Operation::Withdraw => step.withdraw()?,
        Operation::Vote { support } => step.vote(*support)?,
        Operation::Propose { config } => step.propose(config)?,
        Operation::Stake => step.stake()?,
        Operation::RecoverStake => step.recover_stake()?,
        Operation::ProcessWithdrawals => step.process_withdrawals()?,
        Operation::WithdrawValidatorFunds => step.withdraw_validator_funds()?,
        Operation::StakeConfirmed { validator_set_hash } => {
            step.stake_confirmed(*validator_set_hash)?
        }
        Operation::ValidatorSetChanged { validator_set_hash } => {
            step.validator_set_changed(*validator_set_hash)?
        }
        Operation::StakeReturned => step.stake_returned()?,
    }

    if !operation.absorbs_value() && msg.value > 0 {
        step.effects.push(Effect::Transfer {
            to: msg.sender,
            amount: msg.value,
            reason: TransferReason::Refund,
        });
    }

    step.governance()?;

    Ok(Transition {
        data: step.data,
        operation,
        effects: step.effects,
    })
}

struct Step<'a> {
    data: PoolData,
    msg: &'a InboundMessage,
    seqno: u64,
    effects: Vec<Effect>,
}

impl Step<'_> {
    fn book_credit(&mut self, kind: BookingKind, address: Address, amount: Coins) {
        self.effects.push(Effect::Booking(Booking::credit(
            kind,
            address,
            amount,
            self.msg.now,
            self.seqno,
        )));
    }

    fn book_debit(&mut self, kind: BookingKind, address: Address, amount: Coins) {
        self.effects.push(Effect::Booking(Booking::debit(
            kind,
            address,
            amount,
            self.msg.now,
            self.seqno,
        )));
    }

    fn require_state(&self, operation: &'static str, allowed: &[PoolState]) -> Result<()> {
        if !allowed.contains(&self.data.state) {
            return Err(PoolError::InvalidState {
                operation,
                state: self.data.state,
            });
        }
        Ok(())
    }

    fn require_operator(&self, operation: &'static str) -> Result<()> {
        if self.msg.sender != self.data.config.validator_address {
            return Err(PoolError::Unauthorized {
                operation,
                sender: address_hex(&self.msg.sender),
            });
        }
        Ok(())
    }

    fn require_elector(&self, operation: &'static str) -> Result<()> {
        if self.msg.sender != self.data.settings.elector_address {
            return Err(PoolError::Unauthorized {
                operation,
                sender: address_hex(&self.msg.sender),
            });
        }
        Ok(())
    }

    fn add_liquid(&mut self, amount: Coins) -> Result<()> {
        self.data.liquid_balance = self
            .data
            .liquid_balance
            .checked_add(amount)
            .ok_or(PoolError::Overflow)?;
        Ok(())
    }

    fn take_liquid(&mut self, amount: Coins) -> Result<()> {
        self.data.liquid_balance = self
            .data
            .liquid_balance
            .checked_sub(amount)
            .ok_or(PoolError::Overflow)?;
        Ok(())
    }

    fn accrue_operator(&mut self, amount: Coins) -> Result<()> {
        self.data.validator_amount = self
            .data
            .validator_amount
            .checked_add(amount)
            .ok_or(PoolError::Overflow)?;
        Ok(())
    }

    // ---- nominator actions -------------------------------------------------

    fn deposit(&mut self) -> Result<()> {
        let sender = self.msg.sender;
        let value = self.msg.value;
        let fee = self.data.settings.deposit_fee;
        if value <= fee {
            return Err(PoolError::InsufficientStake {
                amount: value,
                minimum: fee.saturating_add(1),
            });
        }
        let net = value - fee;

        if self.data.withdrawals.cancel(&sender) {
            tracing::info!(nominator = %address_hex(&sender), "deposit cancelled pending withdrawal");
        }

        let mode = DepositMode::for_state(self.data.state);
        let entry = self
            .data
            .ledger
            .deposit(sender, net, mode, &self.data.config)?;
        self.add_liquid(value)?;
        self.accrue_operator(fee)?;

        self.book_credit(BookingKind::NominatorDeposit, sender, net);
        if fee > 0 {
            let operator = self.data.config.validator_address;
            self.book_credit(BookingKind::DepositFee, operator, fee);
        }

        tracing::info!(
            nominator = %address_hex(&sender),
            amount = net,
            fee,
            ?mode,
            deposit = entry.deposit,
            pending = entry.pending_deposit,
            "deposit accepted"
        );
        Ok(())
    }

    fn withdraw(&mut self) -> Result<()> {
        let sender = self.msg.sender;
        self.data.withdrawals.request(sender, &self.data.ledger)?;
        if self.data.state.is_liquid() {
            self.settle_withdrawals()?;
        } else {
            tracing::info!(
                nominator = %address_hex(&sender),
                state = %self.data.state,
                "withdrawal queued until stake returns"
            );
        }
        Ok(())
    }

    fn settle_withdrawals(&mut self) -> Result<()> {
        let settlements = self
            .data
            .withdrawals
            .settle_all(&mut self.data.ledger, self.data.state)?;
        for settlement in settlements {
            self.take_liquid(settlement.amount)?;
            self.effects.push(Effect::Transfer {
                to: settlement.address,
                amount: settlement.amount,
                reason: TransferReason::Withdrawal,
            });
            self.book_debit(
                BookingKind::NominatorWithdrawal,
                settlement.address,
                settlement.amount,
            );
        }
        Ok(())
    }

    fn vote(&mut self, support: bool) -> Result<()> {
        let id = self.data.votings.vote_current(
            self.msg.sender,
            support,
            self.msg.now,
            &self.data.ledger,
        )?;
        tracing::debug!(proposal = %hex::encode(id), support, "vote on current proposal");
        Ok(())
    }

    fn propose(&mut self, config: &PoolConfig) -> Result<()> {
        let id = self.data.votings.cast_vote(
            self.msg.sender,
            config,
            true,
            self.msg.now,
            &self.data.ledger,
        )?;
        tracing::info!(
            proposal = %hex::encode(id),
            proposer = %address_hex(&self.msg.sender),
            "config proposal submitted"
        );
        Ok(())
    }

    // ---- operator actions --------------------------------------------------

    fn stake(&mut self) -> Result<()> {
        self.require_operator("stake")?;
        self.require_state("stake", &[PoolState::Idle])?;

        let amount = self.data.ledger.total_deposit()?;
        let minimum = self.data.config.min_validator_stake.max(1);
        if amount < minimum {
            return Err(PoolError::InsufficientStake { amount, minimum });
        }

        self.take_liquid(amount)?;
        self.data.stake_amount_sent = amount;
        self.data.stake_at = self.msg.now;
        self.data.state = PoolState::StakeSent;

        self.effects.push(Effect::SendStake { amount });
        let pool = self.data.settings.pool_address;
        self.book_debit(BookingKind::StakeSent, pool, amount);

        tracing::info!(amount, nominators = self.data.ledger.len(), "stake sent");
        Ok(())
    }

    fn recover_stake(&mut self) -> Result<()> {
        self.require_operator("recover_stake")?;
        self.require_state("recover_stake", &[PoolState::Staked])?;

        let until = self.data.unlock_time();
        if self.msg.now < until {
            return Err(PoolError::StakeLocked { until });
        }

        self.data.state = PoolState::Recovering;
        self.effects.push(Effect::RequestRecovery);

        tracing::info!(
            stake = self.data.stake_amount_sent,
            validator_set_changes = self.data.validator_set_changes_count,
            "stake recovery requested"
        );
        Ok(())
    }

    fn process_withdrawals(&mut self) -> Result<()> {
        self.require_operator("process_withdrawals")?;
        self.require_state("process_withdrawals", &[PoolState::Idle])?;
        self.settle_withdrawals()
    }

    fn withdraw_validator_funds(&mut self) -> Result<()> {
        self.require_operator("withdraw_validator_funds")?;
        let amount = self.data.validator_amount;
        if amount == 0 {
            return Err(PoolError::NothingToWithdraw);
        }

        self.pay_operator()?;
        tracing::info!(amount, "validator funds withdrawn");
        Ok(())
    }

    /// Pay the whole accrued `validator_amount` to the current operator.
    fn pay_operator(&mut self) -> Result<()> {
        let amount = self.data.validator_amount;
        self.take_liquid(amount)?;
        self.data.validator_amount = 0;

        let operator = self.data.config.validator_address;
        self.effects.push(Effect::Transfer {
            to: operator,
            amount,
            reason: TransferReason::ValidatorFunds,
        });
        self.book_debit(BookingKind::ValidatorWithdrawal, operator, amount);
        Ok(())
    }

    // ---- counterparty confirmations ----------------------------------------

    fn record_validator_set(&mut self, hash: Hash) -> Result<()> {
        self.data.validator_set_changes_count = self
            .data
            .validator_set_changes_count
            .checked_add(1)
            .ok_or(PoolError::Overflow)?;
        self.data.saved_validator_set_hash = Some(hash);
        self.data.validator_set_change_time = self.msg.now;
        Ok(())
    }

    fn stake_confirmed(&mut self, hash: Hash) -> Result<()> {
        self.require_elector("stake_confirmed")?;
        self.require_state("stake_confirmed", &[PoolState::StakeSent])?;

        self.record_validator_set(hash)?;
        self.data.stake_at = self.msg.now;
        self.data.state = PoolState::Staked;

        tracing::info!(
            validator_set = %hex::encode(hash),
            locked_until = self.data.unlock_time(),
            "stake confirmed"
        );
        Ok(())
    }

    fn validator_set_changed(&mut self, hash: Hash) -> Result<()> {
        self.require_elector("validator_set_changed")?;
        self.require_state("validator_set_changed", &[PoolState::Staked])?;

        if self.data.saved_validator_set_hash == Some(hash) {
            tracing::debug!(validator_set = %hex::encode(hash), "validator set unchanged");
            return Ok(());
        }
        self.record_validator_set(hash)?;

        tracing::info!(
            validator_set = %hex::encode(hash),
            changes = self.data.validator_set_changes_count,
            locked_until = self.data.unlock_time(),
            "validator set changed"
        );
        Ok(())
    }

    fn stake_returned(&mut self) -> Result<()> {
        self.require_elector("stake_returned")?;
        self.require_state("stake_returned", &[PoolState::Recovering])?;

        let returned = self.msg.value;
        let sent = self.data.stake_amount_sent;
        self.add_liquid(returned)?;
        let pool = self.data.settings.pool_address;
        self.book_credit(BookingKind::StakeReturned, pool, returned);

        if returned >= sent {
            self.distribute(returned - sent)?;
        } else {
            self.absorb_loss(sent - returned)?;
        }

        self.data.stake_amount_sent = 0;
        self.data.state = PoolState::Idle;
        self.data.ledger.promote_pending()?;
        self.settle_withdrawals()?;

        tracing::info!(
            returned,
            sent,
            nominators = self.data.ledger.len(),
            validator_amount = self.data.validator_amount,
            "round settled"
        );
        Ok(())
    }

    fn distribute(&mut self, reward: Coins) -> Result<()> {
        let split = rewards::distribute_reward(
            &mut self.data.ledger,
            reward,
            self.data.config.validator_reward_share,
        )?;
        let operator_part = split.validator_total()?;
        self.accrue_operator(operator_part)?;

        for (address, credit) in &split.nominator_credits {
            self.book_credit(BookingKind::NominatorIncome, *address, *credit);
        }
        if operator_part > 0 {
            let operator = self.data.config.validator_address;
            self.book_credit(BookingKind::ValidatorIncome, operator, operator_part);
        }
        Ok(())
    }

    fn absorb_loss(&mut self, loss: Coins) -> Result<()> {
        let debits = rewards::socialize_loss(&mut self.data.ledger, loss)?;
        for (address, amount) in &debits {
            self.book_debit(BookingKind::NominatorLoss, *address, *amount);
        }
        for address in self.data.ledger.remove_empty() {
            self.data.withdrawals.cancel(&address);
            tracing::warn!(
                nominator = %address_hex(&address),
                "deposit wiped out by loss, entry removed"
            );
        }

        let detail = format!(
            "counterparty returned {} of {} sent",
            self.msg.value, self.data.stake_amount_sent
        );
        tracing::error!(loss, nominators = debits.len(), "negative reward: {detail}");
        self.effects.push(Effect::Anomaly {
            kind: ErrorKind::NegativeReward,
            detail,
        });
        Ok(())
    }

    // ---- governance --------------------------------------------------------

    fn governance(&mut self) -> Result<()> {
        if self.data.votings.is_empty() {
            return Ok(());
        }

        let total_stake = self.data.ledger.total_deposit()?;
        let resolutions =
            self.data
                .votings
                .resolve_all(&self.data.ledger, total_stake, self.msg.now)?;
        for (proposal, resolution) in resolutions {
            if let Resolution::Rejected(reason) = resolution {
                self.effects
                    .push(Effect::ProposalRejected { proposal, reason });
            }
        }

        if !self.data.state.is_liquid() {
            return Ok(());
        }

        for (proposal, config) in self.data.votings.take_accepted() {
            match config.validate_for(self.data.nominators_count()) {
                Ok(()) => {
                    let outgoing = self.data.config.validator_address;
                    let accrued = self.data.validator_amount;
                    if config.validator_address != outgoing && accrued > 0 {
                        self.pay_operator()?;
                        tracing::info!(
                            operator = %address_hex(&outgoing),
                            amount = accrued,
                            "outgoing operator paid before handover"
                        );
                    }
                    tracing::info!(
                        proposal = %hex::encode(proposal),
                        validator = %address_hex(&config.validator_address),
                        reward_share = config.validator_reward_share,
                        max_nominators = config.max_nominators_count,
                        "config replaced"
                    );
                    self.data.config = config.clone();
                    self.effects
                        .push(Effect::ConfigChanged { proposal, config });
                }
                Err(e) => {
                    tracing::warn!(
                        proposal = %hex::encode(proposal),
                        error = %e,
                        "accepted config failed validation, dropped"
                    );
                    self.effects.push(Effect::Anomaly {
                        kind: ErrorKind::ConfigRejected,
                        detail: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
