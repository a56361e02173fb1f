//! Exact reward distribution.
//!
//! ## Formula
//!
//! ```text
//! validator_share = R * reward_share / 10000            (truncated)
//! nominator_i     = (R - validator_share) * deposit_i / total_deposit   (truncated)
//! dust            = (R - validator_share) - sum(nominator_i)
//! operator gets     validator_share + dust
//! ```
//!
//! Every coin of `R` lands somewhere, so `operator + sum(nominator_i) == R`.
//! Losses (the counterparty returning less than was sent) are socialised the
//! same way in reverse, with the truncation remainder charged unit by unit in
//! address order.

use nompool_types::{Address, Coins, BASIS_POINTS};

use crate::ledger::NominatorLedger;
use crate::{LedgerError, Result};

/// Outcome of splitting one reward.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RewardSplit {
    /// Operator's basis-point share.
    pub validator_share: Coins,
    /// Truncation remainder, also owed to the operator.
    pub dust: Coins,
    /// Per-nominator credits (zero credits omitted), ascending address order.
    pub nominator_credits: Vec<(Address, Coins)>,
}

impl RewardSplit {
    /// Everything the operator receives.
    pub fn validator_total(&self) -> Result<Coins> {
        self.validator_share
            .checked_add(self.dust)
            .ok_or(LedgerError::Overflow)
    }

    /// Sum of nominator credits.
    pub fn nominators_total(&self) -> Result<Coins> {
        self.nominator_credits
            .iter()
            .try_fold(0u64, |acc, (_, c)| acc.checked_add(*c).ok_or(LedgerError::Overflow))
    }
}

/// `a * b / c` in 128-bit, narrowed back to [`Coins`].
fn mul_div(a: Coins, b: Coins, c: Coins) -> Result<Coins> {
    if c == 0 {
        return Err(LedgerError::Overflow);
    }
    let wide = u128::from(a) * u128::from(b) / u128::from(c);
    Coins::try_from(wide).map_err(|_| LedgerError::Overflow)
}

/// Compute how a reward splits without touching the ledger.
///
/// # Errors
///
/// - [`LedgerError::InvalidRewardShare`] if `reward_share_bp > 10000`
/// - [`LedgerError::Overflow`] on arithmetic overflow
pub fn compute_reward_split(
    ledger: &NominatorLedger,
    reward: Coins,
    reward_share_bp: u16,
) -> Result<RewardSplit> {
    if reward_share_bp > BASIS_POINTS {
        return Err(LedgerError::InvalidRewardShare(reward_share_bp));
    }

    let validator_share = mul_div(reward, Coins::from(reward_share_bp), Coins::from(BASIS_POINTS))?;
    let nominators_pool = reward
        .checked_sub(validator_share)
        .ok_or(LedgerError::Overflow)?;

    let total_deposit = ledger.total_deposit()?;
    let mut nominator_credits = Vec::new();
    let mut credited: Coins = 0;

    if total_deposit > 0 {
        for (address, nominator) in ledger.iter() {
            if nominator.deposit == 0 {
                continue;
            }
            let credit = mul_div(nominators_pool, nominator.deposit, total_deposit)?;
            if credit == 0 {
                continue;
            }
            credited = credited.checked_add(credit).ok_or(LedgerError::Overflow)?;
            nominator_credits.push((*address, credit));
        }
    }

    let dust = nominators_pool
        .checked_sub(credited)
        .ok_or(LedgerError::Overflow)?;

    Ok(RewardSplit {
        validator_share,
        dust,
        nominator_credits,
    })
}

/// Split a reward and credit the nominator parts to the ledger.
///
/// The operator part is returned for the caller to account for; it is not a
/// ledger entry.
pub fn distribute_reward(
    ledger: &mut NominatorLedger,
    reward: Coins,
    reward_share_bp: u16,
) -> Result<RewardSplit> {
    let split = compute_reward_split(ledger, reward, reward_share_bp)?;
    for (address, credit) in &split.nominator_credits {
        ledger.credit_reward(address, *credit)?;
    }

    tracing::info!(
        reward,
        validator_share = split.validator_share,
        dust = split.dust,
        nominators = split.nominator_credits.len(),
        "rewards: distributed"
    );

    Ok(split)
}

/// Compute per-nominator debits covering `loss` exactly.
///
/// # Errors
///
/// [`LedgerError::Overflow`] if `loss` exceeds the total deposit.
pub fn compute_loss_split(ledger: &NominatorLedger, loss: Coins) -> Result<Vec<(Address, Coins)>> {
    if loss == 0 {
        return Ok(Vec::new());
    }
    let total_deposit = ledger.total_deposit()?;
    if loss > total_deposit {
        return Err(LedgerError::Overflow);
    }

    let mut debits: Vec<(Address, Coins, Coins)> = Vec::new();
    let mut charged: Coins = 0;
    for (address, nominator) in ledger.iter() {
        if nominator.deposit == 0 {
            continue;
        }
        let share = mul_div(loss, nominator.deposit, total_deposit)?;
        charged = charged.checked_add(share).ok_or(LedgerError::Overflow)?;
        debits.push((*address, share, nominator.deposit));
    }

    // Headroom totals total_deposit - charged >= remainder, so one pass suffices.
    let mut remainder = loss.checked_sub(charged).ok_or(LedgerError::Overflow)?;
    for (_, share, deposit) in debits.iter_mut() {
        if remainder == 0 {
            break;
        }
        let headroom = *deposit - *share;
        let extra = headroom.min(remainder);
        *share += extra;
        remainder -= extra;
    }

    Ok(debits
        .into_iter()
        .filter(|(_, share, _)| *share > 0)
        .map(|(address, share, _)| (address, share))
        .collect())
}

/// Debit a counterparty shortfall from nominator deposits.
pub fn socialize_loss(ledger: &mut NominatorLedger, loss: Coins) -> Result<Vec<(Address, Coins)>> {
    let debits = compute_loss_split(ledger, loss)?;
    for (address, amount) in &debits {
        ledger.debit_loss(address, *amount)?;
    }

    tracing::warn!(loss, nominators = debits.len(), "rewards: loss socialised");

    Ok(debits)
}
