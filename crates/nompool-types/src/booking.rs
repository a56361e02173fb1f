//! Booking records: the structured trail every committed message leaves.
//!
//! A reporting layer can rebuild nominator and pool histories from bookings
//! alone. Each booking carries the affected address, the kind of movement,
//! a credit or debit amount, the message timestamp and the pool sequence
//! number of the message that produced it.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::hashing::{self, contexts};
use crate::{Address, Coins, Hash, Timestamp};

/// Kind of funds movement recorded by a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingKind {
    NominatorDeposit,
    NominatorIncome,
    /// Pro-rata share of a counterparty shortfall.
    NominatorLoss,
    NominatorWithdrawal,
    ValidatorIncome,
    ValidatorWithdrawal,
    StakeSent,
    StakeReturned,
    /// Processing fee withheld from a deposit.
    DepositFee,
}

impl BookingKind {
    /// Stable storage name.
    pub fn as_str(self) -> &'static str {
        match self {
            BookingKind::NominatorDeposit => "nominator_deposit",
            BookingKind::NominatorIncome => "nominator_income",
            BookingKind::NominatorLoss => "nominator_loss",
            BookingKind::NominatorWithdrawal => "nominator_withdrawal",
            BookingKind::ValidatorIncome => "validator_income",
            BookingKind::ValidatorWithdrawal => "validator_withdrawal",
            BookingKind::StakeSent => "stake_sent",
            BookingKind::StakeReturned => "stake_returned",
            BookingKind::DepositFee => "deposit_fee",
        }
    }

    /// Parse a storage name.
    pub fn parse(name: &str) -> Option<Self> {
        let kind = match name {
            "nominator_deposit" => BookingKind::NominatorDeposit,
            "nominator_income" => BookingKind::NominatorIncome,
            "nominator_loss" => BookingKind::NominatorLoss,
            "nominator_withdrawal" => BookingKind::NominatorWithdrawal,
            "validator_income" => BookingKind::ValidatorIncome,
            "validator_withdrawal" => BookingKind::ValidatorWithdrawal,
            "stake_sent" => BookingKind::StakeSent,
            "stake_returned" => BookingKind::StakeReturned,
            "deposit_fee" => BookingKind::DepositFee,
            _ => return None,
        };
        Some(kind)
    }
}

/// One funds movement.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub kind: BookingKind,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub address: Address,
    /// Amount credited to `address`.
    pub credit: Coins,
    /// Amount debited from `address`.
    pub debit: Coins,
    pub utime: Timestamp,
    /// Sequence number of the message that produced this booking.
    pub seqno: u64,
}

impl Booking {
    /// A credit booking.
    pub fn credit(kind: BookingKind, address: Address, amount: Coins, utime: Timestamp, seqno: u64) -> Self {
        Self {
            kind,
            address,
            credit: amount,
            debit: 0,
            utime,
            seqno,
        }
    }

    /// A debit booking.
    pub fn debit(kind: BookingKind, address: Address, amount: Coins, utime: Timestamp, seqno: u64) -> Self {
        Self {
            kind,
            address,
            credit: 0,
            debit: amount,
            utime,
            seqno,
        }
    }

    /// Content hash used to deduplicate bookings in storage.
    pub fn booking_hash(&self) -> Hash {
        let credit = self.credit.to_be_bytes();
        let debit = self.debit.to_be_bytes();
        let utime = self.utime.to_be_bytes();
        let seqno = self.seqno.to_be_bytes();
        let encoded = hashing::encode_multi_field(&[
            self.kind.as_str().as_bytes(),
            &self.address,
            &credit,
            &debit,
            &utime,
            &seqno,
        ]);
        hashing::domain_hash(contexts::BOOKING_RECORD, &encoded)
    }
}
