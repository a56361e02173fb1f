//! Side effects produced by a committed message.
//!
//! `apply` never performs I/O. It describes outgoing transfers, requests for
//! the counterparty and booking records as [`Effect`] values; the
//! [`Pool`](crate::pool::Pool) dispatches the counterparty requests and hands
//! the rest to its caller.

use nompool_governance::voting::RejectReason;
use nompool_types::booking::Booking;
use nompool_types::config::PoolConfig;
use nompool_types::{Address, Coins, ErrorKind, Hash};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// Why funds leave the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferReason {
    /// Settled nominator exit.
    Withdrawal,
    /// Operator collecting its accrued balance.
    ValidatorFunds,
    /// Value attached to a message that does not take funds.
    Refund,
    /// Value returned because the message failed.
    Bounce,
}

/// One outcome of a committed message.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    /// Outgoing payment.
    Transfer {
        #[serde_as(as = "serde_with::hex::Hex")]
        to: Address,
        amount: Coins,
        reason: TransferReason,
    },
    /// Hand `amount` to the counterparty for validation.
    SendStake { amount: Coins },
    /// Ask the counterparty to return the stake.
    RequestRecovery,
    /// Accounting record.
    Booking(Booking),
    /// A governance proposal was swapped in.
    ConfigChanged {
        #[serde_as(as = "serde_with::hex::Hex")]
        proposal: Hash,
        config: PoolConfig,
    },
    /// A governance proposal was dropped.
    ProposalRejected {
        #[serde_as(as = "serde_with::hex::Hex")]
        proposal: Hash,
        reason: RejectReason,
    },
    /// Something that succeeded but deserves operator attention.
    Anomaly { kind: ErrorKind, detail: String },
}

impl Effect {
    /// The booking carried by this effect, if any.
    pub fn as_booking(&self) -> Option<&Booking> {
        match self {
            Effect::Booking(booking) => Some(booking),
            _ => None,
        }
    }
}
