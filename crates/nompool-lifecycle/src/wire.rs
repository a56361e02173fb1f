//! Inbound message body codec.
//!
//! ## Layout
//!
//! Nominator actions are text comments: a 32-bit zero op followed by one
//! ASCII tag. On the wire that is a 3-byte zero prefix and the tag byte.
//!
//! ```text
//! 00 00 00 64   'd'  deposit the attached value
//! 00 00 00 77   'w'  withdraw the full balance
//! 00 00 00 79   'y'  support the current proposal
//! 00 00 00 6e   'n'  reject the current proposal
//! ```
//!
//! Every other message starts with a non-zero 32-bit big-endian op code
//! followed by a fixed payload:
//!
//! ```text
//! "prop"      PoolConfig (52 bytes)
//! "stak"      -
//! "rcvr"      -
//! "pwdr"      -
//! "wval"      -
//! "conf"      validator set hash (32 bytes)
//! "vset"      validator set hash (32 bytes)
//! F96F7324    -            (value = returned amount)
//! ```

use nompool_types::config::{PoolConfig, CONFIG_ENCODED_LEN};
use nompool_types::Hash;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// Zero prefix that marks a comment action.
pub const COMMENT_PREFIX: [u8; 3] = [0, 0, 0];

pub const TAG_DEPOSIT: u8 = b'd';
pub const TAG_WITHDRAW: u8 = b'w';
pub const TAG_VOTE_FOR: u8 = b'y';
pub const TAG_VOTE_AGAINST: u8 = b'n';

pub const OP_PROPOSE: u32 = u32::from_be_bytes(*b"prop");
pub const OP_STAKE: u32 = u32::from_be_bytes(*b"stak");
pub const OP_RECOVER_STAKE: u32 = u32::from_be_bytes(*b"rcvr");
pub const OP_PROCESS_WITHDRAWALS: u32 = u32::from_be_bytes(*b"pwdr");
pub const OP_WITHDRAW_VALIDATOR_FUNDS: u32 = u32::from_be_bytes(*b"wval");
pub const OP_STAKE_CONFIRMED: u32 = u32::from_be_bytes(*b"conf");
pub const OP_VALIDATOR_SET_CHANGED: u32 = u32::from_be_bytes(*b"vset");
/// Elector answer carrying recovered stake.
pub const OP_STAKE_RETURNED: u32 = 0xF96F_7324;

/// Body decoding failures. All map to `UnrecognizedOperation`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("message body shorter than an op code ({0} bytes)")]
    Truncated(usize),

    #[error("unknown comment tag 0x{0:02x}")]
    UnknownTag(u8),

    #[error("unknown op code 0x{0:08x}")]
    UnknownOp(u32),

    #[error("op 0x{op:08x} expects {expected} payload bytes, got {got}")]
    PayloadLength { op: u32, expected: usize, got: usize },
}

/// A decoded inbound operation.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Deposit,
    Withdraw,
    Vote {
        support: bool,
    },
    Propose {
        config: PoolConfig,
    },
    Stake,
    RecoverStake,
    ProcessWithdrawals,
    WithdrawValidatorFunds,
    StakeConfirmed {
        #[serde_as(as = "serde_with::hex::Hex")]
        validator_set_hash: Hash,
    },
    ValidatorSetChanged {
        #[serde_as(as = "serde_with::hex::Hex")]
        validator_set_hash: Hash,
    },
    StakeReturned,
}

impl Operation {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Deposit => "deposit",
            Operation::Withdraw => "withdraw",
            Operation::Vote { .. } => "vote",
            Operation::Propose { .. } => "propose",
            Operation::Stake => "stake",
            Operation::RecoverStake => "recover_stake",
            Operation::ProcessWithdrawals => "process_withdrawals",
            Operation::WithdrawValidatorFunds => "withdraw_validator_funds",
            Operation::StakeConfirmed { .. } => "stake_confirmed",
            Operation::ValidatorSetChanged { .. } => "validator_set_changed",
            Operation::StakeReturned => "stake_returned",
        }
    }

    /// Whether the attached value is taken into the pool rather than refunded.
    pub fn absorbs_value(&self) -> bool {
        matches!(self, Operation::Deposit | Operation::StakeReturned)
    }

    /// Encode as a message body.
    pub fn encode(&self) -> Vec<u8> {
        let comment = |tag: u8| {
            let mut out = COMMENT_PREFIX.to_vec();
            out.push(tag);
            out
        };
        let op = |code: u32, payload: &[u8]| {
            let mut out = Vec::with_capacity(4 + payload.len());
            out.extend_from_slice(&code.to_be_bytes());
            out.extend_from_slice(payload);
            out
        };

        match self {
            Operation::Deposit => comment(TAG_DEPOSIT),
            Operation::Withdraw => comment(TAG_WITHDRAW),
            Operation::Vote { support: true } => comment(TAG_VOTE_FOR),
            Operation::Vote { support: false } => comment(TAG_VOTE_AGAINST),
            Operation::Propose { config } => op(OP_PROPOSE, &config.to_bytes()),
            Operation::Stake => op(OP_STAKE, &[]),
            Operation::RecoverStake => op(OP_RECOVER_STAKE, &[]),
            Operation::ProcessWithdrawals => op(OP_PROCESS_WITHDRAWALS, &[]),
            Operation::WithdrawValidatorFunds => op(OP_WITHDRAW_VALIDATOR_FUNDS, &[]),
            Operation::StakeConfirmed { validator_set_hash } => {
                op(OP_STAKE_CONFIRMED, validator_set_hash)
            }
            Operation::ValidatorSetChanged { validator_set_hash } => {
                op(OP_VALIDATOR_SET_CHANGED, validator_set_hash)
            }
            Operation::StakeReturned => op(OP_STAKE_RETURNED, &[]),
        }
    }

    /// Decode a message body.
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] for short bodies, unknown tags or op codes, and
    /// payloads of the wrong length.
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        if body.len() < 4 {
            return Err(WireError::Truncated(body.len()));
        }
        let mut code = [0u8; 4];
        code.copy_from_slice(&body[..4]);
        let code = u32::from_be_bytes(code);
        let payload = &body[4..];

        if body[..3] == COMMENT_PREFIX {
            expect_len(code, payload, 0)?;
            return match body[3] {
                TAG_DEPOSIT => Ok(Operation::Deposit),
                TAG_WITHDRAW => Ok(Operation::Withdraw),
                TAG_VOTE_FOR => Ok(Operation::Vote { support: true }),
                TAG_VOTE_AGAINST => Ok(Operation::Vote { support: false }),
                other => Err(WireError::UnknownTag(other)),
            };
        }

        match code {
            OP_PROPOSE => {
                expect_len(code, payload, CONFIG_ENCODED_LEN)?;
                let config = PoolConfig::from_bytes(payload).map_err(|_| WireError::PayloadLength {
                    op: code,
                    expected: CONFIG_ENCODED_LEN,
                    got: payload.len(),
                })?;
                Ok(Operation::Propose { config })
            }
            OP_STAKE => expect_len(code, payload, 0).map(|()| Operation::Stake),
            OP_RECOVER_STAKE => expect_len(code, payload, 0).map(|()| Operation::RecoverStake),
            OP_PROCESS_WITHDRAWALS => {
                expect_len(code, payload, 0).map(|()| Operation::ProcessWithdrawals)
            }
            OP_WITHDRAW_VALIDATOR_FUNDS => {
                expect_len(code, payload, 0).map(|()| Operation::WithdrawValidatorFunds)
            }
            OP_STAKE_CONFIRMED => Ok(Operation::StakeConfirmed {
                validator_set_hash: read_hash(code, payload)?,
            }),
            OP_VALIDATOR_SET_CHANGED => Ok(Operation::ValidatorSetChanged {
                validator_set_hash: read_hash(code, payload)?,
            }),
            OP_STAKE_RETURNED => expect_len(code, payload, 0).map(|()| Operation::StakeReturned),
            other => Err(WireError::UnknownOp(other)),
        }
    }
}

fn expect_len(op: u32, payload: &[u8], expected: usize) -> Result<(), WireError> {
    if payload.len() != expected {
        return Err(WireError::PayloadLength {
            op,
            expected,
            got: payload.len(),
        });
    }
    Ok(())
}

fn read_hash(op: u32, payload: &[u8]) -> Result<Hash, WireError> {
    expect_len(op, payload, 32)?;
    let mut hash = [0u8; 32];
    hash.copy_from_slice(payload);
    Ok(hash)
}
