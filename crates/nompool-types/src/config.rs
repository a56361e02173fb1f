//! Governance-controlled pool configuration.
//!
//! A [`PoolConfig`] is only ever replaced as a whole. Every candidate passes
//! [`PoolConfig::validate_static`] when proposed and
//! [`PoolConfig::validate_for`] again at the moment it is swapped in.
//!
//! ## Byte layout
//!
//! ```text
//! validator_address       32 bytes
//! validator_reward_share   u16 BE (basis points)
//! max_nominators_count     u16 BE
//! min_validator_stake      u64 BE
//! min_nominator_stake      u64 BE
//! ```

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::hashing::{self, contexts};
use crate::{Address, Coins, Hash, BASIS_POINTS};

/// Encoded length of a [`PoolConfig`].
pub const CONFIG_ENCODED_LEN: usize = 32 + 2 + 2 + 8 + 8;

/// Reasons a configuration is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Reward share above 100%.
    #[error("reward share {share} bp exceeds {BASIS_POINTS} bp")]
    RewardShareOutOfRange {
        /// The offending share.
        share: u16,
    },

    /// Validator floor below the nominator floor.
    #[error("min validator stake {min_validator} below min nominator stake {min_nominator}")]
    StakeFloorsInverted {
        min_validator: Coins,
        min_nominator: Coins,
    },

    /// Capacity would evict current nominators.
    #[error("capacity {max} below current nominators count {current}")]
    CapacityBelowCurrent { max: u16, current: usize },

    /// Byte encoding has the wrong length.
    #[error("config encoding must be {CONFIG_ENCODED_LEN} bytes, got {0}")]
    Encoding(usize),
}

/// Pool parameters (validator identity, reward share, capacity, floors).
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Validator operator address; receives the reward share.
    #[serde_as(as = "serde_with::hex::Hex")]
    pub validator_address: Address,
    /// Operator share of each realized reward, in basis points.
    pub validator_reward_share: u16,
    /// Maximum number of ledger entries.
    pub max_nominators_count: u16,
    /// Minimum total deposit required to send stake.
    pub min_validator_stake: Coins,
    /// Minimum balance for a new nominator.
    pub min_nominator_stake: Coins,
}

impl PoolConfig {
    /// Check the invariants that do not depend on pool state.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::RewardShareOutOfRange`] if the share exceeds 10000 bp
    /// - [`ConfigError::StakeFloorsInverted`] if `min_validator_stake < min_nominator_stake`
    pub fn validate_static(&self) -> Result<(), ConfigError> {
        if self.validator_reward_share > BASIS_POINTS {
            return Err(ConfigError::RewardShareOutOfRange {
                share: self.validator_reward_share,
            });
        }
        if self.min_validator_stake < self.min_nominator_stake {
            return Err(ConfigError::StakeFloorsInverted {
                min_validator: self.min_validator_stake,
                min_nominator: self.min_nominator_stake,
            });
        }
        Ok(())
    }

    /// Full validation against the live nominator count.
    ///
    /// # Errors
    ///
    /// Everything [`PoolConfig::validate_static`] reports, plus
    /// [`ConfigError::CapacityBelowCurrent`] when the new capacity would evict
    /// active nominators.
    pub fn validate_for(&self, nominators_count: usize) -> Result<(), ConfigError> {
        self.validate_static()?;
        if (self.max_nominators_count as usize) < nominators_count {
            return Err(ConfigError::CapacityBelowCurrent {
                max: self.max_nominators_count,
                current: nominators_count,
            });
        }
        Ok(())
    }

    /// Canonical byte encoding.
    pub fn to_bytes(&self) -> [u8; CONFIG_ENCODED_LEN] {
        let mut out = [0u8; CONFIG_ENCODED_LEN];
        out[..32].copy_from_slice(&self.validator_address);
        out[32..34].copy_from_slice(&self.validator_reward_share.to_be_bytes());
        out[34..36].copy_from_slice(&self.max_nominators_count.to_be_bytes());
        out[36..44].copy_from_slice(&self.min_validator_stake.to_be_bytes());
        out[44..52].copy_from_slice(&self.min_nominator_stake.to_be_bytes());
        out
    }

    /// Decode from the canonical layout. Does not validate.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Encoding`] if `bytes` is not exactly [`CONFIG_ENCODED_LEN`] long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.len() != CONFIG_ENCODED_LEN {
            return Err(ConfigError::Encoding(bytes.len()));
        }
        let mut validator_address = [0u8; 32];
        validator_address.copy_from_slice(&bytes[..32]);
        let mut u16_buf = [0u8; 2];
        let mut u64_buf = [0u8; 8];

        u16_buf.copy_from_slice(&bytes[32..34]);
        let validator_reward_share = u16::from_be_bytes(u16_buf);
        u16_buf.copy_from_slice(&bytes[34..36]);
        let max_nominators_count = u16::from_be_bytes(u16_buf);
        u64_buf.copy_from_slice(&bytes[36..44]);
        let min_validator_stake = u64::from_be_bytes(u64_buf);
        u64_buf.copy_from_slice(&bytes[44..52]);
        let min_nominator_stake = u64::from_be_bytes(u64_buf);

        Ok(Self {
            validator_address,
            validator_reward_share,
            max_nominators_count,
            min_validator_stake,
            min_nominator_stake,
        })
    }

    /// Content hash identifying this config as a governance proposal.
    pub fn proposal_id(&self) -> Hash {
        hashing::domain_hash(contexts::CONFIG_PROPOSAL, &self.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NANO_PER_COIN;

    fn sample() -> PoolConfig {
        PoolConfig {
            validator_address: [9u8; 32],
            validator_reward_share: 1_000,
            max_nominators_count: 40,
            min_validator_stake: 10_000 * NANO_PER_COIN,
            min_nominator_stake: 10 * NANO_PER_COIN,
        }
    }

    #[test]
    fn test_valid_config() {
        sample().validate_static().expect("valid");
        sample().validate_for(40).expect("capacity equal to count is fine");
    }

    #[test]
    fn test_reward_share_bounds() {
        let mut config = sample();
        config.validator_reward_share = BASIS_POINTS;
        config.validate_static().expect("100% share is allowed");
        config.validator_reward_share = BASIS_POINTS + 1;
        assert_eq!(
            config.validate_static(),
            Err(ConfigError::RewardShareOutOfRange { share: 10_001 })
        );
    }

    #[test]
    fn test_inverted_floors_rejected() {
        let mut config = sample();
        config.min_validator_stake = config.min_nominator_stake - 1;
        assert!(matches!(
            config.validate_static(),
            Err(ConfigError::StakeFloorsInverted { .. })
        ));
    }

    #[test]
    fn test_capacity_shrink_rejected() {
        let config = sample();
        assert_eq!(
            config.validate_for(41),
            Err(ConfigError::CapacityBelowCurrent { max: 40, current: 41 })
        );
    }

    #[test]
    fn test_byte_layout() {
        let config = sample();
        let bytes = config.to_bytes();
        assert_eq!(&bytes[..32], &[9u8; 32]);
        assert_eq!(&bytes[32..34], &1_000u16.to_be_bytes());
        assert_eq!(PoolConfig::from_bytes(&bytes).expect("decode"), config);
        assert_eq!(
            PoolConfig::from_bytes(&bytes[..51]),
            Err(ConfigError::Encoding(51))
        );
    }

    #[test]
    fn test_proposal_id_tracks_content() {
        let a = sample();
        let mut b = sample();
        assert_eq!(a.proposal_id(), b.proposal_id());
        b.max_nominators_count += 1;
        assert_ne!(a.proposal_id(), b.proposal_id());
    }

    #[test]
    fn test_config_json_uses_hex_address() {
        let json = serde_json::to_value(sample()).expect("serialize");
        assert_eq!(json["validator_address"], serde_json::json!(hex::encode([9u8; 32])));
        let back: PoolConfig = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, sample());
    }
}
