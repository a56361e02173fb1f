//! Configuration file management.
//!
//! `$NOMPOOL_DATA_DIR/config.toml`, every field optional.

use std::path::PathBuf;

use nompool_lifecycle::state::{DEFAULT_DEPOSIT_FEE, DEFAULT_PROPOSAL_TTL, DEFAULT_STAKE_HELD_FOR};
use nompool_lifecycle::PoolSettings;
use nompool_types::config::PoolConfig;
use nompool_types::{Address, Coins, NANO_PER_COIN};
use serde::{Deserialize, Serialize};

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Pool identity and genesis parameters.
    #[serde(default)]
    pub pool: PoolSection,
    /// Lifecycle timing and fees.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    /// Loopback elector behaviour.
    #[serde(default)]
    pub elector: ElectorConfig,
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Pool identity and genesis config. Addresses are 64 hex characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSection {
    #[serde(default = "default_pool_address")]
    pub pool_address: String,
    #[serde(default = "default_elector_address")]
    pub elector_address: String,
    #[serde(default = "default_validator_address")]
    pub validator_address: String,
    /// Operator share in basis points.
    #[serde(default = "default_reward_share")]
    pub validator_reward_share: u16,
    #[serde(default = "default_max_nominators")]
    pub max_nominators_count: u16,
    #[serde(default = "default_min_validator_stake")]
    pub min_validator_stake: Coins,
    #[serde(default = "default_min_nominator_stake")]
    pub min_nominator_stake: Coins,
}

/// Lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Seconds the stake stays locked after the last validator-set change.
    #[serde(default = "default_stake_held_for")]
    pub stake_held_for: u64,
    /// Fee withheld from every deposit, in nano-units.
    #[serde(default = "default_deposit_fee")]
    pub deposit_fee: Coins,
    /// Governance proposal expiry in seconds.
    #[serde(default = "default_proposal_ttl")]
    pub proposal_ttl: u64,
}

/// Loopback elector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectorConfig {
    /// Answer stake and recovery requests automatically. When off, elector
    /// messages must come from the feed.
    #[serde(default = "default_true")]
    pub auto_reply: bool,
    /// Reward returned per round, in basis points of the stake.
    #[serde(default = "default_round_reward")]
    pub round_reward_bp: u16,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
    /// Journal file name inside the data directory.
    #[serde(default = "default_journal_file")]
    pub journal_file: String,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_pool_address() -> String {
    hex::encode([0x50u8; 32])
}

fn default_elector_address() -> String {
    hex::encode([0x33u8; 32])
}

fn default_validator_address() -> String {
    hex::encode([0xAAu8; 32])
}

fn default_reward_share() -> u16 {
    4_000
}

fn default_max_nominators() -> u16 {
    40
}

fn default_min_validator_stake() -> Coins {
    10_000 * NANO_PER_COIN
}

fn default_min_nominator_stake() -> Coins {
    10 * NANO_PER_COIN
}

fn default_stake_held_for() -> u64 {
    DEFAULT_STAKE_HELD_FOR
}

fn default_deposit_fee() -> Coins {
    DEFAULT_DEPOSIT_FEE
}

fn default_proposal_ttl() -> u64 {
    DEFAULT_PROPOSAL_TTL
}

fn default_true() -> bool {
    true
}

fn default_round_reward() -> u16 {
    50
}

fn default_journal_file() -> String {
    "journal.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            pool_address: default_pool_address(),
            elector_address: default_elector_address(),
            validator_address: default_validator_address(),
            validator_reward_share: default_reward_share(),
            max_nominators_count: default_max_nominators(),
            min_validator_stake: default_min_validator_stake(),
            min_nominator_stake: default_min_nominator_stake(),
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            stake_held_for: default_stake_held_for(),
            deposit_fee: default_deposit_fee(),
            proposal_ttl: default_proposal_ttl(),
        }
    }
}

impl Default for ElectorConfig {
    fn default() -> Self {
        Self {
            auto_reply: true,
            round_reward_bp: default_round_reward(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            journal_file: default_journal_file(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: DaemonConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Genesis pool config.
    pub fn genesis_config(&self) -> anyhow::Result<PoolConfig> {
        let config = PoolConfig {
            validator_address: parse_address("pool.validator_address", &self.pool.validator_address)?,
            validator_reward_share: self.pool.validator_reward_share,
            max_nominators_count: self.pool.max_nominators_count,
            min_validator_stake: self.pool.min_validator_stake,
            min_nominator_stake: self.pool.min_nominator_stake,
        };
        config.validate_static()?;
        Ok(config)
    }

    /// Operational settings for the lifecycle.
    pub fn pool_settings(&self) -> anyhow::Result<PoolSettings> {
        Ok(PoolSettings {
            pool_address: parse_address("pool.pool_address", &self.pool.pool_address)?,
            elector_address: parse_address("pool.elector_address", &self.pool.elector_address)?,
            deposit_fee: self.lifecycle.deposit_fee,
            proposal_ttl: self.lifecycle.proposal_ttl,
            stake_held_for: self.lifecycle.stake_held_for,
        })
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    /// Journal database path.
    pub fn journal_path(&self) -> PathBuf {
        self.data_dir().join(&self.storage.journal_file)
    }

    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("NOMPOOL_DATA_DIR") {
            return PathBuf::from(dir);
        }
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".nompool"))
            .unwrap_or_else(|_| PathBuf::from("/tmp/nompool"))
    }
}

/// Parse a 64-character hex address.
pub fn parse_address(field: &str, value: &str) -> anyhow::Result<Address> {
    let bytes = hex::decode(value).map_err(|e| anyhow::anyhow!("{field}: {e}"))?;
    Address::try_from(bytes.as_slice())
        .map_err(|_| anyhow::anyhow!("{field}: expected 32 bytes, got {}", bytes.len()))
}
