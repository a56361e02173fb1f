//! Integration test crate for the nominator pool.
//!
//! The library half holds the shared scenario harness; the tests under
//! `tests/` drive whole pool lifecycles across the workspace crates.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p nompool-integration-tests
//! ```

use nompool_lifecycle::counterparty::RecordingCounterparty;
use nompool_lifecycle::{InboundMessage, Operation, Outcome, Pool, PoolData, PoolSettings};
use nompool_types::config::PoolConfig;
use nompool_types::{Address, Coins, Hash};

/// Base timestamp for test scenarios.
pub const BASE_TIME: u64 = 1_700_000_000;

pub const OPERATOR: Address = [0xAA; 32];
pub const ELECTOR: Address = [0x33; 32];
pub const POOL: Address = [0x50; 32];

/// Lock after the last validator-set change used by the scenarios.
pub const HELD_FOR: u64 = 3_600;

/// Deterministic nominator address.
pub fn nominator(n: u8) -> Address {
    let mut address = [0u8; 32];
    address[0] = 0x0E;
    address[31] = n;
    address
}

/// Scenario config: 10% operator share, ten seats, floors of 1000 and 100.
pub fn test_config() -> PoolConfig {
    PoolConfig {
        validator_address: OPERATOR,
        validator_reward_share: 1_000,
        max_nominators_count: 10,
        min_validator_stake: 1_000,
        min_nominator_stake: 100,
    }
}

/// Settings with no deposit fee and a one-hour lock.
pub fn test_settings() -> PoolSettings {
    let mut settings = PoolSettings::new(POOL, ELECTOR);
    settings.deposit_fee = 0;
    settings.stake_held_for = HELD_FOR;
    settings
}

/// Pool plus a clock. Every call to [`Harness::send`] advances time by one
/// second unless the clock is moved explicitly.
pub struct Harness {
    pub pool: Pool<RecordingCounterparty>,
    pub now: u64,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(test_config(), test_settings())
    }

    pub fn with(config: PoolConfig, settings: PoolSettings) -> Self {
        let data = PoolData::new(config, settings).expect("genesis config is valid");
        Self {
            pool: Pool::new(data, RecordingCounterparty::default()),
            now: BASE_TIME,
        }
    }

    pub fn data(&self) -> &PoolData {
        self.pool.data()
    }

    pub fn advance(&mut self, seconds: u64) {
        self.now += seconds;
    }

    pub fn send(&mut self, sender: Address, value: Coins, op: Operation) -> Outcome {
        self.now += 1;
        let msg = InboundMessage::new(sender, value, self.now, &op);
        self.pool.process(&msg)
    }

    /// Send and require a commit.
    pub fn commit(&mut self, sender: Address, value: Coins, op: Operation) -> Outcome {
        let name = op.name();
        let outcome = self.send(sender, value, op);
        assert!(outcome.is_committed(), "{name} should commit: {outcome:?}");
        outcome
    }

    pub fn deposit(&mut self, n: u8, amount: Coins) -> Outcome {
        self.commit(nominator(n), amount, Operation::Deposit)
    }

    /// Stake, confirm with `hash` and return the stake with `returned` after
    /// the lock expires.
    pub fn run_round(&mut self, hash: Hash, returned: impl FnOnce(Coins) -> Coins) {
        self.commit(OPERATOR, 0, Operation::Stake);
        let sent = self.data().stake_amount_sent;
        self.commit(
            ELECTOR,
            0,
            Operation::StakeConfirmed {
                validator_set_hash: hash,
            },
        );
        self.advance(HELD_FOR);
        self.commit(OPERATOR, 0, Operation::RecoverStake);
        self.commit(ELECTOR, returned(sent), Operation::StakeReturned);
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
