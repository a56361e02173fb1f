//! Vote book, tally and resolution.
//!
//! ## Rules
//!
//! - Only nominators present in the ledger may vote. Re-casting overwrites
//!   the voter's previous vote on the same proposal.
//! - Weight is the voter's active `deposit` at resolution time.
//! - **Accepted** when `2 * support_weight > total_stake`. Acceptance is
//!   latched: the config waits for the next lifecycle-safe boundary and can no
//!   longer expire.
//! - **Rejected** (entry dropped) when every unit of stake has been cast
//!   without acceptance, or when [`DEFAULT_PROPOSAL_TTL`] (or the configured
//!   window) has elapsed since the first vote.
//! - Otherwise **Pending**.

use std::collections::BTreeMap;

use nompool_ledger::ledger::NominatorLedger;
use nompool_types::config::PoolConfig;
use nompool_types::{address_hex, Address, Coins, Hash, Timestamp};
use serde::{Deserialize, Serialize};

use crate::{GovernanceError, Result};

/// Default proposal expiry window (30 days in seconds).
pub const DEFAULT_PROPOSAL_TTL: u64 = 30 * 24 * 3600;

/// A single vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub support: bool,
    pub vote_time: Timestamp,
}

/// An open proposal and its votes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proposal {
    /// Candidate configuration.
    pub config: PoolConfig,
    /// Time of the first vote.
    pub opened_at: Timestamp,
    /// Set once the proposal reached a majority.
    pub accepted_at: Option<Timestamp>,
    votes: BTreeMap<Address, Vote>,
}

impl Proposal {
    /// Vote cast by an address, if any.
    pub fn vote_of(&self, address: &Address) -> Option<&Vote> {
        self.votes.get(address)
    }

    /// Number of distinct voters.
    pub fn voter_count(&self) -> usize {
        self.votes.len()
    }

    fn is_expired(&self, now: Timestamp, ttl: u64) -> bool {
        self.accepted_at.is_none() && now >= self.opened_at.saturating_add(ttl)
    }
}

/// Weighted tally of one proposal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub support_weight: Coins,
    pub cast_weight: Coins,
}

/// Why a proposal was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// All stake voted without a majority.
    Outvoted,
    /// Expiry window elapsed.
    Expired,
}

/// Result of resolving a proposal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Accepted,
    Pending,
    Rejected(RejectReason),
}

/// All open proposals for one pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GovernanceVoting {
    proposals: BTreeMap<Hash, Proposal>,
    current: Option<Hash>,
    ttl: u64,
}

impl Default for GovernanceVoting {
    fn default() -> Self {
        Self::new(DEFAULT_PROPOSAL_TTL)
    }
}

impl GovernanceVoting {
    /// Create an empty vote book with the given expiry window in seconds.
    pub fn new(ttl: u64) -> Self {
        Self {
            proposals: BTreeMap::new(),
            current: None,
            ttl,
        }
    }

    /// Record a vote on a candidate config. Returns the proposal id.
    ///
    /// Opens the proposal (and makes it current) if it is not in the book or
    /// had expired.
    ///
    /// # Errors
    ///
    /// - [`GovernanceError::Unauthorized`] if `address` is not a nominator
    /// - [`GovernanceError::ConfigRejected`] if the candidate fails static validation
    pub fn cast_vote(
        &mut self,
        address: Address,
        proposal_config: &PoolConfig,
        support: bool,
        now: Timestamp,
        ledger: &NominatorLedger,
    ) -> Result<Hash> {
        if !ledger.contains(&address) {
            return Err(GovernanceError::Unauthorized(address_hex(&address)));
        }
        proposal_config.validate_static()?;

        let id = proposal_config.proposal_id();
        if self
            .proposals
            .get(&id)
            .is_some_and(|p| p.is_expired(now, self.ttl))
        {
            self.proposals.remove(&id);
            tracing::info!(proposal = %hex::encode(id), "governance: expired proposal reopened");
        }

        let ttl = self.ttl;
        let proposal = self.proposals.entry(id).or_insert_with(|| {
            tracing::info!(
                proposal = %hex::encode(id),
                expires_at = now.saturating_add(ttl),
                "governance: proposal opened"
            );
            Proposal {
                config: proposal_config.clone(),
                opened_at: now,
                accepted_at: None,
                votes: BTreeMap::new(),
            }
        });
        let opened_now = proposal.votes.is_empty();
        proposal.votes.insert(
            address,
            Vote {
                support,
                vote_time: now,
            },
        );
        if opened_now {
            self.current = Some(id);
        }

        tracing::debug!(
            proposal = %hex::encode(id),
            voter = %address_hex(&address),
            support,
            "governance: vote recorded"
        );

        Ok(id)
    }

    /// Vote on the current proposal.
    ///
    /// # Errors
    ///
    /// [`GovernanceError::NoCurrentProposal`] if nothing is open, plus the
    /// errors of [`GovernanceVoting::cast_vote`].
    pub fn vote_current(
        &mut self,
        address: Address,
        support: bool,
        now: Timestamp,
        ledger: &NominatorLedger,
    ) -> Result<Hash> {
        let config = self
            .current
            .and_then(|id| self.proposals.get(&id))
            .map(|p| p.config.clone())
            .ok_or(GovernanceError::NoCurrentProposal)?;
        self.cast_vote(address, &config, support, now, ledger)
    }

    /// Weighted tally using current deposits.
    pub fn tally(&self, id: &Hash, ledger: &NominatorLedger) -> Result<Tally> {
        let proposal = self
            .proposals
            .get(id)
            .ok_or_else(|| GovernanceError::UnknownProposal(hex::encode(id)))?;

        let mut tally = Tally::default();
        for (voter, vote) in &proposal.votes {
            let weight = ledger.deposit_of(voter);
            tally.cast_weight = tally
                .cast_weight
                .checked_add(weight)
                .ok_or(GovernanceError::Overflow)?;
            if vote.support {
                tally.support_weight = tally
                    .support_weight
                    .checked_add(weight)
                    .ok_or(GovernanceError::Overflow)?;
            }
        }
        Ok(tally)
    }

    /// Resolve one proposal against `total_stake`.
    ///
    /// Rejected proposals are removed from the book. Accepted proposals stay
    /// (latched) until [`GovernanceVoting::take_accepted`].
    pub fn try_resolve(
        &mut self,
        id: &Hash,
        ledger: &NominatorLedger,
        total_stake: Coins,
        now: Timestamp,
    ) -> Result<Resolution> {
        let tally = self.tally(id, ledger)?;
        let ttl = self.ttl;
        let proposal = self
            .proposals
            .get_mut(id)
            .ok_or_else(|| GovernanceError::UnknownProposal(hex::encode(id)))?;

        if proposal.accepted_at.is_some() {
            return Ok(Resolution::Accepted);
        }

        if u128::from(tally.support_weight) * 2 > u128::from(total_stake) {
            proposal.accepted_at = Some(now);
            tracing::info!(
                proposal = %hex::encode(id),
                support = tally.support_weight,
                total_stake,
                "governance: proposal accepted"
            );
            return Ok(Resolution::Accepted);
        }

        // With no active stake nothing can be decided by turnout.
        let reason = if total_stake > 0 && tally.cast_weight >= total_stake {
            Some(RejectReason::Outvoted)
        } else if proposal.is_expired(now, ttl) {
            Some(RejectReason::Expired)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                self.remove(id);
                tracing::info!(
                    proposal = %hex::encode(id),
                    ?reason,
                    support = tally.support_weight,
                    cast = tally.cast_weight,
                    total_stake,
                    "governance: proposal rejected"
                );
                Ok(Resolution::Rejected(reason))
            }
            None => Ok(Resolution::Pending),
        }
    }

    /// Resolve every open proposal. Used at lifecycle boundaries so that
    /// expiry is applied lazily.
    pub fn resolve_all(
        &mut self,
        ledger: &NominatorLedger,
        total_stake: Coins,
        now: Timestamp,
    ) -> Result<Vec<(Hash, Resolution)>> {
        let ids: Vec<Hash> = self.proposals.keys().copied().collect();
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let resolution = self.try_resolve(&id, ledger, total_stake, now)?;
            results.push((id, resolution));
        }
        Ok(results)
    }

    /// Remove and return every latched proposal, oldest acceptance first.
    pub fn take_accepted(&mut self) -> Vec<(Hash, PoolConfig)> {
        let mut accepted: Vec<(Timestamp, Hash)> = self
            .proposals
            .iter()
            .filter_map(|(id, p)| p.accepted_at.map(|at| (at, *id)))
            .collect();
        accepted.sort();

        accepted
            .into_iter()
            .filter_map(|(_, id)| self.remove(&id).map(|p| (id, p.config)))
            .collect()
    }

    /// Drop a proposal, repointing `current` at the newest remaining one.
    pub fn remove(&mut self, id: &Hash) -> Option<Proposal> {
        let removed = self.proposals.remove(id);
        if self.current.as_ref() == Some(id) {
            self.current = self
                .proposals
                .iter()
                .max_by_key(|(pid, p)| (p.opened_at, **pid))
                .map(|(pid, _)| *pid);
        }
        removed
    }

    /// Proposal targeted by wire votes.
    pub fn current(&self) -> Option<Hash> {
        self.current
    }

    /// Look up a proposal.
    pub fn get(&self, id: &Hash) -> Option<&Proposal> {
        self.proposals.get(id)
    }

    /// Number of open proposals.
    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    /// Whether no proposal is open.
    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    /// Expiry window in seconds.
    pub fn ttl(&self) -> u64 {
        self.ttl
    }
}
