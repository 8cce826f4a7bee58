//! C8 — Producer Protocol (spec §4: BFT-style producer schedule, POW
//! entries, block verify/commit/irreversibility, violation slashing).
use chain_primitives::{Amount, ChainError, Component, Digest, ErrorCode, Id, PublicKey, Timestamp};
use chain_store::{OrderedIndex, Table};
use serde::{Deserialize, Serialize};

use crate::state::account::AccountId;

pub type ProducerId = Id<Producer>;

/// BFT safety threshold: a block is committed/irreversible once this share
/// of the active (DPOS+POW) schedule has voted for it (spec §4.8, the
/// classic `2f+1`-of-`3f+1` ~ 67% bound).
pub const IRREVERSIBLE_THRESHOLD_BPS: u32 = 6_667;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Producer {
    pub id: ProducerId,
    pub owner: AccountId,
    pub signing_key: PublicKey,
    pub url: String,
    pub total_missed: u64,
    pub last_aslot: u64,
    pub votes: u128,
    pub active: bool,
    /// Decayed accumulation of proof-of-work difficulty scores (spec §4.8,
    /// §C5: "top-mining producers by decayed mining power").
    pub mining_power: u128,
    /// Block a proof-of-work was last accepted for, rejecting a resubmit of
    /// the same block as evidence (spec §4.8 anti-replay).
    pub last_pow_block_id: Option<Digest>,
    /// Stake bonded behind this producer's most recent commit vote (spec
    /// §4.8: commits can only bond what is actually staked).
    pub committed_stake: Amount,
}

/// Producer rotation for one round, ordered by schedule slot (spec §4:
/// "deterministic, vote-weighted round-robin rotation"), plus the pool of
/// producers admitted by accumulated proof-of-work rather than by vote
/// (spec §C5 "DPOS+POW" hybrid schedule).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProducerSchedule {
    pub current_shuffled_producers: Vec<ProducerId>,
    pub mining_producers: Vec<ProducerId>,
    pub round_start_aslot: u64,
}

impl ProducerSchedule {
    pub fn producer_for_slot(&self, aslot: u64) -> Option<ProducerId> {
        if self.current_shuffled_producers.is_empty() {
            return None;
        }
        let offset = aslot.saturating_sub(self.round_start_aslot) as usize % self.current_shuffled_producers.len();
        self.current_shuffled_producers.get(offset).copied()
    }

    /// Size of the combined DPOS+POW active set, the denominator behind
    /// [`IRREVERSIBLE_THRESHOLD_BPS`] (spec §4.8).
    pub fn total_slot_count(&self) -> usize {
        self.current_shuffled_producers.len() + self.mining_producers.len()
    }
}

/// A signed block-validation vote from one producer, used to drive
/// irreversibility once `2f+1` of the active schedule have committed
/// (spec §4: BFT-style verify -> commit -> irreversible progression).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockValidation {
    pub producer: ProducerId,
    pub block_num: u64,
    pub block_id: Digest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolViolation {
    /// Signed two different blocks at the same height.
    DoubleProduction,
    /// Committed to a block height lower than one it had already committed.
    CommitRegression,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationReport {
    pub producer: ProducerId,
    pub violation: ProtocolViolation,
    /// Height at which the conflicting commits were made — the dedupe key
    /// for repeat reports, distinct from `detected_at_block`.
    pub height: u64,
    pub detected_at_block: u64,
}

#[derive(Default)]
pub struct ProducerBook {
    pub producers: Table<ProducerId, Producer>,
    pub by_votes: OrderedIndex<u128, ProducerId>,
    pub schedule: ProducerSchedule,
    pub validations: Table<(u64, ProducerId), BlockValidation>,
    /// Per-producer commit votes bonding stake behind a specific
    /// `(block_num, block_id)`, keyed the same way as `validations` (spec
    /// §4.8 commit phase).
    pub commitments: Table<(u64, ProducerId), Digest>,
    pub violations: Vec<ViolationReport>,
    pub next_id: chain_primitives::IdAllocator<Producer>,
}

impl chain_store::Transactional for ProducerBook {
    fn begin_scope(&mut self) {
        self.producers.begin_scope();
        self.by_votes.begin_scope();
        self.validations.begin_scope();
        self.commitments.begin_scope();
    }
    fn commit_scope(&mut self) {
        self.producers.commit_scope();
        self.by_votes.commit_scope();
        self.validations.commit_scope();
        self.commitments.commit_scope();
    }
    fn abort_scope(&mut self) {
        self.producers.abort_scope();
        self.by_votes.abort_scope();
        self.validations.abort_scope();
        self.commitments.abort_scope();
    }
}

impl ProducerBook {
    pub fn register(&mut self, owner: AccountId, signing_key: PublicKey, url: String) -> ProducerId {
        let id = self.next_id.allocate();
        self.producers.insert(
            id,
            Producer {
                id,
                owner,
                signing_key,
                url,
                total_missed: 0,
                last_aslot: 0,
                votes: 0,
                active: true,
                mining_power: 0,
                last_pow_block_id: None,
                committed_stake: Amount::ZERO,
            },
        );
        self.by_votes.add(0, id);
        id
    }

    pub fn adjust_votes(&mut self, producer: ProducerId, new_votes: u128) {
        let old_votes = self.producers.get(&producer).map(|p| p.votes).unwrap_or(0);
        self.by_votes.reindex(&old_votes, new_votes, &producer);
        self.producers.modify(&producer, |p| p.votes = new_votes);
    }

    /// Top `count` producers by vote weight, highest first — the input to
    /// schedule shuffling at each maintenance pass (spec §4).
    pub fn top_by_votes(&self, count: usize) -> Vec<ProducerId> {
        self.by_votes.iter_ascending().rev().flat_map(|(_, ids)| ids.iter().copied()).take(count).collect()
    }

    /// Records a validation vote for `(block_num, block_id)` from
    /// `producer`, flagging a [`ProtocolViolation::DoubleProduction`] if the
    /// producer had already validated a *different* block at that height.
    pub fn record_validation(&mut self, producer: ProducerId, block_num: u64, block_id: Digest, detected_at_block: u64) -> Result<(), ChainError> {
        if let Some(existing) = self.validations.get(&(block_num, producer)) {
            if existing.block_id != block_id {
                self.violations.push(ViolationReport { producer, violation: ProtocolViolation::DoubleProduction, height: block_num, detected_at_block });
                self.producers.modify(&producer, |p| p.active = false);
                return Err(chain_primitives::chain_error!(
                    ErrorCode::MissingAuthority,
                    Component::ProducerProtocol,
                    "producer {producer} double-signed block {block_num}"
                ));
            }
            return Ok(());
        }
        self.validations.insert((block_num, producer), BlockValidation { producer, block_num, block_id });
        Ok(())
    }

    /// Counts distinct validations committed for `block_num` matching
    /// `block_id` — the BFT "how many of the schedule have signed this"
    /// tally used to advance irreversibility.
    pub fn commit_count(&self, block_num: u64, block_id: Digest) -> usize {
        self.validations.iter().filter(|((num, _), v)| *num == block_num && v.block_id == block_id).count()
    }

    pub fn record_missed_slot(&mut self, producer: ProducerId) {
        self.producers.modify(&producer, |p| p.total_missed += 1);
    }

    pub fn record_produced_slot(&mut self, producer: ProducerId, aslot: u64) {
        self.producers.modify(&producer, |p| p.last_aslot = aslot);
    }

    /// Accepts one proof-of-work submission for `producer`, rejecting a
    /// repeat of the same `block_id` as evidence, and accrues `work`'s
    /// leading-zero-bit score onto the producer's decayed mining power
    /// (spec §4.8/§C5 miner accrual).
    pub fn record_proof_of_work(&mut self, producer: ProducerId, block_id: Digest, work: Digest) -> Result<(), ChainError> {
        let p = self.producers.get(&producer).ok_or_else(|| {
            chain_primitives::chain_error!(ErrorCode::UnknownEntity, Component::ProducerProtocol, "no such producer {producer}")
        })?;
        if p.last_pow_block_id == Some(block_id) {
            return Err(chain_primitives::chain_error!(
                ErrorCode::DuplicateId,
                Component::ProducerProtocol,
                "producer {producer} already submitted proof of work for block {block_id}"
            ));
        }
        let score = u128::from(work.leading_zero_bits());
        self.producers.modify(&producer, |p| {
            p.mining_power = p.mining_power.saturating_add(score);
            p.last_pow_block_id = Some(block_id);
        });
        Ok(())
    }

    /// Decays every producer's accumulated mining power by `decay_bps /
    /// 10000` (spec §C5), the same per-pass moving-window shape used
    /// elsewhere for participation tracking.
    pub fn decay_mining_power(&mut self, decay_bps: u32) {
        let ids: Vec<ProducerId> = self.producers.keys().copied().collect();
        for id in ids {
            self.producers.modify(&id, |p| p.mining_power = p.mining_power.saturating_mul(u128::from(decay_bps)) / 10_000);
        }
    }

    /// Top `count` producers by decayed mining power, highest first (spec
    /// §C5: the schedule's mining-admitted seats).
    pub fn top_by_mining_power(&self, count: usize) -> Vec<ProducerId> {
        let mut ranked: Vec<(u128, ProducerId)> = self.producers.iter().map(|(id, p)| (p.mining_power, *id)).collect();
        ranked.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        ranked.into_iter().take(count).map(|(_, id)| id).collect()
    }

    /// Verifies two conflicting commits at the same height from `producer`
    /// and records a dedicated violation report, rejecting a repeat report
    /// for the same `(producer, block_num)` pair (spec §8 producer-
    /// violation scenario).
    pub fn record_violation(&mut self, producer: ProducerId, block_num: u64, commit_a: Digest, commit_b: Digest, detected_at_block: u64) -> Result<(), ChainError> {
        if self.producers.get(&producer).is_none() {
            return Err(chain_primitives::chain_error!(ErrorCode::UnknownEntity, Component::ProducerProtocol, "no such producer {producer}"));
        }
        if commit_a == commit_b {
            return Err(chain_primitives::chain_error!(
                ErrorCode::OutOfRange,
                Component::ProducerProtocol,
                "commits must differ to prove a violation by producer {producer}"
            ));
        }
        if self.violations.iter().any(|v| v.producer == producer && v.height == block_num) {
            return Err(chain_primitives::chain_error!(
                ErrorCode::DuplicateId,
                Component::ProducerProtocol,
                "a violation for producer {producer} at block {block_num} was already reported"
            ));
        }
        self.violations.push(ViolationReport { producer, violation: ProtocolViolation::DoubleProduction, height: block_num, detected_at_block });
        self.producers.modify(&producer, |p| p.active = false);
        Ok(())
    }

    /// Records a BFT verification vote for `(block_num, block_id)`, then
    /// reports whether enough of the active DPOS+POW schedule have now
    /// verified the same block to advance irreversibility (spec §4.8 verify
    /// phase).
    pub fn verify_block(&mut self, producer: ProducerId, block_num: u64, block_id: Digest, schedule_size: usize) -> Result<bool, ChainError> {
        self.record_validation(producer, block_num, block_id, block_num)?;
        Ok(past_threshold(self.commit_count(block_num, block_id), schedule_size))
    }

    /// Records a commit vote for `(block_num, block_id)` from `producer`,
    /// bonding `stake` as its commitment, then reports whether enough
    /// distinct committers now back the same block to advance
    /// `last_committed_block_num` (spec §4.8 commit phase).
    pub fn commit_block(&mut self, producer: ProducerId, block_num: u64, block_id: Digest, stake: Amount, schedule_size: usize) -> Result<bool, ChainError> {
        if self.producers.get(&producer).is_none() {
            return Err(chain_primitives::chain_error!(ErrorCode::UnknownEntity, Component::ProducerProtocol, "no such producer {producer}"));
        }
        self.producers.modify(&producer, |p| p.committed_stake = stake);
        if self.commitments.get(&(block_num, producer)).is_none() {
            self.commitments.insert((block_num, producer), block_id);
        }
        let committers = self.commitments.iter().filter(|((num, _), id)| *num == block_num && **id == block_id).count();
        Ok(past_threshold(committers, schedule_size))
    }
}

/// Whether `count` votes clear [`IRREVERSIBLE_THRESHOLD_BPS`] of
/// `schedule_size`.
fn past_threshold(count: usize, schedule_size: usize) -> bool {
    if schedule_size == 0 {
        return false;
    }
    let required = (schedule_size as u128 * u128::from(IRREVERSIBLE_THRESHOLD_BPS)).div_ceil(10_000);
    u128::from(count as u64) >= required
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::account::AccountId;

    fn key(b: u8) -> PublicKey {
        let mut bytes = [0u8; 33];
        bytes[0] = b;
        PublicKey(bytes)
    }

    #[test]
    fn top_by_votes_is_descending() {
        let mut book = ProducerBook::default();
        let a = book.register(AccountId::new(1), key(1), "".into());
        let b = book.register(AccountId::new(2), key(2), "".into());
        book.adjust_votes(a, 10);
        book.adjust_votes(b, 50);
        assert_eq!(book.top_by_votes(2), vec![b, a]);
    }

    #[test]
    fn double_production_is_flagged_and_deactivates_producer() {
        let mut book = ProducerBook::default();
        let p = book.register(AccountId::new(1), key(1), "".into());
        book.record_validation(p, 10, Digest::ZERO, 10).unwrap();
        let mut other = Digest::ZERO;
        other.0[0] = 1;
        assert!(book.record_validation(p, 10, other, 11).is_err());
        assert!(!book.producers.get(&p).unwrap().active);
        assert_eq!(book.violations.len(), 1);
    }

    #[test]
    fn schedule_rotation_wraps_around() {
        let schedule = ProducerSchedule {
            current_shuffled_producers: vec![ProducerId::new(0), ProducerId::new(1), ProducerId::new(2)],
            round_start_aslot: 100,
            mining_producers: Vec::new(),
        };
        assert_eq!(schedule.producer_for_slot(100), Some(ProducerId::new(0)));
        assert_eq!(schedule.producer_for_slot(103), Some(ProducerId::new(0)));
        assert_eq!(schedule.producer_for_slot(104), Some(ProducerId::new(1)));
    }
}
