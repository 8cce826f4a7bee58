//! C5 — Reward Engine (spec §4: inflation split, reward curves, producer /
//! POW / activity payouts).
//!
//! Curve formulas and constants are carried over verbatim from
//! `original_source/libraries/chain/util/reward.cpp`: `quadratic` computes
//! `(rshares + s)^2 - s^2` in 128-bit width before truncating back down,
//! `quadratic_curation` additionally divides the result by the curve's own
//! `s` a second time, `linear` is the identity, and `square_root` takes
//! `approx_sqrt` of the (rshares + s) before subtracting `approx_sqrt(s)`.
use chain_primitives::{isqrt_u128, Amount};
use chain_store::Singleton;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardCurve {
    Quadratic,
    QuadraticCuration,
    Linear,
    SquareRoot,
}

impl RewardCurve {
    /// Evaluates the curve at `rshares` with curve constant `s`, both
    /// widened to `u128` to match the 128-bit intermediate product the
    /// reference implementation relies on to avoid truncation on the
    /// quadratic curves.
    pub fn evaluate(self, rshares: u128, s: u128) -> u128 {
        match self {
            RewardCurve::Quadratic => {
                let shifted = rshares.saturating_add(s);
                shifted.saturating_mul(shifted).saturating_sub(s.saturating_mul(s))
            }
            RewardCurve::QuadraticCuration => {
                let shifted = rshares.saturating_add(s);
                let base = shifted.saturating_mul(shifted).saturating_sub(s.saturating_mul(s));
                if s == 0 {
                    base
                } else {
                    base / s
                }
            }
            RewardCurve::Linear => rshares,
            RewardCurve::SquareRoot => isqrt_u128(rshares.saturating_add(s)).saturating_sub(isqrt_u128(s)),
        }
    }
}

/// Curation reward ramp: weight decays with both a time ramp (early voters
/// on a post earn more) and an ordinal position decay (spec §4: "curation
/// time ramp + ordinal decay + weight cap").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurationParams {
    pub decay_time_secs: u64,
    pub ordinal_decay_bps: u32,
    pub weight_cap_bps: u32,
}

impl CurationParams {
    /// Weight multiplier in basis points for a vote cast `elapsed_secs`
    /// after the post was created, at ordinal position `ordinal` (0 =
    /// first vote).
    pub fn curation_weight_bps(&self, elapsed_secs: u64, ordinal: u32) -> u32 {
        let time_factor_bps = if elapsed_secs >= self.decay_time_secs || self.decay_time_secs == 0 {
            0
        } else {
            10_000 - (10_000 * elapsed_secs / self.decay_time_secs) as u32
        };
        let ordinal_factor_bps = 10_000u32.saturating_sub(self.ordinal_decay_bps.saturating_mul(ordinal));
        let combined = (u64::from(time_factor_bps) * u64::from(ordinal_factor_bps) / 10_000) as u32;
        combined.min(self.weight_cap_bps)
    }
}

/// Per-block inflation split between content rewards, producer rewards and
/// network revenue (spec §4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardFund {
    pub content_reward_balance: Amount,
    pub producer_reward_balance: Amount,
    pub recent_claims: u128,
    pub curve: RewardCurve,
    pub content_constant: u128,
}

impl Default for RewardFund {
    fn default() -> Self {
        RewardFund {
            content_reward_balance: Amount::ZERO,
            producer_reward_balance: Amount::ZERO,
            recent_claims: 0,
            curve: RewardCurve::Quadratic,
            content_constant: 2_000_000_000_000u128,
        }
    }
}

impl RewardFund {
    /// Splits `new_inflation` between content and producer pools, and ages
    /// `recent_claims` toward zero by `content_reward_decay_rate` (spec §4:
    /// reward-fund exponential decay).
    pub fn distribute_inflation(&mut self, new_inflation: Amount, content_share_bps: u32, decay_rate_bps: u32) {
        let content = new_inflation
            .checked_mul(Amount::from(i64::from(content_share_bps)))
            .and_then(|v| v.checked_div(Amount::from(10_000i64)))
            .unwrap_or(Amount::ZERO);
        let producer = new_inflation.saturating_sub(content);
        self.content_reward_balance = self.content_reward_balance.saturating_add(content);
        self.producer_reward_balance = self.producer_reward_balance.saturating_add(producer);
        let decay = self.recent_claims.saturating_mul(u128::from(decay_rate_bps)) / 10_000;
        self.recent_claims = self.recent_claims.saturating_sub(decay);
    }

    /// Pays out a single content claim: `rshares`' share of
    /// `content_reward_balance` proportional to its curve-weighted value
    /// against `recent_claims` (already inclusive of this claim).
    ///
    /// Per the reference implementation's documented dust-clamp behaviour
    /// (preserved deliberately rather than "fixed"): a claim whose curve
    /// value rounds to fewer than one indivisible reward-token unit against
    /// the fund still consumes `rshares` from `recent_claims`, it simply
    /// pays zero — curation bots cannot "round up" free rewards by voting
    /// in many tiny claims.
    pub fn claim_content_reward(&mut self, rshares: u128) -> Amount {
        let claim_value = self.curve.evaluate(rshares, self.content_constant);
        self.recent_claims = self.recent_claims.saturating_add(claim_value);
        if self.recent_claims == 0 {
            return Amount::ZERO;
        }
        let payout = self
            .content_reward_balance
            .checked_mul(Amount::from(u64::try_from(claim_value.min(u128::from(u64::MAX))).unwrap_or(u64::MAX)))
            .and_then(|v| v.checked_div(Amount::from(u64::try_from(self.recent_claims.min(u128::from(u64::MAX))).unwrap_or(u64::MAX))))
            .unwrap_or(Amount::ZERO);
        self.content_reward_balance = self.content_reward_balance.saturating_sub(payout);
        payout
    }
}

pub struct RewardBook {
    pub fund: Singleton<RewardFund>,
    pub curation: Singleton<CurationParams>,
}

impl Default for RewardBook {
    fn default() -> Self {
        RewardBook {
            fund: Singleton::new(RewardFund::default()),
            curation: Singleton::new(CurationParams { decay_time_secs: 1_800, ordinal_decay_bps: 500, weight_cap_bps: 10_000 }),
        }
    }
}

impl chain_store::Transactional for RewardBook {
    fn begin_scope(&mut self) {
        self.fund.begin_scope();
        self.curation.begin_scope();
    }
    fn commit_scope(&mut self) {
        self.fund.commit_scope();
        self.curation.commit_scope();
    }
    fn abort_scope(&mut self) {
        self.fund.abort_scope();
        self.curation.abort_scope();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadratic_curve_matches_closed_form() {
        // (rshares + s)^2 - s^2 with rshares = 100, s = 10: (110^2) - (10^2)
        assert_eq!(RewardCurve::Quadratic.evaluate(100, 10), 12_100 - 100);
    }

    #[test]
    fn square_root_curve_matches_isqrt_difference() {
        assert_eq!(RewardCurve::SquareRoot.evaluate(84, 16), isqrt_u128(100) - isqrt_u128(16));
    }

    #[test]
    fn curation_weight_decays_with_time_and_ordinal() {
        let params = CurationParams { decay_time_secs: 1000, ordinal_decay_bps: 1000, weight_cap_bps: 10_000 };
        let early = params.curation_weight_bps(0, 0);
        let late = params.curation_weight_bps(900, 0);
        let later_voter = params.curation_weight_bps(0, 5);
        assert!(early > late);
        assert!(early > later_voter);
    }

    #[test]
    fn claim_with_zero_recent_claims_pays_full_share() {
        let mut fund = RewardFund { content_reward_balance: Amount::from(1000i64), ..Default::default() };
        let payout = fund.claim_content_reward(100);
        assert_eq!(payout, Amount::from(1000i64));
    }
}
