//! Liquidity and credit pools (spec §4: "LiquidityPool — constant-product
//! AMM with LP shares", "CreditPool — collateralised lending pool with
//! utilisation-based borrow rate").
use chain_primitives::{Amount, ChainError, Component, ErrorCode, Id};
use chain_store::Table;
use serde::{Deserialize, Serialize};

use crate::state::asset_registry::AssetId;

pub type LiquidityPoolId = Id<LiquidityPool>;
pub type CreditPoolId = Id<CreditPool>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityPool {
    pub id: LiquidityPoolId,
    pub asset_a: AssetId,
    pub balance_a: Amount,
    pub asset_b: AssetId,
    pub balance_b: Amount,
    pub total_shares: Amount,
    pub fee_bps: u32,
}

impl LiquidityPool {
    /// Constant-product invariant: `balance_a * balance_b` must never
    /// decrease across a swap (spec §4), ignoring the fee accrual which can
    /// only ever increase it.
    pub fn invariant(&self) -> Amount {
        self.balance_a.checked_mul(self.balance_b).unwrap_or(Amount::ZERO)
    }

    /// Output amount for swapping `amount_in` of `asset_a` for `asset_b`,
    /// net of `fee_bps`, using `x*y=k`.
    pub fn swap_a_for_b(&mut self, amount_in: Amount) -> Result<Amount, ChainError> {
        let fee = amount_in.checked_mul(Amount::from(i64::from(self.fee_bps))).and_then(|v| v.checked_div(Amount::from(10_000i64))).unwrap_or(Amount::ZERO);
        let amount_in_after_fee = amount_in.saturating_sub(fee);
        let new_balance_a = self.balance_a.checked_add(amount_in_after_fee).ok_or_else(|| overflow_err())?;
        let k = self.invariant();
        let new_balance_b = k.checked_div(new_balance_a).ok_or_else(|| overflow_err())?;
        if new_balance_b >= self.balance_b {
            return Err(chain_primitives::chain_error!(ErrorCode::OutOfRange, Component::MarketEngine, "swap would not decrease pool b balance"));
        }
        let amount_out = self.balance_b.saturating_sub(new_balance_b);
        self.balance_a = self.balance_a.checked_add(amount_in).ok_or_else(|| overflow_err())?;
        self.balance_b = new_balance_b;
        Ok(amount_out)
    }

    /// Mints LP shares proportional to the smaller of the two deposit
    /// ratios, following the teacher-adjacent "deposit matches existing
    /// ratio" convention used by constant-product pools generally.
    pub fn deposit(&mut self, amount_a: Amount, amount_b: Amount) -> Amount {
        if self.total_shares.is_zero() {
            self.balance_a = self.balance_a.saturating_add(amount_a);
            self.balance_b = self.balance_b.saturating_add(amount_b);
            let minted = amount_a.checked_mul(amount_b).and_then(|v| chain_primitives::isqrt_decimal(v)).unwrap_or(amount_a);
            self.total_shares = minted;
            return minted;
        }
        let share_a = amount_a.checked_mul(self.total_shares).and_then(|v| v.checked_div(self.balance_a)).unwrap_or(Amount::ZERO);
        let share_b = amount_b.checked_mul(self.total_shares).and_then(|v| v.checked_div(self.balance_b)).unwrap_or(Amount::ZERO);
        let minted = share_a.min(share_b);
        self.balance_a = self.balance_a.saturating_add(amount_a);
        self.balance_b = self.balance_b.saturating_add(amount_b);
        self.total_shares = self.total_shares.saturating_add(minted);
        minted
    }
}

fn overflow_err() -> ChainError {
    chain_primitives::chain_error!(ErrorCode::OutOfRange, Component::MarketEngine, "pool arithmetic overflowed")
}

/// Utilisation-based lending pool: `balance` is undeployed liquidity,
/// `borrowed` is currently out on [`crate::state::market::margin::MarginOrder`]s
/// against this pool (spec §4: "CreditPool").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditPool {
    pub id: CreditPoolId,
    pub asset: AssetId,
    pub balance: Amount,
    pub borrowed: Amount,
    pub total_shares: Amount,
    pub base_borrow_rate_bps: u32,
    pub max_borrow_rate_bps: u32,
}

impl CreditPool {
    pub fn utilisation_bps(&self) -> u32 {
        let total = self.balance.saturating_add(self.borrowed);
        if total.is_zero() {
            return 0;
        }
        self.borrowed
            .checked_mul(Amount::from(10_000i64))
            .and_then(|v| v.checked_div(total))
            .and_then(|v| rust_decimal::prelude::ToPrimitive::to_u32(&v.raw()))
            .unwrap_or(0)
    }

    /// Linear interpolation between `base_borrow_rate_bps` at 0%
    /// utilisation and `max_borrow_rate_bps` at 100% (spec §4).
    pub fn current_borrow_rate_bps(&self) -> u32 {
        let u = self.utilisation_bps().min(10_000);
        self.base_borrow_rate_bps + (self.max_borrow_rate_bps - self.base_borrow_rate_bps) * u / 10_000
    }
}

#[derive(Default)]
pub struct PoolBook {
    pub liquidity_pools: Table<LiquidityPoolId, LiquidityPool>,
    pub credit_pools: Table<CreditPoolId, CreditPool>,
    pub next_liquidity_id: chain_primitives::IdAllocator<LiquidityPool>,
    pub next_credit_id: chain_primitives::IdAllocator<CreditPool>,
}

impl chain_store::Transactional for PoolBook {
    fn begin_scope(&mut self) {
        self.liquidity_pools.begin_scope();
        self.credit_pools.begin_scope();
    }
    fn commit_scope(&mut self) {
        self.liquidity_pools.commit_scope();
        self.credit_pools.commit_scope();
    }
    fn abort_scope(&mut self) {
        self.liquidity_pools.abort_scope();
        self.credit_pools.abort_scope();
    }
}

impl PoolBook {
    pub fn create_liquidity_pool(&mut self, asset_a: AssetId, asset_b: AssetId, fee_bps: u32) -> LiquidityPoolId {
        let id = self.next_liquidity_id.allocate();
        self.liquidity_pools.insert(id, LiquidityPool { id, asset_a, balance_a: Amount::ZERO, asset_b, balance_b: Amount::ZERO, total_shares: Amount::ZERO, fee_bps });
        id
    }

    pub fn create_credit_pool(&mut self, asset: AssetId, base_borrow_rate_bps: u32, max_borrow_rate_bps: u32) -> CreditPoolId {
        let id = self.next_credit_id.allocate();
        self.credit_pools.insert(id, CreditPool { id, asset, balance: Amount::ZERO, borrowed: Amount::ZERO, total_shares: Amount::ZERO, base_borrow_rate_bps, max_borrow_rate_bps });
        id
    }

    pub fn borrow_from_credit_pool(&mut self, id: CreditPoolId, amount: Amount) -> Result<(), ChainError> {
        let pool = self.credit_pools.get(&id).ok_or_else(|| chain_primitives::chain_error!(ErrorCode::UnknownEntity, Component::MarketEngine, "no such credit pool {id}"))?;
        if pool.balance < amount {
            return Err(chain_primitives::chain_error!(ErrorCode::InsufficientBalance, Component::MarketEngine, "credit pool {id} has only {} undeployed", pool.balance));
        }
        self.credit_pools.modify(&id, |p| {
            p.balance = p.balance.saturating_sub(amount);
            p.borrowed = p.borrowed.saturating_add(amount);
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_increases_invariant_after_fee() {
        let mut pool = LiquidityPool { id: LiquidityPoolId::new(0), asset_a: AssetId::new(1), balance_a: Amount::from(1000i64), asset_b: AssetId::new(2), balance_b: Amount::from(1000i64), total_shares: Amount::from(1000i64), fee_bps: 30 };
        let before = pool.invariant();
        let out = pool.swap_a_for_b(Amount::from(100i64)).unwrap();
        assert!(out > Amount::ZERO);
        assert!(pool.invariant() >= before);
    }

    #[test]
    fn utilisation_and_rate_scale_with_borrowed_amount() {
        let pool = CreditPool { id: CreditPoolId::new(0), asset: AssetId::new(1), balance: Amount::from(500i64), borrowed: Amount::from(500i64), total_shares: Amount::ZERO, base_borrow_rate_bps: 200, max_borrow_rate_bps: 2_000 };
        assert_eq!(pool.utilisation_bps(), 5_000);
        assert_eq!(pool.current_borrow_rate_bps(), 1_100);
    }
}
