//! Margin / credit positions and forced call orders (spec §4: "MarginOrder
//! — collateralised borrow against a credit pool", "CallOrder — under-
//! collateralised margin position subject to forced settlement").
use chain_primitives::{Amount, ChainError, Component, ErrorCode, Id, Price};
use chain_store::Table;
use serde::{Deserialize, Serialize};

use crate::state::account::AccountId;
use crate::state::asset_registry::AssetId;

pub type MarginOrderId = Id<MarginOrder>;
pub type CallOrderId = Id<CallOrder>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginOrder {
    pub id: MarginOrderId,
    pub borrower: AccountId,
    pub debt_asset: AssetId,
    pub debt: Amount,
    pub collateral_asset: AssetId,
    pub collateral: Amount,
    pub open_ratio_bps: u32,
}

impl MarginOrder {
    /// Collateralisation ratio in basis points (`collateral-value * 10000 /
    /// debt-value`, both expressed in a common unit via `collateral_price`).
    pub fn collateral_ratio_bps(&self, collateral_price: &Price) -> Option<u32> {
        let collateral_value = collateral_price.convert_base_to_quote(self.collateral)?;
        if self.debt.is_zero() {
            return Some(u32::MAX);
        }
        let ratio = collateral_value.checked_mul(Amount::from(10_000i64))?.checked_div(self.debt)?;
        rust_decimal::prelude::ToPrimitive::to_u32(&ratio.raw())
    }

    /// True once the ratio drops below the liquidation threshold (spec §4).
    pub fn is_undercollateralised(&self, collateral_price: &Price, liquidation_ratio_bps: u32) -> bool {
        self.collateral_ratio_bps(collateral_price).is_none_or(|r| r < liquidation_ratio_bps)
    }
}

/// A forced call order created once a margin position (or a bitasset short)
/// falls below its maintenance ratio; filled preferentially against
/// matching limit orders at the call price (spec §4: margin calls).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallOrder {
    pub id: CallOrderId,
    pub borrower: AccountId,
    pub debt_asset: AssetId,
    pub debt: Amount,
    pub collateral_asset: AssetId,
    pub collateral: Amount,
    pub call_price: Price,
}

#[derive(Default)]
pub struct MarginBook {
    pub margin_orders: Table<MarginOrderId, MarginOrder>,
    pub call_orders: Table<CallOrderId, CallOrder>,
    pub next_margin_id: chain_primitives::IdAllocator<MarginOrder>,
    pub next_call_id: chain_primitives::IdAllocator<CallOrder>,
}

impl chain_store::Transactional for MarginBook {
    fn begin_scope(&mut self) {
        self.margin_orders.begin_scope();
        self.call_orders.begin_scope();
    }
    fn commit_scope(&mut self) {
        self.margin_orders.commit_scope();
        self.call_orders.commit_scope();
    }
    fn abort_scope(&mut self) {
        self.margin_orders.abort_scope();
        self.call_orders.abort_scope();
    }
}

impl MarginBook {
    pub fn open(&mut self, borrower: AccountId, debt_asset: AssetId, debt: Amount, collateral_asset: AssetId, collateral: Amount, open_ratio_bps: u32) -> MarginOrderId {
        let id = self.next_margin_id.allocate();
        self.margin_orders.insert(id, MarginOrder { id, borrower, debt_asset, debt, collateral_asset, collateral, open_ratio_bps });
        id
    }

    /// Converts an under-collateralised margin order into a [`CallOrder`],
    /// removing the original position (spec §4: forced liquidation path).
    pub fn force_call(&mut self, margin_id: MarginOrderId, call_price: Price) -> Result<CallOrderId, ChainError> {
        let order = self.margin_orders.remove(&margin_id).ok_or_else(|| {
            chain_primitives::chain_error!(ErrorCode::UnknownEntity, Component::MarketEngine, "no such margin order {margin_id}")
        })?;
        let id = self.next_call_id.allocate();
        self.call_orders.insert(
            id,
            CallOrder { id, borrower: order.borrower, debt_asset: order.debt_asset, debt: order.debt, collateral_asset: order.collateral_asset, collateral: order.collateral, call_price },
        );
        Ok(id)
    }

    /// Applies a partial (or full) fill against a call order, reducing both
    /// debt and collateral proportionally and removing it once debt reaches
    /// zero.
    pub fn fill_call(&mut self, id: CallOrderId, debt_repaid: Amount, collateral_released: Amount) -> Result<(), ChainError> {
        let order = self.call_orders.get(&id).ok_or_else(|| {
            chain_primitives::chain_error!(ErrorCode::UnknownEntity, Component::MarketEngine, "no such call order {id}")
        })?;
        if debt_repaid > order.debt || collateral_released > order.collateral {
            return Err(chain_primitives::chain_error!(
                ErrorCode::OutOfRange,
                Component::MarketEngine,
                "fill exceeds remaining debt/collateral on call order {id}"
            ));
        }
        let remaining_debt = order.debt.saturating_sub(debt_repaid);
        if remaining_debt.is_zero() {
            self.call_orders.remove(&id);
        } else {
            self.call_orders.modify(&id, |o| {
                o.debt = remaining_debt;
                o.collateral = o.collateral.saturating_sub(collateral_released);
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn px(base: i64, quote: i64) -> Price {
        Price::new(Amount::from(base), chain_primitives::AssetSymbol::from_str("BASE").unwrap(), Amount::from(quote), chain_primitives::AssetSymbol::from_str("QUOTE").unwrap())
    }

    #[test]
    fn undercollateralised_position_triggers_below_threshold() {
        let order = MarginOrder {
            id: MarginOrderId::new(0),
            borrower: AccountId::new(1),
            debt_asset: AssetId::new(1),
            debt: Amount::from(100i64),
            collateral_asset: AssetId::new(2),
            collateral: Amount::from(110i64),
            open_ratio_bps: 12_500,
        };
        // 1 collateral unit = 1 quote unit, so ratio = 11000bps
        assert!(order.is_undercollateralised(&px(1, 1), 12_500));
        assert!(!order.is_undercollateralised(&px(1, 1), 9_000));
    }

    #[test]
    fn force_call_then_full_fill_clears_the_order() {
        let mut book = MarginBook::default();
        let margin_id = book.open(AccountId::new(1), AssetId::new(1), Amount::from(100i64), AssetId::new(2), Amount::from(50i64), 12_500);
        let call_id = book.force_call(margin_id, px(1, 1)).unwrap();
        assert!(book.margin_orders.get(&margin_id).is_none());
        book.fill_call(call_id, Amount::from(100i64), Amount::from(50i64)).unwrap();
        assert!(book.call_orders.get(&call_id).is_none());
    }
}
