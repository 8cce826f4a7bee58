//! Limit order book (spec §4: "LimitOrder — price-time priority, partial
//! fills, expiry").
use chain_primitives::{Amount, ChainError, Component, ErrorCode, Id, Price, Timestamp};
use chain_store::{OrderedIndex, Table};
use serde::{Deserialize, Serialize};

use crate::state::account::AccountId;
use crate::state::asset_registry::AssetId;

pub type LimitOrderId = Id<LimitOrder>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitOrder {
    pub id: LimitOrderId,
    pub seller: AccountId,
    pub sell_asset: AssetId,
    pub receive_asset: AssetId,
    pub for_sale: Amount,
    pub price: Price,
    pub expiration: Option<Timestamp>,
    pub fill_or_kill: bool,
}

impl LimitOrder {
    /// Amount of `receive_asset` this order would still receive if fully
    /// filled at its own limit price.
    pub fn receive_remaining(&self) -> Amount {
        self.price.convert_base_to_quote(self.for_sale).unwrap_or(Amount::ZERO)
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expiration.is_some_and(|exp| now >= exp)
    }
}

/// Price-time priority index: orders on the same market are ordered by
/// `(base_symbol, quote_symbol, rate)`, then insertion id for ties — the
/// quantised price key used for O(log n) best-price lookup (spec §4.1).
pub type MarketKey = (chain_primitives::AssetSymbol, chain_primitives::AssetSymbol, i128);

#[derive(Default)]
pub struct LimitOrderBook {
    pub orders: Table<LimitOrderId, LimitOrder>,
    pub by_market_price: OrderedIndex<MarketKey, LimitOrderId>,
    pub next_id: chain_primitives::IdAllocator<LimitOrder>,
}

impl chain_store::Transactional for LimitOrderBook {
    fn begin_scope(&mut self) {
        self.orders.begin_scope();
        self.by_market_price.begin_scope();
    }
    fn commit_scope(&mut self) {
        self.orders.commit_scope();
        self.by_market_price.commit_scope();
    }
    fn abort_scope(&mut self) {
        self.orders.abort_scope();
        self.by_market_price.abort_scope();
    }
}

fn market_key(order: &LimitOrder) -> MarketKey {
    // rate is quote-per-base scaled by 10^9 and reduced to an i128 so two
    // orders at the "same" price compare equal regardless of how their
    // (base_amount, quote_amount) pair was originally expressed.
    let rate = order.price.rate_scaled(1_000_000_000);
    (order.price.base_symbol.clone(), order.price.quote_symbol.clone(), rate)
}

impl LimitOrderBook {
    pub fn place(&mut self, order: LimitOrder) -> LimitOrderId {
        let id = order.id;
        let key = market_key(&order);
        self.orders.insert(id, order);
        self.by_market_price.add(key, id);
        id
    }

    pub fn cancel(&mut self, id: LimitOrderId) -> Result<LimitOrder, ChainError> {
        let order = self.orders.remove(&id).ok_or_else(|| {
            chain_primitives::chain_error!(ErrorCode::UnknownEntity, Component::MarketEngine, "no such limit order {id}")
        })?;
        self.by_market_price.remove(&market_key(&order), &id);
        Ok(order)
    }

    /// Reduces `id`'s `for_sale` by `filled`, removing the order entirely
    /// once it reaches zero. Re-indexes nothing since price didn't change.
    pub fn reduce(&mut self, id: LimitOrderId, filled: Amount) -> Result<(), ChainError> {
        let order = self.orders.get(&id).ok_or_else(|| {
            chain_primitives::chain_error!(ErrorCode::UnknownEntity, Component::MarketEngine, "no such limit order {id}")
        })?;
        if filled > order.for_sale {
            return Err(chain_primitives::chain_error!(
                ErrorCode::OutOfRange,
                Component::MarketEngine,
                "cannot fill {filled} against order {id} with only {} remaining",
                order.for_sale
            ));
        }
        let remaining = order.for_sale.saturating_sub(filled);
        if remaining.is_zero() {
            self.cancel(id)?;
        } else {
            self.orders.modify(&id, |o| o.for_sale = remaining);
        }
        Ok(())
    }

    /// Best (lowest ask / highest bid, by the index's own ordering) resting
    /// order for a given base/quote pair.
    pub fn best(&self, base: &chain_primitives::AssetSymbol, quote: &chain_primitives::AssetSymbol) -> Option<LimitOrderId> {
        self.by_market_price
            .range((base.clone(), quote.clone(), i128::MIN)..=(base.clone(), quote.clone(), i128::MAX))
            .next()
            .and_then(|(_, ids)| ids.iter().next().copied())
    }

    pub fn expire_due(&mut self, now: Timestamp) -> Vec<LimitOrderId> {
        let expired: Vec<LimitOrderId> = self.orders.iter().filter(|(_, o)| o.is_expired(now)).map(|(id, _)| *id).collect();
        for id in &expired {
            let _ = self.cancel(*id);
        }
        expired
    }

    /// Crosses `taker` against the opposing side of the book at the best
    /// available price, repeatedly, until it is fully filled or no resting
    /// order crosses its limit price any more (spec §4.4: new orders match
    /// immediately at the best opposing price, price-time priority, partial
    /// fills). Matched resting orders are reduced/cancelled in place; the
    /// taker itself is never inserted here, only matched against — callers
    /// decide whether to rest, or reject, whatever remains unfilled.
    ///
    /// Returns the fills applied (oldest match first) and the amount of
    /// `taker.sell_asset` still unfilled.
    pub fn match_new_order(&mut self, taker: &LimitOrder) -> (Vec<Fill>, Amount) {
        let mut remaining = taker.for_sale;
        let mut fills = Vec::new();
        loop {
            if remaining.is_zero() {
                break;
            }
            let Some(resting_id) = self.best(&taker.price.quote_symbol, &taker.price.base_symbol) else {
                break;
            };
            let resting = self.orders.get(&resting_id).expect("id came from the index").clone();
            if !crosses(&taker.price, &resting.price) {
                break;
            }
            let max_sell_for_full_fill = resting.price.convert_base_to_quote(resting.for_sale).unwrap_or(Amount::ZERO);
            let (to_maker, to_taker) = if !max_sell_for_full_fill.is_zero() && remaining >= max_sell_for_full_fill {
                (max_sell_for_full_fill, resting.for_sale)
            } else {
                let to_taker = resting.price.convert_quote_to_base(remaining).unwrap_or(Amount::ZERO).min(resting.for_sale);
                (remaining, to_taker)
            };
            if to_taker.is_zero() {
                break;
            }
            self.reduce(resting_id, to_taker).expect("fill amount is bounded by the resting order's remaining for_sale");
            fills.push(Fill { resting_order: resting_id, resting_seller: resting.seller, to_taker, to_maker });
            remaining = remaining.saturating_sub(to_maker);
        }
        (fills, remaining)
    }
}

/// One resting order consumed while matching a new order against the book:
/// `to_taker` of the new order's `receive_asset` paid to it, `to_maker` of
/// the new order's `sell_asset` paid to the resting order's seller.
#[derive(Debug, Clone, Copy)]
pub struct Fill {
    pub resting_order: LimitOrderId,
    pub resting_seller: AccountId,
    pub to_taker: Amount,
    pub to_maker: Amount,
}

/// True when an order priced at `taker_price` can immediately fill against
/// a resting order priced at `resting_price` (base/quote mirrored between
/// the two) — the resting side's rate is at least as good as what the
/// taker is willing to accept.
fn crosses(taker_price: &Price, resting_price: &Price) -> bool {
    const SCALE: i64 = 1_000_000_000;
    let taker_rate = taker_price.rate_scaled(SCALE);
    let resting_rate = resting_price.rate_scaled(SCALE);
    if taker_rate <= 0 || resting_rate <= 0 {
        return false;
    }
    taker_rate.saturating_mul(resting_rate) >= i128::from(SCALE) * i128::from(SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn order(id: u64, for_sale: i64, base_amt: i64, quote_amt: i64) -> LimitOrder {
        LimitOrder {
            id: LimitOrderId::new(id),
            seller: AccountId::new(1),
            sell_asset: AssetId::new(1),
            receive_asset: AssetId::new(2),
            for_sale: Amount::from(for_sale),
            price: Price {
                base_amount: Amount::from(base_amt),
                base_symbol: chain_primitives::AssetSymbol::from_str("BASE").unwrap(),
                quote_amount: Amount::from(quote_amt),
                quote_symbol: chain_primitives::AssetSymbol::from_str("QUOTE").unwrap(),
            },
            expiration: None,
            fill_or_kill: false,
        }
    }

    #[test]
    fn reduce_to_zero_removes_the_order() {
        let mut book = LimitOrderBook::default();
        let id = book.place(order(1, 100, 1, 2));
        book.reduce(id, Amount::from(100i64)).unwrap();
        assert!(book.orders.get(&id).is_none());
    }

    #[test]
    fn expire_due_cancels_past_expiration_orders() {
        let mut book = LimitOrderBook::default();
        let mut o = order(1, 100, 1, 2);
        o.expiration = Some(Timestamp::from_secs(10));
        let id = book.place(o);
        assert!(book.expire_due(Timestamp::from_secs(5)).is_empty());
        assert_eq!(book.expire_due(Timestamp::from_secs(10)), vec![id]);
    }
}
