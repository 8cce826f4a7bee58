//! Maintenance sweep: scheduled stake/unstake advancement, order expiry,
//! feed median recomputation, and comment cashouts, run once per
//! maintenance interval with explicitly bounded per-call work (spec §4/§9:
//! "no unbounded iteration inside a single block's application" — the same
//! concern the teacher's crank-style position/liquidation sweep addresses
//! by processing a capped batch per crank rather than the whole book at
//! once).
use chain_primitives::{Amount, Duration, Timestamp};
use tracing::{debug, info, instrument};

use crate::state::account::AccountId;
use crate::state::asset_registry::AssetId;
use crate::state::market::limit::{LimitOrder, LimitOrderId};
use crate::state::Store;

/// Per-maintenance-pass cap on how many due items of any one kind are
/// processed; callers that still have more work pending simply see it
/// picked up on the next pass (spec §9: "per-block work is bounded").
pub const MAX_ITEMS_PER_SWEEP: usize = 1_000;

/// Per call order, per sweep, how many times it may cross the book before
/// being left for the next pass (spec §4.4 S4 "check_call_orders driver").
const MAX_CALL_FILLS_PER_ORDER: usize = 8;

#[derive(Debug, Clone, Copy, Default)]
pub struct MaintenanceReport {
    pub savings_settled: usize,
    pub unstakes_advanced: usize,
    pub orders_expired: usize,
    pub options_expired: usize,
    pub comments_cashed_out: usize,
    pub feeds_recomputed: usize,
    pub call_orders_filled: usize,
}

/// Runs one maintenance pass over `store` at time `now`. Called once per
/// maintenance interval from the block-application path (spec §4.8).
#[instrument(skip(store))]
pub fn run_maintenance(store: &mut Store, now: Timestamp) -> MaintenanceReport {
    let mut report = MaintenanceReport::default();

    report.savings_settled = store.balances.settle_due_savings_withdrawals(now).len();

    let unstake_interval = Duration::from_secs(store.globals.parameters.get().unstake_interval_secs);
    let due_unstakes: Vec<(AccountId, AssetId)> = store
        .balances
        .balances
        .iter()
        .filter(|(_, b)| b.next_stake_withdraw.is_some_and(|due| now >= due))
        .map(|(key, _)| *key)
        .take(MAX_ITEMS_PER_SWEEP)
        .collect();
    for (account, asset) in &due_unstakes {
        store.balances.advance_unstake(*account, *asset, now, unstake_interval);
    }
    report.unstakes_advanced = due_unstakes.len();

    report.orders_expired = store.market.limit_orders.expire_due(now).len();
    report.options_expired = store.market.options.options.iter().filter(|(_, o)| !o.exercised && now > o.expiration).count().min(MAX_ITEMS_PER_SWEEP);
    store.market.options.expire_due(now);

    let due_comments: Vec<_> = store.social.due_for_cashout(now).into_iter().take(MAX_ITEMS_PER_SWEEP).collect();
    for comment in &due_comments {
        store.social.mark_paid_out(*comment, now);
    }
    report.comments_cashed_out = due_comments.len();

    let market_ids: Vec<_> = store.market.bitassets.markets.keys().copied().collect();
    for asset_id in market_ids {
        store.market.bitassets.markets.modify(&asset_id, |data| data.recompute_median(now));
        report.feeds_recomputed += 1;
        report.call_orders_filled += check_call_orders(store, asset_id);
    }

    let params = store.globals.parameters.get().clone();
    store.producers.decay_mining_power(params.mining_power_decay_bps);
    let mining_producers = store.producers.top_by_mining_power(params.mining_schedule_size);
    store.producers.schedule.mining_producers = mining_producers;

    store.globals.dynamic.modify(|g| g.time = now);

    if report.orders_expired > 0 || report.savings_settled > 0 {
        debug!(?report, "maintenance sweep made progress");
    }
    info!(at = now.as_secs(), "maintenance sweep complete");
    report
}

/// Drives one bitasset market's outstanding call orders against the limit
/// book, ascending by call price, until each is covered or the book can no
/// longer match it (spec §4.4 S4 "check_call_orders driver"). Returns the
/// number of fills applied. A settled (black-swan) market is left alone —
/// its debt is worked off via holder settlement and collateral bids
/// instead.
fn check_call_orders(store: &mut Store, asset: AssetId) -> usize {
    let Some(bitasset) = store.market.bitassets.markets.get(&asset) else {
        return 0;
    };
    if bitasset.settled {
        return 0;
    }
    let collateral_asset = bitasset.collateral_asset;

    let mut calls: Vec<_> = store.market.margin.call_orders.iter().filter(|(_, o)| o.debt_asset == asset).map(|(id, o)| (*id, o.call_price.rate_scaled(1_000_000_000))).collect();
    calls.sort_by_key(|(_, rate)| *rate);

    let mut fills_applied = 0;
    for (call_id, _) in calls {
        for _ in 0..MAX_CALL_FILLS_PER_ORDER {
            let Some(call) = store.market.margin.call_orders.get(&call_id).cloned() else {
                break;
            };
            if call.debt.is_zero() {
                break;
            }
            let taker = LimitOrder {
                id: LimitOrderId::new(0),
                seller: call.borrower,
                sell_asset: collateral_asset,
                receive_asset: asset,
                for_sale: call.collateral,
                price: call.call_price.clone(),
                expiration: None,
                fill_or_kill: false,
            };
            let (fills, _) = store.market.limit_orders.match_new_order(&taker);
            if fills.is_empty() {
                break;
            }
            let mut debt_repaid = Amount::ZERO;
            let mut collateral_released = Amount::ZERO;
            for fill in &fills {
                store.balances.credit_liquid(fill.resting_seller, collateral_asset, fill.to_maker);
                debt_repaid = debt_repaid.saturating_add(fill.to_taker);
                collateral_released = collateral_released.saturating_add(fill.to_maker);
            }
            debt_repaid = debt_repaid.min(call.debt);
            collateral_released = collateral_released.min(call.collateral);
            let _ = store.market.margin.fill_call(call_id, debt_repaid, collateral_released);
            store.assets.dynamic.modify(&asset, |d| {
                d.total_supply = d.total_supply.saturating_sub(debt_repaid);
                d.liquid_supply = d.liquid_supply.saturating_sub(debt_repaid);
            });
            fills_applied += fills.len();
        }
    }
    fills_applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::account::AccountId;
    use crate::state::asset_registry::AssetId;
    use chain_primitives::Amount;

    #[test]
    fn maintenance_settles_due_savings_withdrawals() {
        let mut store = Store::default();
        store.balances.balances.insert(
            (AccountId::new(1), AssetId::new(1)),
            crate::state::balance::AccountBalance { account: AccountId::new(1), asset: AssetId::new(1), savings: Amount::from(10i64), ..Default::default() },
        );
        store
            .balances
            .request_savings_withdraw(AccountId::new(1), AccountId::new(2), AssetId::new(1), Amount::from(10i64), String::new(), Timestamp::from_secs(100))
            .unwrap();
        let report = run_maintenance(&mut store, Timestamp::from_secs(100));
        assert_eq!(report.savings_settled, 1);
        assert_eq!(store.balances.liquid_of(AccountId::new(2), AssetId::new(1)), Amount::from(10i64));
    }
}
