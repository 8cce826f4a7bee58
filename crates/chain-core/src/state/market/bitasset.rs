//! Bitasset price feeds, median computation, and global settlement (spec
//! §4: "BitassetData — producer price feeds, median computed every
//! maintenance pass, black-swan global settlement once collateral can no
//! longer cover debt at any price").
use chain_primitives::{Amount, ChainError, Component, ErrorCode, Id, Price, Timestamp};
use chain_store::Table;
use serde::{Deserialize, Serialize};

use crate::state::account::AccountId;
use crate::state::asset_registry::AssetId;
use crate::state::producer::ProducerId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceFeed {
    pub settlement_price: Price,
    pub maintenance_collateral_ratio_bps: u32,
    pub maximum_short_squeeze_ratio_bps: u32,
    pub published_at: Timestamp,
}

/// An offer of extra collateral to help revive a globally-settled market
/// (spec §4.4 S4: "bid_collateral/CollateralBid revive path").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralBid {
    pub bidder: AccountId,
    pub additional_collateral: Amount,
    pub debt_covered: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitassetData {
    pub backing_asset: AssetId,
    pub collateral_asset: AssetId,
    pub feeds: std::collections::BTreeMap<ProducerId, PriceFeed>,
    pub current_feed: Option<PriceFeed>,
    pub feed_lifetime: chain_primitives::Duration,
    pub force_settlement_offset_bps: u32,
    pub settled: bool,
    pub settlement_fund: Amount,
    pub settlement_price: Option<Price>,
    pub collateral_bids: Vec<CollateralBid>,
}

impl BitassetData {
    pub fn new(backing_asset: AssetId, collateral_asset: AssetId, feed_lifetime: chain_primitives::Duration) -> Self {
        BitassetData {
            backing_asset,
            collateral_asset,
            feeds: std::collections::BTreeMap::new(),
            current_feed: None,
            feed_lifetime,
            force_settlement_offset_bps: 0,
            settled: false,
            settlement_fund: Amount::ZERO,
            settlement_price: None,
            collateral_bids: Vec::new(),
        }
    }

    pub fn publish_feed(&mut self, producer: ProducerId, feed: PriceFeed) {
        self.feeds.insert(producer, feed);
    }

    /// Recomputes `current_feed` as the median of all feeds not yet expired
    /// per `feed_lifetime`, dropping stale entries first (spec §4: "expired
    /// feeds are pruned before the median is taken").
    pub fn recompute_median(&mut self, now: Timestamp) {
        self.feeds.retain(|_, feed| now.checked_duration_since(feed.published_at).is_none_or(|age| age <= self.feed_lifetime));
        if self.feeds.is_empty() {
            self.current_feed = None;
            return;
        }
        let mut rates: Vec<i128> = self.feeds.values().map(|f| f.settlement_price.rate_scaled(1_000_000_000)).collect();
        rates.sort_unstable();
        let median_rate = rates[rates.len() / 2];
        // Picks the published feed whose rate is closest to the computed
        // median rate, to preserve a real (base_amount, quote_amount) pair
        // rather than synthesising one from the scaled median alone.
        let chosen = self
            .feeds
            .values()
            .min_by_key(|f| (f.settlement_price.rate_scaled(1_000_000_000) - median_rate).abs())
            .cloned();
        self.current_feed = chosen;
    }

    /// True once the median collateralisation ratio for open short
    /// positions can no longer clear debt at any achievable price (spec §4:
    /// black swan event triggers immediate global settlement).
    pub fn check_black_swan(&self, least_collateralised_ratio_bps: u32) -> bool {
        match &self.current_feed {
            Some(feed) => least_collateralised_ratio_bps < feed.maintenance_collateral_ratio_bps,
            None => false,
        }
    }

    /// Freezes the market at `price`: no more borrows/shorts, existing debt
    /// holders may redeem at the frozen price (spec §4).
    pub fn global_settle(&mut self, price: Price, total_debt_collateral: Amount) -> Result<(), ChainError> {
        if self.settled {
            return Err(chain_primitives::chain_error!(
                ErrorCode::WrongOrderState,
                Component::MarketEngine,
                "bitasset already globally settled"
            ));
        }
        self.settled = true;
        self.settlement_price = Some(price);
        self.settlement_fund = total_debt_collateral;
        Ok(())
    }

    /// Redeems `amount_to_settle` of the bitasset against the settlement
    /// fund at the frozen price, rounded down, capped at what the fund
    /// still holds (spec §4.4 S4: holder redemption after a global
    /// settlement). Returns the collateral released.
    pub fn asset_settle(&mut self, amount_to_settle: Amount) -> Result<Amount, ChainError> {
        if !self.settled {
            return Err(chain_primitives::chain_error!(
                ErrorCode::WrongOrderState,
                Component::MarketEngine,
                "bitasset is not globally settled"
            ));
        }
        let price = self.settlement_price.as_ref().expect("settled implies a settlement price");
        let owed = price.convert_quote_to_base(amount_to_settle).unwrap_or(Amount::ZERO).min(self.settlement_fund);
        self.settlement_fund = self.settlement_fund.saturating_sub(owed);
        Ok(owed)
    }

    /// Places (or replaces) `bidder`'s revival bid. Only meaningful once the
    /// market is settled (spec §4.4 S4).
    pub fn bid_collateral(&mut self, bidder: AccountId, additional_collateral: Amount, debt_covered: Amount) -> Result<(), ChainError> {
        if !self.settled {
            return Err(chain_primitives::chain_error!(
                ErrorCode::WrongOrderState,
                Component::MarketEngine,
                "bitasset is not settled, no revival bid needed"
            ));
        }
        self.collateral_bids.retain(|b| b.bidder != bidder);
        if !additional_collateral.is_zero() || !debt_covered.is_zero() {
            self.collateral_bids.push(CollateralBid { bidder, additional_collateral, debt_covered });
        }
        Ok(())
    }

    /// True once pending bids cover at least `target_debt` of the market's
    /// outstanding debt, i.e. the market is eligible for revival.
    pub fn bids_cover_debt(&self, target_debt: Amount) -> bool {
        let covered = self.collateral_bids.iter().fold(Amount::ZERO, |acc, b| acc.saturating_add(b.debt_covered));
        !target_debt.is_zero() && covered >= target_debt
    }

    /// Reverts a settled market back to live trading, returning the
    /// consumed bids so the caller can open matching call orders against
    /// them (spec §4.4 S4).
    pub fn revive(&mut self) -> Vec<CollateralBid> {
        self.settled = false;
        self.settlement_price = None;
        self.settlement_fund = Amount::ZERO;
        std::mem::take(&mut self.collateral_bids)
    }
}

#[derive(Default)]
pub struct BitassetBook {
    pub markets: Table<AssetId, BitassetData>,
}

impl chain_store::Transactional for BitassetBook {
    fn begin_scope(&mut self) {
        self.markets.begin_scope();
    }
    fn commit_scope(&mut self) {
        self.markets.commit_scope();
    }
    fn abort_scope(&mut self) {
        self.markets.abort_scope();
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
    fn stale_feeds_are_pruned_before_median() {
        let mut data = BitassetData::new(AssetId::new(1), AssetId::new(2), chain_primitives::Duration::from_secs(3600));
        data.publish_feed(
            ProducerId::new(1),
            PriceFeed { settlement_price: px(1, 10), maintenance_collateral_ratio_bps: 17_500, maximum_short_squeeze_ratio_bps: 15_000, published_at: Timestamp::from_secs(0) },
        );
        data.recompute_median(Timestamp::from_secs(10_000));
        assert!(data.current_feed.is_none());
    }

    #[test]
    fn global_settle_is_idempotent_guarded() {
        let mut data = BitassetData::new(AssetId::new(1), AssetId::new(2), chain_primitives::Duration::from_secs(3600));
        data.global_settle(px(1, 10), Amount::from(1000i64)).unwrap();
        assert!(data.global_settle(px(1, 10), Amount::from(1000i64)).is_err());
    }
}
