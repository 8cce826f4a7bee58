//! Auction orders (spec §4: "AuctionOrder — Dutch/ascending collateral
//! auction for under-collateralised credit-pool debt, minimum-collateral
//! floor").
use chain_primitives::{Amount, ChainError, Component, ErrorCode, Id, Timestamp};
use chain_store::Table;
use serde::{Deserialize, Serialize};

use crate::state::account::AccountId;
use crate::state::asset_registry::AssetId;

pub type AuctionOrderId = Id<AuctionOrder>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionOrder {
    pub id: AuctionOrderId,
    pub debtor: AccountId,
    pub debt_asset: AssetId,
    pub debt: Amount,
    pub collateral_asset: AssetId,
    pub starting_collateral: Amount,
    pub minimum_collateral: Amount,
    pub started_at: Timestamp,
    pub duration: chain_primitives::Duration,
}

impl AuctionOrder {
    /// Collateral offered linearly decays from `starting_collateral` at
    /// `started_at` down to `minimum_collateral` at `started_at + duration`
    /// — the spec's "ascending discount, descending collateral floor"
    /// Dutch-auction shape.
    pub fn collateral_offered_at(&self, now: Timestamp) -> Amount {
        let elapsed = now.checked_duration_since(self.started_at).unwrap_or_default().as_secs();
        let total = self.duration.as_secs().max(1);
        if elapsed >= total {
            return self.minimum_collateral;
        }
        let remaining_span = self.starting_collateral.saturating_sub(self.minimum_collateral);
        let decayed = remaining_span
            .checked_mul(Amount::from(total - elapsed))
            .and_then(|v| v.checked_div(Amount::from(total)))
            .unwrap_or(Amount::ZERO);
        self.minimum_collateral.saturating_add(decayed)
    }
}

#[derive(Default)]
pub struct AuctionBook {
    pub auctions: Table<AuctionOrderId, AuctionOrder>,
    pub next_id: chain_primitives::IdAllocator<AuctionOrder>,
}

impl chain_store::Transactional for AuctionBook {
    fn begin_scope(&mut self) {
        self.auctions.begin_scope();
    }
    fn commit_scope(&mut self) {
        self.auctions.commit_scope();
    }
    fn abort_scope(&mut self) {
        self.auctions.abort_scope();
    }
}

impl AuctionBook {
    pub fn start(&mut self, debtor: AccountId, debt_asset: AssetId, debt: Amount, collateral_asset: AssetId, starting_collateral: Amount, minimum_collateral: Amount, started_at: Timestamp, duration: chain_primitives::Duration) -> AuctionOrderId {
        let id = self.next_id.allocate();
        self.auctions.insert(id, AuctionOrder { id, debtor, debt_asset, debt, collateral_asset, starting_collateral, minimum_collateral, started_at, duration });
        id
    }

    pub fn settle(&mut self, id: AuctionOrderId) -> Result<AuctionOrder, ChainError> {
        self.auctions.remove(&id).ok_or_else(|| {
            chain_primitives::chain_error!(ErrorCode::UnknownEntity, Component::MarketEngine, "no such auction order {id}")
        })
    }
}
