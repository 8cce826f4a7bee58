//! C4 — Market Engine: limit order book, margin/call orders, collateral
//! auctions, bitasset feeds/settlement, liquidity & credit pools, and
//! option orders, composed behind one [`MarketBook`].
pub mod auction;
pub mod bitasset;
pub mod limit;
pub mod margin;
pub mod option_order;
pub mod pool;

use chain_store::Transactional;

#[derive(Default)]
pub struct MarketBook {
    pub limit_orders: limit::LimitOrderBook,
    pub margin: margin::MarginBook,
    pub auctions: auction::AuctionBook,
    pub bitassets: bitasset::BitassetBook,
    pub pools: pool::PoolBook,
    pub options: option_order::OptionBook,
}

impl Transactional for MarketBook {
    fn begin_scope(&mut self) {
        self.limit_orders.begin_scope();
        self.margin.begin_scope();
        self.auctions.begin_scope();
        self.bitassets.begin_scope();
        self.pools.begin_scope();
        self.options.begin_scope();
    }
    fn commit_scope(&mut self) {
        self.limit_orders.commit_scope();
        self.margin.commit_scope();
        self.auctions.commit_scope();
        self.bitassets.commit_scope();
        self.pools.commit_scope();
        self.options.commit_scope();
    }
    fn abort_scope(&mut self) {
        self.limit_orders.abort_scope();
        self.margin.abort_scope();
        self.auctions.abort_scope();
        self.bitassets.abort_scope();
        self.pools.abort_scope();
        self.options.abort_scope();
    }
}
