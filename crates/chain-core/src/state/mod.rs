//! Aggregate state: one `Store` composing every component's "book" of
//! tables/indices, generalising the teacher's `State`/`StateContext` split
//! (a shared read handle plus a per-transaction mutation context) to the
//! full indexed-store surface (spec §4.1/§9).
pub mod account;
pub mod asset_registry;
pub mod balance;
pub mod governance;
pub mod market;
pub mod producer;
pub mod reward;
pub mod social;

use chain_primitives::ChainResult;
use chain_store::Transactional;

use crate::globals::GlobalsBook;

/// The full indexed store: every entity table, secondary index and
/// singleton in the system, grouped by component. A `Store` is what gets
/// snapshotted/restored as a whole by [`chain_store::run_scoped`] around
/// each transaction and each block.
#[derive(Default)]
pub struct Store {
    pub globals: GlobalsBook,
    pub assets: asset_registry::AssetBook,
    pub balances: balance::BalanceBook,
    pub accounts: account::AccountBook,
    pub producers: producer::ProducerBook,
    pub market: market::MarketBook,
    pub reward: reward::RewardBook,
    pub social: social::SocialBook,
    pub governance: governance::GovernanceBook,
}

impl Transactional for Store {
    fn begin_scope(&mut self) {
        self.globals.begin_scope();
        self.assets.begin_scope();
        self.balances.begin_scope();
        self.accounts.begin_scope();
        self.producers.begin_scope();
        self.market.begin_scope();
        self.reward.begin_scope();
        self.social.begin_scope();
        self.governance.begin_scope();
    }
    fn commit_scope(&mut self) {
        self.globals.commit_scope();
        self.assets.commit_scope();
        self.balances.commit_scope();
        self.accounts.commit_scope();
        self.producers.commit_scope();
        self.market.commit_scope();
        self.reward.commit_scope();
        self.social.commit_scope();
        self.governance.commit_scope();
    }
    fn abort_scope(&mut self) {
        self.globals.abort_scope();
        self.assets.abort_scope();
        self.balances.abort_scope();
        self.accounts.abort_scope();
        self.producers.abort_scope();
        self.market.abort_scope();
        self.reward.abort_scope();
        self.social.abort_scope();
        self.governance.abort_scope();
    }
}

impl Store {
    /// Runs `f` inside one undo scope spanning every book at once, committing
    /// on `Ok` and rolling back the entire store on `Err` (spec §4.1: "a
    /// failed operation rolls back the entire transaction").
    pub fn transact<T>(&mut self, f: impl FnOnce(&mut Store) -> ChainResult<T>) -> ChainResult<T> {
        chain_store::run_scoped(self, f)
    }
}
