//! C9 — Evaluator Dispatch: the tagged-union `Operation` type and the
//! per-operation evaluators it routes to, plus the transaction/block
//! envelope that wraps [`chain_store::run_scoped`] around each (spec
//! §4.2-§4.8, §9 "dynamic dispatch over operations... match statement
//! calling the specific evaluator function").
use chain_primitives::{Amount, ChainResult, Digest, Price, PublicKey, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::state::account::{Authority, OperationClass};
use crate::state::asset_registry::AssetKind;
use crate::state::market::bitasset::PriceFeed;
use crate::state::market::option_order::{ExerciseStyle, OptionKind};
use crate::state::social::CommunityAccess;
use crate::state::Store;
use crate::prelude::*;

/// One signed operation: `{ signatory, operation_specific_fields,
/// extensions }` (spec §6 operation envelope). `extensions` is reserved for
/// forward-compatible per-operation additions and is intentionally unused
/// by every evaluator today.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedOperation {
    pub signatory: AccountId,
    pub operation: Operation,
}

/// Tagged union over every mutating operation the chain accepts. Scoped
/// down from the spec's full ~120-variant surface to one representative,
/// fully-evaluated operation per write path each component exposes;
/// `DESIGN.md` records the scoping decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
    // --- C3 Account & Authority ---
    CreateAccount { name: String, owner: Authority, active: Authority, posting: Authority, creation_fee: Amount },
    UpdateOwnerAuthority { account: AccountId, new_owner: Authority },
    SetProxy { account: AccountId, proxy: AccountId },
    RequestAccountRecovery { account_to_recover: AccountId, new_owner_authority: Authority, expires_at: Timestamp },

    // --- C1 Asset Registry ---
    CreateAsset { symbol: AssetSymbol, kind: AssetKind, issuer: AccountId, precision: u8 },
    IssueAsset { asset: AssetId, to: AccountId, amount: Amount },

    // --- C2 Balance Ledger ---
    Transfer { from: AccountId, to: AccountId, asset: AssetId, amount: Amount, memo: String },
    TransferToStake { account: AccountId, asset: AssetId, amount: Amount },
    BeginUnstake { account: AccountId, asset: AssetId, total: Amount, intervals: u32 },
    Delegate { from: AccountId, to: AccountId, asset: AssetId, amount: Amount },
    TransferToSavings { from: AccountId, to: AccountId, asset: AssetId, amount: Amount },
    WithdrawFromSavings { from: AccountId, to: AccountId, asset: AssetId, amount: Amount, memo: String, unlock_at: Timestamp },

    // --- C4 Market Engine ---
    CreateLimitOrder { seller: AccountId, sell_asset: AssetId, receive_asset: AssetId, for_sale: Amount, price: Price, expiration: Option<Timestamp>, fill_or_kill: bool },
    CancelLimitOrder { owner: AccountId, order: crate::state::market::limit::LimitOrderId },
    OpenMarginOrder { borrower: AccountId, debt_asset: AssetId, debt: Amount, collateral_asset: AssetId, collateral: Amount, open_ratio_bps: u32 },
    PublishPriceFeed { producer: ProducerId, asset: AssetId, feed: PriceFeed },
    GlobalSettle { asset: AssetId, price: Price, total_debt_collateral: Amount },
    CreateLiquidityPool { asset_a: AssetId, asset_b: AssetId, fee_bps: u32 },
    LiquidityPoolDeposit { pool: crate::state::market::pool::LiquidityPoolId, amount_a: Amount, amount_b: Amount },
    LiquidityPoolSwap { pool: crate::state::market::pool::LiquidityPoolId, amount_in: Amount },
    CreateCreditPool { asset: AssetId, base_borrow_rate_bps: u32, max_borrow_rate_bps: u32 },
    BorrowFromCreditPool { pool: crate::state::market::pool::CreditPoolId, amount: Amount },
    WriteOption { writer: AccountId, kind: OptionKind, underlying_asset: AssetId, strike: Price, expiration: Timestamp, style: ExerciseStyle, collateral_locked: Amount },
    ExerciseOption { order: crate::state::market::option_order::OptionOrderId },
    AssetSettle { holder: AccountId, asset: AssetId, amount_to_settle: Amount },
    BidCollateral { bidder: AccountId, asset: AssetId, additional_collateral: Amount, debt_covered: Amount },

    // --- C6 Social Graph ---
    CreateComment { author: AccountId, permlink: Permlink, parent: Option<CommentId>, community: Option<crate::state::social::CommunityId>, cashout_at: Option<Timestamp> },
    Vote { comment: CommentId, voter: AccountId, rshares: i128, weight_bps: i32 },
    CreateCommunity { founder: AccountId, name: String, access: CommunityAccess },

    // --- C7 Governance ---
    ProposeEnterprise { creator: AccountId, receiver: AccountId, title: String, milestones: Vec<crate::state::governance::Milestone>, total_budget: Amount, start_date: Timestamp, end_date: Timestamp },
    ApproveMilestone { proposal: crate::state::governance::EnterpriseProposalId, index: usize },

    // --- C8 Producer Protocol ---
    RegisterProducer { owner: AccountId, signing_key: PublicKey, url: String },
    VoteProducer { voter_stake_account: AccountId, producer: ProducerId, approve_votes: u128 },
    ProofOfWork { producer: ProducerId, block_id: Digest, work: Digest },
    VerifyBlock { producer: ProducerId, block_num: u64, block_id: Digest },
    CommitBlock { producer: ProducerId, block_num: u64, block_id: Digest, stake_asset: AssetId, commitment_stake: Amount },
    ProducerViolation { reporter: AccountId, producer: ProducerId, block_num: u64, commit_a: Digest, commit_b: Digest, stake_asset: AssetId, stake_a: Amount, stake_b: Amount },
}

impl Operation {
    /// The account this operation is primarily "about" (for authority
    /// resolution purposes) — most operations act on behalf of exactly one
    /// account, which is usually but not always `signatory`. `None` for
    /// operations with no single acting account (network-wide actions like
    /// publishing a price feed or settling a market).
    fn acting_account(&self) -> Option<AccountId> {
        use Operation::*;
        match self {
            CreateAccount { .. } => None,
            UpdateOwnerAuthority { account, .. } => Some(*account),
            SetProxy { account, .. } => Some(*account),
            RequestAccountRecovery { account_to_recover, .. } => Some(*account_to_recover),
            CreateAsset { issuer, .. } => Some(*issuer),
            IssueAsset { to, .. } => Some(*to),
            Transfer { from, .. } => Some(*from),
            TransferToStake { account, .. } => Some(*account),
            BeginUnstake { account, .. } => Some(*account),
            Delegate { from, .. } => Some(*from),
            TransferToSavings { from, .. } => Some(*from),
            WithdrawFromSavings { from, .. } => Some(*from),
            CreateLimitOrder { seller, .. } => Some(*seller),
            CancelLimitOrder { owner, .. } => Some(*owner),
            OpenMarginOrder { borrower, .. } => Some(*borrower),
            PublishPriceFeed { .. } => None,
            GlobalSettle { .. } => None,
            CreateLiquidityPool { .. } => None,
            LiquidityPoolDeposit { .. } => None,
            LiquidityPoolSwap { .. } => None,
            CreateCreditPool { .. } => None,
            BorrowFromCreditPool { .. } => None,
            WriteOption { writer, .. } => Some(*writer),
            ExerciseOption { .. } => None,
            AssetSettle { holder, .. } => Some(*holder),
            BidCollateral { bidder, .. } => Some(*bidder),
            CreateComment { author, .. } => Some(*author),
            Vote { voter, .. } => Some(*voter),
            CreateCommunity { founder, .. } => Some(*founder),
            ProposeEnterprise { creator, .. } => Some(*creator),
            ApproveMilestone { .. } => None,
            RegisterProducer { owner, .. } => Some(*owner),
            VoteProducer { voter_stake_account, .. } => Some(*voter_stake_account),
            ProofOfWork { .. } => None,
            VerifyBlock { .. } => None,
            CommitBlock { .. } => None,
            ProducerViolation { reporter, .. } => Some(*reporter),
        }
    }

    /// The business-role operation class this operation falls under, used
    /// when `signatory != acting_account` (spec §4).
    fn operation_class(&self) -> OperationClass {
        use Operation::*;
        match self {
            Transfer { .. } | TransferToStake { .. } | TransferToSavings { .. } | WithdrawFromSavings { .. } | Delegate { .. } => OperationClass::Transfer,
            CreateComment { .. } | Vote { .. } | CreateCommunity { .. } => OperationClass::Content,
            RegisterProducer { .. } | PublishPriceFeed { .. } | ProofOfWork { .. } | VerifyBlock { .. } | CommitBlock { .. } => OperationClass::Network,
            ProposeEnterprise { .. } | ApproveMilestone { .. } => OperationClass::Governance,
            VoteProducer { .. } => OperationClass::VoteExecutive,
            RequestAccountRecovery { .. } => OperationClass::Request,
            _ => OperationClass::General,
        }
    }
}

/// Checks that `signatory`'s active authority is satisfied by
/// `signing_keys`, and, if `signatory` differs from the operation's acting
/// account, that the acting account's business roles authorise `signatory`
/// for this operation's class (spec §4).
fn check_authority(store: &Store, signatory: AccountId, op: &Operation, signing_keys: &[PublicKey]) -> ChainResult<()> {
    let signatory_account = store
        .accounts
        .accounts
        .get(&signatory)
        .ok_or_else(|| chain_error!(ErrorCode::UnknownEntity, Component::AccountAuthority, "no such signatory account {signatory}"))?;
    let resolve = |id: AccountId| store.accounts.accounts.get(&id).map(|a| a.active.clone());
    if !signatory_account.active.is_satisfied(signing_keys, resolve) {
        chain_bail!(ErrorCode::SignatureInvalid, Component::AccountAuthority, "signatory {signatory}'s active authority is not satisfied");
    }

    if let Some(acting) = op.acting_account() {
        if acting != signatory {
            let acting_account = store
                .accounts
                .accounts
                .get(&acting)
                .ok_or_else(|| chain_error!(ErrorCode::UnknownEntity, Component::AccountAuthority, "no such account {acting}"))?;
            if !acting_account.is_authorized_for(op.operation_class()) {
                chain_bail!(
                    ErrorCode::MissingAuthority,
                    Component::AccountAuthority,
                    "{signatory} is not authorised to act for {acting} on {:?}",
                    op.operation_class()
                );
            }
        }
    }
    Ok(())
}

/// Evaluates one already-authority-checked operation against `store`.
fn evaluate(store: &mut Store, now: Timestamp, op: Operation) -> ChainResult<()> {
    use Operation::*;
    match op {
        CreateAccount { name, owner, active, posting, creation_fee } => {
            let required = store.globals.parameters.get().account_creation_fee;
            if creation_fee < required {
                chain_bail!(ErrorCode::InsufficientBalance, Component::AccountAuthority, "account creation fee {creation_fee} below required {required}");
            }
            store.accounts.create(name, owner, active, posting, now)?;
        }
        UpdateOwnerAuthority { account, new_owner } => {
            store.accounts.update_owner_authority(account, new_owner, now)?;
        }
        SetProxy { account, proxy } => {
            store.accounts.set_proxy(account, proxy)?;
        }
        RequestAccountRecovery { account_to_recover, new_owner_authority, expires_at } => {
            store.accounts.request_recovery(account_to_recover, new_owner_authority, expires_at);
        }
        CreateAsset { symbol, kind, issuer, precision } => {
            store.assets.create(symbol, kind, format!("{issuer}"), precision)?;
        }
        IssueAsset { asset, to, amount } => {
            store.assets.dynamic.modify(&asset, |d| {
                d.total_supply = d.total_supply.saturating_add(amount);
                d.liquid_supply = d.liquid_supply.saturating_add(amount);
            });
            store.balances.credit_liquid(to, asset, amount);
        }
        Transfer { from, to, asset, amount, memo: _ } => {
            store.balances.debit_liquid(from, asset, amount)?;
            store.balances.credit_liquid(to, asset, amount);
        }
        TransferToStake { account, asset, amount } => {
            store.balances.stake(account, asset, amount)?;
        }
        BeginUnstake { account, asset, total, intervals } => {
            let interval = chain_primitives::Duration::from_secs(store.globals.parameters.get().unstake_interval_secs);
            store.balances.begin_unstake(account, asset, total, intervals, now + interval)?;
        }
        Delegate { from, to, asset, amount } => {
            store.balances.delegate(from, to, asset, amount)?;
        }
        TransferToSavings { from, to, asset, amount } => {
            store.balances.debit_liquid(from, asset, amount)?;
            store.balances.credit_savings(to, asset, amount);
        }
        WithdrawFromSavings { from, to, asset, amount, memo, unlock_at } => {
            store.balances.request_savings_withdraw(from, to, asset, amount, memo, unlock_at)?;
        }
        CreateLimitOrder { seller, sell_asset, receive_asset, for_sale, price, expiration, fill_or_kill } => {
            let sell_symbol = store
                .assets
                .assets
                .get(&sell_asset)
                .ok_or_else(|| chain_error!(ErrorCode::UnknownEntity, Component::MarketEngine, "no such asset {sell_asset:?}"))?
                .symbol
                .clone();
            let receive_symbol = store
                .assets
                .assets
                .get(&receive_asset)
                .ok_or_else(|| chain_error!(ErrorCode::UnknownEntity, Component::MarketEngine, "no such asset {receive_asset:?}"))?
                .symbol
                .clone();
            if price.base_symbol != sell_symbol || price.quote_symbol != receive_symbol {
                chain_bail!(
                    ErrorCode::OutOfRange,
                    Component::MarketEngine,
                    "limit order price must be quoted as {sell_symbol}/{receive_symbol}"
                );
            }
            store.balances.debit_liquid(seller, sell_asset, for_sale)?;
            let id = store.market.limit_orders.next_id.allocate();
            let taker = LimitOrder { id, seller, sell_asset, receive_asset, for_sale, price, expiration, fill_or_kill };
            let (fills, remaining) = store.market.limit_orders.match_new_order(&taker);
            for fill in &fills {
                store.balances.credit_liquid(fill.resting_seller, sell_asset, fill.to_maker);
                store.balances.credit_liquid(seller, receive_asset, fill.to_taker);
            }
            if remaining.is_zero() {
                return Ok(());
            }
            if fill_or_kill {
                chain_bail!(
                    ErrorCode::WrongOrderState,
                    Component::MarketEngine,
                    "fill-or-kill order for {remaining} of asset {sell_asset:?} could not be fully filled"
                );
            }
            let mut resting = taker;
            resting.for_sale = remaining;
            store.market.limit_orders.place(resting);
        }
        CancelLimitOrder { owner, order } => {
            let cancelled = store.market.limit_orders.cancel(order)?;
            if cancelled.seller != owner {
                chain_bail!(ErrorCode::MissingAuthority, Component::MarketEngine, "only the order's seller may cancel it");
            }
            store.balances.credit_liquid(owner, cancelled.sell_asset, cancelled.for_sale);
        }
        OpenMarginOrder { borrower, debt_asset, debt, collateral_asset, collateral, open_ratio_bps } => {
            store.balances.debit_liquid(borrower, collateral_asset, collateral)?;
            store.market.margin.open(borrower, debt_asset, debt, collateral_asset, collateral, open_ratio_bps);
        }
        PublishPriceFeed { producer, asset, feed } => {
            if store.market.bitassets.markets.get(&asset).is_none() {
                store.market.bitassets.markets.insert(asset, crate::state::market::bitasset::BitassetData::new(asset, asset, chain_primitives::Duration::from_secs(3600)));
            }
            store.market.bitassets.markets.modify(&asset, |data| data.publish_feed(producer, feed));
        }
        GlobalSettle { asset, price, total_debt_collateral } => {
            let mut data = store
                .market
                .bitassets
                .markets
                .get(&asset)
                .ok_or_else(|| chain_error!(ErrorCode::UnknownEntity, Component::MarketEngine, "no such bitasset market {asset}"))?
                .clone();
            data.global_settle(price, total_debt_collateral)?;
            store.market.bitassets.markets.modify(&asset, |d| *d = data);
        }
        CreateLiquidityPool { asset_a, asset_b, fee_bps } => {
            store.market.pools.create_liquidity_pool(asset_a, asset_b, fee_bps);
        }
        LiquidityPoolDeposit { pool, amount_a, amount_b } => {
            store.market.pools.liquidity_pools.modify(&pool, |p| {
                p.deposit(amount_a, amount_b);
            });
        }
        LiquidityPoolSwap { pool, amount_in } => {
            let data = store
                .market
                .pools
                .liquidity_pools
                .get(&pool)
                .ok_or_else(|| chain_error!(ErrorCode::UnknownEntity, Component::MarketEngine, "no such liquidity pool {pool}"))?
                .clone();
            let mut data = data;
            data.swap_a_for_b(amount_in)?;
            store.market.pools.liquidity_pools.modify(&pool, |p| *p = data);
        }
        CreateCreditPool { asset, base_borrow_rate_bps, max_borrow_rate_bps } => {
            store.market.pools.create_credit_pool(asset, base_borrow_rate_bps, max_borrow_rate_bps);
        }
        BorrowFromCreditPool { pool, amount } => {
            store.market.pools.borrow_from_credit_pool(pool, amount)?;
        }
        WriteOption { writer, kind, underlying_asset, strike, expiration, style, collateral_locked } => {
            store.balances.debit_liquid(writer, underlying_asset, collateral_locked)?;
            store.market.options.write(writer, kind, underlying_asset, strike, expiration, style, collateral_locked);
        }
        ExerciseOption { order } => {
            store.market.options.exercise(order, now)?;
        }
        CreateComment { author, permlink, parent, community, cashout_at } => {
            store.social.post(author, permlink, parent, community, now, cashout_at)?;
        }
        Vote { comment, voter, rshares, weight_bps } => {
            store.social.vote(comment, voter, rshares, weight_bps, now.as_secs())?;
        }
        CreateCommunity { founder, name, access } => {
            store.social.create_community(name, access, founder);
        }
        ProposeEnterprise { creator, receiver, title, milestones, total_budget, start_date, end_date } => {
            store.governance.propose_enterprise(creator, receiver, title, milestones, total_budget, start_date, end_date)?;
        }
        ApproveMilestone { proposal, index } => {
            store.governance.approve_milestone(proposal, index)?;
        }
        RegisterProducer { owner, signing_key, url } => {
            store.producers.register(owner, signing_key, url);
        }
        VoteProducer { producer, approve_votes, .. } => {
            store.producers.adjust_votes(producer, approve_votes);
        }
        AssetSettle { holder, asset, amount_to_settle } => {
            store.balances.debit_liquid(holder, asset, amount_to_settle)?;
            let mut data = store
                .market
                .bitassets
                .markets
                .get(&asset)
                .ok_or_else(|| chain_error!(ErrorCode::UnknownEntity, Component::MarketEngine, "no such bitasset market {asset}"))?
                .clone();
            let collateral_asset = data.collateral_asset;
            let owed = data.asset_settle(amount_to_settle)?;
            store.market.bitassets.markets.modify(&asset, |d| *d = data);
            store.assets.dynamic.modify(&asset, |d| {
                d.total_supply = d.total_supply.saturating_sub(amount_to_settle);
                d.liquid_supply = d.liquid_supply.saturating_sub(amount_to_settle);
            });
            store.balances.credit_liquid(holder, collateral_asset, owed);
        }
        BidCollateral { bidder, asset, additional_collateral, debt_covered } => {
            let mut data = store
                .market
                .bitassets
                .markets
                .get(&asset)
                .ok_or_else(|| chain_error!(ErrorCode::UnknownEntity, Component::MarketEngine, "no such bitasset market {asset}"))?
                .clone();
            let collateral_asset = data.collateral_asset;
            if let Some(previous) = data.collateral_bids.iter().find(|b| b.bidder == bidder).map(|b| b.additional_collateral) {
                store.balances.credit_liquid(bidder, collateral_asset, previous);
            }
            store.balances.debit_liquid(bidder, collateral_asset, additional_collateral)?;
            data.bid_collateral(bidder, additional_collateral, debt_covered)?;
            let target_debt = store.assets.dynamic.get(&asset).map(|d| d.total_supply).unwrap_or(Amount::ZERO);
            if data.bids_cover_debt(target_debt) {
                let revival_price = data.settlement_price.clone().expect("bids_cover_debt implies settled");
                for bid in data.revive() {
                    let call_id = store.market.margin.next_call_id.allocate();
                    store.market.margin.call_orders.insert(
                        call_id,
                        CallOrder {
                            id: call_id,
                            borrower: bid.bidder,
                            debt_asset: asset,
                            debt: bid.debt_covered,
                            collateral_asset,
                            collateral: bid.additional_collateral,
                            call_price: revival_price.clone(),
                        },
                    );
                }
            }
            store.market.bitassets.markets.modify(&asset, |d| *d = data);
        }
        ProofOfWork { producer, block_id, work } => {
            let target_bits = store.globals.parameters.get().pow_target_bits;
            if work.leading_zero_bits() < target_bits {
                chain_bail!(ErrorCode::OutOfRange, Component::ProducerProtocol, "proof of work does not clear the {target_bits}-bit target");
            }
            store.producers.record_proof_of_work(producer, block_id, work)?;
            store.globals.dynamic.modify(|g| g.total_pow += 1);
        }
        VerifyBlock { producer, block_num, block_id } => {
            let schedule_size = store.producers.schedule.total_slot_count();
            let advanced = store.producers.verify_block(producer, block_num, block_id, schedule_size)?;
            if advanced {
                store.globals.dynamic.modify(|g| {
                    if block_num > g.last_irreversible_block_num {
                        g.last_irreversible_block_num = block_num;
                        g.last_irreversible_block_id = block_id;
                    }
                });
            }
        }
        CommitBlock { producer, block_num, block_id, stake_asset, commitment_stake } => {
            let owner = store
                .producers
                .producers
                .get(&producer)
                .ok_or_else(|| chain_error!(ErrorCode::UnknownEntity, Component::ProducerProtocol, "no such producer {producer}"))?
                .owner;
            let staked = store.balances.balances.get(&(owner, stake_asset)).map(|b| b.staked).unwrap_or(Amount::ZERO);
            if commitment_stake > staked {
                chain_bail!(
                    ErrorCode::InsufficientBalance,
                    Component::ProducerProtocol,
                    "producer {producer} cannot commit {commitment_stake}, only {staked} staked"
                );
            }
            let schedule_size = store.producers.schedule.total_slot_count();
            let advanced = store.producers.commit_block(producer, block_num, block_id, commitment_stake, schedule_size)?;
            if advanced {
                store.globals.dynamic.modify(|g| {
                    if block_num > g.last_committed_block_num {
                        g.last_committed_block_num = block_num;
                        g.last_committed_block_id = block_id;
                    }
                });
            }
        }
        ProducerViolation { reporter, producer, block_num, commit_a, commit_b, stake_asset, stake_a, stake_b } => {
            store.producers.record_violation(producer, block_num, commit_a, commit_b, block_num)?;
            let owner = store.producers.producers.get(&producer).expect("record_violation just confirmed this producer exists").owner;
            store.balances.slash_stake(owner, reporter, stake_asset, stake_a.max(stake_b));
        }
    }
    Ok(())
}

/// A transaction: an ordered batch of signed operations that commits or
/// rolls back atomically (spec §6 transaction envelope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub ref_block_num: u32,
    pub ref_block_prefix: u32,
    pub expiration: Timestamp,
    pub operations: Vec<SignedOperation>,
}

/// Applies every operation in `tx` inside one undo scope: all commit
/// together or the whole transaction rolls back (spec §4.1/§9).
#[instrument(skip(store, tx, signing_keys))]
pub fn apply_transaction(store: &mut Store, now: Timestamp, tx: &Transaction, signing_keys: &[PublicKey]) -> ChainResult<()> {
    if now >= tx.expiration {
        chain_bail!(ErrorCode::Expired, Component::EvaluatorDispatch, "transaction expired at {}", tx.expiration);
    }
    store.transact(|store| {
        for signed_op in &tx.operations {
            check_authority(store, signed_op.signatory, &signed_op.operation, signing_keys)?;
            evaluate(store, now, signed_op.operation.clone())?;
        }
        Ok(())
    })
}

/// A block: a producer-signed batch of transactions (spec §6 block
/// envelope). `previous_id`/`transaction_merkle_root`/`producer_signature`
/// are carried as opaque bytes here — their production and verification is
/// an external collaborator's concern (hashing, signing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub previous_id: Digest,
    pub timestamp: Timestamp,
    pub producer: ProducerId,
    pub transactions: Vec<Transaction>,
}

/// Applies every transaction in `block`: the block aborts as a whole if
/// any transaction fails (spec §9: "the block aborts if any transaction
/// fails"). `signing_keys_for` resolves the recovered signer set for a
/// given transaction — signature recovery itself is external.
pub fn apply_block(store: &mut Store, block: &Block, signing_keys_for: impl Fn(&Transaction) -> Vec<PublicKey>) -> ChainResult<()> {
    store.transact(|store| {
        for tx in &block.transactions {
            let keys = signing_keys_for(tx);
            apply_transaction(store, block.timestamp, tx, &keys)?;
        }
        store.globals.dynamic.modify(|g| {
            g.head_block_number += 1;
            g.time = block.timestamp;
        });
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(b: u8) -> PublicKey {
        let mut bytes = [0u8; 33];
        bytes[0] = b;
        PublicKey(bytes)
    }

    fn single_key_authority(k: PublicKey) -> Authority {
        let mut a = Authority { weight_threshold: 1, ..Default::default() };
        a.key_auths.insert(k, 1);
        a
    }

    #[test]
    fn transaction_rolls_back_entirely_on_a_later_operation_failure() {
        let mut store = Store::default();
        let alice = store.accounts.create("alice".into(), single_key_authority(key(1)), single_key_authority(key(1)), single_key_authority(key(1)), Timestamp::EPOCH).unwrap();
        let bob = store.accounts.create("bob".into(), single_key_authority(key(2)), single_key_authority(key(2)), single_key_authority(key(2)), Timestamp::EPOCH).unwrap();
        let asset = store.assets.create("COIN".parse().unwrap(), AssetKind::Currency, "genesis".into(), 3).unwrap();
        store.balances.credit_liquid(alice, asset, Amount::from(100i64));

        let tx = Transaction {
            ref_block_num: 0,
            ref_block_prefix: 0,
            expiration: Timestamp::from_secs(1_000_000),
            operations: vec![
                SignedOperation { signatory: alice, operation: Operation::Transfer { from: alice, to: bob, asset, amount: Amount::from(50i64), memo: String::new() } },
                // second transfer exceeds alice's remaining balance and must roll back the first transfer too
                SignedOperation { signatory: alice, operation: Operation::Transfer { from: alice, to: bob, asset, amount: Amount::from(100i64), memo: String::new() } },
            ],
        };
        let result = apply_transaction(&mut store, Timestamp::EPOCH, &tx, &[key(1)]);
        assert!(result.is_err());
        assert_eq!(store.balances.liquid_of(alice, asset), Amount::from(100i64));
        assert_eq!(store.balances.liquid_of(bob, asset), Amount::ZERO);
    }

    #[test]
    fn unsatisfied_authority_is_rejected_before_any_mutation() {
        let mut store = Store::default();
        let alice = store.accounts.create("alice".into(), single_key_authority(key(1)), single_key_authority(key(1)), single_key_authority(key(1)), Timestamp::EPOCH).unwrap();
        let asset = store.assets.create("COIN".parse().unwrap(), AssetKind::Currency, "genesis".into(), 3).unwrap();
        store.balances.credit_liquid(alice, asset, Amount::from(100i64));
        let tx = Transaction {
            ref_block_num: 0,
            ref_block_prefix: 0,
            expiration: Timestamp::from_secs(1_000_000),
            operations: vec![SignedOperation { signatory: alice, operation: Operation::Transfer { from: alice, to: alice, asset, amount: Amount::from(1i64), memo: String::new() } }],
        };
        // wrong signing key: alice's authority requires key(1)
        assert!(apply_transaction(&mut store, Timestamp::EPOCH, &tx, &[key(99)]).is_err());
        assert_eq!(store.balances.liquid_of(alice, asset), Amount::from(100i64));
    }
}
