//! End-to-end scenarios driving the evaluator dispatch and maintenance sweep
//! together, in the style of the teacher's `multi_test` scenario harness
//! scaled down to one in-process builder.
use std::str::FromStr;

use chain_core::dispatch::{apply_transaction, Operation, SignedOperation, Transaction};
use chain_core::maintenance::run_maintenance;
use chain_core::prelude::*;
use chain_core::state::reward::CurationParams;

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

struct TestChain {
    store: Store,
}

impl TestChain {
    fn new() -> Self {
        TestChain { store: Store::default() }
    }

    fn create_account(&mut self, name: &str, signing_key: PublicKey) -> AccountId {
        let auth = single_key_authority(signing_key);
        self.store.accounts.create(name.into(), auth.clone(), auth.clone(), auth, Timestamp::EPOCH).unwrap()
    }

    fn create_asset(&mut self, symbol: &str) -> AssetId {
        self.store.assets.create(AssetSymbol::from_str(symbol).unwrap(), AssetKind::Currency, "genesis".into(), 3).unwrap()
    }

    fn apply_at(&mut self, now: Timestamp, signatory: AccountId, signing_key: PublicKey, operation: Operation) -> ChainResult<()> {
        let tx = Transaction { ref_block_num: 0, ref_block_prefix: 0, expiration: Timestamp::from_secs(u64::MAX / 2), operations: vec![SignedOperation { signatory, operation }] };
        apply_transaction(&mut self.store, now, &tx, &[signing_key])
    }
}

#[test]
fn basic_transfer_moves_liquid_balance_without_changing_supply() {
    let mut chain = TestChain::new();
    let ka = key(1);
    let alice = chain.create_account("alice", ka);
    let bob = chain.create_account("bob", key(2));
    let coin = chain.create_asset("COIN");
    chain.store.balances.credit_liquid(alice, coin, Amount::from(1000i64));
    chain.store.assets.dynamic.modify(&coin, |d| d.total_supply = Amount::from(1000i64));

    chain
        .apply_at(Timestamp::EPOCH, alice, ka, Operation::Transfer { from: alice, to: bob, asset: coin, amount: Amount::from(100i64), memo: String::new() })
        .unwrap();

    assert_eq!(chain.store.balances.liquid_of(alice, coin), Amount::from(900i64));
    assert_eq!(chain.store.balances.liquid_of(bob, coin), Amount::from(100i64));
    assert_eq!(chain.store.assets.dynamic.get(&coin).unwrap().total_supply, Amount::from(1000i64));
}

#[test]
fn proxy_cycle_is_rejected_and_leaves_the_proxy_unchanged() {
    let mut chain = TestChain::new();
    let kb = key(2);
    let alice = chain.create_account("alice", key(1));
    let bob = chain.create_account("bob", kb);
    chain.store.accounts.set_proxy(alice, bob).unwrap();

    let result = chain.apply_at(Timestamp::EPOCH, bob, kb, Operation::SetProxy { account: bob, proxy: alice });

    assert!(result.is_err());
    assert_eq!(chain.store.accounts.accounts.get(&bob).unwrap().proxy, None);
}

#[test]
fn stake_schedule_completes_after_the_configured_number_of_intervals() {
    let mut chain = TestChain::new();
    let ka = key(1);
    let alice = chain.create_account("alice", ka);
    let coin = chain.create_asset("COIN");
    chain.store.balances.credit_liquid(alice, coin, Amount::from(1000i64));

    chain.apply_at(Timestamp::EPOCH, alice, ka, Operation::TransferToStake { account: alice, asset: coin, amount: Amount::from(400i64) }).unwrap();
    chain.apply_at(Timestamp::EPOCH, alice, ka, Operation::BeginUnstake { account: alice, asset: coin, total: Amount::from(400i64), intervals: 4 }).unwrap();

    let week = 7 * 24 * 3600;
    for n in 1..=4u64 {
        run_maintenance(&mut chain.store, Timestamp::from_secs(n * week));
    }

    let balance = chain.store.balances.balances.get(&(alice, coin)).unwrap();
    assert_eq!(balance.staked, Amount::ZERO);
    assert_eq!(balance.liquid, Amount::from(1000i64));
    assert_eq!(balance.stake_withdraw_rate, Amount::from(100i64));
    assert_eq!(balance.remaining_stake_withdraw, Amount::ZERO);
    assert!(balance.next_stake_withdraw.is_none());
}

#[test]
fn bitasset_black_swan_freezes_the_market_at_the_feed_price() {
    let mut chain = TestChain::new();
    let producer_owner = chain.create_account("witness", key(9));
    let coin = chain.create_asset("COIN");
    let busd = chain.create_asset("BUSD");
    let producer = chain.store.producers.register(producer_owner, key(9), "https://witness.example".into());

    let healthy_feed = PriceFeed {
        settlement_price: Price::new(Amount::from(1i64), "COIN".parse().unwrap(), Amount::from(1i64), "BUSD".parse().unwrap()),
        maintenance_collateral_ratio_bps: 17_500,
        maximum_short_squeeze_ratio_bps: 15_000,
        published_at: Timestamp::EPOCH,
    };
    chain.apply_at(Timestamp::EPOCH, producer_owner, key(9), Operation::PublishPriceFeed { producer, asset: busd, feed: healthy_feed }).unwrap();
    run_maintenance(&mut chain.store, Timestamp::from_secs(1));
    // the worst open position sits at 200% collateralisation, comfortably
    // above the 175% maintenance ratio.
    assert!(!chain.store.market.bitassets.markets.get(&busd).unwrap().check_black_swan(20_000));

    // the feed price halves, so the same position now sits at 140%
    // collateralisation: below the 175% maintenance ratio.
    let crashed_feed = PriceFeed {
        settlement_price: Price::new(Amount::from(1i64), "COIN".parse().unwrap(), Amount::from(2i64), "BUSD".parse().unwrap()),
        maintenance_collateral_ratio_bps: 17_500,
        maximum_short_squeeze_ratio_bps: 15_000,
        published_at: Timestamp::from_secs(2),
    };
    chain.apply_at(Timestamp::from_secs(2), producer_owner, key(9), Operation::PublishPriceFeed { producer, asset: busd, feed: crashed_feed }).unwrap();
    run_maintenance(&mut chain.store, Timestamp::from_secs(3));
    assert!(chain.store.market.bitassets.markets.get(&busd).unwrap().check_black_swan(14_000));

    let settlement_price = Price::new(Amount::from(1i64), "COIN".parse().unwrap(), Amount::from(2i64), "BUSD".parse().unwrap());
    chain
        .apply_at(Timestamp::from_secs(4), producer_owner, key(9), Operation::GlobalSettle { asset: busd, price: settlement_price.clone(), total_debt_collateral: Amount::from(500i64) })
        .unwrap();
    let market = chain.store.market.bitassets.markets.get(&busd).unwrap();
    assert!(market.settled);
    assert_eq!(market.settlement_fund, Amount::from(500i64));

    // a second settlement of an already-settled market must be rejected.
    let result = chain.apply_at(
        Timestamp::from_secs(5),
        producer_owner,
        key(9),
        Operation::GlobalSettle { asset: busd, price: settlement_price, total_debt_collateral: Amount::from(500i64) },
    );
    assert!(result.is_err());
}

#[test]
fn curation_weight_decays_with_both_the_time_ramp_and_ordinal_position() {
    let params = CurationParams { decay_time_secs: 600, ordinal_decay_bps: 100, weight_cap_bps: 10_000 };

    let first_vote_at_post_time = params.curation_weight_bps(0, 0);
    let second_vote_five_minutes_later = params.curation_weight_bps(300, 1);

    // time ramp alone would halve the weight (300/600 elapsed); the ordinal
    // decay on top of that pushes the second voter's weight further below
    // half of the first voter's.
    assert!(second_vote_five_minutes_later < first_vote_at_post_time / 2);
    assert!(second_vote_five_minutes_later > 0);
}

#[test]
fn a_new_limit_order_matches_immediately_against_the_resting_book() {
    let mut chain = TestChain::new();
    let alice = chain.create_account("alice", key(1));
    let bob = chain.create_account("bob", key(2));
    let coin = chain.create_asset("COIN");
    let busd = chain.create_asset("BUSD");
    chain.store.balances.credit_liquid(bob, busd, Amount::from(100i64));
    chain.store.balances.credit_liquid(alice, coin, Amount::from(50i64));

    let rate_1_to_1 = |base: &str, quote: &str| Price::new(Amount::from(1i64), base.parse().unwrap(), Amount::from(1i64), quote.parse().unwrap());

    // bob rests an order selling BUSD for COIN.
    chain
        .apply_at(
            Timestamp::EPOCH,
            bob,
            key(2),
            Operation::CreateLimitOrder { seller: bob, sell_asset: busd, receive_asset: coin, for_sale: Amount::from(100i64), price: rate_1_to_1("BUSD", "COIN"), expiration: None, fill_or_kill: false },
        )
        .unwrap();

    // alice's new order sells COIN for BUSD and should cross immediately.
    chain
        .apply_at(
            Timestamp::EPOCH,
            alice,
            key(1),
            Operation::CreateLimitOrder { seller: alice, sell_asset: coin, receive_asset: busd, for_sale: Amount::from(50i64), price: rate_1_to_1("COIN", "BUSD"), expiration: None, fill_or_kill: false },
        )
        .unwrap();

    assert_eq!(chain.store.balances.liquid_of(alice, coin), Amount::ZERO);
    assert_eq!(chain.store.balances.liquid_of(alice, busd), Amount::from(50i64));
    assert_eq!(chain.store.balances.liquid_of(bob, coin), Amount::from(50i64));
    let resting = chain.store.market.limit_orders.orders.iter().next().unwrap().1;
    assert_eq!(resting.seller, bob);
    assert_eq!(resting.for_sale, Amount::from(50i64));
}

#[test]
fn a_fill_or_kill_order_that_cannot_be_fully_matched_rolls_back_entirely() {
    let mut chain = TestChain::new();
    let alice = chain.create_account("alice", key(1));
    let bob = chain.create_account("bob", key(2));
    let coin = chain.create_asset("COIN");
    let busd = chain.create_asset("BUSD");
    chain.store.balances.credit_liquid(bob, busd, Amount::from(20i64));
    chain.store.balances.credit_liquid(alice, coin, Amount::from(50i64));

    let rate_1_to_1 = |base: &str, quote: &str| Price::new(Amount::from(1i64), base.parse().unwrap(), Amount::from(1i64), quote.parse().unwrap());

    chain
        .apply_at(
            Timestamp::EPOCH,
            bob,
            key(2),
            Operation::CreateLimitOrder { seller: bob, sell_asset: busd, receive_asset: coin, for_sale: Amount::from(20i64), price: rate_1_to_1("BUSD", "COIN"), expiration: None, fill_or_kill: false },
        )
        .unwrap();

    let result = chain.apply_at(
        Timestamp::EPOCH,
        alice,
        key(1),
        Operation::CreateLimitOrder { seller: alice, sell_asset: coin, receive_asset: busd, for_sale: Amount::from(50i64), price: rate_1_to_1("COIN", "BUSD"), expiration: None, fill_or_kill: true },
    );

    assert!(result.is_err());
    assert_eq!(chain.store.balances.liquid_of(alice, coin), Amount::from(50i64));
    assert_eq!(chain.store.balances.liquid_of(alice, busd), Amount::ZERO);
    assert_eq!(chain.store.market.limit_orders.orders.iter().find(|(_, o)| o.seller == bob).unwrap().1.for_sale, Amount::from(20i64));
}

#[test]
fn producer_violation_slashes_stake_to_the_reporter() {
    let mut chain = TestChain::new();
    let producer_owner = chain.create_account("witness", key(9));
    let reporter = chain.create_account("reporter", key(3));
    let coin = chain.create_asset("COIN");
    let producer = chain.store.producers.register(producer_owner, key(9), "https://witness.example".into());
    chain.store.balances.balances.insert((producer_owner, coin), AccountBalance { account: producer_owner, asset: coin, staked: Amount::from(1_000i64), ..Default::default() });

    let mut commit_a = Digest::ZERO;
    commit_a.0[0] = 1;
    let mut commit_b = Digest::ZERO;
    commit_b.0[0] = 2;

    chain
        .apply_at(
            Timestamp::EPOCH,
            reporter,
            key(3),
            Operation::ProducerViolation { reporter, producer, block_num: 50, commit_a, commit_b, stake_asset: coin, stake_a: Amount::from(300i64), stake_b: Amount::from(700i64) },
        )
        .unwrap();

    assert!(!chain.store.producers.producers.get(&producer).unwrap().active);
    assert_eq!(chain.store.producers.violations.len(), 1);
    assert_eq!(chain.store.balances.balances.get(&(producer_owner, coin)).unwrap().staked, Amount::from(300i64));
    assert_eq!(chain.store.balances.balances.get(&(reporter, coin)).unwrap().staked, Amount::from(700i64));
}

#[test]
fn proof_of_work_accrues_mining_power_and_enters_the_schedule() {
    let mut chain = TestChain::new();
    let owner = chain.create_account("miner", key(9));
    let producer = chain.store.producers.register(owner, key(9), "https://miner.example".into());

    let mut block_id = Digest::ZERO;
    block_id.0[0] = 1;

    chain.apply_at(Timestamp::EPOCH, owner, key(9), Operation::ProofOfWork { producer, block_id, work: Digest::ZERO }).unwrap();

    assert!(chain.store.producers.producers.get(&producer).unwrap().mining_power > 0);
    assert_eq!(chain.store.globals.dynamic.get().total_pow, 1);

    // resubmitting the same block as evidence must be rejected.
    assert!(chain.apply_at(Timestamp::EPOCH, owner, key(9), Operation::ProofOfWork { producer, block_id, work: Digest::ZERO }).is_err());

    run_maintenance(&mut chain.store, Timestamp::from_secs(1));
    assert_eq!(chain.store.producers.schedule.mining_producers, vec![producer]);
}

#[test]
fn verify_then_commit_advances_irreversible_and_committed_heights() {
    let mut chain = TestChain::new();
    let owner = chain.create_account("witness", key(9));
    let producer = chain.store.producers.register(owner, key(9), "https://witness.example".into());
    chain.store.producers.schedule.current_shuffled_producers = vec![producer];
    let coin = chain.create_asset("COIN");
    chain.store.balances.balances.insert((owner, coin), AccountBalance { account: owner, asset: coin, staked: Amount::from(500i64), ..Default::default() });

    let mut block_id = Digest::ZERO;
    block_id.0[0] = 9;

    chain.apply_at(Timestamp::EPOCH, owner, key(9), Operation::VerifyBlock { producer, block_num: 10, block_id }).unwrap();
    assert_eq!(chain.store.globals.dynamic.get().last_irreversible_block_num, 10);

    chain
        .apply_at(Timestamp::EPOCH, owner, key(9), Operation::CommitBlock { producer, block_num: 10, block_id, stake_asset: coin, commitment_stake: Amount::from(500i64) })
        .unwrap();
    assert_eq!(chain.store.globals.dynamic.get().last_committed_block_num, 10);
}

#[test]
fn holder_redemption_and_collateral_bid_revive_a_settled_market() {
    let mut chain = TestChain::new();
    let holder = chain.create_account("holder", key(2));
    let bidder = chain.create_account("bidder", key(3));
    let coin = chain.create_asset("COIN");
    let busd = chain.create_asset("BUSD");
    chain.store.market.bitassets.markets.insert(busd, BitassetData::new(busd, coin, Duration::from_secs(3600)));

    chain.store.balances.credit_liquid(holder, busd, Amount::from(100i64));
    chain.store.assets.dynamic.modify(&busd, |d| {
        d.total_supply = Amount::from(100i64);
        d.liquid_supply = Amount::from(100i64);
    });
    chain.store.balances.credit_liquid(bidder, coin, Amount::from(1_000i64));

    let settlement_price = Price::new(Amount::from(1i64), "COIN".parse().unwrap(), Amount::from(1i64), "BUSD".parse().unwrap());
    chain.store.market.bitassets.markets.modify(&busd, |d| d.global_settle(settlement_price, Amount::from(1_000i64)).unwrap());

    chain.apply_at(Timestamp::from_secs(1), holder, key(2), Operation::AssetSettle { holder, asset: busd, amount_to_settle: Amount::from(40i64) }).unwrap();
    assert_eq!(chain.store.balances.liquid_of(holder, busd), Amount::from(60i64));
    assert_eq!(chain.store.balances.liquid_of(holder, coin), Amount::from(40i64));
    assert_eq!(chain.store.assets.dynamic.get(&busd).unwrap().total_supply, Amount::from(60i64));

    // the remaining 60 BUSD of circulating debt is fully covered by one bid.
    chain
        .apply_at(Timestamp::from_secs(2), bidder, key(3), Operation::BidCollateral { bidder, asset: busd, additional_collateral: Amount::from(60i64), debt_covered: Amount::from(60i64) })
        .unwrap();

    let market = chain.store.market.bitassets.markets.get(&busd).unwrap();
    assert!(!market.settled);
    assert!(market.collateral_bids.is_empty());
    assert_eq!(chain.store.market.margin.call_orders.len(), 1);
}

#[test]
fn a_producers_double_signed_block_is_flagged_and_deactivates_it() {
    let mut chain = TestChain::new();
    let owner = chain.create_account("witness", key(9));
    let producer = chain.store.producers.register(owner, key(9), "https://witness.example".into());

    chain.store.producers.record_validation(producer, 100, Digest::ZERO, 100).unwrap();
    let mut conflicting = Digest::ZERO;
    conflicting.0[0] = 7;
    let result = chain.store.producers.record_validation(producer, 100, conflicting, 101);

    assert!(result.is_err());
    assert!(!chain.store.producers.producers.get(&producer).unwrap().active);
    assert_eq!(chain.store.producers.violations.len(), 1);
}
