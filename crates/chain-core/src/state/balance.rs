//! C2 — Balance Ledger (spec §3 "AccountBalance", §4 stake/unstake
//! scheduling, delegation, savings withdrawal requests).
use chain_primitives::{Amount, ChainError, Component, ErrorCode, Id, Timestamp};
use chain_store::Table;
use serde::{Deserialize, Serialize};

use crate::state::account::AccountId;
use crate::state::asset_registry::AssetId;

pub type SavingsWithdrawId = Id<SavingsWithdraw>;

/// Maximum concurrent savings withdrawal requests per (account, asset) pair
/// (spec §4: "≤ 100 concurrent withdrawal requests").
pub const MAX_CONCURRENT_SAVINGS_WITHDRAWALS: usize = 100;

/// One asset's full sub-balance breakdown for one account (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account: AccountId,
    pub asset: AssetId,
    pub liquid: Amount,
    pub staked: Amount,
    pub reward: Amount,
    pub savings: Amount,
    pub delegated_out: Amount,
    pub delegated_in: Amount,
    pub stake_withdraw_rate: Amount,
    pub next_stake_withdraw: Option<Timestamp>,
    pub remaining_stake_withdraw: Amount,
}

impl AccountBalance {
    fn new(account: AccountId, asset: AssetId) -> Self {
        AccountBalance { account, asset, ..Default::default() }
    }

    /// Total value owned by this account in this asset, across every
    /// sub-balance (spec §3 conservation invariant operand).
    pub fn total(&self) -> Amount {
        self.liquid
            .saturating_add(self.staked)
            .saturating_add(self.reward)
            .saturating_add(self.savings)
            .saturating_add(self.delegated_out)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsWithdraw {
    pub id: SavingsWithdrawId,
    pub from: AccountId,
    pub to: AccountId,
    pub asset: AssetId,
    pub amount: Amount,
    pub memo: String,
    pub complete_at: Timestamp,
}

#[derive(Default)]
pub struct BalanceBook {
    pub balances: Table<(AccountId, AssetId), AccountBalance>,
    pub savings_withdrawals: Table<SavingsWithdrawId, SavingsWithdraw>,
    pub next_withdraw_id: chain_primitives::IdAllocator<SavingsWithdraw>,
}

impl chain_store::Transactional for BalanceBook {
    fn begin_scope(&mut self) {
        self.balances.begin_scope();
        self.savings_withdrawals.begin_scope();
    }
    fn commit_scope(&mut self) {
        self.balances.commit_scope();
        self.savings_withdrawals.commit_scope();
    }
    fn abort_scope(&mut self) {
        self.balances.abort_scope();
        self.savings_withdrawals.abort_scope();
    }
}

impl BalanceBook {
    fn ensure_row(&mut self, account: AccountId, asset: AssetId) {
        if self.balances.get(&(account, asset)).is_none() {
            self.balances.insert((account, asset), AccountBalance::new(account, asset));
        }
    }

    pub fn liquid_of(&self, account: AccountId, asset: AssetId) -> Amount {
        self.balances.get(&(account, asset)).map(|b| b.liquid).unwrap_or(Amount::ZERO)
    }

    /// Credits `amount` to `account`'s liquid sub-balance, creating the row
    /// on first use.
    pub fn credit_liquid(&mut self, account: AccountId, asset: AssetId, amount: Amount) {
        self.ensure_row(account, asset);
        self.balances.modify(&(account, asset), |b| b.liquid = b.liquid.saturating_add(amount));
    }

    /// Credits `amount` to `account`'s savings sub-balance, creating the row
    /// on first use.
    pub fn credit_savings(&mut self, account: AccountId, asset: AssetId, amount: Amount) {
        self.ensure_row(account, asset);
        self.balances.modify(&(account, asset), |b| b.savings = b.savings.saturating_add(amount));
    }

    /// Debits `amount` from `account`'s liquid sub-balance, failing with
    /// `InsufficientBalance` rather than going negative (spec §3: "no
    /// sub-balance may go negative").
    pub fn debit_liquid(&mut self, account: AccountId, asset: AssetId, amount: Amount) -> Result<(), ChainError> {
        let have = self.liquid_of(account, asset);
        if have < amount {
            return Err(chain_primitives::chain_error!(
                ErrorCode::InsufficientBalance,
                Component::BalanceLedger,
                "account {account} has {have} of asset {asset:?}, needs {amount}"
            ));
        }
        self.balances.modify(&(account, asset), |b| b.liquid = b.liquid.saturating_sub(amount));
        Ok(())
    }

    /// Moves `amount` from liquid into the staking sub-balance (spec §4:
    /// stake begins accruing voting/interest weight immediately, unstake is
    /// what's scheduled).
    pub fn stake(&mut self, account: AccountId, asset: AssetId, amount: Amount) -> Result<(), ChainError> {
        self.debit_liquid(account, asset, amount)?;
        self.ensure_row(account, asset);
        self.balances.modify(&(account, asset), |b| b.staked = b.staked.saturating_add(amount));
        Ok(())
    }

    /// Begins an unstake schedule: `stake_intervals` equal payments of
    /// `total / stake_intervals`, released on successive `advance_unstake`
    /// calls, starting at `first_payment`.
    pub fn begin_unstake(
        &mut self,
        account: AccountId,
        asset: AssetId,
        total: Amount,
        stake_intervals: u32,
        first_payment: Timestamp,
    ) -> Result<(), ChainError> {
        let staked = self.balances.get(&(account, asset)).map(|b| b.staked).unwrap_or(Amount::ZERO);
        if staked < total {
            return Err(chain_primitives::chain_error!(
                ErrorCode::InsufficientBalance,
                Component::BalanceLedger,
                "account {account} has only {staked} staked in asset {asset:?}, cannot schedule {total}"
            ));
        }
        let rate = total
            .checked_div(Amount::from(i64::from(stake_intervals.max(1))))
            .unwrap_or(Amount::ZERO);
        self.balances.modify(&(account, asset), |b| {
            b.stake_withdraw_rate = rate;
            b.remaining_stake_withdraw = total;
            b.next_stake_withdraw = Some(first_payment);
        });
        Ok(())
    }

    /// Releases one unstake installment if `now >= next_stake_withdraw`,
    /// moving `min(rate, remaining)` from staked to liquid. Returns the
    /// amount released, or `Amount::ZERO` if nothing was due.
    pub fn advance_unstake(&mut self, account: AccountId, asset: AssetId, now: Timestamp, interval: chain_primitives::Duration) -> Amount {
        let Some(balance) = self.balances.get(&(account, asset)) else {
            return Amount::ZERO;
        };
        let Some(due) = balance.next_stake_withdraw else {
            return Amount::ZERO;
        };
        if now < due {
            return Amount::ZERO;
        }
        let released = balance.stake_withdraw_rate.min(balance.remaining_stake_withdraw);
        self.balances.modify(&(account, asset), |b| {
            b.staked = b.staked.saturating_sub(released);
            b.liquid = b.liquid.saturating_add(released);
            b.remaining_stake_withdraw = b.remaining_stake_withdraw.saturating_sub(released);
            b.next_stake_withdraw = if b.remaining_stake_withdraw.is_zero() { None } else { Some(due + interval) };
        });
        released
    }

    /// Delegates `amount` of staked weight from `from` to `to`, without
    /// moving funds: `delegated_out` on the delegator and `delegated_in` on
    /// the recipient track the same amount for voting-power accounting.
    pub fn delegate(&mut self, from: AccountId, to: AccountId, asset: AssetId, amount: Amount) -> Result<(), ChainError> {
        let available = self.balances.get(&(from, asset)).map(|b| b.staked.saturating_sub(b.delegated_out)).unwrap_or(Amount::ZERO);
        if available < amount {
            return Err(chain_primitives::chain_error!(
                ErrorCode::InsufficientBalance,
                Component::BalanceLedger,
                "account {from} has only {available} undelegated stake in asset {asset:?}"
            ));
        }
        self.balances.modify(&(from, asset), |b| b.delegated_out = b.delegated_out.saturating_add(amount));
        self.ensure_row(to, asset);
        self.balances.modify(&(to, asset), |b| b.delegated_in = b.delegated_in.saturating_add(amount));
        Ok(())
    }

    /// Opens a savings withdrawal request (spec §4: 3-day unlock, ≤100
    /// concurrent per account+asset).
    pub fn request_savings_withdraw(
        &mut self,
        from: AccountId,
        to: AccountId,
        asset: AssetId,
        amount: Amount,
        memo: String,
        complete_at: Timestamp,
    ) -> Result<SavingsWithdrawId, ChainError> {
        let have = self.balances.get(&(from, asset)).map(|b| b.savings).unwrap_or(Amount::ZERO);
        if have < amount {
            return Err(chain_primitives::chain_error!(
                ErrorCode::InsufficientBalance,
                Component::BalanceLedger,
                "account {from} has {have} in savings of asset {asset:?}, needs {amount}"
            ));
        }
        let pending = self.savings_withdrawals.iter().filter(|(_, w)| w.from == from && w.asset == asset).count();
        if pending >= MAX_CONCURRENT_SAVINGS_WITHDRAWALS {
            return Err(chain_primitives::chain_error!(
                ErrorCode::TooManyConcurrentRequests,
                Component::BalanceLedger,
                "account {from} already has {pending} pending savings withdrawals in asset {asset:?}"
            ));
        }
        self.balances.modify(&(from, asset), |b| b.savings = b.savings.saturating_sub(amount));
        let id = self.next_withdraw_id.allocate();
        self.savings_withdrawals.insert(id, SavingsWithdraw { id, from, to, asset, amount, memo, complete_at });
        Ok(id)
    }

    /// Transfers up to `amount` from `from`'s staked sub-balance to `to`'s
    /// staked sub-balance, capped at what `from` actually has staked (spec
    /// §8 producer-violation slashing: a penalty can never drive a balance
    /// negative). Returns the amount actually moved.
    pub fn slash_stake(&mut self, from: AccountId, to: AccountId, asset: AssetId, amount: Amount) -> Amount {
        let available = self.balances.get(&(from, asset)).map(|b| b.staked).unwrap_or(Amount::ZERO);
        let moved = amount.min(available);
        if moved.is_zero() {
            return moved;
        }
        self.balances.modify(&(from, asset), |b| b.staked = b.staked.saturating_sub(moved));
        self.ensure_row(to, asset);
        self.balances.modify(&(to, asset), |b| b.staked = b.staked.saturating_add(moved));
        moved
    }

    /// Settles every savings withdrawal whose `complete_at <= now`,
    /// returning the ids settled. Called from the maintenance sweep.
    pub fn settle_due_savings_withdrawals(&mut self, now: Timestamp) -> Vec<SavingsWithdrawId> {
        let due: Vec<SavingsWithdrawId> = self
            .savings_withdrawals
            .iter()
            .filter(|(_, w)| w.complete_at <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in &due {
            let withdraw = self.savings_withdrawals.remove(id).expect("id came from this table");
            self.credit_liquid(withdraw.to, withdraw.asset, withdraw.amount);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acc(n: u64) -> AccountId {
        AccountId::new(n)
    }
    fn ast(n: u64) -> AssetId {
        AssetId::new(n)
    }

    #[test]
    fn debit_rejects_insufficient_liquid_balance() {
        let mut book = BalanceBook::default();
        book.credit_liquid(acc(1), ast(1), Amount::from(5i64));
        assert!(book.debit_liquid(acc(1), ast(1), Amount::from(10i64)).is_err());
        assert!(book.debit_liquid(acc(1), ast(1), Amount::from(5i64)).is_ok());
    }

    #[test]
    fn unstake_schedule_releases_equal_installments() {
        let mut book = BalanceBook::default();
        book.credit_liquid(acc(1), ast(1), Amount::from(100i64));
        book.stake(acc(1), ast(1), Amount::from(100i64)).unwrap();
        book.begin_unstake(acc(1), ast(1), Amount::from(100i64), 4, Timestamp::from_secs(100)).unwrap();

        assert_eq!(book.advance_unstake(acc(1), ast(1), Timestamp::from_secs(50), chain_primitives::Duration::from_secs(10)), Amount::ZERO);
        let released = book.advance_unstake(acc(1), ast(1), Timestamp::from_secs(100), chain_primitives::Duration::from_secs(10));
        assert_eq!(released, Amount::from(25i64));
        assert_eq!(book.liquid_of(acc(1), ast(1)), Amount::from(25i64));
    }

    #[test]
    fn savings_withdrawal_request_cap_is_enforced() {
        let mut book = BalanceBook::default();
        book.balances.insert(
            (acc(1), ast(1)),
            AccountBalance { account: acc(1), asset: ast(1), savings: Amount::from(1_000_000i64), ..Default::default() },
        );
        for _ in 0..MAX_CONCURRENT_SAVINGS_WITHDRAWALS {
            book.request_savings_withdraw(acc(1), acc(2), ast(1), Amount::from(1i64), String::new(), Timestamp::from_secs(0)).unwrap();
        }
        assert!(book.request_savings_withdraw(acc(1), acc(2), ast(1), Amount::from(1i64), String::new(), Timestamp::from_secs(0)).is_err());
    }

    #[test]
    fn savings_withdrawal_settles_when_due() {
        let mut book = BalanceBook::default();
        book.balances.insert(
            (acc(1), ast(1)),
            AccountBalance { account: acc(1), asset: ast(1), savings: Amount::from(10i64), ..Default::default() },
        );
        book.request_savings_withdraw(acc(1), acc(2), ast(1), Amount::from(10i64), String::new(), Timestamp::from_secs(259_200)).unwrap();
        assert!(book.settle_due_savings_withdrawals(Timestamp::from_secs(0)).is_empty());
        let settled = book.settle_due_savings_withdrawals(Timestamp::from_secs(259_200));
        assert_eq!(settled.len(), 1);
        assert_eq!(book.liquid_of(acc(2), ast(1)), Amount::from(10i64));
    }
}
