//! Option orders (spec §4: "OptionOrder — covered call/put, strike/expiry,
//! American or European exercise style").
use chain_primitives::{Amount, ChainError, Component, ErrorCode, Id, Price, Timestamp};
use chain_store::Table;
use serde::{Deserialize, Serialize};

use crate::state::account::AccountId;
use crate::state::asset_registry::AssetId;

pub type OptionOrderId = Id<OptionOrder>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionKind {
    Call,
    Put,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExerciseStyle {
    American,
    European,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionOrder {
    pub id: OptionOrderId,
    pub writer: AccountId,
    pub holder: Option<AccountId>,
    pub kind: OptionKind,
    pub underlying_asset: AssetId,
    pub strike: Price,
    pub expiration: Timestamp,
    pub style: ExerciseStyle,
    pub collateral_locked: Amount,
    pub exercised: bool,
}

impl OptionOrder {
    pub fn can_exercise(&self, now: Timestamp) -> bool {
        if self.exercised || self.holder.is_none() {
            return false;
        }
        match self.style {
            ExerciseStyle::American => now <= self.expiration,
            ExerciseStyle::European => now == self.expiration,
        }
    }

    /// Intrinsic value per unit of underlying at `spot`, zero if
    /// out-of-the-money.
    pub fn intrinsic_value(&self, spot: &Price) -> Amount {
        let spot_rate = spot.rate().unwrap_or(Amount::ZERO);
        let strike_rate = self.strike.rate().unwrap_or(Amount::ZERO);
        match self.kind {
            OptionKind::Call if spot_rate > strike_rate => spot_rate.saturating_sub(strike_rate),
            OptionKind::Put if strike_rate > spot_rate => strike_rate.saturating_sub(spot_rate),
            _ => Amount::ZERO,
        }
    }
}

#[derive(Default)]
pub struct OptionBook {
    pub options: Table<OptionOrderId, OptionOrder>,
    pub next_id: chain_primitives::IdAllocator<OptionOrder>,
}

impl chain_store::Transactional for OptionBook {
    fn begin_scope(&mut self) {
        self.options.begin_scope();
    }
    fn commit_scope(&mut self) {
        self.options.commit_scope();
    }
    fn abort_scope(&mut self) {
        self.options.abort_scope();
    }
}

impl OptionBook {
    pub fn write(&mut self, writer: AccountId, kind: OptionKind, underlying_asset: AssetId, strike: Price, expiration: Timestamp, style: ExerciseStyle, collateral_locked: Amount) -> OptionOrderId {
        let id = self.next_id.allocate();
        self.options.insert(id, OptionOrder { id, writer, holder: None, kind, underlying_asset, strike, expiration, style, collateral_locked, exercised: false });
        id
    }

    pub fn take(&mut self, id: OptionOrderId, holder: AccountId) -> Result<(), ChainError> {
        self.options
            .get(&id)
            .ok_or_else(|| chain_primitives::chain_error!(ErrorCode::UnknownEntity, Component::MarketEngine, "no such option order {id}"))?;
        self.options.modify(&id, |o| o.holder = Some(holder));
        Ok(())
    }

    pub fn exercise(&mut self, id: OptionOrderId, now: Timestamp) -> Result<(), ChainError> {
        let order = self.options.get(&id).ok_or_else(|| chain_primitives::chain_error!(ErrorCode::UnknownEntity, Component::MarketEngine, "no such option order {id}"))?;
        if !order.can_exercise(now) {
            return Err(chain_primitives::chain_error!(ErrorCode::WrongOrderState, Component::MarketEngine, "option order {id} is not exercisable now"));
        }
        self.options.modify(&id, |o| o.exercised = true);
        Ok(())
    }

    pub fn expire_due(&mut self, now: Timestamp) -> Vec<OptionOrderId> {
        let expired: Vec<OptionOrderId> = self
            .options
            .iter()
            .filter(|(_, o)| !o.exercised && now > o.expiration)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            self.options.remove(id);
        }
        expired
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
    fn call_intrinsic_value_is_zero_out_of_the_money() {
        let order = OptionOrder {
            id: OptionOrderId::new(0),
            writer: AccountId::new(1),
            holder: Some(AccountId::new(2)),
            kind: OptionKind::Call,
            underlying_asset: AssetId::new(1),
            strike: px(1, 100),
            expiration: Timestamp::from_secs(1000),
            style: ExerciseStyle::European,
            collateral_locked: Amount::from(1i64),
            exercised: false,
        };
        assert_eq!(order.intrinsic_value(&px(1, 90)), Amount::ZERO);
        assert_eq!(order.intrinsic_value(&px(1, 120)), Amount::from(20i64));
    }

    #[test]
    fn european_option_only_exercisable_at_expiration() {
        let mut book = OptionBook::default();
        let id = book.write(AccountId::new(1), OptionKind::Put, AssetId::new(1), px(1, 100), Timestamp::from_secs(1000), ExerciseStyle::European, Amount::from(1i64));
        book.take(id, AccountId::new(2)).unwrap();
        assert!(book.exercise(id, Timestamp::from_secs(999)).is_err());
        assert!(book.exercise(id, Timestamp::from_secs(1000)).is_ok());
    }
}
