//! Price representation (spec §6: "prices are `(base_amount, base_symbol,
//! quote_amount, quote_symbol)`").
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::asset::AssetSymbol;
use crate::number::Amount;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Price {
    pub base_amount: Amount,
    pub base_symbol: AssetSymbol,
    pub quote_amount: Amount,
    pub quote_symbol: AssetSymbol,
}

impl Price {
    pub fn new(base_amount: Amount, base_symbol: AssetSymbol, quote_amount: Amount, quote_symbol: AssetSymbol) -> Self {
        Price { base_amount, base_symbol, quote_amount, quote_symbol }
    }

    /// `quote / base`, the exchange rate expressed as quote-per-base.
    pub fn rate(&self) -> Option<Amount> {
        self.quote_amount.checked_div(self.base_amount)
    }

    /// Converts an amount of the base asset into the equivalent amount of
    /// the quote asset at this price.
    pub fn convert_base_to_quote(&self, base_amount: Amount) -> Option<Amount> {
        base_amount.checked_mul(self.rate()?)
    }

    pub fn convert_quote_to_base(&self, quote_amount: Amount) -> Option<Amount> {
        let rate = self.rate()?;
        if rate.is_zero() {
            return None;
        }
        quote_amount.checked_div(rate)
    }

    /// `rate() * scale`, truncated to an `i128`, for use as a sortable index
    /// key where floating point would introduce nondeterminism across
    /// producers.
    pub fn rate_scaled(&self, scale: i64) -> i128 {
        use rust_decimal::prelude::ToPrimitive;
        self.rate()
            .and_then(|r| r.raw().checked_mul(rust_decimal::Decimal::from(scale)))
            .and_then(|v| v.to_i128())
            .unwrap_or(0)
    }

    pub fn invert(&self) -> Price {
        Price {
            base_amount: self.quote_amount,
            base_symbol: self.quote_symbol.clone(),
            quote_amount: self.base_amount,
            quote_symbol: self.base_symbol.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sym(s: &str) -> AssetSymbol {
        AssetSymbol::from_str(s).unwrap()
    }

    #[test]
    fn conversion_round_trips() {
        let price = Price::new(Amount::from(1i64), sym("BTC"), Amount::from(20000i64), sym("USD"));
        let quote = price.convert_base_to_quote(Amount::from(2i64)).unwrap();
        assert_eq!(quote, Amount::from(40000i64));
        let base = price.convert_quote_to_base(quote).unwrap();
        assert_eq!(base, Amount::from(2i64));
    }
}
