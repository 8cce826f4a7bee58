//! Fixed-point numeric types used throughout the economic engine.
//!
//! # Amount, Signed, and NonZero
//!
//! All balances and supplies are held as [`Amount`], a thin wrapper around
//! [`rust_decimal::Decimal`] (28-29 significant digits, banker's-rounding
//! friendly). Two newtype wrappers layer compile-time guarantees on top:
//!
//! * [`NonZero<T>`] asserts the wrapped value is strictly positive. Used for
//!   anything that would be nonsensical at zero (an order's `for_sale`
//!   amount, a stake schedule's `amount`).
//! * [`Signed<T>`] allows negative values where a plain [`Amount`] would
//!   reject them (net debt, PnL, funding payments).
//!
//! Reward-curve and price-median math additionally uses native `i128`/`u128`
//! for the widened intermediate products the spec requires (128-bit
//! intermediate width), converted back to [`Amount`] only at the boundary.
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::str::FromStr;

use rust_decimal::prelude::MathematicalOps;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A non-negative or negative fixed-point economic quantity.
///
/// This is the base numeric type for balances, supplies, prices and fees.
/// It does not by itself guarantee sign; use [`NonZero`] or check
/// [`Amount::is_negative`] at call sites that care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    pub fn from_decimal(d: Decimal) -> Self {
        Amount(d)
    }

    pub fn raw(self) -> Decimal {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn checked_mul(self, other: Amount) -> Option<Amount> {
        self.0.checked_mul(other.0).map(Amount)
    }

    pub fn checked_div(self, other: Amount) -> Option<Amount> {
        if other.is_zero() {
            return None;
        }
        self.0.checked_div(other.0).map(Amount)
    }

    /// Saturating subtraction floored at zero, used pervasively by the
    /// ledger helpers where underflow would indicate a consensus bug rather
    /// than a legitimate negative balance.
    pub fn saturating_sub(self, other: Amount) -> Amount {
        match self.checked_sub(other) {
            Some(v) if !v.is_negative() => v,
            _ => Amount::ZERO,
        }
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        self.checked_add(other).unwrap_or(Amount(Decimal::MAX))
    }

    pub fn min(self, other: Amount) -> Amount {
        if self <= other {
            self
        } else {
            other
        }
    }

    pub fn max(self, other: Amount) -> Amount {
        if self >= other {
            self
        } else {
            other
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s).map(Amount)
    }
}

impl JsonSchema for Amount {
    fn schema_name() -> String {
        "Amount".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Self) -> Self::Output {
        Amount(self.0 - rhs.0)
    }
}

impl Mul for Amount {
    type Output = Amount;
    fn mul(self, rhs: Self) -> Self::Output {
        Amount(self.0 * rhs.0)
    }
}

impl Div for Amount {
    type Output = Amount;
    fn div(self, rhs: Self) -> Self::Output {
        Amount(self.0 / rhs.0)
    }
}

impl Neg for Amount {
    type Output = Amount;
    fn neg(self) -> Self::Output {
        Amount(-self.0)
    }
}

impl From<i64> for Amount {
    fn from(v: i64) -> Self {
        Amount(Decimal::from(v))
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Amount(Decimal::from(v))
    }
}

/// Wrapper guaranteeing the contained [`Amount`] is strictly greater than
/// zero. Construction is the only fallible path; every subsequent operation
/// on the wrapped value is infallible by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct NonZero<T>(T);

impl NonZero<Amount> {
    pub fn new(amount: Amount) -> Option<Self> {
        if amount.is_zero() || amount.is_negative() {
            None
        } else {
            Some(NonZero(amount))
        }
    }

    pub fn raw(self) -> Amount {
        self.0
    }
}

impl fmt::Display for NonZero<Amount> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wrapper allowing negative values, used for net positions, PnL and
/// signed deltas where the direction of change matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, JsonSchema)]
pub struct Signed<T>(T);

impl Signed<Amount> {
    pub fn new(amount: Amount) -> Self {
        Signed(amount)
    }

    pub fn raw(self) -> Amount {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0.is_negative()
    }

    pub fn checked_add(self, other: Signed<Amount>) -> Option<Signed<Amount>> {
        self.0.checked_add(other.0).map(Signed)
    }

    pub fn checked_sub(self, other: Signed<Amount>) -> Option<Signed<Amount>> {
        self.0.checked_sub(other.0).map(Signed)
    }
}

impl From<Amount> for Signed<Amount> {
    fn from(a: Amount) -> Self {
        Signed(a)
    }
}

impl fmt::Display for Signed<Amount> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compares two `i128` ratios `a_num/a_den` vs `b_num/b_den` without
/// floating point, used by order-book tie-breaks and price comparisons
/// where both sides have been reduced to integer (base_amount, quote_amount)
/// pairs. Matches the spec's 128-bit intermediate width requirement.
pub fn compare_ratio(a_num: i128, a_den: i128, b_num: i128, b_den: i128) -> Ordering {
    debug_assert!(a_den > 0 && b_den > 0);
    let lhs = a_num.saturating_mul(b_den);
    let rhs = b_num.saturating_mul(a_den);
    lhs.cmp(&rhs)
}

/// `floor(sqrt(amount))`, used by liquidity-pool initial-deposit share
/// minting (the usual "geometric mean of the two deposits" convention).
/// Returns `None` for a negative input.
pub fn isqrt_decimal(amount: Amount) -> Option<Amount> {
    if amount.is_negative() {
        return None;
    }
    Some(Amount(amount.0.sqrt()?))
}

/// `floor(sqrt(x))` via Newton's method, mirroring the reference chain's
/// `approx_sqrt` (see `util/reward.cpp` in the original source): used by the
/// `square_root` reward curve.
pub fn isqrt_u128(x: u128) -> u128 {
    if x < 2 {
        return x;
    }
    let mut lo: u128 = 0;
    let mut hi: u128 = x;
    // binary search for the largest r with r*r <= x; avoids the overflow
    // risk of a naive Newton step when x is near u128::MAX.
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        match mid.checked_mul(mid) {
            Some(sq) if sq <= x => lo = mid,
            _ => hi = mid - 1,
        }
    }
    lo
}

/// Rounds `numerator / denominator` up, per the spec's "force settlement
/// multiply_and_round_up" note (§9).
pub fn multiply_and_round_up(numerator: i128, multiplier: i128, denominator: i128) -> i128 {
    debug_assert!(denominator > 0);
    let product = numerator.saturating_mul(multiplier);
    let (q, r) = (product / denominator, product % denominator);
    if r != 0 && product > 0 {
        q + 1
    } else {
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isqrt_matches_known_values() {
        assert_eq!(isqrt_u128(0), 0);
        assert_eq!(isqrt_u128(1), 1);
        assert_eq!(isqrt_u128(15), 3);
        assert_eq!(isqrt_u128(16), 4);
        assert_eq!(isqrt_u128(u128::from(u64::MAX) * u128::from(u64::MAX)), u128::from(u64::MAX));
    }

    #[test]
    fn round_up_only_when_remainder() {
        assert_eq!(multiply_and_round_up(10, 1, 2), 5);
        assert_eq!(multiply_and_round_up(11, 1, 2), 6);
        assert_eq!(multiply_and_round_up(0, 1, 2), 0);
    }

    #[test]
    fn nonzero_rejects_zero_and_negative() {
        assert!(NonZero::new(Amount::ZERO).is_none());
        assert!(NonZero::new(Amount::from(-1i64)).is_none());
        assert!(NonZero::new(Amount::from(1i64)).is_some());
    }

    #[test]
    fn amount_saturating_sub_floors_at_zero() {
        let a = Amount::from(5i64);
        let b = Amount::from(10i64);
        assert_eq!(a.saturating_sub(b), Amount::ZERO);
    }
}
