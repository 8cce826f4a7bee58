//! Block time representation.
//!
//! Internal representation is whole seconds since the epoch (block
//! intervals are measured in seconds across the protocol, never
//! sub-second), stored as a plain `u64` rather than `std::time::Instant` or
//! `SystemTime` so the type stays `Copy`, ordered, and free of any
//! dependency on the wall clock: head time only ever advances by explicit
//! block production, never by reading the local clock.
use std::fmt;
use std::ops::{Add, Sub};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const EPOCH: Timestamp = Timestamp(0);

    pub fn from_secs(secs: u64) -> Self {
        Timestamp(secs)
    }

    pub fn as_secs(self) -> u64 {
        self.0
    }

    pub fn saturating_add_secs(self, secs: u64) -> Self {
        Timestamp(self.0.saturating_add(secs))
    }

    pub fn saturating_sub_secs(self, secs: u64) -> Self {
        Timestamp(self.0.saturating_sub(secs))
    }

    /// Returns `None` rather than panicking on underflow: callers at a
    /// consensus boundary should treat a negative duration as a validation
    /// error, not a panic (spec §9: "TimestampSubtractUnderflow").
    pub fn checked_duration_since(self, earlier: Timestamp) -> Option<Duration> {
        self.0.checked_sub(earlier.0).map(Duration)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Duration(u64);

impl Duration {
    pub const fn from_secs(secs: u64) -> Self {
        Duration(secs)
    }

    pub const fn as_secs(self) -> u64 {
        self.0
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;
    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(rhs.0))
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;
    fn sub(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0.saturating_sub(rhs.0))
    }
}

/// Fixed block production interval. The spec treats this as a consensus
/// parameter (§6), defaulted here to 3s as in the reference chain.
pub const BLOCK_INTERVAL: Duration = Duration::from_secs(3);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_since_none_on_underflow() {
        let early = Timestamp::from_secs(10);
        let late = Timestamp::from_secs(20);
        assert!(early.checked_duration_since(late).is_none());
        assert_eq!(late.checked_duration_since(early), Some(Duration::from_secs(10)));
    }
}
