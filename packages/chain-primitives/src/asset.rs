//! Asset symbols (spec §6: "1-16 ASCII chars `[A-Z0-9.]`, leading char
//! letter") and permlinks (§6: "3-256 chars `[a-z0-9-]`").
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ChainError, Component, ErrorCode};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct AssetSymbol(String);

impl AssetSymbol {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), ChainError> {
        if !(1..=16).contains(&s.len()) {
            return Err(crate::chain_error!(
                ErrorCode::InvalidAssetSymbol,
                Component::AssetRegistry,
                "symbol '{s}' must be 1-16 chars"
            ));
        }
        let mut chars = s.chars();
        let first = chars.next().unwrap();
        if !first.is_ascii_uppercase() {
            return Err(crate::chain_error!(
                ErrorCode::InvalidAssetSymbol,
                Component::AssetRegistry,
                "symbol '{s}' must start with a letter"
            ));
        }
        if !s.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.') {
            return Err(crate::chain_error!(
                ErrorCode::InvalidAssetSymbol,
                Component::AssetRegistry,
                "symbol '{s}' may only contain [A-Z0-9.]"
            ));
        }
        Ok(())
    }
}

impl FromStr for AssetSymbol {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::validate(s)?;
        Ok(AssetSymbol(s.to_string()))
    }
}

impl fmt::Display for AssetSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Permlink(String);

impl Permlink {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Permlink {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !(3..=256).contains(&s.len()) {
            return Err(crate::chain_error!(
                ErrorCode::InvalidPermlink,
                Component::SocialGraph,
                "permlink '{s}' must be 3-256 chars"
            ));
        }
        if !s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            return Err(crate::chain_error!(
                ErrorCode::InvalidPermlink,
                Component::SocialGraph,
                "permlink '{s}' may only contain [a-z0-9-]"
            ));
        }
        Ok(Permlink(s.to_string()))
    }
}

impl fmt::Display for Permlink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_rejects_lowercase_and_leading_digit() {
        assert!(AssetSymbol::from_str("coin").is_err());
        assert!(AssetSymbol::from_str("1COIN").is_err());
        assert!(AssetSymbol::from_str("COIN.X").is_ok());
    }

    #[test]
    fn permlink_rejects_uppercase_and_too_short() {
        assert!(Permlink::from_str("ab").is_err());
        assert!(Permlink::from_str("Hello-World").is_err());
        assert!(Permlink::from_str("hello-world-123").is_ok());
    }
}
