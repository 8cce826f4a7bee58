//! C1 — Asset Registry (spec §4's implicit asset lifecycle, §3 "Asset" /
//! "AssetDynamicData").
use chain_primitives::{Amount, AssetSymbol, ChainError, Component, ErrorCode, Id};
use chain_store::{HashIndex, Table};
use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

pub type AssetId = Id<Asset>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter)]
pub enum AssetKind {
    Standard,
    Currency,
    Equity,
    Credit,
    Bitasset,
    LiquidityPool,
    CreditPool,
    Option,
    Prediction,
    Gateway,
    Unique,
}

bitflags_like_permissions! {
    /// Issuer permission / flag bits (spec §3: "new flags ⊆ issuer
    /// permissions; once supply > 0, permissions may not be re-expanded").
    pub struct AssetPermissions: u16 {
        const WHITELIST = 1 << 0;
        const BLACKLIST = 1 << 1;
        const MARKET_WHITELIST = 1 << 2;
        const MARKET_BLACKLIST = 1 << 3;
        const DISABLE_FORCE_SETTLE = 1 << 4;
        const GLOBAL_SETTLE = 1 << 5;
        const OVERRIDE_AUTHORITY = 1 << 6;
        const TRANSFER_RESTRICTED = 1 << 7;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub symbol: AssetSymbol,
    pub kind: AssetKind,
    pub issuer: String,
    pub precision: u8,
    pub stake_intervals: u32,
    pub unstake_intervals: u32,
    pub market_fee_bps: u32,
    pub issuer_permissions: AssetPermissions,
    pub flags: AssetPermissions,
    pub whitelist_authorities: Vec<String>,
    pub blacklist_authorities: Vec<String>,
    pub whitelist_markets: Vec<AssetSymbol>,
    pub blacklist_markets: Vec<AssetSymbol>,
}

impl Asset {
    /// Enables a subset of flags, enforcing spec §3: "new flags ⊆ issuer
    /// permissions".
    pub fn set_flags(&mut self, requested: AssetPermissions) -> Result<(), ChainError> {
        if !self.issuer_permissions.contains(requested) {
            return Err(chain_primitives::chain_error!(
                ErrorCode::MissingAuthority,
                Component::AssetRegistry,
                "requested flags exceed {} issuer permissions",
                self.symbol
            ));
        }
        self.flags = requested;
        Ok(())
    }

    /// Enforces "once supply > 0, permissions may not be re-expanded".
    pub fn update_permissions(
        &mut self,
        requested: AssetPermissions,
        current_supply_positive: bool,
    ) -> Result<(), ChainError> {
        if current_supply_positive && !self.issuer_permissions.contains(requested) {
            return Err(chain_primitives::chain_error!(
                ErrorCode::OutOfRange,
                Component::AssetRegistry,
                "cannot expand permissions on {} after supply was issued",
                self.symbol
            ));
        }
        self.issuer_permissions = requested;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetDynamicData {
    pub total_supply: Amount,
    pub liquid_supply: Amount,
    pub staked_supply: Amount,
    pub reward_supply: Amount,
    pub savings_supply: Amount,
    pub delegated_supply: Amount,
    pub receiving_supply: Amount,
    pub pending_supply: Amount,
    pub confidential_supply: Amount,
}

impl AssetDynamicData {
    /// Spec §3 global invariant: "for every asset, the sum of all per-account
    /// sub-balances plus pending_supply equals total_supply."
    pub fn check_conservation(&self) -> Result<(), ChainError> {
        let accounted = self
            .liquid_supply
            .checked_add(self.staked_supply)
            .and_then(|v| v.checked_add(self.reward_supply))
            .and_then(|v| v.checked_add(self.savings_supply))
            .and_then(|v| v.checked_add(self.receiving_supply))
            .and_then(|v| v.checked_add(self.confidential_supply))
            .and_then(|v| v.checked_add(self.pending_supply));
        match accounted {
            Some(total) if total == self.total_supply => Ok(()),
            _ => Err(chain_primitives::chain_error!(
                ErrorCode::SupplyConservationViolated,
                Component::AssetRegistry,
                "sub-balances + pending_supply != total_supply"
            )),
        }
    }
}

#[derive(Default)]
pub struct AssetBook {
    pub assets: Table<AssetId, Asset>,
    pub dynamic: Table<AssetId, AssetDynamicData>,
    pub by_symbol: HashIndex<AssetSymbol, AssetId>,
    pub next_id: chain_primitives::IdAllocator<Asset>,
}

impl chain_store::Transactional for AssetBook {
    fn begin_scope(&mut self) {
        self.assets.begin_scope();
        self.dynamic.begin_scope();
        self.by_symbol.begin_scope();
    }
    fn commit_scope(&mut self) {
        self.assets.commit_scope();
        self.dynamic.commit_scope();
        self.by_symbol.commit_scope();
    }
    fn abort_scope(&mut self) {
        self.assets.abort_scope();
        self.dynamic.abort_scope();
        self.by_symbol.abort_scope();
    }
}

impl AssetBook {
    pub fn get_by_symbol(&self, symbol: &AssetSymbol) -> Option<(&Asset, &AssetDynamicData)> {
        let id = self.by_symbol.get(symbol)?;
        Some((self.assets.get(id)?, self.dynamic.get(id)?))
    }

    pub fn create(&mut self, symbol: AssetSymbol, kind: AssetKind, issuer: String, precision: u8) -> Result<AssetId, ChainError> {
        if self.by_symbol.get(&symbol).is_some() {
            return Err(chain_primitives::chain_error!(
                ErrorCode::DuplicateId,
                Component::AssetRegistry,
                "asset {symbol} already registered"
            ));
        }
        let id = self.next_id.allocate();
        let asset = Asset {
            id,
            symbol: symbol.clone(),
            kind,
            issuer,
            precision,
            stake_intervals: 4,
            unstake_intervals: 4,
            market_fee_bps: 0,
            issuer_permissions: AssetPermissions::all(),
            flags: AssetPermissions::empty(),
            whitelist_authorities: Vec::new(),
            blacklist_authorities: Vec::new(),
            whitelist_markets: Vec::new(),
            blacklist_markets: Vec::new(),
        };
        self.assets.insert(id, asset);
        self.dynamic.insert(id, AssetDynamicData::default());
        self.by_symbol.insert(symbol, id);
        Ok(id)
    }

    /// Checks the `unique` asset invariant (spec §3): max supply == 1 unit.
    pub fn check_unique_supply(&self, id: AssetId) -> Result<(), ChainError> {
        let asset = self.assets.get(&id).expect("asset must exist");
        if asset.kind != AssetKind::Unique {
            return Ok(());
        }
        let dyn_data = self.dynamic.get(&id).expect("dynamic data must exist");
        if dyn_data.total_supply > Amount::from(1i64) {
            return Err(chain_primitives::chain_error!(
                ErrorCode::OutOfRange,
                Component::AssetRegistry,
                "unique asset {} may not exceed 1 unit of supply",
                asset.symbol
            ));
        }
        Ok(())
    }
}

/// Minimal bitflags-style permission mask, generated with the same API
/// shape as the `bitflags` crate but implemented directly: this asset book
/// is the only place in the crate needing more than 2-3 boolean flags
/// together, so a single hand-rolled macro (mirroring `bitflags!`'s
/// generated API) avoids a dependency used in exactly one spot.
macro_rules! bitflags_like_permissions {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $ty:ty {
            $(const $flag:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
        pub struct $name($ty);

        impl $name {
            $(pub const $flag: $name = $name($value);)*

            pub const fn empty() -> Self {
                $name(0)
            }

            pub fn all() -> Self {
                $name($(Self::$flag.0 |)* 0)
            }

            pub fn contains(&self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: Self) -> Self::Output {
                $name(self.0 | rhs.0)
            }
        }
    };
}
use bitflags_like_permissions;

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn flags_must_be_subset_of_issuer_permissions() {
        let mut asset = Asset {
            id: AssetId::new(0),
            symbol: AssetSymbol::from_str("BITUSD").unwrap(),
            kind: AssetKind::Bitasset,
            issuer: "issuer".into(),
            precision: 4,
            stake_intervals: 1,
            unstake_intervals: 1,
            market_fee_bps: 0,
            issuer_permissions: AssetPermissions::WHITELIST,
            flags: AssetPermissions::empty(),
            whitelist_authorities: vec![],
            blacklist_authorities: vec![],
            whitelist_markets: vec![],
            blacklist_markets: vec![],
        };
        assert!(asset.set_flags(AssetPermissions::BLACKLIST).is_err());
        assert!(asset.set_flags(AssetPermissions::WHITELIST).is_ok());
    }

    #[test]
    fn conservation_check_catches_drift() {
        let mut dyn_data = AssetDynamicData {
            total_supply: Amount::from(100i64),
            liquid_supply: Amount::from(100i64),
            ..Default::default()
        };
        assert!(dyn_data.check_conservation().is_ok());
        dyn_data.liquid_supply = Amount::from(90i64);
        assert!(dyn_data.check_conservation().is_err());
    }

    #[test]
    fn registry_rejects_duplicate_symbols() {
        let mut book = AssetBook::default();
        book.create(AssetSymbol::from_str("COIN").unwrap(), AssetKind::Currency, "genesis".into(), 3).unwrap();
        assert!(book
            .create(AssetSymbol::from_str("COIN").unwrap(), AssetKind::Currency, "genesis".into(), 3)
            .is_err());
    }
}
