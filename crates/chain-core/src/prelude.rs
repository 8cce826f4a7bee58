//! Common imports for evaluators and tests: `use chain_core::prelude::*;`.
pub use chain_primitives::{
    chain_bail, chain_ensure, chain_error, Amount, AssetSymbol, ChainError, ChainResult, Component, Digest, Duration, ErrorCode, Id, NonZero, Permlink, Price, PublicKey,
    Signature, Signed, SignatureVerifier, Timestamp,
};

pub use crate::state::account::{Account, AccountId, Authority, BusinessRole, MembershipTier};
pub use crate::state::asset_registry::{Asset, AssetId, AssetKind, AssetPermissions};
pub use crate::state::balance::{AccountBalance, SavingsWithdraw};
pub use crate::state::governance::{EnterpriseProposal, ExecutiveBoard, Milestone, MilestoneStatus, OfficerRole};
pub use crate::state::market::bitasset::{BitassetData, PriceFeed};
pub use crate::state::market::limit::LimitOrder;
pub use crate::state::market::margin::{CallOrder, MarginOrder};
pub use crate::state::market::pool::{CreditPool, LiquidityPool};
pub use crate::state::producer::{Producer, ProducerId, ProducerSchedule};
pub use crate::state::social::{Comment, CommentId, Community, Vote};
pub use crate::state::Store;
