//! Error handling for the chain state machine.
//!
//! Mirrors the teacher's `PerpError { id, domain, description, data }` /
//! `perp_error!` pattern: a single structured error type carrying a
//! component tag and a stable code, raised via macros so call sites read
//! like `chain_bail!(ErrorCode::InsufficientBalance, Component::Balance,
//! "account {account} has {have}, needs {need}")`.
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The component (spec §2 C1-C10) an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum Component {
    AssetRegistry,
    BalanceLedger,
    AccountAuthority,
    MarketEngine,
    RewardEngine,
    SocialGraph,
    Governance,
    ProducerProtocol,
    EvaluatorDispatch,
    IndexedStore,
}

/// Stable error identifier, grouped per spec §7's error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum ErrorCode {
    // Validation
    MalformedField,
    OutOfRange,
    UnknownEntity,
    InvalidAssetSymbol,
    InvalidPermlink,
    // Authorisation
    MissingAuthority,
    VotingRightsDeclined,
    AccountInactive,
    AuthorityRecursionTooDeep,
    SignatureInvalid,
    // Precondition
    InsufficientBalance,
    MissingApproval,
    WrongOrderState,
    DuplicateId,
    RateLimited,
    StakeScheduleConflict,
    TooManyConcurrentRequests,
    // Consensus
    SupplyConservationViolated,
    UnfillableMarginCall,
    ProxyCycle,
    ProxyDepthExceeded,
    BlackSwan,
    // Scheduling
    NotYetActive,
    Expired,
    RequestLimitExceeded,
}

/// A structured, serializable error value for the chain state machine.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChainError {
    pub code: ErrorCode,
    pub component: Component,
    pub description: String,
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}/{:?}] {}", self.component, self.code, self.description)
    }
}

impl std::error::Error for ChainError {}

/// Builds a [`ChainError`] value without wrapping it in `anyhow::Error`.
#[macro_export]
macro_rules! chain_error {
    ($code:expr, $component:expr, $($t:tt)*) => {{
        $crate::error::ChainError {
            code: $code,
            component: $component,
            description: format!($($t)*),
        }
    }};
}

/// Builds a [`ChainError`] and immediately returns it from the enclosing
/// function via `anyhow::Error`, for evaluators whose return type is
/// `anyhow::Result<T>`.
#[macro_export]
macro_rules! chain_bail {
    ($code:expr, $component:expr, $($t:tt)*) => {
        return Err(anyhow::Error::new($crate::chain_error!($code, $component, $($t)*)))
    };
}

/// Asserts a precondition, bailing with a [`ChainError`] if it does not
/// hold. Evaluators use this in place of `assert!`/`panic!`: per spec §7,
/// no error is recovered inside an evaluator, but none may panic either —
/// the enclosing operation's undo scope must still unwind cleanly.
#[macro_export]
macro_rules! chain_ensure {
    ($cond:expr, $code:expr, $component:expr, $($t:tt)*) => {
        if !($cond) {
            $crate::chain_bail!($code, $component, $($t)*);
        }
    };
}

pub type ChainResult<T> = anyhow::Result<T>;
