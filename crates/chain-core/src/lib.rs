//! Deterministic consensus state machine for a social/economic blockchain
//! node: accounts and authorities, a multi-asset balance ledger, a market
//! engine (limit/margin/auction/bitasset/pool/option orders), a reward
//! engine, a social graph, governance, and a BFT-style producer protocol,
//! all driven through one evaluator dispatch over a transactional
//! in-memory multi-index store.
//!
//! External collaborators — network gossip, a persistent write-ahead log,
//! RPC/HTTP surfaces, wallet/CLI tooling, the concrete hash/signature
//! implementations, a VM, ZK proofs, cross-chain bridges — live outside
//! this crate; `chain-primitives` exposes only the trait boundaries this
//! crate calls through.
pub mod dispatch;
pub mod globals;
pub mod maintenance;
pub mod prelude;
pub mod state;

pub use chain_primitives::{ChainError, ChainResult};
pub use state::Store;
