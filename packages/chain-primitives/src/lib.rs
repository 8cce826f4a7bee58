//! Shared types for the deterministic consensus state machine: numeric
//! newtypes, block time, typed ids, asset symbols/permlinks, prices, and the
//! structured error type every component raises.
//!
//! External collaborators (hash functions, signature verification) are
//! exposed only as trait interfaces here — no concrete implementation lives
//! in this crate or its dependents, per the out-of-scope cryptographic
//! primitives boundary (spec §1).

pub mod asset;
pub mod error;
pub mod ids;
pub mod number;
pub mod price;

pub use asset::{AssetSymbol, Permlink};
pub use error::{ChainError, ChainResult, Component, ErrorCode};
pub use ids::{Id, IdAllocator};
pub use number::{compare_ratio, isqrt_decimal, isqrt_u128, multiply_and_round_up, Amount, NonZero, Signed};
pub use price::Price;
pub use time::{Duration, Timestamp, BLOCK_INTERVAL};

pub mod time;

/// A 256-bit digest, opaque to this crate. The concrete hash algorithm
/// (blake2b, sha256, ...) is an external collaborator (spec §1); this type
/// only carries the bytes around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    pub const ZERO: Digest = Digest([0u8; 32]);

    /// Number of leading zero bits, used as a proof-of-work difficulty
    /// score for an externally-supplied digest (spec §4.8): the core never
    /// computes a hash itself, it only scores one handed to it.
    pub fn leading_zero_bits(&self) -> u32 {
        let mut bits = 0u32;
        for byte in &self.0 {
            if *byte == 0 {
                bits += 8;
            } else {
                bits += byte.leading_zeros();
                break;
            }
        }
        bits
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// A compact-secp256k1-or-equivalent public key, opaque to this crate. The
/// concrete curve and verification routine are supplied externally via
/// [`SignatureVerifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct PublicKey(pub [u8; 33]);

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Signature(pub Vec<u8>);

/// Trait boundary for the cryptographic primitives the spec treats as an
/// external collaborator: the core only ever calls through this trait, it
/// never hashes or verifies a signature itself.
pub trait SignatureVerifier {
    fn verify(&self, message: &[u8], signature: &Signature, key: &PublicKey) -> bool;
}

pub trait HashFn {
    fn hash(&self, data: &[u8]) -> Digest;
}
