//! # passid-core — Foundational Types for passid
//!
//! Every other crate in the workspace depends on `passid-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **One digest type.** Certificate leaves, Merkle accumulators, on-chain
//!    identity keys and commitments are all [`Hash32`]. Ordering on `Hash32`
//!    is big-endian unsigned comparison, which is what the treap and the
//!    pairwise combinator rely on.
//!
//! 2. **Keccak-256 everywhere on the EVM side.** [`keccak256()`] is the only
//!    hash used for leaves, tags (`zkType`, data types, dispatchers) and
//!    function selectors.
//!
//! 3. **The parsed document is data, not behavior.** Chip reading and X.509
//!    parsing happen outside this workspace; [`ParsedDocument`] carries the
//!    byte fields and the already-classified signature profile.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `passid-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod digest;
pub mod document;
pub mod error;
pub mod profile;

pub use digest::{decode_hex, encode_hex, keccak256, keccak256_str, Hash32};
pub use document::{
    ActiveAuthKey, ChainOfTrust, DocumentType, ParsedDocument, PersonDetails, SigningCertificate,
};
pub use error::{DigestError, DocumentError, PassidError};
pub use profile::{Curve, HashAlgorithm, SignatureAlgorithm, SignatureProfile};
