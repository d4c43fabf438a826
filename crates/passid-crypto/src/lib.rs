//! # passid-crypto — Certificate Membership Accumulator
//!
//! Provides the authenticated set that proves a certificate public key is a
//! member of a trusted list (the ICAO CSCA master list when registering a
//! signing certificate).
//!
//! ## Architecture
//!
//! - **Combinator** (`combinator.rs`): `combine(a, b)` hashes a pair in
//!   sorted order so that `combine(a, b) == combine(b, a)`. Proof paths
//!   therefore never record left/right roles.
//!
//! - **Treap** (`treap.rs`): `CertTreap`, a BST on 32-byte keys with
//!   max-heap priorities. Every node caches a Merkle accumulator over its
//!   subtree. Priorities are derived from the key, so a fixed key set
//!   always yields the same shape and root.
//!
//! - **Certificate tree** (`cert_tree.rs`): builds a treap from raw
//!   certificate public keys and produces inclusion proofs.
//!
//! ## Crate Policy
//!
//! - Depends on `passid-core` only.
//! - Treap operations are synchronous and never fail on valid input.
//! - No `unsafe`.

pub mod cert_tree;
pub mod combinator;
pub mod treap;

pub use cert_tree::{derive_priority, CertTree, InclusionProof};
pub use combinator::{combine, fold_path, hash_pair};
pub use treap::{CertTreap, InvariantViolation};
