//! # Certificate Tree
//!
//! Builds a [`CertTreap`] from raw certificate public keys. The leaf is
//! `Keccak256(public_key)` and the priority is derived from the leaf, which
//! makes the tree shape a pure function of the key set. This is the tree
//! the registration contract checks ICAO master-list inclusion against.

use num_bigint::BigUint;
use passid_core::{keccak256, Hash32};
use serde::{Deserialize, Serialize};

use crate::combinator::fold_path;
use crate::treap::CertTreap;

/// `BigEndianUint256(Keccak256(leaf)) mod (2^64 - 1)`.
pub fn derive_priority(leaf: &Hash32) -> u64 {
    let digest = keccak256(leaf.as_bytes());
    let reduced = digest.to_biguint() % BigUint::from(u64::MAX);
    reduced.iter_u64_digits().next().unwrap_or(0)
}

/// Inclusion evidence for one leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// `Keccak256` of the certificate public key.
    pub leaf: Hash32,
    /// Leaf-to-root path.
    pub siblings: Vec<Hash32>,
}

impl InclusionProof {
    /// Fold the path into the leaf.
    pub fn compute_root(&self) -> Hash32 {
        fold_path(self.leaf, &self.siblings)
    }

    /// True when the path folds to `root`.
    pub fn verify(&self, root: &Hash32) -> bool {
        self.compute_root() == *root
    }

    /// Siblings as `0x`-hex, the form passed to `registerCertificate`.
    pub fn siblings_hex(&self) -> Vec<String> {
        self.siblings.iter().map(Hash32::to_hex).collect()
    }
}

/// Certificate public keys held in a deterministic treap.
#[derive(Debug, Clone, Default)]
pub struct CertTree {
    treap: CertTreap,
}

impl CertTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw public keys. Duplicate keys collapse to one leaf.
    pub fn from_public_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let mut tree = Self::new();
        for key in keys {
            tree.insert_public_key(key.as_ref());
        }
        tree
    }

    /// Insert a raw public key and return its leaf hash.
    pub fn insert_public_key(&mut self, public_key: &[u8]) -> Hash32 {
        let leaf = keccak256(public_key);
        self.treap.insert(leaf, derive_priority(&leaf));
        leaf
    }

    /// Remove a raw public key. Returns `false` if it was absent.
    pub fn remove_public_key(&mut self, public_key: &[u8]) -> bool {
        self.treap.remove(&keccak256(public_key))
    }

    /// True when the key is a member.
    pub fn contains_public_key(&self, public_key: &[u8]) -> bool {
        self.treap.contains(&keccak256(public_key))
    }

    pub fn root(&self) -> Option<Hash32> {
        self.treap.merkle_root()
    }

    pub fn len(&self) -> usize {
        self.treap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.treap.is_empty()
    }

    /// Inclusion proof for a raw public key, or `None` if it is not a member.
    pub fn inclusion_proof(&self, public_key: &[u8]) -> Option<InclusionProof> {
        self.leaf_proof(&keccak256(public_key))
    }

    /// Inclusion proof for an already-hashed leaf.
    pub fn leaf_proof(&self, leaf: &Hash32) -> Option<InclusionProof> {
        if !self.treap.contains(leaf) {
            return None;
        }
        Some(InclusionProof {
            leaf: *leaf,
            siblings: self.treap.merkle_path(leaf),
        })
    }

    /// The underlying treap.
    pub fn treap(&self) -> &CertTreap {
        &self.treap
    }
}
