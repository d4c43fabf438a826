//! # Pairwise Hash Combinator
//!
//! `combine(a, b) = Keccak256(min(a, b) || max(a, b))` with absent inputs
//! acting as the identity element. Sorting before hashing makes the
//! combinator commutative, which lets a verifier fold a proof path without
//! knowing which side each sibling sat on.

use passid_core::{keccak256, Hash32};

/// Hash two present values in ascending order.
pub fn hash_pair(a: &Hash32, b: &Hash32) -> Hash32 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(lo.as_bytes());
    buf[32..].copy_from_slice(hi.as_bytes());
    keccak256(&buf)
}

/// Combine two optional values. `None` is the identity element.
pub fn combine(a: Option<Hash32>, b: Option<Hash32>) -> Option<Hash32> {
    match (a, b) {
        (None, b) => b,
        (a, None) => a,
        (Some(a), Some(b)) => Some(hash_pair(&a, &b)),
    }
}

/// Fold a leaf-to-root path: `acc = combine(acc, x)` starting from `leaf`.
pub fn fold_path(leaf: Hash32, path: &[Hash32]) -> Hash32 {
    path.iter().fold(leaf, |acc, x| hash_pair(&acc, x))
}
