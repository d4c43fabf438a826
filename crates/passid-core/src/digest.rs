//! # Keccak Digests — 32-byte Values
//!
//! Defines [`Hash32`], the single 32-byte value type used for certificate
//! leaves, Merkle accumulators, on-chain identity keys, commitments and
//! proof public signals, together with the Keccak-256 helpers that produce
//! them.
//!
//! ## Ordering
//!
//! `Hash32` derives `Ord` over its byte array, which is lexicographic and
//! therefore identical to big-endian unsigned integer comparison. The treap
//! BST order and the pairwise combinator both depend on this.
//!
//! ## Text form
//!
//! `0x`-prefixed lowercase hex, 64 digits. Serde uses the same form.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};

use crate::error::DigestError;

/// A 32-byte digest or EVM word.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash32([u8; 32]);

impl Hash32 {
    /// The all-zero value. On chain this is the "no active identity" sentinel.
    pub const ZERO: Hash32 = Hash32([0u8; 32]);

    /// Wrap raw bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Build from a slice that must be exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DigestError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| DigestError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Build from at most 32 bytes, left-padding with zeros (`zeroPad` on the
    /// EVM side).
    pub fn left_padded(bytes: &[u8]) -> Result<Self, DigestError> {
        if bytes.len() > 32 {
            return Err(DigestError::InvalidLength(bytes.len()));
        }
        let mut out = [0u8; 32];
        out[32 - bytes.len()..].copy_from_slice(bytes);
        Ok(Self(out))
    }

    /// Parse a 64-digit hex string, with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self, DigestError> {
        let bytes = decode_hex(s)?;
        Self::from_slice(&bytes)
    }

    /// Parse a circuit field element, given either in decimal (Circom
    /// public signals) or as `0x`-hex (Noir public signals), into a
    /// left-padded 32-byte word.
    pub fn from_field_element(s: &str) -> Result<Self, DigestError> {
        let trimmed = s.trim();
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex_digits) if hex_digits.is_empty() => Some(BigUint::default()),
            Some(hex_digits) => BigUint::parse_bytes(hex_digits.as_bytes(), 16),
            None => BigUint::parse_bytes(trimmed.as_bytes(), 10),
        };
        let value =
            parsed.ok_or_else(|| DigestError::InvalidFieldElement(trimmed.to_string()))?;
        Self::from_biguint(&value)
    }

    /// Convert a non-negative integer below 2^256.
    pub fn from_biguint(value: &BigUint) -> Result<Self, DigestError> {
        let bytes = value.to_bytes_be();
        if bytes == [0] {
            return Ok(Self::ZERO);
        }
        Self::left_padded(&bytes)
    }

    /// Widen a `u64` into a big-endian word.
    pub fn from_u64(value: u64) -> Self {
        let mut out = [0u8; 32];
        out[24..].copy_from_slice(&value.to_be_bytes());
        Self(out)
    }

    /// The value as a big-endian unsigned integer.
    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Copy out the raw bytes.
    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    /// True for the all-zero value.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// The value minus one as a fixed-width 32-byte integer.
    ///
    /// Returns `None` for zero, which has no predecessor.
    pub fn predecessor(&self) -> Option<Self> {
        if self.is_zero() {
            return None;
        }
        let mut out = self.0;
        for byte in out.iter_mut().rev() {
            if *byte == 0 {
                *byte = 0xff;
            } else {
                *byte -= 1;
                break;
            }
        }
        Some(Self(out))
    }

    /// Render as `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        encode_hex(&self.0)
    }
}

impl From<[u8; 32]> for Hash32 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash32 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({})", self.to_hex())
    }
}

impl FromStr for Hash32 {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Hash32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Keccak-256
// ---------------------------------------------------------------------------

/// Keccak-256 (the Ethereum variant, not FIPS SHA3-256).
pub fn keccak256(data: &[u8]) -> Hash32 {
    let digest = Keccak256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Hash32(out)
}

/// Keccak-256 of a UTF-8 tag such as `"P_NO_DATA"` or a function signature.
pub fn keccak256_str(tag: &str) -> Hash32 {
    keccak256(tag.as_bytes())
}

// ---------------------------------------------------------------------------
// Hex
// ---------------------------------------------------------------------------

/// Encode bytes as `0x`-prefixed lowercase hex.
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode hex with an optional `0x` prefix. Odd-length input is rejected.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, DigestError> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex::decode(digits).map_err(|e| DigestError::InvalidHex(format!("{e}")))
}

/// Serde adapter for `Vec<u8>` fields rendered as `0x`-hex strings.
pub mod serde_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize bytes as `0x`-hex.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_hex(bytes))
    }

    /// Deserialize `0x`-hex into bytes.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::decode_hex(&s).map_err(serde::de::Error::custom)
    }

    /// The same adapter for `Option<Vec<u8>>`.
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        /// Serialize optional bytes as `0x`-hex or `null`.
        pub fn serialize<S: Serializer>(
            bytes: &Option<Vec<u8>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(b) => serializer.serialize_some(&super::super::encode_hex(b)),
                None => serializer.serialize_none(),
            }
        }

        /// Deserialize optional `0x`-hex.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec<u8>>, D::Error> {
            let s = Option::<String>::deserialize(deserializer)?;
            s.map(|s| super::super::decode_hex(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_empty_vector() {
        assert_eq!(
            keccak256(b"").to_hex(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_hex_roundtrip_with_and_without_prefix() {
        let h = keccak256(b"abc");
        assert_eq!(Hash32::from_hex(&h.to_hex()).unwrap(), h);
        assert_eq!(Hash32::from_hex(&h.to_hex()[2..]).unwrap(), h);
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        assert_eq!(
            Hash32::from_slice(&[1u8; 31]),
            Err(DigestError::InvalidLength(31))
        );
    }

    #[test]
    fn test_left_padded() {
        let h = Hash32::left_padded(&[0xab, 0xcd]).unwrap();
        assert_eq!(h.as_bytes()[30], 0xab);
        assert_eq!(h.as_bytes()[31], 0xcd);
        assert!(h.as_bytes()[..30].iter().all(|b| *b == 0));
        assert!(Hash32::left_padded(&[0u8; 33]).is_err());
    }

    #[test]
    fn test_field_element_decimal_and_hex_agree() {
        let dec = Hash32::from_field_element("255").unwrap();
        let hex = Hash32::from_field_element("0xff").unwrap();
        assert_eq!(dec, hex);
        assert_eq!(dec, Hash32::from_u64(255));
        assert_eq!(Hash32::from_field_element("0").unwrap(), Hash32::ZERO);
        assert!(Hash32::from_field_element("12a").is_err());
    }

    #[test]
    fn test_field_element_too_large_rejected() {
        // 2^256
        let too_big = format!("0x1{}", "0".repeat(64));
        assert!(Hash32::from_field_element(&too_big).is_err());
    }

    #[test]
    fn test_predecessor_borrows_across_bytes() {
        let mut bytes = [0u8; 32];
        bytes[30] = 1;
        let h = Hash32::new(bytes);
        let p = h.predecessor().unwrap();
        assert_eq!(p.as_bytes()[30], 0);
        assert_eq!(p.as_bytes()[31], 0xff);
        assert!(Hash32::ZERO.predecessor().is_none());
        assert!(p < h);
    }

    #[test]
    fn test_ordering_is_big_endian() {
        let small = Hash32::from_u64(1);
        let mut big_bytes = [0u8; 32];
        big_bytes[0] = 1;
        assert!(small < Hash32::new(big_bytes));
    }

    #[test]
    fn test_serde_as_hex_string() {
        let h = Hash32::from_u64(7);
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{}\"", h.to_hex()));
        let back: Hash32 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn test_decode_hex_rejects_odd_length() {
        assert!(decode_hex("0xabc").is_err());
        assert_eq!(decode_hex("0x").unwrap(), Vec::<u8>::new());
    }
}
