//! # Document Layout
//!
//! Derives the positional parameters that appear in a circuit name from the
//! raw document bytes. Circuits are compiled for fixed byte positions, so
//! each parameter is an offset (in bits) or a SHA block count.
//!
//! Offsets are located by searching for the digest of the inner structure
//! inside the outer one, using the signing certificate's digest algorithm:
//!
//! | parameter            | digest of              | searched in            |
//! |----------------------|------------------------|------------------------|
//! | `dg1_shift`          | DG1                    | encapsulated content   |
//! | `encap_content_shift`| encapsulated content   | SOD                    |
//! | `dg15_shift`         | DG15                   | encapsulated content   |
//!
//! A digest that cannot be found is an error rather than a zero offset.

use passid_core::{ActiveAuthKey, Curve, DocumentError, HashAlgorithm, ParsedDocument};
use serde::Serialize;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use crate::error::ZkpError;

/// Hash `data` with `algorithm`.
pub fn digest(algorithm: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    match algorithm {
        HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
        HashAlgorithm::Sha224 => Sha224::digest(data).to_vec(),
        HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
        HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
    }
}

/// SHA blocks needed for a message of `len` bytes, including padding and
/// the length field: 64-byte blocks for digests up to 256 bits, 128-byte
/// blocks above.
pub fn chunk_number(len: usize, algorithm: HashAlgorithm) -> usize {
    let block = if algorithm.digest_len() <= 32 { 64 } else { 128 };
    (len + 8).div_ceil(block)
}

/// First byte offset of `needle` in `haystack`.
pub fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Active-authentication signature type id used in circuit names.
pub fn aa_signature_type(key: &ActiveAuthKey) -> Result<u32, ZkpError> {
    match key {
        ActiveAuthKey::Rsa { .. } => Ok(1),
        ActiveAuthKey::Ecdsa { curve, .. } => match curve {
            Curve::BrainpoolP256r1 => Ok(20),
            Curve::Secp256r1 => Ok(21),
            Curve::BrainpoolP320r1 => Ok(22),
            Curve::Secp192r1 => Ok(23),
            other => Err(ZkpError::UnsupportedActiveAuthCurve(*other)),
        },
    }
}

/// Positional parameters describing DG15 and the AA key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AaParams {
    pub sig_type: u32,
    pub dg15_shift_bits: usize,
    pub dg15_chunk_number: usize,
    /// Offset of the AA public key bytes inside DG15.
    pub key_shift_bits: usize,
}

/// Every positional parameter of a registration circuit name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DocumentLayout {
    pub hash_algorithm: HashAlgorithm,
    pub dg_hash_bits: usize,
    pub doc_type_code: u8,
    pub ec_chunk_number: usize,
    pub encap_content_shift_bits: usize,
    pub dg1_shift_bits: usize,
    /// Present iff the document has active authentication.
    pub aa: Option<AaParams>,
}

impl DocumentLayout {
    /// Derive the layout of `doc`.
    pub fn derive(doc: &ParsedDocument) -> Result<Self, ZkpError> {
        let alg = doc.signing_certificate.profile.hash_algorithm;
        let encap = &doc.encapsulated_content;

        let dg1_shift = find_subslice(encap, &digest(alg, &doc.dg1)).ok_or(
            DocumentError::DigestNotFound {
                what: "dg1",
                container: "encapsulated content",
            },
        )?;
        let encap_shift = find_subslice(&doc.sod, &digest(alg, encap)).ok_or(
            DocumentError::DigestNotFound {
                what: "encapsulated content",
                container: "sod",
            },
        )?;

        let aa = match doc.dg15.as_deref() {
            Some(dg15) if !dg15.is_empty() => Some(Self::derive_aa(doc, alg, dg15)?),
            _ => None,
        };

        Ok(Self {
            hash_algorithm: alg,
            dg_hash_bits: alg.bits(),
            doc_type_code: doc.doc_type.td_code(),
            ec_chunk_number: chunk_number(encap.len(), alg),
            encap_content_shift_bits: encap_shift * 8,
            dg1_shift_bits: dg1_shift * 8,
            aa,
        })
    }

    fn derive_aa(
        doc: &ParsedDocument,
        alg: HashAlgorithm,
        dg15: &[u8],
    ) -> Result<AaParams, ZkpError> {
        let key = doc
            .active_auth_key
            .as_ref()
            .ok_or(DocumentError::ActiveAuthKeyNotFound)?;
        let dg15_shift = find_subslice(&doc.encapsulated_content, &digest(alg, dg15)).ok_or(
            DocumentError::DigestNotFound {
                what: "dg15",
                container: "encapsulated content",
            },
        )?;
        let key_shift = find_subslice(dg15, key.public_key_bytes())
            .ok_or(DocumentError::ActiveAuthKeyNotFound)?;
        Ok(AaParams {
            sig_type: aa_signature_type(key)?,
            dg15_shift_bits: dg15_shift * 8,
            dg15_chunk_number: chunk_number(dg15.len(), alg),
            key_shift_bits: key_shift * 8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_number_block_sizes() {
        assert_eq!(chunk_number(56, HashAlgorithm::Sha256), 1);
        assert_eq!(chunk_number(57, HashAlgorithm::Sha256), 2);
        assert_eq!(chunk_number(260, HashAlgorithm::Sha256), 5);
        assert_eq!(chunk_number(120, HashAlgorithm::Sha512), 1);
        assert_eq!(chunk_number(121, HashAlgorithm::Sha384), 2);
    }

    #[test]
    fn test_digest_lengths() {
        for alg in [
            HashAlgorithm::Sha1,
            HashAlgorithm::Sha224,
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha384,
            HashAlgorithm::Sha512,
        ] {
            assert_eq!(digest(alg, b"x").len(), alg.digest_len());
        }
    }

    #[test]
    fn test_find_subslice() {
        assert_eq!(find_subslice(b"abcdef", b"cd"), Some(2));
        assert_eq!(find_subslice(b"abc", b"x"), None);
        assert_eq!(find_subslice(b"ab", b"abc"), None);
        assert_eq!(find_subslice(b"ab", b""), None);
    }

    #[test]
    fn test_aa_signature_types() {
        let ec = |curve| ActiveAuthKey::Ecdsa {
            public_key: vec![4],
            curve,
        };
        assert_eq!(aa_signature_type(&ec(Curve::BrainpoolP256r1)).unwrap(), 20);
        assert_eq!(aa_signature_type(&ec(Curve::Secp256r1)).unwrap(), 21);
        assert_eq!(aa_signature_type(&ec(Curve::Secp192r1)).unwrap(), 23);
        assert!(aa_signature_type(&ec(Curve::Secp521r1)).is_err());
        let rsa = ActiveAuthKey::Rsa {
            modulus: vec![1],
            exponent: 65537,
            hash_algorithm: None,
        };
        assert_eq!(aa_signature_type(&rsa).unwrap(), 1);
    }
}
