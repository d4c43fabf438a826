//! # Parsed Travel Document
//!
//! The document model handed to passid by the chip reader. NFC/APDU
//! reading, BAC/PACE, and ASN.1/X.509 parsing all happen upstream; what
//! arrives here is the raw data-group bytes plus the few structural facts
//! the registration flow needs (signing-certificate profile and offsets,
//! active-authentication key, chain-of-trust material).
//!
//! All byte fields serialize as `0x`-hex so an `IdentityItem` can be
//! persisted as plain JSON.

use serde::{Deserialize, Serialize};

use crate::digest::{keccak256, serde_hex, Hash32};
use crate::error::PassidError;
use crate::profile::{Curve, HashAlgorithm, SignatureProfile};

/// ICAO document family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    /// TD1 identity card.
    #[serde(rename = "ID")]
    Id,
    /// TD3 passport booklet.
    #[serde(rename = "PASSPORT")]
    Passport,
}

impl DocumentType {
    /// ICAO 9303 size code used in circuit names (TD1 = 1, TD3 = 3).
    pub fn td_code(&self) -> u8 {
        match self {
            Self::Id => 1,
            Self::Passport => 3,
        }
    }
}

/// Active-authentication public key from DG15.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "lowercase")]
pub enum ActiveAuthKey {
    /// RSA key; `hash_algorithm` is the digest recovered from the AA
    /// signature, absent if it could not be determined.
    Rsa {
        /// Big-endian modulus without a leading zero byte.
        #[serde(with = "serde_hex")]
        modulus: Vec<u8>,
        /// Public exponent.
        exponent: u64,
        /// Digest recovered from the AA signature.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hash_algorithm: Option<HashAlgorithm>,
    },
    /// ECDSA key (signatures are always over SHA-1 on current documents).
    Ecdsa {
        /// Uncompressed public point.
        #[serde(with = "serde_hex")]
        public_key: Vec<u8>,
        /// Named curve.
        curve: Curve,
    },
}

impl ActiveAuthKey {
    /// The key bytes submitted on chain as `Passport.publicKey`.
    pub fn public_key_bytes(&self) -> &[u8] {
        match self {
            Self::Rsa { modulus, .. } => modulus,
            Self::Ecdsa { public_key, .. } => public_key,
        }
    }
}

/// The document signing certificate (DSC, the "slave" certificate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningCertificate {
    /// Raw subject public key bytes. This is the certificate-tree leaf.
    #[serde(with = "serde_hex")]
    pub public_key: Vec<u8>,
    /// Signature profile of the certificate.
    pub profile: SignatureProfile,
    /// DER `tbsCertificate`.
    #[serde(with = "serde_hex")]
    pub tbs_certificate: Vec<u8>,
    /// Byte offset of the subject public key inside `tbs_certificate`.
    pub key_offset: u64,
    /// Byte offset of the `notAfter` field inside `tbs_certificate`.
    pub expiration_offset: u64,
}

impl SigningCertificate {
    /// Keccak-256 of the raw public key: the certificate's index in the
    /// on-chain certificate tree.
    pub fn certificate_index(&self) -> Hash32 {
        keccak256(&self.public_key)
    }
}

/// Chain-of-trust material linking the signing certificate to a CSCA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainOfTrust {
    /// Raw public key of the issuing CSCA ("master") certificate.
    #[serde(with = "serde_hex")]
    pub master_public_key: Vec<u8>,
    /// The CSCA's signature over the signing certificate.
    #[serde(with = "serde_hex")]
    pub icao_member_signature: Vec<u8>,
    /// The CSCA key in the encoding the registration contract verifies.
    #[serde(with = "serde_hex")]
    pub icao_member_key: Vec<u8>,
}

/// Biographic data decoded from DG1/DG11. Purely informational here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonDetails {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<String>,
    pub expiry_date: Option<String>,
    pub document_number: Option<String>,
    pub nationality: Option<String>,
    pub issuing_authority: Option<String>,
}

/// A chip read, as produced by the external document reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// ID card or passport.
    pub doc_type: DocumentType,
    /// Full EF.SOD bytes.
    #[serde(with = "serde_hex")]
    pub sod: Vec<u8>,
    /// LDS security object (the hashed data-group list).
    #[serde(with = "serde_hex")]
    pub encapsulated_content: Vec<u8>,
    /// CMS signed attributes.
    #[serde(with = "serde_hex")]
    pub signed_attributes: Vec<u8>,
    /// DG1 (MRZ data).
    #[serde(with = "serde_hex")]
    pub dg1: Vec<u8>,
    /// DG11 (additional personal details), if read.
    #[serde(default, with = "serde_hex::option")]
    pub dg11: Option<Vec<u8>>,
    /// DG15 (active-authentication public key), if the chip has one.
    #[serde(default, with = "serde_hex::option")]
    pub dg15: Option<Vec<u8>>,
    /// Chip's AA signature over the challenge supplied at read time.
    #[serde(default, with = "serde_hex::option")]
    pub aa_signature: Option<Vec<u8>>,
    /// Decoded DG15 key.
    #[serde(default)]
    pub active_auth_key: Option<ActiveAuthKey>,
    /// Document signing certificate.
    pub signing_certificate: SigningCertificate,
    /// CSCA linkage, needed only if the signing certificate is not yet
    /// registered on chain.
    #[serde(default)]
    pub chain_of_trust: Option<ChainOfTrust>,
    /// Decoded biographic data.
    #[serde(default)]
    pub person_details: PersonDetails,
}

impl ParsedDocument {
    /// True when the chip exposes active-authentication key material.
    pub fn has_active_authentication(&self) -> bool {
        self.dg15.as_ref().is_some_and(|d| !d.is_empty())
    }

    /// The AA signature, or empty bytes for chips without AA.
    pub fn aa_signature_or_empty(&self) -> &[u8] {
        if !self.has_active_authentication() {
            return &[];
        }
        self.aa_signature.as_deref().unwrap_or(&[])
    }

    /// The AA public key bytes, if known.
    pub fn aa_public_key(&self) -> Option<&[u8]> {
        self.active_auth_key.as_ref().map(ActiveAuthKey::public_key_bytes)
    }

    /// A copy of this document carrying a fresh AA signature, as produced by
    /// a re-read over a revocation challenge.
    pub fn with_aa_signature(&self, signature: Vec<u8>) -> Self {
        let mut doc = self.clone();
        doc.aa_signature = Some(signature);
        doc
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, PassidError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, PassidError> {
        Ok(serde_json::from_str(json)?)
    }
}
