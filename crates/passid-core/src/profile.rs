//! # Signature Profiles
//!
//! The cryptographic profile of a document signing certificate: algorithm
//! family, digest, key size and the family-specific parameters. Circuit
//! selection matches on this tuple exactly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Signature algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// RSASSA-PKCS1-v1_5.
    #[serde(rename = "RSA")]
    Rsa,
    /// RSASSA-PSS with MGF1 over the same digest.
    #[serde(rename = "RSA-PSS")]
    RsaPss,
    /// ECDSA over a named curve.
    #[serde(rename = "ECDSA")]
    Ecdsa,
}

impl SignatureAlgorithm {
    /// Returns the canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rsa => "RSA",
            Self::RsaPss => "RSA-PSS",
            Self::Ecdsa => "ECDSA",
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('_', "-").as_str() {
            "RSA" => Ok(Self::Rsa),
            "RSA-PSS" | "RSAPSS" => Ok(Self::RsaPss),
            "ECDSA" => Ok(Self::Ecdsa),
            other => Err(format!("unknown signature algorithm: {other}")),
        }
    }
}

/// Message digest used by the certificate signature (and therefore by the
/// SOD data-group hashes the circuit recomputes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-1.
    #[serde(rename = "SHA1")]
    Sha1,
    /// SHA-224.
    #[serde(rename = "SHA224")]
    Sha224,
    /// SHA-256.
    #[serde(rename = "SHA256")]
    Sha256,
    /// SHA-384.
    #[serde(rename = "SHA384")]
    Sha384,
    /// SHA-512.
    #[serde(rename = "SHA512")]
    Sha512,
}

impl HashAlgorithm {
    /// Digest length in bytes.
    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Digest length in bits, as it appears in circuit names.
    pub fn bits(&self) -> usize {
        self.digest_len() * 8
    }

    /// Returns the canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha224 => "SHA224",
            Self::Sha256 => "SHA256",
            Self::Sha384 => "SHA384",
            Self::Sha512 => "SHA512",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace(['-', '_'], "").as_str() {
            "SHA1" | "SHA160" => Ok(Self::Sha1),
            "SHA224" | "SHA2224" => Ok(Self::Sha224),
            "SHA256" | "SHA2256" => Ok(Self::Sha256),
            "SHA384" | "SHA2384" => Ok(Self::Sha384),
            "SHA512" | "SHA2512" => Ok(Self::Sha512),
            other => Err(format!("unknown hash algorithm: {other}")),
        }
    }
}

/// Named elliptic curves that appear on document signing certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Curve {
    /// NIST P-192.
    #[serde(rename = "secp192r1")]
    Secp192r1,
    /// NIST P-224.
    #[serde(rename = "secp224r1")]
    Secp224r1,
    /// NIST P-256.
    #[serde(rename = "secp256r1")]
    Secp256r1,
    /// NIST P-384.
    #[serde(rename = "secp384r1")]
    Secp384r1,
    /// NIST P-521.
    #[serde(rename = "secp521r1")]
    Secp521r1,
    /// Brainpool P-256 r1.
    #[serde(rename = "brainpoolP256r1")]
    BrainpoolP256r1,
    /// Brainpool P-320 r1.
    #[serde(rename = "brainpoolP320r1")]
    BrainpoolP320r1,
    /// Brainpool P-384 r1.
    #[serde(rename = "brainpoolP384r1")]
    BrainpoolP384r1,
    /// Brainpool P-512 r1.
    #[serde(rename = "brainpoolP512r1")]
    BrainpoolP512r1,
}

impl Curve {
    /// All supported curves.
    pub const ALL: [Curve; 9] = [
        Self::Secp192r1,
        Self::Secp224r1,
        Self::Secp256r1,
        Self::Secp384r1,
        Self::Secp521r1,
        Self::BrainpoolP256r1,
        Self::BrainpoolP320r1,
        Self::BrainpoolP384r1,
        Self::BrainpoolP512r1,
    ];

    /// Returns the curve name in its usual mixed-case spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Secp192r1 => "secp192r1",
            Self::Secp224r1 => "secp224r1",
            Self::Secp256r1 => "secp256r1",
            Self::Secp384r1 => "secp384r1",
            Self::Secp521r1 => "secp521r1",
            Self::BrainpoolP256r1 => "brainpoolP256r1",
            Self::BrainpoolP320r1 => "brainpoolP320r1",
            Self::BrainpoolP384r1 => "brainpoolP384r1",
            Self::BrainpoolP512r1 => "brainpoolP512r1",
        }
    }

    /// Field size in bits.
    pub fn field_bits(&self) -> u32 {
        match self {
            Self::Secp192r1 => 192,
            Self::Secp224r1 => 224,
            Self::Secp256r1 | Self::BrainpoolP256r1 => 256,
            Self::BrainpoolP320r1 => 320,
            Self::Secp384r1 | Self::BrainpoolP384r1 => 384,
            Self::BrainpoolP512r1 => 512,
            Self::Secp521r1 => 521,
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Curve {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown curve: {s}"))
    }
}

/// The full parameter tuple of a signing certificate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignatureProfile {
    /// Algorithm family.
    pub algorithm: SignatureAlgorithm,
    /// Signature digest.
    pub hash_algorithm: HashAlgorithm,
    /// Modulus size (RSA) or field size (ECDSA) in bits.
    pub key_size: u32,
    /// RSA public exponent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exponent: Option<u64>,
    /// RSA-PSS salt length in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<u32>,
    /// ECDSA named curve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<Curve>,
}

impl SignatureProfile {
    /// PKCS#1 v1.5 RSA profile.
    pub fn rsa(hash_algorithm: HashAlgorithm, key_size: u32, exponent: u64) -> Self {
        Self {
            algorithm: SignatureAlgorithm::Rsa,
            hash_algorithm,
            key_size,
            exponent: Some(exponent),
            salt: None,
            curve: None,
        }
    }

    /// RSA-PSS profile.
    pub fn rsa_pss(hash_algorithm: HashAlgorithm, key_size: u32, exponent: u64, salt: u32) -> Self {
        Self {
            algorithm: SignatureAlgorithm::RsaPss,
            hash_algorithm,
            key_size,
            exponent: Some(exponent),
            salt: Some(salt),
            curve: None,
        }
    }

    /// ECDSA profile; the key size is the curve's field size.
    pub fn ecdsa(hash_algorithm: HashAlgorithm, curve: Curve) -> Self {
        Self {
            algorithm: SignatureAlgorithm::Ecdsa,
            hash_algorithm,
            key_size: curve.field_bits(),
            exponent: None,
            salt: None,
            curve: Some(curve),
        }
    }
}

impl fmt::Display for SignatureProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.algorithm, self.hash_algorithm, self.key_size)?;
        if let Some(e) = self.exponent {
            write!(f, "/e={e}")?;
        }
        if let Some(s) = self.salt {
            write!(f, "/salt={s}")?;
        }
        if let Some(c) = self.curve {
            write!(f, "/{c}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_algorithm_lengths() {
        assert_eq!(HashAlgorithm::Sha1.bits(), 160);
        assert_eq!(HashAlgorithm::Sha224.bits(), 224);
        assert_eq!(HashAlgorithm::Sha256.bits(), 256);
        assert_eq!(HashAlgorithm::Sha384.bits(), 384);
        assert_eq!(HashAlgorithm::Sha512.bits(), 512);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("sha-256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("rsa_pss".parse::<SignatureAlgorithm>().unwrap(), SignatureAlgorithm::RsaPss);
        assert_eq!("BRAINPOOLP320R1".parse::<Curve>().unwrap(), Curve::BrainpoolP320r1);
        assert!("md5".parse::<HashAlgorithm>().is_err());
    }

    #[test]
    fn test_profile_display() {
        let p = SignatureProfile::rsa_pss(HashAlgorithm::Sha256, 2048, 65537, 32);
        assert_eq!(p.to_string(), "RSA-PSS/SHA256/2048/e=65537/salt=32");
        let e = SignatureProfile::ecdsa(HashAlgorithm::Sha256, Curve::BrainpoolP256r1);
        assert_eq!(e.to_string(), "ECDSA/SHA256/256/brainpoolP256r1");
    }

    #[test]
    fn test_profile_serde_skips_absent_fields() {
        let p = SignatureProfile::ecdsa(HashAlgorithm::Sha1, Curve::Secp192r1);
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("exponent").is_none());
        assert_eq!(json["curve"], "secp192r1");
        assert_eq!(json["algorithm"], "ECDSA");
    }
}
