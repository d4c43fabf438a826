//! # Circuit Catalog
//!
//! The static list of registration circuits, one per supported signing
//! certificate profile. The catalog is validated once at construction:
//! two descriptors with the same profile tuple, or the same static id, are
//! rejected so that [`CircuitCatalog::select`] can never silently prefer
//! one circuit over another.

use passid_core::{Curve, HashAlgorithm, SignatureProfile};
use serde::Serialize;

use crate::error::ZkpError;

/// Name prefix shared by every Circom registration circuit.
pub const CIRCUIT_PREFIX: &str = "registerIdentity";

/// One proof circuit and the certificate profile it verifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitDescriptor {
    pub prefix_name: String,
    /// Signature-type id, the first positional parameter of the full name.
    pub static_id: u32,
    pub profile: SignatureProfile,
}

impl CircuitDescriptor {
    pub fn new(static_id: u32, profile: SignatureProfile) -> Self {
        Self {
            prefix_name: CIRCUIT_PREFIX.to_string(),
            static_id,
            profile,
        }
    }
}

fn builtin_descriptors() -> Vec<CircuitDescriptor> {
    use HashAlgorithm::*;
    const E: u64 = 65537;
    vec![
        CircuitDescriptor::new(1, SignatureProfile::rsa(Sha256, 2048, E)),
        CircuitDescriptor::new(2, SignatureProfile::rsa(Sha256, 4096, E)),
        CircuitDescriptor::new(3, SignatureProfile::rsa(Sha1, 2048, E)),
        CircuitDescriptor::new(10, SignatureProfile::rsa_pss(Sha256, 2048, 3, 32)),
        CircuitDescriptor::new(11, SignatureProfile::rsa_pss(Sha256, 2048, E, 32)),
        CircuitDescriptor::new(12, SignatureProfile::rsa_pss(Sha256, 2048, E, 64)),
        CircuitDescriptor::new(13, SignatureProfile::rsa_pss(Sha384, 2048, E, 48)),
        CircuitDescriptor::new(14, SignatureProfile::rsa_pss(Sha256, 3072, E, 32)),
        CircuitDescriptor::new(15, SignatureProfile::rsa_pss(Sha512, 3072, E, 64)),
        CircuitDescriptor::new(20, SignatureProfile::ecdsa(Sha256, Curve::Secp256r1)),
        CircuitDescriptor::new(21, SignatureProfile::ecdsa(Sha256, Curve::BrainpoolP256r1)),
        CircuitDescriptor::new(22, SignatureProfile::ecdsa(Sha256, Curve::BrainpoolP320r1)),
        CircuitDescriptor::new(23, SignatureProfile::ecdsa(Sha1, Curve::Secp192r1)),
        CircuitDescriptor::new(24, SignatureProfile::ecdsa(Sha256, Curve::Secp224r1)),
        CircuitDescriptor::new(25, SignatureProfile::ecdsa(Sha384, Curve::BrainpoolP384r1)),
        CircuitDescriptor::new(26, SignatureProfile::ecdsa(Sha512, Curve::BrainpoolP512r1)),
        CircuitDescriptor::new(27, SignatureProfile::ecdsa(Sha512, Curve::Secp521r1)),
    ]
}

/// An immutable, validated list of circuit descriptors.
#[derive(Debug, Clone)]
pub struct CircuitCatalog {
    descriptors: Vec<CircuitDescriptor>,
}

impl CircuitCatalog {
    /// Validate and wrap `descriptors`.
    pub fn new(descriptors: Vec<CircuitDescriptor>) -> Result<Self, ZkpError> {
        for (i, a) in descriptors.iter().enumerate() {
            for b in &descriptors[i + 1..] {
                if a.profile == b.profile {
                    return Err(ZkpError::DuplicateDescriptor {
                        first: a.static_id,
                        second: b.static_id,
                        what: "profile",
                    });
                }
                if a.static_id == b.static_id {
                    return Err(ZkpError::DuplicateDescriptor {
                        first: a.static_id,
                        second: b.static_id,
                        what: "static id",
                    });
                }
            }
        }
        Ok(Self { descriptors })
    }

    /// The catalog of published registration circuits.
    pub fn builtin() -> Result<Self, ZkpError> {
        Self::new(builtin_descriptors())
    }

    pub fn descriptors(&self) -> &[CircuitDescriptor] {
        &self.descriptors
    }

    pub fn by_id(&self, static_id: u32) -> Option<&CircuitDescriptor> {
        self.descriptors.iter().find(|d| d.static_id == static_id)
    }

    /// The single descriptor whose profile equals `profile`.
    pub fn select(&self, profile: &SignatureProfile) -> Result<&CircuitDescriptor, ZkpError> {
        let matches: Vec<&CircuitDescriptor> = self
            .descriptors
            .iter()
            .filter(|d| d.profile == *profile)
            .collect();
        match matches.as_slice() {
            [one] => Ok(one),
            [] => Err(ZkpError::UnsupportedCertificateProfile {
                profile: profile.to_string(),
            }),
            many => Err(ZkpError::AmbiguousCircuit {
                profile: profile.to_string(),
                ids: many.iter().map(|d| d.static_id).collect(),
            }),
        }
    }
}
