//! # Identity Descriptor
//!
//! Canonical identity fields read out of a registration proof's public
//! signals. Where each field sits depends on the proof system and the
//! document family:
//!
//! | variant          | public key | passport hash | dg1 commitment | pk identity hash |
//! |------------------|-----------|---------------|----------------|------------------|
//! | Circom ePassport | 0         | 1             | 2              | 3                |
//! | Noir ePassport   | 0         | 1             | 2              | 3                |
//! | Noir eID         | n/a       | 2             | 3              | 4                |

use chrono::{DateTime, Utc};
use passid_core::{DocumentType, Hash32, ParsedDocument};
use serde::{Deserialize, Serialize};

use crate::error::ZkpError;
use crate::proof::{Proof, ProofSystem};

struct SignalLayout {
    public_key: Option<usize>,
    passport_hash: usize,
    dg1_commitment: usize,
    pk_identity_hash: usize,
}

const EPASSPORT: SignalLayout = SignalLayout {
    public_key: Some(0),
    passport_hash: 1,
    dg1_commitment: 2,
    pk_identity_hash: 3,
};

const NOIR_EID: SignalLayout = SignalLayout {
    public_key: None,
    passport_hash: 2,
    dg1_commitment: 3,
    pk_identity_hash: 4,
};

fn signal_layout(system: ProofSystem, doc_type: DocumentType) -> &'static SignalLayout {
    match (system, doc_type) {
        (ProofSystem::Noir, DocumentType::Id) => &NOIR_EID,
        (ProofSystem::Noir, DocumentType::Passport) | (ProofSystem::Circom, _) => &EPASSPORT,
    }
}

fn signal(signals: &[String], index: usize) -> Result<Hash32, ZkpError> {
    let raw = signals.get(index).ok_or(ZkpError::MissingPublicSignal {
        index,
        len: signals.len(),
    })?;
    Ok(Hash32::from_field_element(raw)?)
}

/// Identity fields derived from a proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityDescriptor {
    /// Absent for eID proofs.
    #[serde(default)]
    pub public_key: Option<Hash32>,
    pub passport_hash: Hash32,
    pub dg1_commitment: Hash32,
    /// Hash of the holder's identity key. This is what the registry stores
    /// as `activeIdentity`.
    pub pk_identity_hash: Hash32,
    /// `PassportInfo` lookup key: `public_key` for documents with active
    /// authentication, `passport_hash` otherwise.
    pub identity_key: Hash32,
}

impl IdentityDescriptor {
    /// Read the descriptor from `proof`'s public signals.
    pub fn from_proof(proof: &Proof, doc: &ParsedDocument) -> Result<Self, ZkpError> {
        let layout = signal_layout(proof.system(), doc.doc_type);
        let signals = proof.public_signals();

        let public_key = layout
            .public_key
            .map(|i| signal(signals, i))
            .transpose()?;
        let passport_hash = signal(signals, layout.passport_hash)?;
        let identity_key = match public_key {
            Some(pk) if doc.has_active_authentication() => pk,
            _ => passport_hash,
        };

        Ok(Self {
            public_key,
            passport_hash,
            dg1_commitment: signal(signals, layout.dg1_commitment)?,
            pk_identity_hash: signal(signals, layout.pk_identity_hash)?,
            identity_key,
        })
    }
}

/// A registered identity as persisted by the application.
///
/// Created once per successful proof and replaced wholesale on
/// re-registration; never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityItem {
    pub document: ParsedDocument,
    pub registration_proof: Proof,
    pub descriptor: IdentityDescriptor,
    pub circuit_name: String,
    pub created_at: DateTime<Utc>,
}

impl IdentityItem {
    /// Bundle a fresh proof with its document.
    pub fn new(
        document: ParsedDocument,
        registration_proof: Proof,
        circuit_name: impl Into<String>,
    ) -> Result<Self, ZkpError> {
        let descriptor = IdentityDescriptor::from_proof(&registration_proof, &document)?;
        Ok(Self {
            document,
            registration_proof,
            descriptor,
            circuit_name: circuit_name.into(),
            created_at: Utc::now(),
        })
    }

    pub fn system(&self) -> ProofSystem {
        self.registration_proof.system()
    }

    pub fn to_json(&self) -> Result<String, ZkpError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ZkpError> {
        Ok(serde_json::from_str(json)?)
    }
}
