//! # Circuit Names and zkType
//!
//! A full registration circuit name is the descriptor prefix followed by
//! positional parameters:
//!
//! ```text
//! registerIdentity_{sigId}_{dgHashBits}_{td}_{ecChunks}_{encapShift}_{dg1Shift}_NA
//! registerIdentity_{sigId}_{dgHashBits}_{td}_{ecChunks}_{encapShift}_{dg1Shift}_{aaSig}_{dg15Shift}_{dg15Chunks}_{aaKeyShift}
//! ```
//!
//! The registration contract identifies the verifier by `zkType`, a Keccak
//! tag derived from the name (Circom) or fixed (Noir).

use passid_core::{keccak256_str, DocumentType, Hash32, ParsedDocument};
use serde::Serialize;
use tracing::debug;

use crate::artifacts::{self, NOIR_EID_CIRCUIT};
use crate::catalog::{CircuitCatalog, CircuitDescriptor};
use crate::error::ZkpError;
use crate::layout::DocumentLayout;
use crate::proof::ProofSystem;

const CIRCOM_ZK_TYPE_PREFIX: &str = "Z_PER_PASSPORT";
const NOIR_ZK_TYPE_TAG: &str = "Z_NOIR_PASSPORT_ID_CARD_I";

/// Full circuit name for `descriptor` over a document with `layout`.
pub fn circuit_name(descriptor: &CircuitDescriptor, layout: &DocumentLayout) -> String {
    let mut parts = vec![
        descriptor.prefix_name.clone(),
        descriptor.static_id.to_string(),
        layout.dg_hash_bits.to_string(),
        layout.doc_type_code.to_string(),
        layout.ec_chunk_number.to_string(),
        layout.encap_content_shift_bits.to_string(),
        layout.dg1_shift_bits.to_string(),
    ];
    match &layout.aa {
        None => parts.push("NA".to_string()),
        Some(aa) => parts.extend([
            aa.sig_type.to_string(),
            aa.dg15_shift_bits.to_string(),
            aa.dg15_chunk_number.to_string(),
            aa.key_shift_bits.to_string(),
        ]),
    }
    parts.join("_")
}

/// The on-chain verifier tag for a circuit.
pub fn zk_type(name: &str, system: ProofSystem) -> Result<Hash32, ZkpError> {
    match system {
        ProofSystem::Noir => Ok(keccak256_str(NOIR_ZK_TYPE_TAG)),
        ProofSystem::Circom => {
            let parts: Vec<&str> = name.split('_').collect();
            if parts.len() < 2 {
                return Err(ZkpError::InvalidCircuitName(name.to_string()));
            }
            let tag = format!("{CIRCOM_ZK_TYPE_PREFIX}_{}", parts[1..].join("_"));
            Ok(keccak256_str(&tag))
        }
    }
}

/// Everything needed to prove and submit for one document.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedCircuit {
    pub name: String,
    pub system: ProofSystem,
    pub zk_type: Hash32,
    /// Absent for the Noir eID circuit, which is not profile-specific.
    pub descriptor: Option<CircuitDescriptor>,
    pub layout: Option<DocumentLayout>,
    /// Absent when the circuit has no published Circom artifact.
    pub download_url: Option<String>,
}

/// Select, name and tag the circuit that proves `doc` under `system`.
pub fn resolve_circuit(
    catalog: &CircuitCatalog,
    doc: &ParsedDocument,
    system: ProofSystem,
) -> Result<ResolvedCircuit, ZkpError> {
    if system == ProofSystem::Noir && doc.doc_type == DocumentType::Id {
        return Ok(ResolvedCircuit {
            name: NOIR_EID_CIRCUIT.to_string(),
            system,
            zk_type: zk_type(NOIR_EID_CIRCUIT, system)?,
            descriptor: None,
            layout: None,
            download_url: None,
        });
    }

    let descriptor = catalog.select(&doc.signing_certificate.profile)?;
    let layout = DocumentLayout::derive(doc)?;
    let name = circuit_name(descriptor, &layout);
    let download_url = artifacts::resolve(&name).ok();
    debug!(circuit = %name, published = download_url.is_some(), "resolved circuit");

    Ok(ResolvedCircuit {
        zk_type: zk_type(&name, system)?,
        name,
        system,
        descriptor: Some(descriptor.clone()),
        layout: Some(layout),
        download_url,
    })
}
