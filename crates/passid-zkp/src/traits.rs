//! # Prover Interface
//!
//! Witness calculation and proving run outside this workspace (native
//! Circom or Noir toolchains). The registration protocol reaches them only
//! through [`Prover`], so a mock and the real binaries are interchangeable.
//!
//! Implementations must be `Send + Sync`; the protocol holds one behind an
//! `Arc` and calls it from concurrent registration attempts.

use std::fmt;

use async_trait::async_trait;
use passid_core::{Hash32, ParsedDocument};
use thiserror::Error;

use crate::proof::{Proof, ProofSystem};

/// Error during proof generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProverError {
    /// The circuit artifacts are missing or unusable.
    #[error("circuit error: {0}")]
    Circuit(String),
    /// Witness generation failed (inputs do not satisfy the circuit).
    #[error("witness error: {0}")]
    Witness(String),
    /// Internal prover error.
    #[error("prover error: {0}")]
    Prover(String),
}

/// Inputs for one registration proof.
#[derive(Clone)]
pub struct ProofRequest {
    pub circuit_name: String,
    pub system: ProofSystem,
    pub document: ParsedDocument,
    /// Holder's identity secret (`skIdentity`).
    pub secret_key: Hash32,
    /// Certificate SMT root the signing certificate is proven against.
    pub merkle_root: Hash32,
    pub inclusion_branches: Vec<Hash32>,
}

impl fmt::Debug for ProofRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProofRequest")
            .field("circuit_name", &self.circuit_name)
            .field("system", &self.system)
            .field("secret_key", &"<redacted>")
            .field("merkle_root", &self.merkle_root)
            .field("inclusion_branches", &self.inclusion_branches.len())
            .finish()
    }
}

/// Generates registration proofs.
#[async_trait]
pub trait Prover: Send + Sync {
    async fn prove(&self, request: &ProofRequest) -> Result<Proof, ProverError>;
}
