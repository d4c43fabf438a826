//! # Mock Prover
//!
//! A deterministic stand-in for the native provers. Public signals are
//! Keccak digests of the request, laid out exactly as the real circuits lay
//! them out, so [`crate::descriptor::IdentityDescriptor`] and the
//! registration protocol run unchanged against it.
//!
//! ## Security Notice
//!
//! Mock proofs carry no zero-knowledge guarantees and verify nowhere but
//! in-memory test registries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use passid_core::{keccak256, DocumentType, Hash32};

use crate::proof::{Groth16Proof, Proof, ProofSystem};
use crate::traits::{ProofRequest, Prover, ProverError};

/// `pkIdentityHash` the mock reports for `secret_key`.
pub fn mock_pk_identity_hash(secret_key: &Hash32) -> Hash32 {
    keccak256(secret_key.as_bytes())
}

/// Deterministic prover for tests and dry runs.
#[derive(Debug, Default)]
pub struct MockProver {
    calls: AtomicUsize,
    delay: Option<Duration>,
    failure: Option<ProverError>,
}

impl MockProver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Always fail with `error`.
    pub fn failing(error: ProverError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// Number of `prove` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn render(value: &Hash32, system: ProofSystem) -> String {
    match system {
        ProofSystem::Circom => value.to_biguint().to_string(),
        ProofSystem::Noir => value.to_hex(),
    }
}

#[async_trait]
impl Prover for MockProver {
    async fn prove(&self, request: &ProofRequest) -> Result<Proof, ProverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        let doc = &request.document;
        let public_key = keccak256(
            doc.aa_public_key()
                .unwrap_or(doc.signing_certificate.public_key.as_slice()),
        );
        let passport_hash = keccak256(&doc.sod);
        let mut dg1_input = doc.dg1.clone();
        dg1_input.extend_from_slice(request.secret_key.as_bytes());
        let dg1_commitment = keccak256(&dg1_input);
        let pk_identity_hash = mock_pk_identity_hash(&request.secret_key);

        let system = request.system;
        let outputs = match (system, doc.doc_type) {
            (ProofSystem::Noir, DocumentType::Id) => vec![
                Hash32::ZERO,
                request.merkle_root,
                passport_hash,
                dg1_commitment,
                pk_identity_hash,
            ],
            _ => vec![public_key, passport_hash, dg1_commitment, pk_identity_hash],
        };
        let pub_signals = outputs.iter().map(|v| render(v, system)).collect();

        let seed = keccak256(request.circuit_name.as_bytes());
        Ok(match system {
            ProofSystem::Circom => {
                let coord = |i: u8| {
                    let mut b = seed.to_bytes();
                    b[0] = i;
                    Hash32::new(b).to_biguint().to_string()
                };
                Proof::Circom {
                    proof: Groth16Proof {
                        pi_a: vec![coord(1), coord(2), "1".into()],
                        pi_b: vec![
                            vec![coord(3), coord(4)],
                            vec![coord(5), coord(6)],
                            vec!["1".into(), "0".into()],
                        ],
                        pi_c: vec![coord(7), coord(8), "1".into()],
                        protocol: Some("groth16".into()),
                        curve: Some("bn128".into()),
                    },
                    pub_signals,
                }
            }
            ProofSystem::Noir => Proof::Noir {
                proof: seed.as_bytes().repeat(4),
                pub_signals,
            },
        })
    }
}
