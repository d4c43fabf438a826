//! # passid-zkp — Registration Circuits and Proofs
//!
//! Maps a document's cryptographic profile to exactly one proof circuit,
//! names it, tags it for the on-chain verifier, and decodes the identity
//! fields out of the resulting proof.
//!
//! ## Architecture
//!
//! - **Catalog** (`catalog.rs`): the validated static list of circuit
//!   descriptors and the exact-match selection function.
//!
//! - **Layout** (`layout.rs`): digest offsets and SHA block counts derived
//!   from the document bytes. These become the positional parameters.
//!
//! - **Naming** (`naming.rs`): full circuit names, `zkType`, and
//!   `resolve_circuit`, which runs selection, layout and naming together.
//!
//! - **Artifacts** (`artifacts.rs`): published circuit name to download URL.
//!
//! - **Proofs** (`proof.rs`, `descriptor.rs`): the proof-system-tagged
//!   [`Proof`] enum and the [`IdentityDescriptor`] read from its signals.
//!
//! - **Traits** (`traits.rs`): the async [`Prover`] seam. The native
//!   Circom/Noir provers sit behind it.
//!
//! - **Mock** (`mock.rs`, `fixtures.rs`): `MockProver` and synthetic
//!   documents, behind the default `mock` feature.
//!
//! ## Crate Policy
//!
//! - Depends on `passid-core` internally.
//! - No `unsafe` code.

pub mod artifacts;
pub mod catalog;
pub mod descriptor;
pub mod error;
#[cfg(feature = "mock")]
pub mod fixtures;
pub mod layout;
#[cfg(feature = "mock")]
pub mod mock;
pub mod naming;
pub mod proof;
pub mod traits;

pub use artifacts::{ArtifactEntry, NOIR_EID_CIRCUIT};
pub use catalog::{CircuitCatalog, CircuitDescriptor, CIRCUIT_PREFIX};
pub use descriptor::{IdentityDescriptor, IdentityItem};
pub use error::ZkpError;
pub use layout::{AaParams, DocumentLayout};
#[cfg(feature = "mock")]
pub use mock::MockProver;
pub use naming::{circuit_name, resolve_circuit, zk_type, ResolvedCircuit};
pub use proof::{Groth16Points, Groth16Proof, Proof, ProofSystem};
pub use traits::{ProofRequest, Prover, ProverError};
