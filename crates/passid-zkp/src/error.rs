//! # Circuit Layer Errors

use passid_core::{Curve, DigestError, DocumentError};
use thiserror::Error;

/// Errors from circuit selection, naming and proof-output decoding.
#[derive(Error, Debug)]
pub enum ZkpError {
    /// No circuit in the catalog handles this certificate profile.
    #[error("unsupported certificate profile: {profile}")]
    UnsupportedCertificateProfile { profile: String },

    /// More than one circuit matched. The catalog itself is defective.
    #[error("catalog defect: profile {profile} matches circuits {ids:?}")]
    AmbiguousCircuit { profile: String, ids: Vec<u32> },

    /// Two descriptors share a profile tuple or a static id.
    #[error("catalog defect: descriptors {first} and {second} collide on {what}")]
    DuplicateDescriptor {
        first: u32,
        second: u32,
        what: &'static str,
    },

    /// A circuit name did not have the expected `prefix_rest` shape.
    #[error("invalid circuit name: {0:?}")]
    InvalidCircuitName(String),

    /// The circuit is not published in the artifact registry.
    #[error("circuit not found: {0}")]
    CircuitNotFound(String),

    /// No active-authentication signature type exists for this curve.
    #[error("unsupported active authentication curve: {0}")]
    UnsupportedActiveAuthCurve(Curve),

    /// The proof carries fewer public signals than the layout needs.
    #[error("public signal {index} missing (proof has {len})")]
    MissingPublicSignal { index: usize, len: usize },

    /// A Groth16 point is malformed.
    #[error("malformed proof point: {0}")]
    MalformedProofPoint(String),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Digest(#[from] DigestError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
