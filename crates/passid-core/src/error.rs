//! # Error Types — Structured Error Hierarchy
//!
//! Defines the leaf error types shared across passid. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Digest and hex errors carry the offending length or position.
//! - Document errors name the field that was missing or malformed.

use thiserror::Error;

/// Top-level error type for passid-core consumers.
#[derive(Error, Debug)]
pub enum PassidError {
    /// Digest or hex decoding failed.
    #[error("digest error: {0}")]
    Digest(#[from] DigestError),

    /// The parsed document is missing data or internally inconsistent.
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error decoding hex strings or building fixed-width digests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestError {
    /// Input was not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Input had the wrong byte length for a 32-byte value.
    #[error("expected 32 bytes, got {0}")]
    InvalidLength(usize),

    /// A field element did not parse as decimal or 0x-hex.
    #[error("invalid field element {0:?}")]
    InvalidFieldElement(String),
}

/// Error in the parsed document model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// A required data group or field is absent.
    #[error("missing document field: {0}")]
    MissingField(&'static str),

    /// A digest expected inside a signed structure was not found there.
    #[error("digest of {what} not found in {container}")]
    DigestNotFound {
        /// Which data was hashed (e.g. "dg1").
        what: &'static str,
        /// Which byte container was searched (e.g. "encapsulated content").
        container: &'static str,
    },

    /// The active-authentication key could not be located inside DG15.
    #[error("active authentication key not found in dg15")]
    ActiveAuthKeyNotFound,
}
