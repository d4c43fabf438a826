//! # Registration Errors
//!
//! Two layers. [`RemoteError`] covers everything that can go wrong talking
//! to the relayer or the chain node. [`RegistrationError`] is what a
//! registration or revocation attempt returns to its caller; remote errors
//! convert into it via `#[from]`.

use passid_core::Hash32;
use passid_zkp::ZkpError;
use thiserror::Error;

use crate::abi::AbiError;
use crate::calldata::CallDataError;
use crate::config::ConfigError;

/// Errors from relayer or JSON-RPC calls.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// A relayer submission got no answer in time. The transaction may
    /// have been broadcast; only a chain read can tell.
    #[error("submission to {endpoint} timed out; the transaction may have been accepted")]
    SubmissionTimedOut { endpoint: String },

    /// HTTP transport error (after retries).
    #[error("HTTP error calling {endpoint}: {source}")]
    Transport {
        endpoint: String,
        source: reqwest::Error,
    },

    /// The endpoint answered with a non-2xx status.
    #[error("{endpoint} returned {status}: {body}")]
    Rejected {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// JSON-RPC `error` object.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The transaction was mined but reverted.
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: Hash32 },

    /// The response body could not be understood.
    #[error("malformed response from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },

    /// Return data did not decode.
    #[error("ABI decoding failed: {0}")]
    Abi(#[from] AbiError),
}

impl RemoteError {
    /// Text a remote service attached to the failure, used for substring
    /// classification of contract revert reasons.
    pub fn message(&self) -> String {
        match self {
            Self::Rejected { body, .. } => body.clone(),
            Self::Rpc { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Transport failures and 5xx answers are worth retrying later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::SubmissionTimedOut { .. } => true,
            Self::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Errors from a registration or revocation attempt.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// No circuit, or more than one, accepts the certificate profile.
    #[error("unsupported certificate profile: {0}")]
    UnsupportedCertificateProfile(String),

    /// The signing certificate is already in the on-chain tree.
    #[error("certificate {index} is already registered")]
    CertificateAlreadyRegistered { index: Hash32 },

    /// The signing certificate cannot be linked to a trusted CSCA.
    #[error("untrusted signing certificate: {0}")]
    UntrustedCertificate(String),

    /// The passport is bound to a different identity key.
    #[error(
        "passport {identity_key} is registered with another public key ({active_identity}); revoke first"
    )]
    PassportRegisteredWithAnotherPK {
        identity_key: Hash32,
        active_identity: Hash32,
    },

    /// The prover failed, or the document cannot be proven as given.
    #[error("proof generation failed: {0}")]
    ProofGenerationFailed(String),

    /// The relayer or chain node failed.
    #[error("relayer or chain error: {0}")]
    RelayerOrChain(#[from] RemoteError),

    /// A bounded wait ran out.
    #[error("timed out during {stage} after {seconds}s")]
    Timeout { stage: &'static str, seconds: u64 },

    /// Configuration was invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl RegistrationError {
    /// Whether retrying the same attempt later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RelayerOrChain(e) => e.is_transient(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

impl From<ZkpError> for RegistrationError {
    fn from(err: ZkpError) -> Self {
        match err {
            ZkpError::UnsupportedCertificateProfile { .. } | ZkpError::AmbiguousCircuit { .. } => {
                Self::UnsupportedCertificateProfile(err.to_string())
            }
            other => Self::ProofGenerationFailed(other.to_string()),
        }
    }
}

impl From<CallDataError> for RegistrationError {
    fn from(err: CallDataError) -> Self {
        match err {
            CallDataError::UnsupportedDispatcher(_) => {
                Self::UnsupportedCertificateProfile(err.to_string())
            }
            other => Self::ProofGenerationFailed(other.to_string()),
        }
    }
}
