//! Revocation support: the challenge, the document re-read seam, and the
//! classification of relayer errors that mean "nothing left to revoke".

use async_trait::async_trait;
use passid_core::{Hash32, ParsedDocument};
use thiserror::Error;

use crate::chain::TxHash;

/// The 8-byte AA challenge for revoking `active_identity`: its last eight
/// bytes.
pub fn revocation_challenge(active_identity: &Hash32) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&active_identity.as_bytes()[24..32]);
    out
}

/// The document re-read failed or was cancelled.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("document re-read failed: {0}")]
pub struct SignerError(pub String);

/// Re-reads the chip to obtain an active-authentication signature over a
/// challenge. Implemented by the NFC layer.
#[async_trait]
pub trait ChallengeSigner: Send + Sync {
    async fn sign_challenge(
        &self,
        document: &ParsedDocument,
        challenge: &[u8; 8],
    ) -> Result<Vec<u8>, SignerError>;
}

/// Remote revocation failures that leave the passport revocable or already
/// revoked, and so count as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenignRevokeOutcome {
    /// `"the leaf does not match"`: the binding changed since it was read.
    LeafDoesNotMatch,
    /// `"already revoked"`.
    AlreadyRevoked,
}

impl BenignRevokeOutcome {
    const ALLOW_LIST: [(&'static str, Self); 2] = [
        ("the leaf does not match", Self::LeafDoesNotMatch),
        ("already revoked", Self::AlreadyRevoked),
    ];

    /// Match a remote error message against the allow-list.
    pub fn classify(message: &str) -> Option<Self> {
        Self::ALLOW_LIST
            .iter()
            .find(|(needle, _)| message.contains(needle))
            .map(|(_, outcome)| *outcome)
    }
}

/// Result of a revocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// The passport now reads as revoked after this attempt's transaction.
    /// `tx_hash` is absent when the relayer's answer was lost.
    Revoked { tx_hash: Option<TxHash> },
    /// The relayer or chain reported a benign failure.
    Benign(BenignRevokeOutcome),
    /// The passport was never bound; no call was made.
    NothingToRevoke,
}
