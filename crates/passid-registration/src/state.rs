//! Registration state machine: states and the on-chain decision.
//!
//! ```text
//! CertificateCheck -> CertificateRegister? -> ProofGeneration
//!   -> PassportInfoLookup -> Decision
//!        Register | Reissue  -> CallDataSubmit -> Confirmed
//!        AlreadyCurrent      -> Confirmed
//!        ConflictRevokeRequired -> Revoke -> (rerun from CertificateCheck)
//! ```

use std::fmt;

use passid_core::Hash32;

use crate::chain::PassportInfo;

/// What to do given the current passport binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Never bound: `register`.
    Register,
    /// Revoked: `reissueIdentity`.
    Reissue,
    /// Already bound to the caller's key. Nothing to submit.
    AlreadyCurrent,
    /// Bound to another key; revoke before retrying.
    ConflictRevokeRequired { active_identity: Hash32 },
}

impl Decision {
    /// Decide from a `PassportInfo` read and the caller's identity-key hash.
    pub fn from_passport_info(info: &PassportInfo, own_key_hash: &Hash32) -> Self {
        if info.is_unregistered() {
            Self::Register
        } else if info.is_revoked() {
            Self::Reissue
        } else if info.active_identity == *own_key_hash {
            Self::AlreadyCurrent
        } else {
            Self::ConflictRevokeRequired {
                active_identity: info.active_identity,
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Reissue => "reissue",
            Self::AlreadyCurrent => "already_current",
            Self::ConflictRevokeRequired { .. } => "conflict_revoke_required",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States of one registration attempt, as logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    CertificateCheck,
    CertificateRegister,
    ProofGeneration,
    PassportInfoLookup,
    Decision(Decision),
    CallDataSubmit,
    Confirmed,
    Revoke,
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CertificateCheck => f.write_str("certificate_check"),
            Self::CertificateRegister => f.write_str("certificate_register"),
            Self::ProofGeneration => f.write_str("proof_generation"),
            Self::PassportInfoLookup => f.write_str("passport_info_lookup"),
            Self::Decision(d) => write!(f, "decision:{d}"),
            Self::CallDataSubmit => f.write_str("call_data_submit"),
            Self::Confirmed => f.write_str("confirmed"),
            Self::Revoke => f.write_str("revoke"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::revoked_sentinel;

    fn info(active: Hash32) -> PassportInfo {
        PassportInfo {
            active_identity: active,
            ..PassportInfo::default()
        }
    }

    #[test]
    fn test_decision_table() {
        let own = Hash32::from_u64(1);
        let other = Hash32::from_u64(2);
        assert_eq!(
            Decision::from_passport_info(&info(Hash32::ZERO), &own),
            Decision::Register
        );
        assert_eq!(
            Decision::from_passport_info(&info(revoked_sentinel()), &own),
            Decision::Reissue
        );
        assert_eq!(
            Decision::from_passport_info(&info(own), &own),
            Decision::AlreadyCurrent
        );
        assert_eq!(
            Decision::from_passport_info(&info(other), &own),
            Decision::ConflictRevokeRequired {
                active_identity: other
            }
        );
    }

    #[test]
    fn test_state_display() {
        assert_eq!(
            RegistrationState::Decision(Decision::Reissue).to_string(),
            "decision:reissue"
        );
        assert_eq!(RegistrationState::CallDataSubmit.to_string(), "call_data_submit");
    }
}
