//! # In-Memory Registry
//!
//! A single object playing the relayer, the Registration contract, the
//! StateKeeper and the certificates SMT. It decodes submitted call data,
//! applies the contract rules that matter to the registration flow, and
//! answers reads from its own state.
//!
//! ## Contract Rules Modelled
//!
//! - `registerCertificate`: the dispatcher named by `dataType` fixes the key
//!   length; the key is cut from the TBS bytes at `keyOffset` and its
//!   Keccak digest becomes the SMT index. An existing index is rejected with
//!   `"the key already exists"`. If an ICAO root is configured the
//!   master-list path must fold to it.
//! - `register` / `registerViaNoir` revert unless the passport is unbound.
//!   `reissueIdentity*` revert unless it is revoked. Both require a
//!   certificates root this registry has produced.
//! - `revoke` is rejected with `"already revoked"` or
//!   `"the leaf does not match"` as the contract would.
//!
//! The passport key is `Keccak256(publicKey)` when an AA signature is
//! present and `passportHash` otherwise.
//!
//! [`InMemoryRegistry::lose_next_answer`] makes the relayer apply the next
//! call and then fail with [`RemoteError::SubmissionTimedOut`], the way a
//! relayer that broadcast but answered too late looks to its client.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use passid_core::{keccak256, keccak256_str, Hash32, ParsedDocument};
use passid_crypto::fold_path;

use crate::abi::{hash32, Passport};
use crate::calldata::RegistrationCall;
use crate::chain::{
    revoked_sentinel, CertificateProof, PassportInfo, ReceiptStatus, RegistryReader, TxHash,
};
use crate::error::RemoteError;
use crate::relayer::{Relayer, TxRequest};
use crate::revoke::{ChallengeSigner, SignerError};

const ENDPOINT: &str = "in-memory relayer";

/// When submitted transactions report receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiptMode {
    /// Applied and mined immediately.
    #[default]
    Immediate,
    /// Applied, but the receipt never shows up.
    Withheld,
    /// Neither applied nor mined.
    Stalled,
}

/// A state change applied just before the next submission is processed,
/// as if another client's transaction landed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interference {
    BindPassport { key: Hash32, active_identity: Hash32 },
    RegisterCertificate { index: Hash32 },
}

#[derive(Debug, Default)]
struct State {
    passports: HashMap<Hash32, PassportInfo>,
    certificates: BTreeSet<Hash32>,
    known_roots: HashSet<Hash32>,
    dispatchers: HashMap<Hash32, usize>,
    icao_root: Option<Hash32>,
    receipts: HashMap<TxHash, ReceiptStatus>,
    receipt_mode: ReceiptMode,
    interference: Option<Interference>,
    rejections: Vec<(u16, String)>,
    lose_next_answer: bool,
    submissions: Vec<RegistrationCall>,
    reads: usize,
    nonce: u64,
    clock: u64,
}

impl State {
    fn certificates_root(&self) -> Hash32 {
        if self.certificates.is_empty() {
            return Hash32::ZERO;
        }
        let mut buf = Vec::with_capacity(self.certificates.len() * 32);
        for index in &self.certificates {
            buf.extend_from_slice(index.as_bytes());
        }
        keccak256(&buf)
    }
}

/// In-memory stand-in for the relayer plus the registry contracts.
#[derive(Debug)]
pub struct InMemoryRegistry {
    state: Mutex<State>,
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn rejected(body: impl Into<String>) -> RemoteError {
    RemoteError::Rejected {
        endpoint: ENDPOINT.to_string(),
        status: 400,
        body: body.into(),
    }
}

/// The passport key the StateKeeper derives from a `Passport` struct.
pub fn passport_key(passport: &Passport) -> Hash32 {
    if passport.signature.is_empty() {
        hash32(&passport.passportHash)
    } else {
        keccak256(&passport.publicKey)
    }
}

impl InMemoryRegistry {
    /// An empty registry knowing the RSA certificate dispatchers for
    /// 1024 to 4096-bit keys.
    pub fn new() -> Self {
        let registry = Self {
            state: Mutex::new(State::default()),
        };
        {
            let mut st = registry.state();
            st.known_roots.insert(Hash32::ZERO);
            for prefix in ["C_RSA_", "C_RSA_SHA1_", "C_RSA_SHA384_", "C_RSA_SHA512_", "C_RSAPSS_SHA2_"] {
                for bits in [1024usize, 2048, 3072, 4096] {
                    st.dispatchers
                        .insert(keccak256_str(&format!("{prefix}{bits}")), bits / 8);
                }
            }
        }
        registry
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Recognise another dispatcher; the key length is read from the
    /// trailing `_{bits}` of its name.
    pub fn register_dispatcher(&self, name: &str) -> bool {
        let Some(bits) = name.rsplit('_').next().and_then(|b| b.parse::<usize>().ok()) else {
            return false;
        };
        self.state().dispatchers.insert(keccak256_str(name), bits / 8);
        true
    }

    /// Require certificate registrations to prove membership under `root`.
    pub fn with_icao_root(self, root: Hash32) -> Self {
        self.state().icao_root = Some(root);
        self
    }

    /// Mark a certificate index as already registered.
    pub fn with_certificate(self, index: Hash32) -> Self {
        {
            let mut st = self.state();
            st.certificates.insert(index);
            let root = st.certificates_root();
            st.known_roots.insert(root);
        }
        self
    }

    /// Bind a passport key directly.
    pub fn bind_passport(&self, key: Hash32, active_identity: Hash32) {
        let mut st = self.state();
        st.clock += 1;
        let clock = st.clock;
        let entry = st.passports.entry(key).or_default();
        entry.active_identity = active_identity;
        entry.issue_timestamp = clock;
    }

    pub fn set_receipt_mode(&self, mode: ReceiptMode) {
        self.state().receipt_mode = mode;
    }

    /// Apply `interference` right before the next submission.
    pub fn interfere_before_next_submission(&self, interference: Interference) {
        self.state().interference = Some(interference);
    }

    /// Reject the next submission with `status` and `body`.
    pub fn reject_next_submission(&self, status: u16, body: impl Into<String>) {
        self.state().rejections.push((status, body.into()));
    }

    /// Apply the next submission, then answer it with
    /// [`RemoteError::SubmissionTimedOut`] instead of a transaction hash.
    pub fn lose_next_answer(&self) {
        self.state().lose_next_answer = true;
    }

    pub fn passport_info(&self, key: &Hash32) -> PassportInfo {
        self.state().passports.get(key).copied().unwrap_or_default()
    }

    pub fn has_certificate(&self, index: &Hash32) -> bool {
        self.state().certificates.contains(index)
    }

    /// Every decoded call accepted by the relayer, in order.
    pub fn submissions(&self) -> Vec<RegistrationCall> {
        self.state().submissions.clone()
    }

    pub fn submission_count(&self) -> usize {
        self.state().submissions.len()
    }

    /// Number of `getPassportInfo` reads served.
    pub fn passport_reads(&self) -> usize {
        self.state().reads
    }

    fn apply(st: &mut State, call: &RegistrationCall) -> Result<ReceiptStatus, RemoteError> {
        match call {
            RegistrationCall::RegisterCertificate {
                certificate,
                icao_member,
                siblings,
            } => {
                let data_type = hash32(&certificate.dataType);
                let key_len = st
                    .dispatchers
                    .get(&data_type)
                    .copied()
                    .ok_or_else(|| rejected(format!("unknown dispatcher {data_type}")))?;
                let from = usize::try_from(certificate.keyOffset).unwrap_or(usize::MAX);
                let key = from
                    .checked_add(key_len)
                    .and_then(|to| certificate.signedAttributes.get(from..to))
                    .ok_or_else(|| rejected("key offset out of range"))?;
                if let Some(root) = st.icao_root {
                    if fold_path(keccak256(&icao_member.publicKey), siblings) != root {
                        return Err(rejected("invalid icao merkle proof"));
                    }
                }
                let index = keccak256(key);
                if !st.certificates.insert(index) {
                    return Err(rejected(r#"{"errors":[{"title":"Bad Request","detail":"the key already exists"}]}"#));
                }
                let root = st.certificates_root();
                st.known_roots.insert(root);
                Ok(ReceiptStatus::Success)
            }
            RegistrationCall::Identity {
                kind,
                certificates_root,
                pk_identity_hash,
                passport,
                ..
            } => {
                if !st.known_roots.contains(certificates_root) {
                    return Ok(ReceiptStatus::Reverted);
                }
                st.clock += 1;
                let clock = st.clock;
                let key = passport_key(passport);
                let info = st.passports.entry(key).or_default();
                let allowed = if kind.is_reissue() {
                    info.is_revoked()
                } else {
                    info.is_unregistered()
                };
                if !allowed {
                    return Ok(ReceiptStatus::Reverted);
                }
                if kind.is_reissue() {
                    info.identity_reissue_counter += 1;
                }
                info.active_identity = *pk_identity_hash;
                info.active_passport = hash32(&passport.passportHash);
                info.issue_timestamp = clock;
                Ok(ReceiptStatus::Success)
            }
            RegistrationCall::Revoke {
                active_identity,
                passport,
            } => {
                let key = if passport.publicKey.iter().all(|b| *b == 0) {
                    st.passports
                        .iter()
                        .find(|(_, info)| info.active_identity == *active_identity)
                        .map(|(k, _)| *k)
                } else {
                    Some(keccak256(&passport.publicKey))
                };
                let info = key.and_then(|k| st.passports.get_mut(&k));
                match info {
                    Some(info) if info.is_revoked() => Err(rejected("already revoked")),
                    Some(info) if info.active_identity == *active_identity => {
                        info.active_identity = revoked_sentinel();
                        Ok(ReceiptStatus::Success)
                    }
                    _ => Err(rejected("the leaf does not match")),
                }
            }
        }
    }
}

#[async_trait]
impl Relayer for InMemoryRegistry {
    async fn submit(&self, request: &TxRequest) -> Result<TxHash, RemoteError> {
        let mut st = self.state();
        match st.interference.take() {
            Some(Interference::BindPassport {
                key,
                active_identity,
            }) => st.passports.entry(key).or_default().active_identity = active_identity,
            Some(Interference::RegisterCertificate { index }) => {
                st.certificates.insert(index);
                let root = st.certificates_root();
                st.known_roots.insert(root);
            }
            None => {}
        }
        if !st.rejections.is_empty() {
            let (status, body) = st.rejections.remove(0);
            return Err(RemoteError::Rejected {
                endpoint: ENDPOINT.to_string(),
                status,
                body,
            });
        }

        let call = RegistrationCall::decode(&request.tx_data).map_err(|e| rejected(e.to_string()))?;
        st.nonce += 1;
        let mut seed = request.tx_data.clone();
        seed.extend_from_slice(&st.nonce.to_be_bytes());
        let tx_hash = keccak256(&seed);

        let status = match st.receipt_mode {
            ReceiptMode::Stalled => None,
            _ => Some(Self::apply(&mut st, &call)?),
        };
        st.submissions.push(call);
        if let (Some(status), ReceiptMode::Immediate) = (status, st.receipt_mode) {
            st.receipts.insert(tx_hash, status);
        }
        if std::mem::take(&mut st.lose_next_answer) {
            return Err(RemoteError::SubmissionTimedOut {
                endpoint: ENDPOINT.to_string(),
            });
        }
        Ok(tx_hash)
    }
}

#[async_trait]
impl RegistryReader for InMemoryRegistry {
    async fn get_passport_info(&self, key: &Hash32) -> Result<PassportInfo, RemoteError> {
        let mut st = self.state();
        st.reads += 1;
        Ok(st.passports.get(key).copied().unwrap_or_default())
    }

    async fn get_certificate_proof(
        &self,
        index: &Hash32,
    ) -> Result<CertificateProof, RemoteError> {
        let st = self.state();
        let existence = st.certificates.contains(index);
        Ok(CertificateProof {
            root: st.certificates_root(),
            siblings: Vec::new(),
            existence,
            key: *index,
            value: if existence { *index } else { Hash32::ZERO },
            ..CertificateProof::default()
        })
    }

    async fn transaction_receipt(&self, tx: &TxHash) -> Result<Option<ReceiptStatus>, RemoteError> {
        Ok(self.state().receipts.get(tx).copied())
    }
}

/// A [`ChallengeSigner`] that answers with `Keccak256(challenge)` without
/// touching a chip, or fails if built with [`StaticChallengeSigner::failing`].
#[derive(Debug, Default)]
pub struct StaticChallengeSigner {
    challenges: Mutex<Vec<[u8; 8]>>,
    failure: Option<String>,
}

impl StaticChallengeSigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Challenges signed so far.
    pub fn challenges(&self) -> Vec<[u8; 8]> {
        self.challenges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ChallengeSigner for StaticChallengeSigner {
    async fn sign_challenge(
        &self,
        _document: &ParsedDocument,
        challenge: &[u8; 8],
    ) -> Result<Vec<u8>, SignerError> {
        self.challenges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*challenge);
        match &self.failure {
            Some(reason) => Err(SignerError(reason.clone())),
            None => Ok(keccak256(challenge).to_bytes().to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::Address;
    use crate::calldata;
    use passid_zkp::fixtures;

    fn tx(data: Vec<u8>) -> TxRequest {
        TxRequest {
            tx_data: data,
            destination: Address::default(),
        }
    }

    #[tokio::test]
    async fn certificate_registration_indexes_signing_key() {
        let registry = InMemoryRegistry::new();
        let doc = fixtures::passport(false);
        let index = doc.signing_certificate.certificate_index();

        let data = calldata::register_certificate(&doc, &[]).unwrap();
        registry.submit(&tx(data.clone())).await.unwrap();
        assert!(registry.has_certificate(&index));

        let proof = registry.get_certificate_proof(&index).await.unwrap();
        assert!(proof.existence);
        assert!(!proof.root.is_zero());

        let err = registry.submit(&tx(data)).await.unwrap_err();
        assert!(err.message().contains("the key already exists"));
    }

    #[tokio::test]
    async fn icao_root_is_enforced() {
        let registry = InMemoryRegistry::new().with_icao_root(Hash32::from_u64(1));
        let doc = fixtures::passport(false);
        let err = registry
            .submit(&tx(calldata::register_certificate(&doc, &[]).unwrap()))
            .await
            .unwrap_err();
        assert!(err.message().contains("invalid icao merkle proof"));
    }

    #[tokio::test]
    async fn rejections_and_garbage_are_reported() {
        let registry = InMemoryRegistry::new();
        registry.reject_next_submission(503, "maintenance");
        let err = registry.submit(&tx(vec![1, 2, 3, 4])).await.unwrap_err();
        assert!(err.is_transient());
        let err = registry.submit(&tx(vec![1, 2, 3, 4])).await.unwrap_err();
        assert!(err.message().contains("unknown selector"));
        assert_eq!(registry.submission_count(), 0);
    }

    #[tokio::test]
    async fn lost_answer_still_applies_the_call() {
        let registry = InMemoryRegistry::new();
        let doc = fixtures::passport(false);
        let data = calldata::register_certificate(&doc, &[]).unwrap();
        registry.lose_next_answer();

        let err = registry.submit(&tx(data.clone())).await.unwrap_err();
        assert!(matches!(err, RemoteError::SubmissionTimedOut { .. }));
        assert!(registry.has_certificate(&doc.signing_certificate.certificate_index()));
        assert_eq!(registry.submission_count(), 1);

        // Only the next answer is lost; a resubmission hits the contract rule.
        let err = registry.submit(&tx(data)).await.unwrap_err();
        assert!(err.message().contains("the key already exists"));
    }

    #[test]
    fn dispatcher_registration_parses_bits() {
        let registry = InMemoryRegistry::new();
        assert!(registry.register_dispatcher("C_ECDSA_secp256r1_SHA2_512"));
        assert!(!registry.register_dispatcher("C_ECDSA_secp256r1_SHA2"));
    }

    #[tokio::test]
    async fn static_signer_records_challenges() {
        let signer = StaticChallengeSigner::new();
        let sig = signer
            .sign_challenge(&fixtures::passport(true), &[1; 8])
            .await
            .unwrap();
        assert_eq!(sig.len(), 32);
        assert_eq!(signer.challenges(), vec![[1u8; 8]]);
        assert!(StaticChallengeSigner::failing("cancelled")
            .sign_challenge(&fixtures::passport(true), &[0; 8])
            .await
            .is_err());
    }
}
