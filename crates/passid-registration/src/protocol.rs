//! # Registration Protocol
//!
//! Drives one passport from a chip read to an on-chain identity binding.
//!
//! ## Flow
//!
//! 1. **CertificateCheck**: look the signing certificate up in the
//!    certificates SMT. If absent, register it with its CSCA master-list
//!    inclusion path and read the proof again so proving uses the new root.
//! 2. **ProofGeneration**: run the prover (bounded by `prover_timeout`).
//! 3. **PassportInfoLookup** / **Decision**: read the passport binding and
//!    register, reissue, stop, or report a conflict.
//! 4. **CallDataSubmit**: submit through the relayer, wait for the receipt
//!    (bounded by `receipt_timeout`), then read the binding again. The
//!    attempt succeeds only if that post-submission read shows the caller's
//!    key. A receipt timeout is followed by the same read and never by a
//!    second submission. A relayer that times out, or drops the connection
//!    after the request went out, may still have broadcast the transaction:
//!    the binding is polled until `receipt_timeout` instead.
//!
//! Steps 3 and 4 are serialized per identity key: concurrent attempts for
//! one passport submit at most one transaction.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use metrics::counter;
use passid_core::{DocumentType, Hash32, ParsedDocument};
use passid_crypto::CertTree;
use passid_zkp::{
    resolve_circuit, CircuitCatalog, IdentityItem, ProofRequest, ProofSystem, Prover,
    ResolvedCircuit,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::abi::Address;
use crate::calldata;
use crate::chain::{
    CertificateProof, JsonRpcRegistryReader, ReceiptStatus, ReceiptWait, RegistryReader, TxHash,
};
use crate::config::RegistrationConfig;
use crate::error::{RegistrationError, RemoteError};
use crate::relayer::{HttpRelayer, Relayer, TxRequest};
use crate::retry::Failure;
use crate::revoke::{
    revocation_challenge, BenignRevokeOutcome, ChallengeSigner, RevokeOutcome,
};
use crate::state::{Decision, RegistrationState};

const ALREADY_EXISTS: &str = "the key already exists";

/// What the relayer said about a submission.
enum Submission {
    Accepted(TxHash),
    /// No transaction hash, and no proof that nothing was broadcast.
    Unconfirmed,
}

/// Input of one registration attempt.
#[derive(Clone)]
pub struct RegistrationRequest {
    pub document: ParsedDocument,
    /// Identity secret; its hash is what the passport gets bound to.
    pub secret_key: Hash32,
    pub system: ProofSystem,
}

impl std::fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("doc_type", &self.document.doc_type)
            .field("secret_key", &"[REDACTED]")
            .field("system", &self.system)
            .finish()
    }
}

/// How a successful attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered,
    Reissued,
    /// The passport was already bound to the caller's key.
    AlreadyRegistered,
}

impl RegistrationOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Reissued => "reissued",
            Self::AlreadyRegistered => "already_registered",
        }
    }
}

/// Result of a successful attempt.
#[derive(Debug, Clone)]
pub struct RegistrationReport {
    pub attempt_id: Uuid,
    pub outcome: RegistrationOutcome,
    pub item: IdentityItem,
    /// The identity transaction, if the relayer reported one.
    pub tx_hash: Option<TxHash>,
    /// Whether this attempt registered the signing certificate.
    pub certificate_registered: bool,
}

/// The registration state machine and its collaborators.
pub struct RegistrationProtocol {
    catalog: CircuitCatalog,
    csca: CertTree,
    reader: Arc<dyn RegistryReader>,
    relayer: Arc<dyn Relayer>,
    prover: Arc<dyn Prover>,
    registration_contract: Address,
    prover_timeout: Duration,
    receipt_timeout: Duration,
    receipt_poll_interval: Duration,
    locks: DashMap<Hash32, Arc<Mutex<()>>>,
}

impl RegistrationProtocol {
    /// Assemble a protocol from explicit collaborators.
    ///
    /// `csca` is the CSCA master list tree used for certificate
    /// registration.
    pub fn new(
        config: &RegistrationConfig,
        catalog: CircuitCatalog,
        csca: CertTree,
        reader: Arc<dyn RegistryReader>,
        relayer: Arc<dyn Relayer>,
        prover: Arc<dyn Prover>,
    ) -> Self {
        Self {
            catalog,
            csca,
            reader,
            relayer,
            prover,
            registration_contract: config.registration_contract,
            prover_timeout: config.prover_timeout,
            receipt_timeout: config.receipt_timeout,
            receipt_poll_interval: config.receipt_poll_interval,
            locks: DashMap::new(),
        }
    }

    /// Assemble a protocol talking to the configured RPC node and relayer.
    pub fn connect(
        config: &RegistrationConfig,
        catalog: CircuitCatalog,
        csca: CertTree,
        prover: Arc<dyn Prover>,
    ) -> Result<Self, RegistrationError> {
        let reader = JsonRpcRegistryReader::new(
            &config.rpc_url,
            config.state_keeper_contract,
            config.certificates_smt_contract,
            config.http_timeout,
        )?;
        let relayer = HttpRelayer::new(
            &config.relayer_url,
            config.relayer_api_key.clone(),
            config.http_timeout,
        )?;
        Ok(Self::new(
            config,
            catalog,
            csca,
            Arc::new(reader),
            Arc::new(relayer),
            prover,
        ))
    }

    // -- Registration -------------------------------------------------------

    /// Run one registration attempt.
    pub async fn register(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationReport, RegistrationError> {
        let attempt_id = Uuid::new_v4();
        counter!("passid_registration_attempts_total", "system" => request.system.to_string())
            .increment(1);

        let result = self.run_registration(request, attempt_id).await;
        let outcome = match &result {
            Ok(report) => report.outcome.as_str(),
            Err(RegistrationError::PassportRegisteredWithAnotherPK { .. }) => "conflict",
            Err(_) => "failed",
        };
        counter!("passid_registration_outcomes_total", "outcome" => outcome).increment(1);
        if let Err(e) = &result {
            warn!(attempt = %attempt_id, error = %e, "registration attempt failed");
        }
        result
    }

    /// Register; on a conflicting binding, revoke it with a fresh AA
    /// signature and register again (which then reissues).
    pub async fn register_with_revocation(
        &self,
        request: &RegistrationRequest,
        signer: &dyn ChallengeSigner,
    ) -> Result<RegistrationReport, RegistrationError> {
        match self.register(request).await {
            Err(RegistrationError::PassportRegisteredWithAnotherPK { identity_key, .. }) => {
                let outcome = self.revoke(&request.document, identity_key, signer).await?;
                info!(identity_key = %identity_key, ?outcome, "revocation finished, registering again");
                self.register(request).await
            }
            other => other,
        }
    }

    async fn run_registration(
        &self,
        request: &RegistrationRequest,
        attempt_id: Uuid,
    ) -> Result<RegistrationReport, RegistrationError> {
        let doc = &request.document;
        if doc.has_active_authentication() && doc.aa_signature.is_none() {
            return Err(RegistrationError::ProofGenerationFailed(
                "AA signature is not defined".to_string(),
            ));
        }
        let circuit = resolve_circuit(&self.catalog, doc, request.system)?;
        info!(attempt = %attempt_id, circuit = %circuit.name, system = %request.system, "circuit resolved");

        self.transition(attempt_id, RegistrationState::CertificateCheck);
        let (cert_proof, certificate_registered) = self.ensure_certificate(attempt_id, doc).await?;

        self.transition(attempt_id, RegistrationState::ProofGeneration);
        let item = self
            .generate_proof(request, &circuit, &cert_proof)
            .await?;

        let identity_key = item.descriptor.identity_key;
        let lock = self.identity_lock(identity_key);
        let guard = lock.lock().await;
        let result = self
            .decide_and_submit(attempt_id, &item, &circuit, &cert_proof)
            .await;
        drop(guard);
        drop(lock);
        self.release_identity_lock(&identity_key);

        let (outcome, tx_hash) = result?;
        Ok(RegistrationReport {
            attempt_id,
            outcome,
            item,
            tx_hash,
            certificate_registered,
        })
    }

    /// Holding the identity lock: read, decide, submit, confirm.
    async fn decide_and_submit(
        &self,
        attempt_id: Uuid,
        item: &IdentityItem,
        circuit: &ResolvedCircuit,
        cert_proof: &CertificateProof,
    ) -> Result<(RegistrationOutcome, Option<TxHash>), RegistrationError> {
        let identity_key = item.descriptor.identity_key;
        let own = item.descriptor.pk_identity_hash;

        self.transition(attempt_id, RegistrationState::PassportInfoLookup);
        let info = self.reader.get_passport_info(&identity_key).await?;
        let decision = Decision::from_passport_info(&info, &own);
        self.transition(attempt_id, RegistrationState::Decision(decision));

        let (outcome, is_revoked) = match decision {
            Decision::AlreadyCurrent => {
                self.transition(attempt_id, RegistrationState::Confirmed);
                return Ok((RegistrationOutcome::AlreadyRegistered, None));
            }
            Decision::ConflictRevokeRequired { active_identity } => {
                return Err(RegistrationError::PassportRegisteredWithAnotherPK {
                    identity_key,
                    active_identity,
                });
            }
            Decision::Register => (RegistrationOutcome::Registered, false),
            Decision::Reissue => (RegistrationOutcome::Reissued, true),
        };

        let data = calldata::register_identity(item, circuit, cert_proof.root, is_revoked)?;
        self.transition(attempt_id, RegistrationState::CallDataSubmit);
        let tx_hash = match self.submit(attempt_id, decision.as_str(), data).await? {
            Submission::Accepted(tx_hash) => tx_hash,
            Submission::Unconfirmed => {
                let after = self
                    .poll_until(
                        || self.reader.get_passport_info(&identity_key),
                        |info| info.active_identity == own,
                    )
                    .await?;
                if after.active_identity == own {
                    self.transition(attempt_id, RegistrationState::Confirmed);
                    return Ok((outcome, None));
                }
                if after.is_unregistered() || after.is_revoked() {
                    return Err(RegistrationError::Timeout {
                        stage: "submission",
                        seconds: self.receipt_timeout.as_secs(),
                    });
                }
                return Err(RegistrationError::PassportRegisteredWithAnotherPK {
                    identity_key,
                    active_identity: after.active_identity,
                });
            }
        };
        let wait = self.await_receipt(attempt_id, &tx_hash).await?;

        let after = self.reader.get_passport_info(&identity_key).await?;
        if after.active_identity == own {
            self.transition(attempt_id, RegistrationState::Confirmed);
            return Ok((outcome, Some(tx_hash)));
        }

        match wait {
            ReceiptWait::TimedOut => Err(RegistrationError::Timeout {
                stage: "receipt",
                seconds: self.receipt_timeout.as_secs(),
            }),
            ReceiptWait::Mined(ReceiptStatus::Reverted)
                if after.is_unregistered() || after.is_revoked() =>
            {
                Err(RemoteError::Reverted { tx_hash }.into())
            }
            ReceiptWait::Mined(_) => Err(RegistrationError::PassportRegisteredWithAnotherPK {
                identity_key,
                active_identity: after.active_identity,
            }),
        }
    }

    // -- Certificate --------------------------------------------------------

    /// Certificate SMT proof for the document's signing certificate,
    /// registering the certificate first if it is absent.
    async fn ensure_certificate(
        &self,
        attempt_id: Uuid,
        doc: &ParsedDocument,
    ) -> Result<(CertificateProof, bool), RegistrationError> {
        let index = doc.signing_certificate.certificate_index();
        let proof = self.reader.get_certificate_proof(&index).await?;
        if proof.existence {
            debug!(attempt = %attempt_id, index = %index, "signing certificate already on chain");
            return Ok((proof, false));
        }

        self.transition(attempt_id, RegistrationState::CertificateRegister);
        let (registered, wait) = match self.register_certificate(attempt_id, doc, index).await {
            Ok(wait) => (true, wait),
            Err(RegistrationError::CertificateAlreadyRegistered { index }) => {
                warn!(attempt = %attempt_id, index = %index, "certificate registered concurrently, continuing");
                (false, Some(ReceiptWait::Mined(ReceiptStatus::Success)))
            }
            Err(e) => return Err(e),
        };

        // `None`: the relayer's answer was lost.
        let proof = match wait {
            None => {
                self.poll_until(
                    || self.reader.get_certificate_proof(&index),
                    |proof| proof.existence,
                )
                .await?
            }
            Some(_) => self.reader.get_certificate_proof(&index).await?,
        };
        if proof.existence {
            return Ok((proof, registered));
        }
        match wait {
            None => {
                return Err(RegistrationError::Timeout {
                    stage: "certificate submission",
                    seconds: self.receipt_timeout.as_secs(),
                })
            }
            Some(ReceiptWait::TimedOut) => {
                return Err(RegistrationError::Timeout {
                    stage: "certificate receipt",
                    seconds: self.receipt_timeout.as_secs(),
                })
            }
            Some(ReceiptWait::Mined(_)) => {}
        }
        Err(RemoteError::Malformed {
            endpoint: "certificates SMT".to_string(),
            reason: format!("certificate {index} absent after registration"),
        }
        .into())
    }

    async fn register_certificate(
        &self,
        attempt_id: Uuid,
        doc: &ParsedDocument,
        index: Hash32,
    ) -> Result<Option<ReceiptWait>, RegistrationError> {
        let master = doc
            .chain_of_trust
            .as_ref()
            .map(|c| c.master_public_key.as_slice())
            .ok_or_else(|| {
                RegistrationError::UntrustedCertificate(
                    "document has no chain-of-trust material".to_string(),
                )
            })?;
        let inclusion = self.csca.inclusion_proof(master).ok_or_else(|| {
            RegistrationError::UntrustedCertificate(
                "issuing CSCA is not in the master list".to_string(),
            )
        })?;

        let data = calldata::register_certificate(doc, &inclusion.siblings)?;
        let tx_hash = match self.submit(attempt_id, "register_certificate", data).await {
            Ok(Submission::Accepted(tx)) => tx,
            Ok(Submission::Unconfirmed) => return Ok(None),
            Err(e) if e.message().contains(ALREADY_EXISTS) => {
                return Err(RegistrationError::CertificateAlreadyRegistered { index });
            }
            Err(e) => return Err(e.into()),
        };

        match self.await_receipt(attempt_id, &tx_hash).await? {
            ReceiptWait::Mined(ReceiptStatus::Reverted) => {
                Err(RemoteError::Reverted { tx_hash }.into())
            }
            wait => Ok(Some(wait)),
        }
    }

    // -- Proof --------------------------------------------------------------

    async fn generate_proof(
        &self,
        request: &RegistrationRequest,
        circuit: &ResolvedCircuit,
        cert_proof: &CertificateProof,
    ) -> Result<IdentityItem, RegistrationError> {
        let proof_request = ProofRequest {
            circuit_name: circuit.name.clone(),
            system: request.system,
            document: request.document.clone(),
            secret_key: request.secret_key,
            merkle_root: cert_proof.root,
            inclusion_branches: cert_proof.siblings.clone(),
        };

        let proof = tokio::time::timeout(self.prover_timeout, self.prover.prove(&proof_request))
            .await
            .map_err(|_| RegistrationError::Timeout {
                stage: "proof generation",
                seconds: self.prover_timeout.as_secs(),
            })?
            .map_err(|e| RegistrationError::ProofGenerationFailed(e.to_string()))?;

        if proof.system() != request.system {
            return Err(RegistrationError::ProofGenerationFailed(format!(
                "prover returned a {} proof for a {} circuit",
                proof.system(),
                request.system
            )));
        }
        Ok(IdentityItem::new(
            request.document.clone(),
            proof,
            circuit.name.clone(),
        )?)
    }

    // -- Revocation ---------------------------------------------------------

    /// Revoke the current binding of the passport keyed by `identity_key`.
    ///
    /// The chip is re-read through `signer` to sign the revocation
    /// challenge. Allow-listed relayer failures count as success.
    pub async fn revoke(
        &self,
        document: &ParsedDocument,
        identity_key: Hash32,
        signer: &dyn ChallengeSigner,
    ) -> Result<RevokeOutcome, RegistrationError> {
        if document.doc_type == DocumentType::Id {
            return Err(RegistrationError::ProofGenerationFailed(
                "revocation is not supported for ID cards".to_string(),
            ));
        }

        let attempt_id = Uuid::new_v4();
        let lock = self.identity_lock(identity_key);
        let guard = lock.lock().await;
        let result = self
            .run_revocation(attempt_id, document, identity_key, signer)
            .await;
        drop(guard);
        drop(lock);
        self.release_identity_lock(&identity_key);

        let label = match &result {
            Ok(RevokeOutcome::Revoked { .. }) => "revoked",
            Ok(RevokeOutcome::Benign(_)) => "benign",
            Ok(RevokeOutcome::NothingToRevoke) => "nothing_to_revoke",
            Err(_) => "failed",
        };
        counter!("passid_revocations_total", "outcome" => label).increment(1);
        result
    }

    async fn run_revocation(
        &self,
        attempt_id: Uuid,
        document: &ParsedDocument,
        identity_key: Hash32,
        signer: &dyn ChallengeSigner,
    ) -> Result<RevokeOutcome, RegistrationError> {
        self.transition(attempt_id, RegistrationState::Revoke);
        let info = self.reader.get_passport_info(&identity_key).await?;
        if info.is_unregistered() {
            info!(attempt = %attempt_id, identity_key = %identity_key, "passport not bound, nothing to revoke");
            return Ok(RevokeOutcome::NothingToRevoke);
        }
        if info.is_revoked() {
            return Ok(RevokeOutcome::Benign(BenignRevokeOutcome::AlreadyRevoked));
        }

        let challenge = revocation_challenge(&info.active_identity);
        let signature = signer
            .sign_challenge(document, &challenge)
            .await
            .map_err(|e| RegistrationError::ProofGenerationFailed(e.to_string()))?;
        if signature.is_empty() {
            return Err(RegistrationError::ProofGenerationFailed(
                "AA signature is not defined".to_string(),
            ));
        }

        let reread = document.with_aa_signature(signature.clone());
        let passport = calldata::revoke_passport(&reread, signature);
        let data = calldata::revoke(info.active_identity, &passport);

        let tx_hash = match self.submit(attempt_id, "revoke", data).await {
            Ok(Submission::Accepted(tx)) => tx,
            Ok(Submission::Unconfirmed) => {
                let after = self
                    .poll_until(
                        || self.reader.get_passport_info(&identity_key),
                        |info| info.is_revoked(),
                    )
                    .await?;
                if after.is_revoked() {
                    return Ok(RevokeOutcome::Revoked { tx_hash: None });
                }
                return Err(RegistrationError::Timeout {
                    stage: "revoke submission",
                    seconds: self.receipt_timeout.as_secs(),
                });
            }
            Err(e) => {
                return match BenignRevokeOutcome::classify(&e.message()) {
                    Some(benign) => {
                        warn!(attempt = %attempt_id, ?benign, error = %e, "revoke rejected benignly");
                        Ok(RevokeOutcome::Benign(benign))
                    }
                    None => Err(e.into()),
                };
            }
        };

        match self.await_receipt(attempt_id, &tx_hash).await? {
            ReceiptWait::Mined(ReceiptStatus::Success) => Ok(RevokeOutcome::Revoked {
                tx_hash: Some(tx_hash),
            }),
            wait => {
                let after = self.reader.get_passport_info(&identity_key).await?;
                match (wait, after.is_revoked()) {
                    (ReceiptWait::TimedOut, true) => Ok(RevokeOutcome::Revoked {
                        tx_hash: Some(tx_hash),
                    }),
                    (_, true) => Ok(RevokeOutcome::Benign(BenignRevokeOutcome::AlreadyRevoked)),
                    (ReceiptWait::TimedOut, false) => Err(RegistrationError::Timeout {
                        stage: "revoke receipt",
                        seconds: self.receipt_timeout.as_secs(),
                    }),
                    (_, false) => Err(RemoteError::Reverted { tx_hash }.into()),
                }
            }
        }
    }

    // -- Plumbing -----------------------------------------------------------

    /// Hand call data to the relayer once.
    async fn submit(
        &self,
        attempt_id: Uuid,
        call: &'static str,
        tx_data: Vec<u8>,
    ) -> Result<Submission, RemoteError> {
        debug!(attempt = %attempt_id, call, bytes = tx_data.len(), "call data built");
        counter!("passid_relayer_submissions_total", "call" => call).increment(1);
        let result = self
            .relayer
            .submit(&TxRequest {
                tx_data,
                destination: self.registration_contract,
            })
            .await;
        match result {
            Ok(tx_hash) => {
                info!(attempt = %attempt_id, call, tx_hash = %tx_hash, "transaction submitted");
                Ok(Submission::Accepted(tx_hash))
            }
            Err(e) if submission_may_have_landed(&e) => {
                warn!(attempt = %attempt_id, call, error = %e, "submission outcome unknown, re-reading state");
                counter!("passid_relayer_unconfirmed_total", "call" => call).increment(1);
                Ok(Submission::Unconfirmed)
            }
            Err(e) => Err(e),
        }
    }

    /// Read with `read` every poll interval until `settled` holds or the
    /// receipt timeout passes; returns the last value read.
    async fn poll_until<T, F, Fut>(
        &self,
        mut read: F,
        settled: impl Fn(&T) -> bool,
    ) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let deadline = tokio::time::Instant::now() + self.receipt_timeout;
        loop {
            let value = read().await?;
            if settled(&value) || tokio::time::Instant::now() >= deadline {
                return Ok(value);
            }
            tokio::time::sleep(self.receipt_poll_interval).await;
        }
    }

    async fn await_receipt(
        &self,
        attempt_id: Uuid,
        tx_hash: &TxHash,
    ) -> Result<ReceiptWait, RemoteError> {
        let wait = self
            .reader
            .wait_for_receipt(tx_hash, self.receipt_poll_interval, self.receipt_timeout)
            .await?;
        match wait {
            ReceiptWait::Mined(ReceiptStatus::Success) => {
                info!(attempt = %attempt_id, tx_hash = %tx_hash, "transaction mined")
            }
            ReceiptWait::Mined(ReceiptStatus::Reverted) => {
                warn!(attempt = %attempt_id, tx_hash = %tx_hash, "transaction reverted")
            }
            ReceiptWait::TimedOut => warn!(
                attempt = %attempt_id,
                tx_hash = %tx_hash,
                timeout = ?self.receipt_timeout,
                "no receipt before timeout, re-reading state"
            ),
        }
        Ok(wait)
    }

    fn transition(&self, attempt_id: Uuid, state: RegistrationState) {
        info!(attempt = %attempt_id, state = %state, "registration state");
    }

    fn identity_lock(&self, key: Hash32) -> Arc<Mutex<()>> {
        self.locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn release_identity_lock(&self, key: &Hash32) {
        self.locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// A relayer timeout, or a transport failure once the connection was up.
fn submission_may_have_landed(err: &RemoteError) -> bool {
    match err {
        RemoteError::SubmissionTimedOut { .. } => true,
        RemoteError::Transport { source, .. } => Failure::classify(source) != Failure::Connect,
        _ => false,
    }
}
