//! # Registration Flow Integration Tests
//!
//! Runs [`RegistrationProtocol`] end to end against the in-memory registry
//! and the mock prover: certificate registration, every decision branch,
//! post-submission re-reads, receipt timeouts, lost relayer answers,
//! concurrency, and revocation.

use std::sync::Arc;
use std::time::Duration;

use passid_core::{keccak256, Curve, Hash32, HashAlgorithm, SignatureProfile};
use passid_crypto::CertTree;
use passid_registration::calldata::{IdentityCallKind, RegistrationCall};
use passid_registration::revoke::revocation_challenge;
use passid_registration::{
    revoked_sentinel, BenignRevokeOutcome, InMemoryRegistry, Interference, ReceiptMode,
    RegistrationConfig, RegistrationError, RegistrationOutcome, RegistrationProtocol,
    RegistrationRequest, RevokeOutcome, StaticChallengeSigner,
};
use passid_zkp::mock::mock_pk_identity_hash;
use passid_zkp::{fixtures, CircuitCatalog, MockProver, ProofSystem, ProverError};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

const SECRET: u64 = 0xa11ce;

struct Harness {
    registry: Arc<InMemoryRegistry>,
    prover: Arc<MockProver>,
    protocol: Arc<RegistrationProtocol>,
}

fn config() -> RegistrationConfig {
    let mut config = RegistrationConfig::local("http://127.0.0.1:1", "http://127.0.0.1:1").unwrap();
    config.receipt_timeout = Duration::from_millis(150);
    config.receipt_poll_interval = Duration::from_millis(5);
    config
}

fn harness_with(
    registry: InMemoryRegistry,
    prover: MockProver,
    config: RegistrationConfig,
) -> Harness {
    let csca = CertTree::from_public_keys(fixtures::csca_master_list());
    let registry = Arc::new(registry.with_icao_root(csca.root().unwrap()));
    let prover = Arc::new(prover);
    let protocol = RegistrationProtocol::new(
        &config,
        CircuitCatalog::builtin().unwrap(),
        csca,
        registry.clone(),
        registry.clone(),
        prover.clone(),
    );
    Harness {
        registry,
        prover,
        protocol: Arc::new(protocol),
    }
}

fn harness() -> Harness {
    harness_with(InMemoryRegistry::new(), MockProver::new(), config())
}

/// A registry that already holds the fixture signing certificate.
fn certified_registry() -> InMemoryRegistry {
    let index = fixtures::passport(false).signing_certificate.certificate_index();
    InMemoryRegistry::new().with_certificate(index)
}

fn request(active_auth: bool) -> RegistrationRequest {
    RegistrationRequest {
        document: fixtures::passport(active_auth),
        secret_key: Hash32::from_u64(SECRET),
        system: ProofSystem::Circom,
    }
}

fn own_key_hash() -> Hash32 {
    mock_pk_identity_hash(&Hash32::from_u64(SECRET))
}

/// Passport lookup key the mock prover produces for a fixture passport.
fn identity_key(active_auth: bool) -> Hash32 {
    if active_auth {
        keccak256(&fixtures::aa_modulus())
    } else {
        keccak256(&fixtures::passport(false).sod)
    }
}

fn identity_calls(registry: &InMemoryRegistry) -> Vec<IdentityCallKind> {
    registry
        .submissions()
        .into_iter()
        .filter_map(|c| match c {
            RegistrationCall::Identity { kind, .. } => Some(kind),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// First registration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_registration_registers_certificate_then_identity() {
    let h = harness();
    let report = h.protocol.register(&request(false)).await.unwrap();

    assert_eq!(report.outcome, RegistrationOutcome::Registered);
    assert!(report.certificate_registered);
    assert!(report.tx_hash.is_some());
    assert_eq!(report.item.descriptor.identity_key, identity_key(false));

    let calls = h.registry.submissions();
    assert_eq!(calls.len(), 2);
    assert!(matches!(calls[0], RegistrationCall::RegisterCertificate { .. }));
    assert_eq!(identity_calls(&h.registry), vec![IdentityCallKind::Register]);

    let info = h.registry.passport_info(&identity_key(false));
    assert_eq!(info.active_identity, own_key_hash());
}

#[tokio::test]
async fn first_registration_succeeds_despite_zero_pre_submission_read() {
    let h = harness_with(certified_registry(), MockProver::new(), config());
    let report = h.protocol.register(&request(false)).await.unwrap();

    assert_eq!(report.outcome, RegistrationOutcome::Registered);
    assert!(!report.certificate_registered);
    // One read before submitting (zero), one after the receipt (own key).
    assert_eq!(h.registry.passport_reads(), 2);
    assert_eq!(h.registry.submission_count(), 1);
}

#[tokio::test]
async fn registration_with_active_authentication_keys_by_aa_public_key() {
    let h = harness_with(certified_registry(), MockProver::new(), config());
    let report = h.protocol.register(&request(true)).await.unwrap();

    assert_eq!(report.item.descriptor.identity_key, identity_key(true));
    assert_eq!(
        h.registry.passport_info(&identity_key(true)).active_identity,
        own_key_hash()
    );
    match &h.registry.submissions()[0] {
        RegistrationCall::Identity { passport, .. } => {
            assert_eq!(passport.publicKey.to_vec(), fixtures::aa_modulus());
            assert!(!passport.signature.is_empty());
        }
        other => panic!("unexpected call {other:?}"),
    }
}

#[tokio::test]
async fn noir_id_card_registers_via_noir() {
    let h = harness_with(certified_registry(), MockProver::new(), config());
    let req = RegistrationRequest {
        document: fixtures::id_card(),
        secret_key: Hash32::from_u64(SECRET),
        system: ProofSystem::Noir,
    };
    let report = h.protocol.register(&req).await.unwrap();

    assert_eq!(report.outcome, RegistrationOutcome::Registered);
    assert_eq!(
        identity_calls(&h.registry),
        vec![IdentityCallKind::RegisterViaNoir]
    );
    assert_eq!(report.item.descriptor.identity_key, keccak256(&fixtures::id_card().sod));
}

#[tokio::test]
async fn concurrent_certificate_registration_is_benign() {
    let h = harness();
    let index = fixtures::passport(false).signing_certificate.certificate_index();
    h.registry
        .interfere_before_next_submission(Interference::RegisterCertificate { index });

    let report = h.protocol.register(&request(false)).await.unwrap();
    assert_eq!(report.outcome, RegistrationOutcome::Registered);
    assert!(!report.certificate_registered);
    assert_eq!(identity_calls(&h.registry), vec![IdentityCallKind::Register]);
}

#[tokio::test]
async fn untrusted_csca_is_rejected_before_submitting() {
    let h = harness();
    let mut req = request(false);
    if let Some(chain) = req.document.chain_of_trust.as_mut() {
        chain.master_public_key = b"unknown csca".to_vec();
    }
    let err = h.protocol.register(&req).await.unwrap_err();
    assert!(matches!(err, RegistrationError::UntrustedCertificate(_)));
    assert_eq!(h.registry.submission_count(), 0);
}

// ---------------------------------------------------------------------------
// Decision branches
// ---------------------------------------------------------------------------

#[tokio::test]
async fn already_bound_to_own_key_submits_nothing() {
    let h = harness_with(certified_registry(), MockProver::new(), config());
    h.registry.bind_passport(identity_key(false), own_key_hash());

    let report = h.protocol.register(&request(false)).await.unwrap();
    assert_eq!(report.outcome, RegistrationOutcome::AlreadyRegistered);
    assert!(report.tx_hash.is_none());
    assert_eq!(h.registry.submission_count(), 0);
}

#[tokio::test]
async fn bound_to_another_key_is_a_conflict_without_call_data() {
    let h = harness_with(certified_registry(), MockProver::new(), config());
    let other = Hash32::from_u64(0xb0b);
    h.registry.bind_passport(identity_key(false), other);

    let err = h.protocol.register(&request(false)).await.unwrap_err();
    match err {
        RegistrationError::PassportRegisteredWithAnotherPK {
            identity_key: key,
            active_identity,
        } => {
            assert_eq!(key, identity_key(false));
            assert_eq!(active_identity, other);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(h.registry.submission_count(), 0);
}

#[tokio::test]
async fn revoked_passport_is_reissued() {
    let h = harness_with(certified_registry(), MockProver::new(), config());
    h.registry.bind_passport(identity_key(false), revoked_sentinel());

    let report = h.protocol.register(&request(false)).await.unwrap();
    assert_eq!(report.outcome, RegistrationOutcome::Reissued);
    assert_eq!(identity_calls(&h.registry), vec![IdentityCallKind::Reissue]);

    let info = h.registry.passport_info(&identity_key(false));
    assert_eq!(info.active_identity, own_key_hash());
    assert_eq!(info.identity_reissue_counter, 1);
}

#[tokio::test]
async fn losing_the_race_reports_the_winning_key() {
    let h = harness_with(certified_registry(), MockProver::new(), config());
    let winner = Hash32::from_u64(0x5eed);
    h.registry
        .interfere_before_next_submission(Interference::BindPassport {
            key: identity_key(false),
            active_identity: winner,
        });

    let err = h.protocol.register(&request(false)).await.unwrap_err();
    assert!(matches!(
        err,
        RegistrationError::PassportRegisteredWithAnotherPK { active_identity, .. } if active_identity == winner
    ));
    assert_eq!(identity_calls(&h.registry).len(), 1);
}

// ---------------------------------------------------------------------------
// Concurrency and timeouts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_attempts_submit_exactly_once() {
    let h = harness_with(
        certified_registry(),
        MockProver::new().with_delay(Duration::from_millis(10)),
        config(),
    );
    let req = request(false);

    let (a, b) = tokio::join!(h.protocol.register(&req), h.protocol.register(&req));
    let mut outcomes = vec![a.unwrap().outcome, b.unwrap().outcome];
    outcomes.sort_by_key(|o| *o == RegistrationOutcome::AlreadyRegistered);

    assert_eq!(
        outcomes,
        vec![
            RegistrationOutcome::Registered,
            RegistrationOutcome::AlreadyRegistered
        ]
    );
    assert_eq!(h.registry.submission_count(), 1);
    assert_eq!(h.prover.calls(), 2);
}

#[tokio::test]
async fn concurrent_attempts_across_tasks_submit_exactly_once() {
    let h = harness_with(
        certified_registry(),
        MockProver::new().with_delay(Duration::from_millis(10)),
        config(),
    );
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let protocol = h.protocol.clone();
            tokio::spawn(async move { protocol.register(&request(false)).await })
        })
        .collect();

    let mut registered = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().outcome == RegistrationOutcome::Registered {
            registered += 1;
        }
    }
    assert_eq!(registered, 1);
    assert_eq!(h.registry.submission_count(), 1);
}

#[tokio::test]
async fn receipt_timeout_requeries_and_succeeds_without_resubmitting() {
    let h = harness_with(certified_registry(), MockProver::new(), config());
    h.registry.set_receipt_mode(ReceiptMode::Withheld);

    let report = h.protocol.register(&request(false)).await.unwrap();
    assert_eq!(report.outcome, RegistrationOutcome::Registered);
    assert_eq!(h.registry.submission_count(), 1);
}

#[tokio::test]
async fn receipt_timeout_with_unchanged_state_is_a_timeout() {
    let h = harness_with(certified_registry(), MockProver::new(), config());
    h.registry.set_receipt_mode(ReceiptMode::Stalled);

    let err = h.protocol.register(&request(false)).await.unwrap_err();
    assert!(matches!(err, RegistrationError::Timeout { stage: "receipt", .. }));
    assert!(err.is_transient());
    assert_eq!(h.registry.submission_count(), 1);
}

#[tokio::test]
async fn lost_relayer_answer_rereads_and_registers() {
    let h = harness_with(certified_registry(), MockProver::new(), config());
    h.registry.lose_next_answer();

    let report = h.protocol.register(&request(false)).await.unwrap();
    assert_eq!(report.outcome, RegistrationOutcome::Registered);
    assert!(report.tx_hash.is_none());
    assert_eq!(h.registry.submission_count(), 1);
    assert_eq!(
        h.registry.passport_info(&identity_key(false)).active_identity,
        own_key_hash()
    );
}

#[tokio::test]
async fn lost_relayer_answer_with_unchanged_state_is_a_timeout() {
    let h = harness_with(certified_registry(), MockProver::new(), config());
    h.registry.set_receipt_mode(ReceiptMode::Stalled);
    h.registry.lose_next_answer();

    let err = h.protocol.register(&request(false)).await.unwrap_err();
    assert!(matches!(err, RegistrationError::Timeout { stage: "submission", .. }));
    assert!(err.is_transient());
    assert_eq!(h.registry.submission_count(), 1);
}

#[tokio::test]
async fn lost_certificate_answer_rereads_the_tree() {
    let h = harness();
    h.registry.lose_next_answer();

    let report = h.protocol.register(&request(false)).await.unwrap();
    assert!(report.certificate_registered);
    assert_eq!(report.outcome, RegistrationOutcome::Registered);
    let calls = h.registry.submissions();
    assert_eq!(calls.len(), 2);
    assert!(matches!(calls[0], RegistrationCall::RegisterCertificate { .. }));
}

#[tokio::test]
async fn slow_prover_times_out() {
    let mut cfg = config();
    cfg.prover_timeout = Duration::from_millis(20);
    let h = harness_with(
        certified_registry(),
        MockProver::new().with_delay(Duration::from_millis(500)),
        cfg,
    );

    let err = h.protocol.register(&request(false)).await.unwrap_err();
    assert!(matches!(
        err,
        RegistrationError::Timeout {
            stage: "proof generation",
            ..
        }
    ));
    assert_eq!(h.registry.submission_count(), 0);
}

// ---------------------------------------------------------------------------
// Failures before submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn prover_failure_is_proof_generation_failed() {
    let h = harness_with(
        certified_registry(),
        MockProver::failing(ProverError::Witness("dg1 mismatch".into())),
        config(),
    );
    let err = h.protocol.register(&request(false)).await.unwrap_err();
    assert!(matches!(err, RegistrationError::ProofGenerationFailed(msg) if msg.contains("dg1 mismatch")));
}

#[tokio::test]
async fn missing_aa_signature_fails_before_proving() {
    let h = harness_with(certified_registry(), MockProver::new(), config());
    let mut req = request(true);
    req.document.aa_signature = None;

    let err = h.protocol.register(&req).await.unwrap_err();
    assert!(matches!(err, RegistrationError::ProofGenerationFailed(msg) if msg.contains("AA signature")));
    assert_eq!(h.prover.calls(), 0);
}

#[tokio::test]
async fn unsupported_profile_is_rejected() {
    let h = harness();
    let mut req = request(false);
    req.document.signing_certificate.profile =
        SignatureProfile::ecdsa(HashAlgorithm::Sha1, Curve::Secp521r1);

    let err = h.protocol.register(&req).await.unwrap_err();
    assert!(matches!(err, RegistrationError::UnsupportedCertificateProfile(_)));
    assert_eq!(h.registry.submission_count(), 0);
    assert_eq!(h.prover.calls(), 0);
}

// ---------------------------------------------------------------------------
// Revocation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn conflict_is_revoked_then_reissued() {
    let h = harness_with(certified_registry(), MockProver::new(), config());
    let other = Hash32::from_u64(0xb0b);
    h.registry.bind_passport(identity_key(true), other);
    let signer = StaticChallengeSigner::new();

    let report = h
        .protocol
        .register_with_revocation(&request(true), &signer)
        .await
        .unwrap();

    assert_eq!(report.outcome, RegistrationOutcome::Reissued);
    assert_eq!(signer.challenges(), vec![revocation_challenge(&other)]);
    let calls = h.registry.submissions();
    assert!(matches!(
        calls[0],
        RegistrationCall::Revoke { active_identity, .. } if active_identity == other
    ));
    assert_eq!(identity_calls(&h.registry), vec![IdentityCallKind::Reissue]);
    assert_eq!(
        h.registry.passport_info(&identity_key(true)).active_identity,
        own_key_hash()
    );
}

#[tokio::test]
async fn already_revoked_rejection_counts_as_success_and_reissues() {
    let h = harness_with(certified_registry(), MockProver::new(), config());
    let key = identity_key(true);
    h.registry.bind_passport(key, Hash32::from_u64(0xb0b));
    // Someone else revokes between our read and our revoke call.
    h.registry
        .interfere_before_next_submission(Interference::BindPassport {
            key,
            active_identity: revoked_sentinel(),
        });

    let outcome = h
        .protocol
        .revoke(&fixtures::passport(true), key, &StaticChallengeSigner::new())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        RevokeOutcome::Benign(BenignRevokeOutcome::AlreadyRevoked)
    );

    let report = h.protocol.register(&request(true)).await.unwrap();
    assert_eq!(report.outcome, RegistrationOutcome::Reissued);
}

#[tokio::test]
async fn lost_revoke_answer_rereads_and_reports_revoked() {
    let h = harness_with(certified_registry(), MockProver::new(), config());
    let key = identity_key(true);
    h.registry.bind_passport(key, Hash32::from_u64(0xb0b));
    h.registry.lose_next_answer();

    let outcome = h
        .protocol
        .revoke(&fixtures::passport(true), key, &StaticChallengeSigner::new())
        .await
        .unwrap();
    assert_eq!(outcome, RevokeOutcome::Revoked { tx_hash: None });
    assert_eq!(h.registry.submission_count(), 1);
    assert!(h.registry.passport_info(&key).is_revoked());
}

#[tokio::test]
async fn leaf_mismatch_rejection_is_benign() {
    let h = harness_with(certified_registry(), MockProver::new(), config());
    let key = identity_key(true);
    h.registry.bind_passport(key, Hash32::from_u64(0xb0b));
    h.registry
        .reject_next_submission(400, "execution reverted: the leaf does not match");

    let outcome = h
        .protocol
        .revoke(&fixtures::passport(true), key, &StaticChallengeSigner::new())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        RevokeOutcome::Benign(BenignRevokeOutcome::LeafDoesNotMatch)
    );
}

#[tokio::test]
async fn other_revoke_rejections_propagate() {
    let h = harness_with(certified_registry(), MockProver::new(), config());
    let key = identity_key(true);
    h.registry.bind_passport(key, Hash32::from_u64(0xb0b));
    h.registry.reject_next_submission(400, "insufficient funds");

    let err = h
        .protocol
        .revoke(&fixtures::passport(true), key, &StaticChallengeSigner::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrationError::RelayerOrChain(_)));
}

#[tokio::test]
async fn unbound_passport_has_nothing_to_revoke() {
    let h = harness_with(certified_registry(), MockProver::new(), config());
    let signer = StaticChallengeSigner::new();
    let outcome = h
        .protocol
        .revoke(&fixtures::passport(true), identity_key(true), &signer)
        .await
        .unwrap();
    assert_eq!(outcome, RevokeOutcome::NothingToRevoke);
    assert!(signer.challenges().is_empty());
    assert_eq!(h.registry.submission_count(), 0);
}

#[tokio::test]
async fn id_card_revocation_is_unsupported() {
    let h = harness();
    let err = h
        .protocol
        .revoke(
            &fixtures::id_card(),
            keccak256(&fixtures::id_card().sod),
            &StaticChallengeSigner::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrationError::ProofGenerationFailed(_)));
}

#[tokio::test]
async fn cancelled_rescan_fails_revocation() {
    let h = harness_with(certified_registry(), MockProver::new(), config());
    let key = identity_key(true);
    h.registry.bind_passport(key, Hash32::from_u64(0xb0b));

    let err = h
        .protocol
        .revoke(
            &fixtures::passport(true),
            key,
            &StaticChallengeSigner::failing("user cancelled"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrationError::ProofGenerationFailed(msg) if msg.contains("user cancelled")));
    assert_eq!(h.registry.submission_count(), 0);
}
