//! # Registration Contract Call Data
//!
//! Builds the payloads the relayer forwards to the Registration contract,
//! and decodes them back (the in-memory registry reads call data).
//!
//! ## Call Shapes
//!
//! ```text
//! registerCertificate(Certificate, ICAOMember, bytes32[] icaoMerkleProof)
//! register / reissueIdentity(
//!     bytes32 certificatesRoot, uint256 identityKey, uint256 dgCommit,
//!     Passport, ProofPoints)
//! registerViaNoir / reissueIdentityViaNoir(..., Passport, bytes zkPoints)
//! revoke(bytes32 identityKey, Passport)
//! ```
//!
//! The `Passport` struct carries the active-authentication data type, the
//! circuit's `zkType`, the AA signature and key, and the passport hash.

use passid_core::{
    keccak256_str, ActiveAuthKey, Hash32, HashAlgorithm, ParsedDocument, SignatureAlgorithm,
    SigningCertificate,
};
use passid_zkp::{Groth16Points, IdentityItem, Proof, ResolvedCircuit, ZkpError};
use thiserror::Error;

use crate::abi::{
    b256, biguint_u256, hash32, u256, u256_hash, AbiError, Certificate, ProofPoints, Registration,
    SolCall, SolInterface, ICAOMember, Passport, B256, U256,
};

/// Smallest RSA size that appears in AA data-type tags.
const AA_RSA_MIN_BITS: u32 = 2688;

/// Errors building or decoding call data.
#[derive(Debug, Error)]
pub enum CallDataError {
    /// No certificate dispatcher exists for this profile.
    #[error("no certificate dispatcher for {0}")]
    UnsupportedDispatcher(String),

    /// The chip has AA key material but no AA signature was captured.
    #[error("AA signature is not defined")]
    MissingAaSignature,

    /// Registering a new signing certificate needs its CSCA linkage.
    #[error("document has no chain-of-trust material")]
    MissingChainOfTrust,

    /// The selector is not one of the registration calls.
    #[error("unknown selector 0x{0}")]
    UnknownSelector(String),

    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error(transparent)]
    Proof(#[from] ZkpError),
}

impl From<alloy_sol_types::Error> for CallDataError {
    fn from(err: alloy_sol_types::Error) -> Self {
        Self::Abi(err.into())
    }
}

// ---------------------------------------------------------------------------
// Data-type tags
// ---------------------------------------------------------------------------

/// Name of the on-chain certificate dispatcher for a signing certificate.
///
/// The bit suffix is the size of the raw public key bytes.
pub fn certificate_dispatcher_name(cert: &SigningCertificate) -> Result<String, CallDataError> {
    let bits = cert.public_key.len() * 8;
    let profile = &cert.profile;
    let unsupported = || CallDataError::UnsupportedDispatcher(profile.to_string());

    match profile.algorithm {
        SignatureAlgorithm::Rsa => match profile.hash_algorithm {
            HashAlgorithm::Sha1 => Ok(format!("C_RSA_SHA1_{bits}")),
            HashAlgorithm::Sha256 => Ok(format!("C_RSA_{bits}")),
            HashAlgorithm::Sha384 => Ok(format!("C_RSA_SHA384_{bits}")),
            HashAlgorithm::Sha512 => Ok(format!("C_RSA_SHA512_{bits}")),
            HashAlgorithm::Sha224 => Err(unsupported()),
        },
        SignatureAlgorithm::RsaPss => Ok(format!("C_RSAPSS_SHA2_{bits}")),
        SignatureAlgorithm::Ecdsa => {
            let curve = profile.curve.ok_or_else(unsupported)?;
            let hash = match profile.hash_algorithm {
                HashAlgorithm::Sha1 => "SHA1",
                HashAlgorithm::Sha256 => "SHA2",
                HashAlgorithm::Sha384 => "SHA384",
                HashAlgorithm::Sha512 => "SHA512",
                HashAlgorithm::Sha224 => return Err(unsupported()),
            };
            Ok(format!("C_ECDSA_{}_{hash}_{bits}", curve.as_str()))
        }
    }
}

/// Active-authentication data-type tag, before hashing.
pub fn aa_data_type_name(doc: &ParsedDocument) -> String {
    let cert_bits = doc.signing_certificate.profile.key_size;
    match &doc.active_auth_key {
        None => "P_NO_DATA".to_string(),
        Some(ActiveAuthKey::Rsa { hash_algorithm, .. }) => match hash_algorithm {
            None => "P_NO_DATA".to_string(),
            Some(h) => format!("P_RSA_{}_{}", h.as_str(), cert_bits.max(AA_RSA_MIN_BITS)),
        },
        Some(ActiveAuthKey::Ecdsa { .. }) => format!("P_ECDSA_SHA1_{cert_bits}"),
    }
}

/// `Keccak256` of [`aa_data_type_name`].
pub fn aa_data_type(doc: &ParsedDocument) -> Hash32 {
    keccak256_str(&aa_data_type_name(doc))
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// `registerCertificate` for the document's signing certificate.
///
/// `icao_siblings` is the CSCA master-list inclusion path of the issuing
/// master key.
pub fn register_certificate(
    doc: &ParsedDocument,
    icao_siblings: &[Hash32],
) -> Result<Vec<u8>, CallDataError> {
    let cert = &doc.signing_certificate;
    let chain = doc
        .chain_of_trust
        .as_ref()
        .ok_or(CallDataError::MissingChainOfTrust)?;

    let call = Registration::registerCertificateCall {
        certificate: Certificate {
            dataType: b256(&keccak256_str(&certificate_dispatcher_name(cert)?)),
            signedAttributes: cert.tbs_certificate.clone().into(),
            keyOffset: U256::from(cert.key_offset),
            expirationOffset: U256::from(cert.expiration_offset),
        },
        icaoMember: ICAOMember {
            signature: chain.icao_member_signature.clone().into(),
            publicKey: chain.icao_member_key.clone().into(),
        },
        icaoMerkleProof: icao_siblings.iter().map(b256).collect(),
    };
    Ok(call.abi_encode())
}

/// The `Passport` struct submitted with `register`/`reissueIdentity`.
pub fn identity_passport(
    item: &IdentityItem,
    circuit: &ResolvedCircuit,
) -> Result<Passport, CallDataError> {
    let doc = &item.document;
    if doc.has_active_authentication() && doc.aa_signature.is_none() {
        return Err(CallDataError::MissingAaSignature);
    }
    let public_key = match doc.aa_public_key() {
        Some(pk) => pk.to_vec(),
        None => item
            .descriptor
            .public_key
            .unwrap_or(item.descriptor.pk_identity_hash)
            .to_bytes()
            .to_vec(),
    };
    Ok(Passport {
        dataType: b256(&aa_data_type(doc)),
        zkType: b256(&circuit.zk_type),
        signature: doc.aa_signature_or_empty().to_vec().into(),
        publicKey: public_key.into(),
        passportHash: b256(&item.descriptor.passport_hash),
    })
}

fn proof_points(points: &Groth16Points) -> Result<ProofPoints, AbiError> {
    let pair = |p: &[num_bigint::BigUint; 2]| -> Result<[U256; 2], AbiError> {
        Ok([biguint_u256(&p[0])?, biguint_u256(&p[1])?])
    };
    Ok(ProofPoints {
        a: pair(&points.a)?,
        b: [pair(&points.b[0])?, pair(&points.b[1])?],
        c: pair(&points.c)?,
    })
}

/// `register`, `reissueIdentity`, or their Noir variants, chosen by the
/// proof system and by whether the passport is currently revoked.
pub fn register_identity(
    item: &IdentityItem,
    circuit: &ResolvedCircuit,
    certificates_root: Hash32,
    is_revoked: bool,
) -> Result<Vec<u8>, CallDataError> {
    let passport = identity_passport(item, circuit)?;
    let certificates_root = b256(&certificates_root);
    let identity_key = u256(&item.descriptor.pk_identity_hash);
    let dg_commit = u256(&item.descriptor.dg1_commitment);

    let data = match (&item.registration_proof, is_revoked) {
        (Proof::Circom { proof, .. }, false) => Registration::registerCall {
            certificatesRoot: certificates_root,
            identityKey: identity_key,
            dgCommit: dg_commit,
            passport,
            zkPoints: proof_points(&proof.points()?)?,
        }
        .abi_encode(),
        (Proof::Circom { proof, .. }, true) => Registration::reissueIdentityCall {
            certificatesRoot: certificates_root,
            identityKey: identity_key,
            dgCommit: dg_commit,
            passport,
            zkPoints: proof_points(&proof.points()?)?,
        }
        .abi_encode(),
        (Proof::Noir { proof, .. }, false) => Registration::registerViaNoirCall {
            certificatesRoot: certificates_root,
            identityKey: identity_key,
            dgCommit: dg_commit,
            passport,
            zkPoints: proof.clone().into(),
        }
        .abi_encode(),
        (Proof::Noir { proof, .. }, true) => Registration::reissueIdentityViaNoirCall {
            certificatesRoot: certificates_root,
            identityKey: identity_key,
            dgCommit: dg_commit,
            passport,
            zkPoints: proof.clone().into(),
        }
        .abi_encode(),
    };
    Ok(data)
}

/// `revoke(activeIdentity, passport)`.
pub fn revoke(active_identity: Hash32, passport: &Passport) -> Vec<u8> {
    Registration::revokeCall {
        identityKey: b256(&active_identity),
        passport: passport.clone(),
    }
    .abi_encode()
}

/// The `Passport` struct for a revocation: fresh AA signature over the
/// challenge, no `zkType`, no passport hash.
pub fn revoke_passport(doc: &ParsedDocument, signature: Vec<u8>) -> Passport {
    Passport {
        dataType: b256(&aa_data_type(doc)),
        zkType: B256::ZERO,
        signature: signature.into(),
        publicKey: doc
            .aa_public_key()
            .map(<[u8]>::to_vec)
            .unwrap_or_else(|| vec![0u8; 32])
            .into(),
        passportHash: B256::ZERO,
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Which identity call a payload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityCallKind {
    Register,
    Reissue,
    RegisterViaNoir,
    ReissueViaNoir,
}

impl IdentityCallKind {
    pub fn is_reissue(&self) -> bool {
        matches!(self, Self::Reissue | Self::ReissueViaNoir)
    }
}

/// A decoded Registration contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationCall {
    RegisterCertificate {
        certificate: Certificate,
        icao_member: ICAOMember,
        siblings: Vec<Hash32>,
    },
    Identity {
        kind: IdentityCallKind,
        certificates_root: Hash32,
        pk_identity_hash: Hash32,
        dg1_commitment: Hash32,
        passport: Passport,
    },
    Revoke {
        active_identity: Hash32,
        passport: Passport,
    },
}

impl RegistrationCall {
    fn identity(
        kind: IdentityCallKind,
        certificates_root: B256,
        identity_key: U256,
        dg_commit: U256,
        passport: Passport,
    ) -> Self {
        Self::Identity {
            kind,
            certificates_root: hash32(&certificates_root),
            pk_identity_hash: u256_hash(&identity_key),
            dg1_commitment: u256_hash(&dg_commit),
            passport,
        }
    }

    /// Decode call data produced by the builders above.
    pub fn decode(data: &[u8]) -> Result<Self, CallDataError> {
        use Registration::RegistrationCalls as Calls;

        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| CallDataError::UnknownSelector(hex::encode(data)))?;
        if !Calls::valid_selector(selector) {
            return Err(CallDataError::UnknownSelector(hex::encode(selector)));
        }

        Ok(match Calls::abi_decode(data, true)? {
            Calls::registerCertificate(c) => Self::RegisterCertificate {
                certificate: c.certificate,
                icao_member: c.icaoMember,
                siblings: c.icaoMerkleProof.iter().map(hash32).collect(),
            },
            Calls::register(c) => Self::identity(
                IdentityCallKind::Register,
                c.certificatesRoot,
                c.identityKey,
                c.dgCommit,
                c.passport,
            ),
            Calls::reissueIdentity(c) => Self::identity(
                IdentityCallKind::Reissue,
                c.certificatesRoot,
                c.identityKey,
                c.dgCommit,
                c.passport,
            ),
            Calls::registerViaNoir(c) => Self::identity(
                IdentityCallKind::RegisterViaNoir,
                c.certificatesRoot,
                c.identityKey,
                c.dgCommit,
                c.passport,
            ),
            Calls::reissueIdentityViaNoir(c) => Self::identity(
                IdentityCallKind::ReissueViaNoir,
                c.certificatesRoot,
                c.identityKey,
                c.dgCommit,
                c.passport,
            ),
            Calls::revoke(c) => Self::Revoke {
                active_identity: hash32(&c.identityKey),
                passport: c.passport,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use passid_core::{Curve, SignatureProfile};
    use passid_zkp::{
        fixtures, resolve_circuit, CircuitCatalog, MockProver, ProofRequest, ProofSystem, Prover,
    };
    use proptest::prelude::*;

    fn cert_with(profile: SignatureProfile, key_len: usize) -> SigningCertificate {
        SigningCertificate {
            public_key: vec![7u8; key_len],
            profile,
            tbs_certificate: vec![1, 2, 3],
            key_offset: 0,
            expiration_offset: 0,
        }
    }

    async fn item(active_auth: bool, system: ProofSystem) -> (IdentityItem, ResolvedCircuit) {
        let doc = fixtures::passport(active_auth);
        let circuit = resolve_circuit(&CircuitCatalog::builtin().unwrap(), &doc, system).unwrap();
        let proof = MockProver::new()
            .prove(&ProofRequest {
                circuit_name: circuit.name.clone(),
                system,
                document: doc.clone(),
                secret_key: Hash32::from_u64(42),
                merkle_root: Hash32::from_u64(1),
                inclusion_branches: vec![],
            })
            .await
            .unwrap();
        (IdentityItem::new(doc, proof, &circuit.name).unwrap(), circuit)
    }

    #[test]
    fn test_rsa_dispatcher_names() {
        let rsa = |h| cert_with(SignatureProfile::rsa(h, 2048, 65537), 256);
        assert_eq!(
            certificate_dispatcher_name(&rsa(HashAlgorithm::Sha256)).unwrap(),
            "C_RSA_2048"
        );
        assert_eq!(
            certificate_dispatcher_name(&rsa(HashAlgorithm::Sha1)).unwrap(),
            "C_RSA_SHA1_2048"
        );
        assert_eq!(
            certificate_dispatcher_name(&rsa(HashAlgorithm::Sha512)).unwrap(),
            "C_RSA_SHA512_2048"
        );
        assert!(matches!(
            certificate_dispatcher_name(&rsa(HashAlgorithm::Sha224)),
            Err(CallDataError::UnsupportedDispatcher(_))
        ));
        let pss = cert_with(
            SignatureProfile::rsa_pss(HashAlgorithm::Sha384, 3072, 65537, 48),
            384,
        );
        assert_eq!(certificate_dispatcher_name(&pss).unwrap(), "C_RSAPSS_SHA2_3072");
    }

    #[test]
    fn test_ecdsa_dispatcher_name() {
        let c = cert_with(
            SignatureProfile::ecdsa(HashAlgorithm::Sha256, Curve::BrainpoolP256r1),
            64,
        );
        assert_eq!(
            certificate_dispatcher_name(&c).unwrap(),
            "C_ECDSA_brainpoolP256r1_SHA2_512"
        );
    }

    #[test]
    fn test_aa_data_type_names() {
        let doc = fixtures::passport(false);
        assert_eq!(aa_data_type_name(&doc), "P_NO_DATA");
        assert_eq!(aa_data_type(&doc), keccak256_str("P_NO_DATA"));

        let doc = fixtures::passport(true);
        assert_eq!(aa_data_type_name(&doc), "P_RSA_SHA1_2688");

        let mut doc = fixtures::passport(true);
        doc.active_auth_key = Some(ActiveAuthKey::Ecdsa {
            public_key: vec![4; 65],
            curve: Curve::Secp256r1,
        });
        assert_eq!(aa_data_type_name(&doc), "P_ECDSA_SHA1_2048");
    }

    #[tokio::test]
    async fn test_register_selects_call_by_system_and_revocation() {
        let (circom, circuit) = item(false, ProofSystem::Circom).await;
        let root = Hash32::from_u64(9);

        let data = register_identity(&circom, &circuit, root, false).unwrap();
        assert_eq!(data[..4], Registration::registerCall::SELECTOR);
        let data = register_identity(&circom, &circuit, root, true).unwrap();
        assert_eq!(data[..4], Registration::reissueIdentityCall::SELECTOR);

        let (noir, circuit) = item(false, ProofSystem::Noir).await;
        let data = register_identity(&noir, &circuit, root, false).unwrap();
        assert_eq!(data[..4], Registration::registerViaNoirCall::SELECTOR);
        let data = register_identity(&noir, &circuit, root, true).unwrap();
        assert_eq!(data[..4], Registration::reissueIdentityViaNoirCall::SELECTOR);
    }

    #[tokio::test]
    async fn test_register_call_decodes_back() {
        let (item, circuit) = item(true, ProofSystem::Circom).await;
        let root = Hash32::from_u64(77);
        let data = register_identity(&item, &circuit, root, false).unwrap();

        match RegistrationCall::decode(&data).unwrap() {
            RegistrationCall::Identity {
                kind,
                certificates_root,
                pk_identity_hash,
                dg1_commitment,
                passport,
            } => {
                assert_eq!(kind, IdentityCallKind::Register);
                assert_eq!(certificates_root, root);
                assert_eq!(pk_identity_hash, item.descriptor.pk_identity_hash);
                assert_eq!(dg1_commitment, item.descriptor.dg1_commitment);
                assert_eq!(hash32(&passport.zkType), circuit.zk_type);
                assert_eq!(passport.publicKey.to_vec(), fixtures::aa_modulus());
                assert_eq!(
                    passport.signature.to_vec(),
                    item.document.aa_signature_or_empty()
                );
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_aa_signature_rejected() {
        let (mut item, circuit) = item(true, ProofSystem::Circom).await;
        item.document.aa_signature = None;
        assert!(matches!(
            register_identity(&item, &circuit, Hash32::ZERO, false),
            Err(CallDataError::MissingAaSignature)
        ));
    }

    #[test]
    fn test_register_certificate_decodes_back() {
        let doc = fixtures::passport(false);
        let siblings = vec![Hash32::from_u64(1), Hash32::from_u64(2)];
        let data = register_certificate(&doc, &siblings).unwrap();
        match RegistrationCall::decode(&data).unwrap() {
            RegistrationCall::RegisterCertificate {
                certificate,
                icao_member,
                siblings: decoded,
            } => {
                assert_eq!(hash32(&certificate.dataType), keccak256_str("C_RSA_2048"));
                assert_eq!(
                    certificate.signedAttributes.to_vec(),
                    doc.signing_certificate.tbs_certificate
                );
                assert_eq!(certificate.keyOffset, U256::from(200u64));
                assert_eq!(certificate.expirationOffset, U256::from(150u64));
                let chain = doc.chain_of_trust.as_ref().unwrap();
                assert_eq!(icao_member.publicKey.to_vec(), chain.icao_member_key);
                assert_eq!(decoded, siblings);
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn test_revoke_passport_zeroes_proof_fields() {
        let doc = fixtures::passport(false);
        let p = revoke_passport(&doc, vec![1, 2]);
        assert_eq!(p.publicKey.to_vec(), vec![0u8; 32]);
        assert!(p.zkType.is_zero() && p.passportHash.is_zero());

        let active = Hash32::from_u64(5);
        match RegistrationCall::decode(&revoke(active, &p)).unwrap() {
            RegistrationCall::Revoke {
                active_identity,
                passport,
            } => {
                assert_eq!(active_identity, active);
                assert_eq!(passport, p);
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn test_unknown_selector() {
        assert!(matches!(
            RegistrationCall::decode(&[0xde, 0xad, 0xbe, 0xef]),
            Err(CallDataError::UnknownSelector(s)) if s == "deadbeef"
        ));
        assert!(matches!(
            RegistrationCall::decode(&[0x01]),
            Err(CallDataError::UnknownSelector(_))
        ));
    }

    #[test]
    fn test_truncated_call_is_an_abi_error() {
        let data = revoke(Hash32::from_u64(1), &revoke_passport(&fixtures::passport(false), vec![]));
        assert!(matches!(
            RegistrationCall::decode(&data[..40]),
            Err(CallDataError::Abi(_))
        ));
    }

    proptest! {
        #[test]
        fn certificate_call_preserves_fields(
            tbs in proptest::collection::vec(any::<u8>(), 0..300),
            key_offset in any::<u64>(),
            expiration_offset in any::<u64>(),
            siblings in proptest::collection::vec(any::<[u8; 32]>(), 0..8),
        ) {
            let mut doc = fixtures::passport(false);
            doc.signing_certificate.tbs_certificate = tbs.clone();
            doc.signing_certificate.key_offset = key_offset;
            doc.signing_certificate.expiration_offset = expiration_offset;
            let siblings: Vec<Hash32> = siblings.into_iter().map(Hash32::new).collect();

            let data = register_certificate(&doc, &siblings).unwrap();
            match RegistrationCall::decode(&data).unwrap() {
                RegistrationCall::RegisterCertificate { certificate, siblings: decoded, .. } => {
                    prop_assert_eq!(certificate.signedAttributes.to_vec(), tbs);
                    prop_assert_eq!(certificate.keyOffset, U256::from(key_offset));
                    prop_assert_eq!(certificate.expirationOffset, U256::from(expiration_offset));
                    prop_assert_eq!(decoded, siblings);
                }
                other => prop_assert!(false, "unexpected call {:?}", other),
            }
        }

        #[test]
        fn revoke_call_preserves_identity_and_signature(
            identity in any::<[u8; 32]>(),
            signature in proptest::collection::vec(any::<u8>(), 0..128),
        ) {
            let passport = revoke_passport(&fixtures::passport(true), signature.clone());
            let data = revoke(Hash32::new(identity), &passport);
            prop_assert_eq!(&data[..4], &Registration::revokeCall::SELECTOR[..]);
            match RegistrationCall::decode(&data).unwrap() {
                RegistrationCall::Revoke { active_identity, passport: decoded } => {
                    prop_assert_eq!(active_identity, Hash32::new(identity));
                    prop_assert_eq!(decoded.signature.to_vec(), signature);
                }
                other => prop_assert!(false, "unexpected call {:?}", other),
            }
        }
    }
}
