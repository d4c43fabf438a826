//! # Document Fixtures
//!
//! Synthetic chip reads whose byte layout lands on published circuits.
//! The data-group contents are filler; only the digest positions matter.
//!
//! | fixture                | circuit                                              |
//! |------------------------|------------------------------------------------------|
//! | `passport(false)`      | `registerIdentity_1_256_3_5_576_248_NA`              |
//! | `passport(true)`       | `registerIdentity_1_256_3_6_576_248_1_2432_5_296`    |
//! | `id_card()`            | `registerIdentity_inid_ca` (Noir)                    |

use passid_core::{
    ActiveAuthKey, ChainOfTrust, DocumentType, HashAlgorithm, ParsedDocument, PersonDetails,
    SignatureProfile, SigningCertificate,
};

use crate::layout::digest;

const DG1_SHIFT: usize = 31;
const DG15_SHIFT: usize = 304;
const ENCAP_SHIFT: usize = 72;
const AA_KEY_SHIFT: usize = 37;

/// Raw public key of the CSCA that issued the fixture signing certificate.
pub fn csca_master_key() -> Vec<u8> {
    (0..256u32).map(|i| (i * 11 + 0x8f) as u8).collect()
}

/// A small CSCA master list containing [`csca_master_key`].
pub fn csca_master_list() -> Vec<Vec<u8>> {
    let mut list: Vec<Vec<u8>> = (0..6u8)
        .map(|n| format!("csca-fixture-{n}").into_bytes())
        .collect();
    list.insert(3, csca_master_key());
    list
}

/// Signing certificate public key (RSA-2048 modulus).
pub fn signing_public_key() -> Vec<u8> {
    (0..256u32).map(|i| (i * 13 + 0x9d) as u8).collect()
}

/// Active-authentication RSA modulus carried in DG15.
pub fn aa_modulus() -> Vec<u8> {
    (0..256u32).map(|i| (i * 7 + 0xc1) as u8).collect()
}

fn dg1() -> Vec<u8> {
    let mut dg1 = vec![0x61, 0x5b, 0x5f, 0x1f, 0x58];
    dg1.extend((0..88u8).map(|i| b'A' + i % 26));
    dg1
}

fn dg15() -> Vec<u8> {
    let mut dg15 = vec![0u8; 300];
    dg15[AA_KEY_SHIFT..AA_KEY_SHIFT + 256].copy_from_slice(&aa_modulus());
    dg15
}

fn place(buf: &mut [u8], at: usize, bytes: &[u8]) {
    buf[at..at + bytes.len()].copy_from_slice(bytes);
}

/// An RSA-2048/SHA-256 passport read, with or without active authentication.
pub fn passport(active_auth: bool) -> ParsedDocument {
    let alg = HashAlgorithm::Sha256;
    let dg1 = dg1();
    let dg15 = active_auth.then(dg15);

    let mut encap = vec![0x04u8; if active_auth { 340 } else { 260 }];
    place(&mut encap, DG1_SHIFT, &digest(alg, &dg1));
    if let Some(dg15) = &dg15 {
        place(&mut encap, DG15_SHIFT, &digest(alg, dg15));
    }

    let mut sod = vec![0x82u8; 520];
    place(&mut sod, ENCAP_SHIFT, &digest(alg, &encap));

    let mut tbs = vec![0x30u8; 600];
    place(&mut tbs, 200, &signing_public_key());

    ParsedDocument {
        doc_type: DocumentType::Passport,
        sod,
        encapsulated_content: encap,
        signed_attributes: vec![0x31, 0x48, 0x30, 0x15],
        dg1,
        dg11: None,
        aa_signature: active_auth.then(|| vec![0xa5; 256]),
        active_auth_key: active_auth.then(|| ActiveAuthKey::Rsa {
            modulus: aa_modulus(),
            exponent: 65537,
            hash_algorithm: Some(HashAlgorithm::Sha1),
        }),
        dg15,
        signing_certificate: SigningCertificate {
            public_key: signing_public_key(),
            profile: SignatureProfile::rsa(alg, 2048, 65537),
            tbs_certificate: tbs,
            key_offset: 200,
            expiration_offset: 150,
        },
        chain_of_trust: Some(ChainOfTrust {
            master_public_key: csca_master_key(),
            icao_member_signature: vec![0x5a; 256],
            icao_member_key: csca_master_key(),
        }),
        person_details: PersonDetails {
            first_name: Some("ANNA".into()),
            last_name: Some("ERIKSSON".into()),
            nationality: Some("UTO".into()),
            ..PersonDetails::default()
        },
    }
}

/// A national eID card read (TD1, no active authentication).
pub fn id_card() -> ParsedDocument {
    let mut doc = passport(false);
    doc.doc_type = DocumentType::Id;
    doc
}
