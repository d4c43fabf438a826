//! # Contract ABI
//!
//! Solidity declarations of the registry contracts as passid uses them,
//! expanded by `alloy_sol_types::sol!` into call structs with
//! `abi_encode` / `abi_decode`.
//!
//! - **Registration**: every write the relayer forwards.
//! - **StateKeeper**: `getPassportInfo`.
//! - **PoseidonSMT**: `getProof` of the certificates tree.
//!
//! Words cross the crate boundary as [`Hash32`]; the helpers at the bottom
//! convert to and from the alloy primitives.

use alloy_sol_types::sol;
use num_bigint::BigUint;
use passid_core::Hash32;
use thiserror::Error;

pub use alloy_primitives::{Address, Bytes, B256, U256};
pub use alloy_sol_types::{SolCall, SolInterface, SolValue};

/// ABI encoding or decoding failure.
#[derive(Error, Debug)]
pub enum AbiError {
    /// An integer does not fit in 256 bits.
    #[error("integer does not fit in uint256")]
    IntegerOverflow,

    /// Return data or call data did not decode.
    #[error("ABI decoding failed: {0}")]
    Decode(#[from] alloy_sol_types::Error),
}

sol! {
    #![sol(all_derives)]

    /// Signing certificate as `registerCertificate` takes it.
    #[sol(all_derives)]
    struct Certificate {
        bytes32 dataType;
        bytes signedAttributes;
        uint256 keyOffset;
        uint256 expirationOffset;
    }

    /// The CSCA's signature over the certificate, and the CSCA key.
    #[sol(all_derives)]
    struct ICAOMember {
        bytes signature;
        bytes publicKey;
    }

    #[sol(all_derives)]
    struct Passport {
        bytes32 dataType;
        bytes32 zkType;
        bytes signature;
        bytes publicKey;
        bytes32 passportHash;
    }

    /// Groth16 points with `b` in verifier order.
    #[sol(all_derives)]
    struct ProofPoints {
        uint256[2] a;
        uint256[2][2] b;
        uint256[2] c;
    }

    #[sol(all_derives)]
    struct PassportInfo {
        bytes32 activeIdentity;
        uint64 identityReissueCounter;
    }

    #[sol(all_derives)]
    struct IdentityInfo {
        bytes32 activePassport;
        uint64 issueTimestamp;
    }

    #[sol(all_derives)]
    struct SmtProof {
        bytes32 root;
        bytes32[] siblings;
        bool existence;
        bytes32 key;
        bytes32 value;
        bool auxExistence;
        bytes32 auxKey;
        bytes32 auxValue;
    }

    #[sol(all_derives)]
    interface Registration {
        function registerCertificate(
            Certificate certificate,
            ICAOMember icaoMember,
            bytes32[] icaoMerkleProof
        ) external;

        function register(
            bytes32 certificatesRoot,
            uint256 identityKey,
            uint256 dgCommit,
            Passport passport,
            ProofPoints zkPoints
        ) external;

        function reissueIdentity(
            bytes32 certificatesRoot,
            uint256 identityKey,
            uint256 dgCommit,
            Passport passport,
            ProofPoints zkPoints
        ) external;

        function registerViaNoir(
            bytes32 certificatesRoot,
            uint256 identityKey,
            uint256 dgCommit,
            Passport passport,
            bytes zkPoints
        ) external;

        function reissueIdentityViaNoir(
            bytes32 certificatesRoot,
            uint256 identityKey,
            uint256 dgCommit,
            Passport passport,
            bytes zkPoints
        ) external;

        function revoke(bytes32 identityKey, Passport passport) external;
    }

    #[sol(all_derives)]
    interface StateKeeper {
        function getPassportInfo(bytes32 passportKey)
            external
            view
            returns (PassportInfo memory passportInfo, IdentityInfo memory identityInfo);
    }

    #[sol(all_derives)]
    interface PoseidonSMT {
        function getProof(bytes32 key) external view returns (SmtProof memory proof);
    }
}

pub fn b256(value: &Hash32) -> B256 {
    B256::new(value.to_bytes())
}

pub fn hash32(value: &B256) -> Hash32 {
    Hash32::new(value.0)
}

/// A word read as a big-endian `uint256`.
pub fn u256(value: &Hash32) -> U256 {
    U256::from_be_bytes(value.to_bytes())
}

pub fn u256_hash(value: &U256) -> Hash32 {
    Hash32::new(value.to_be_bytes::<32>())
}

pub fn biguint_u256(value: &BigUint) -> Result<U256, AbiError> {
    Hash32::from_biguint(value)
        .map(|h| u256(&h))
        .map_err(|_| AbiError::IntegerOverflow)
}
