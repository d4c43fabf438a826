//! # passid-registration — On-Chain Registration
//!
//! Binds a passport to an identity key on the registry contracts.
//!
//! ## Architecture
//!
//! - **ABI** (`abi.rs`, `calldata.rs`): `sol!` declarations of the
//!   registry contracts, and the Registration call builders and decoders.
//!
//! - **Chain** (`chain.rs`): the [`RegistryReader`] trait and its JSON-RPC
//!   implementation. Passport bindings, certificate proofs, receipts.
//!
//! - **Relayer** (`relayer.rs`, `retry.rs`): the [`Relayer`] trait and the
//!   HTTP client. Reads back off and retry on transport errors; a
//!   submission is sent once and a lost answer is settled by reading the
//!   chain.
//!
//! - **Protocol** (`protocol.rs`, `state.rs`, `revoke.rs`): the
//!   registration state machine, its decision table, and revocation.
//!
//! - **Config** (`config.rs`): YAML / environment configuration.
//!
//! - **Mock** (`mock.rs`): [`InMemoryRegistry`], behind the default `mock`
//!   feature.
//!
//! ## Crate Policy
//!
//! - Depends on `passid-core`, `passid-crypto` and `passid-zkp` internally.
//! - Every write goes through the relayer; this crate never signs
//!   transactions.

pub mod abi;
pub mod calldata;
pub mod chain;
pub mod config;
pub mod error;
#[cfg(feature = "mock")]
pub mod mock;
pub mod protocol;
pub mod relayer;
mod retry;
pub mod revoke;
pub mod state;

pub use abi::Address;
pub use chain::{
    revoked_sentinel, CertificateProof, JsonRpcRegistryReader, PassportInfo, ReceiptStatus,
    ReceiptWait, RegistryReader, TxHash,
};
pub use config::{ConfigError, RegistrationConfig};
pub use error::{RegistrationError, RemoteError};
#[cfg(feature = "mock")]
pub use mock::{InMemoryRegistry, Interference, ReceiptMode, StaticChallengeSigner};
pub use protocol::{
    RegistrationOutcome, RegistrationProtocol, RegistrationReport, RegistrationRequest,
};
pub use relayer::{HttpRelayer, Relayer, TxRequest};
pub use revoke::{BenignRevokeOutcome, ChallengeSigner, RevokeOutcome, SignerError};
pub use state::{Decision, RegistrationState};
