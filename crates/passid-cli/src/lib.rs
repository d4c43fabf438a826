//! # passid-cli — Operator Tooling
//!
//! Provides the `passid` command-line interface over the pure components
//! and the read side of the registry.
//!
//! ## Subcommands
//!
//! - `passid tree` — CSCA certificate tree roots, proofs and verification.
//! - `passid circuit` — circuit selection, naming and the artifact list.
//! - `passid config` — load and check the registration configuration.
//! - `passid status` — on-chain binding of a passport.
//!
//! ```bash
//! passid tree root masterlist.txt
//! passid circuit select --algorithm rsa --hash sha256 --key-size 2048
//! passid circuit name document.json --system noir
//! passid --config passid.yaml status 0x5f3c...
//! ```

pub mod circuit;
pub mod config;
pub mod status;
pub mod tree;

use std::path::Path;

use anyhow::{Context, Result};
use passid_core::Hash32;

/// Parse a `0x`-hex 32-byte value given on the command line.
pub fn parse_hash(label: &str, value: &str) -> Result<Hash32> {
    Hash32::from_hex(value).with_context(|| format!("invalid {label}: {value:?}"))
}

/// Read a UTF-8 file, naming it in the error.
pub fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
