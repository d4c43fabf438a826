//! # Circuit CLI — catalog lookups and circuit naming.
//!
//! ```bash
//! passid circuit select --algorithm rsa --hash sha256 --key-size 2048
//! passid circuit select --algorithm rsa-pss --hash sha256 --key-size 2048 --salt 32
//! passid circuit select --algorithm ecdsa --hash sha256 --curve secp256r1
//! passid circuit name document.json
//! passid circuit list
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use passid_core::{Curve, HashAlgorithm, ParsedDocument, SignatureAlgorithm, SignatureProfile};
use passid_zkp::{artifacts, resolve_circuit, CircuitCatalog, CircuitDescriptor, ProofSystem};
use serde_json::json;

use crate::read_to_string;

const DEFAULT_EXPONENT: u64 = 65537;

/// Circuit subcommand arguments.
#[derive(Args, Debug)]
pub struct CircuitArgs {
    #[command(subcommand)]
    pub command: CircuitCommand,
}

#[derive(Subcommand, Debug)]
pub enum CircuitCommand {
    /// Find the catalog descriptor for a certificate profile.
    Select(SelectArgs),

    /// Resolve the full circuit name, artifact URL and zkType of a document.
    Name {
        /// Parsed document as JSON.
        document: PathBuf,
        #[arg(long, value_enum, default_value_t = SystemArg::Circom)]
        system: SystemArg,
    },

    /// List the catalog and the published artifacts.
    List,
}

/// A certificate profile given flag by flag.
#[derive(Args, Debug, Clone)]
pub struct SelectArgs {
    /// rsa, rsa-pss or ecdsa.
    #[arg(long)]
    pub algorithm: SignatureAlgorithm,
    #[arg(long)]
    pub hash: HashAlgorithm,
    /// Modulus size in bits (RSA and RSA-PSS).
    #[arg(long)]
    pub key_size: Option<u32>,
    #[arg(long)]
    pub exponent: Option<u64>,
    /// PSS salt length in bytes.
    #[arg(long)]
    pub salt: Option<u32>,
    /// Named curve (ECDSA).
    #[arg(long)]
    pub curve: Option<Curve>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemArg {
    Circom,
    Noir,
}

impl From<SystemArg> for ProofSystem {
    fn from(arg: SystemArg) -> Self {
        match arg {
            SystemArg::Circom => ProofSystem::Circom,
            SystemArg::Noir => ProofSystem::Noir,
        }
    }
}

/// Execute the circuit subcommand.
pub fn run_circuit(args: &CircuitArgs) -> Result<u8> {
    let catalog = CircuitCatalog::builtin().context("built-in circuit catalog is invalid")?;
    match &args.command {
        CircuitCommand::Select(select) => {
            let descriptor = select_descriptor(&catalog, select)?;
            println!("{}", serde_json::to_string_pretty(descriptor)?);
            Ok(0)
        }
        CircuitCommand::Name { document, system } => {
            let doc = ParsedDocument::from_json(&read_to_string(document)?)
                .with_context(|| format!("invalid document {}", document.display()))?;
            let named = name_document(&catalog, &doc, (*system).into())?;
            println!("{}", serde_json::to_string_pretty(&named)?);
            Ok(0)
        }
        CircuitCommand::List => {
            println!("Circuit catalog:");
            for d in catalog.descriptors() {
                println!("  {:>3}  {}", d.static_id, d.profile);
            }
            println!();
            println!("Published artifacts:");
            for a in artifacts::artifacts() {
                println!("  {:<56} {}", a.name, a.version);
            }
            println!();
            println!(
                "Total: {} descriptors, {} artifacts",
                catalog.descriptors().len(),
                artifacts::artifacts().len()
            );
            Ok(0)
        }
    }
}

/// Assemble a [`SignatureProfile`] from the flags its algorithm needs.
pub fn build_profile(args: &SelectArgs) -> Result<SignatureProfile> {
    let exponent = args.exponent.unwrap_or(DEFAULT_EXPONENT);
    Ok(match args.algorithm {
        SignatureAlgorithm::Rsa => {
            let key_size = args.key_size.context("--key-size is required for RSA")?;
            SignatureProfile::rsa(args.hash, key_size, exponent)
        }
        SignatureAlgorithm::RsaPss => {
            let key_size = args.key_size.context("--key-size is required for RSA-PSS")?;
            let salt = args.salt.context("--salt is required for RSA-PSS")?;
            SignatureProfile::rsa_pss(args.hash, key_size, exponent, salt)
        }
        SignatureAlgorithm::Ecdsa => {
            let Some(curve) = args.curve else {
                bail!("--curve is required for ECDSA");
            };
            SignatureProfile::ecdsa(args.hash, curve)
        }
    })
}

pub fn select_descriptor<'a>(
    catalog: &'a CircuitCatalog,
    args: &SelectArgs,
) -> Result<&'a CircuitDescriptor> {
    let profile = build_profile(args)?;
    Ok(catalog.select(&profile)?)
}

/// `{name, system, zk_type, download_url}` for a document.
pub fn name_document(
    catalog: &CircuitCatalog,
    doc: &ParsedDocument,
    system: ProofSystem,
) -> Result<serde_json::Value> {
    let resolved = resolve_circuit(catalog, doc, system)?;
    Ok(json!({
        "name": resolved.name,
        "system": resolved.system.to_string(),
        "zk_type": resolved.zk_type.to_hex(),
        "download_url": resolved.download_url,
    }))
}
