//! # Status CLI — on-chain binding of a passport.
//!
//! Reads `getPassportInfo` from the StateKeeper and, given the caller's
//! identity-key hash, the registration decision the protocol would take.
//!
//! ```bash
//! passid --config passid.yaml status 0x5f3c... --own 0x9a1b...
//! ```

use anyhow::{Context, Result};
use clap::Args;
use passid_core::Hash32;
use passid_registration::{
    Decision, JsonRpcRegistryReader, PassportInfo, RegistrationConfig, RegistryReader,
};
use serde_json::json;

use crate::parse_hash;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Passport lookup key: the AA public-key hash or the passport hash.
    pub identity_key: String,
    /// Caller's identity-key hash; adds the registration decision.
    #[arg(long)]
    pub own: Option<String>,
}

/// Execute the status subcommand.
pub fn run_status(args: &StatusArgs, config: &RegistrationConfig) -> Result<u8> {
    let key = parse_hash("identity key", &args.identity_key)?;
    let own = args
        .own
        .as_deref()
        .map(|own| parse_hash("own key hash", own))
        .transpose()?;
    let status = query_status(config, key, own)?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(0)
}

/// Blocking read of one passport's binding.
pub fn query_status(
    config: &RegistrationConfig,
    key: Hash32,
    own: Option<Hash32>,
) -> Result<serde_json::Value> {
    let reader = JsonRpcRegistryReader::new(
        &config.rpc_url,
        config.state_keeper_contract,
        config.certificates_smt_contract,
        config.http_timeout,
    )?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let info = runtime
        .block_on(reader.get_passport_info(&key))
        .with_context(|| format!("getPassportInfo({key}) failed"))?;
    tracing::debug!(identity_key = %key, active_identity = %info.active_identity, "passport info read");
    Ok(render(&key, &info, own.as_ref()))
}

fn binding(info: &PassportInfo) -> &'static str {
    if info.is_unregistered() {
        "unregistered"
    } else if info.is_revoked() {
        "revoked"
    } else {
        "bound"
    }
}

fn render(key: &Hash32, info: &PassportInfo, own: Option<&Hash32>) -> serde_json::Value {
    let mut out = json!({
        "identity_key": key.to_hex(),
        "binding": binding(info),
        "passport_info": info,
    });
    if let Some(own) = own {
        out["decision"] = json!(Decision::from_passport_info(info, own).as_str());
    }
    out
}
