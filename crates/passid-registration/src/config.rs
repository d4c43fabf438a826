//! Registration client configuration.
//!
//! Endpoints, contract addresses and timeouts. Loaded from a YAML file or
//! from `PASSID_*` environment variables; both paths end in the same
//! validation so a loaded [`RegistrationConfig`] always holds parsed URLs
//! and well-formed addresses.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::abi::Address;

const DEFAULT_RPC_URL: &str = "https://rpc.evm.mainnet.rarimo.com";
const DEFAULT_RELAYER_URL: &str = "https://api.app.rarime.com";
const DEFAULT_PROVER_TIMEOUT_SECS: u64 = 300;
const DEFAULT_RECEIPT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_RECEIPT_POLL_MS: u64 = 1_000;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Configuration for the registration flow.
///
/// Custom `Debug` implementation redacts `relayer_api_key`.
#[derive(Clone)]
pub struct RegistrationConfig {
    /// EVM JSON-RPC endpoint used for reads and receipts.
    pub rpc_url: Url,
    /// Relayer base URL.
    pub relayer_url: Url,
    /// Optional bearer token for the relayer.
    pub relayer_api_key: Option<String>,
    /// Registration contract (destination of every write).
    pub registration_contract: Address,
    /// StateKeeper contract (`getPassportInfo`).
    pub state_keeper_contract: Address,
    /// Certificates sparse Merkle tree (`getProof`).
    pub certificates_smt_contract: Address,
    pub prover_timeout: Duration,
    pub receipt_timeout: Duration,
    pub receipt_poll_interval: Duration,
    pub http_timeout: Duration,
}

impl std::fmt::Debug for RegistrationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationConfig")
            .field("rpc_url", &self.rpc_url)
            .field("relayer_url", &self.relayer_url)
            .field(
                "relayer_api_key",
                &self.relayer_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("registration_contract", &self.registration_contract)
            .field("state_keeper_contract", &self.state_keeper_contract)
            .field("certificates_smt_contract", &self.certificates_smt_contract)
            .field("prover_timeout", &self.prover_timeout)
            .field("receipt_timeout", &self.receipt_timeout)
            .field("receipt_poll_interval", &self.receipt_poll_interval)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

/// On-disk YAML shape.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    rpc_url: Option<String>,
    #[serde(default)]
    relayer_url: Option<String>,
    #[serde(default)]
    relayer_api_key: Option<String>,
    contracts: FileContracts,
    #[serde(default)]
    timeouts: FileTimeouts,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileContracts {
    registration: String,
    state_keeper: String,
    certificates_smt: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileTimeouts {
    prover_secs: Option<u64>,
    receipt_secs: Option<u64>,
    receipt_poll_ms: Option<u64>,
    http_secs: Option<u64>,
}

impl RegistrationConfig {
    /// Parse a YAML document.
    ///
    /// ```yaml
    /// rpc_url: https://rpc.example.org
    /// relayer_url: https://relayer.example.org
    /// contracts:
    ///   registration: "0x…"
    ///   state_keeper: "0x…"
    ///   certificates_smt: "0x…"
    /// timeouts:
    ///   prover_secs: 300
    ///   receipt_secs: 120
    /// ```
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let file: FileConfig =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Yaml(e.to_string()))?;
        let t = &file.timeouts;
        Ok(Self {
            rpc_url: parse_url(
                "rpc_url",
                file.rpc_url.as_deref().unwrap_or(DEFAULT_RPC_URL),
            )?,
            relayer_url: parse_url(
                "relayer_url",
                file.relayer_url.as_deref().unwrap_or(DEFAULT_RELAYER_URL),
            )?,
            relayer_api_key: file.relayer_api_key.filter(|k| !k.is_empty()),
            registration_contract: parse_address(
                "contracts.registration",
                &file.contracts.registration,
            )?,
            state_keeper_contract: parse_address(
                "contracts.state_keeper",
                &file.contracts.state_keeper,
            )?,
            certificates_smt_contract: parse_address(
                "contracts.certificates_smt",
                &file.contracts.certificates_smt,
            )?,
            prover_timeout: Duration::from_secs(
                t.prover_secs.unwrap_or(DEFAULT_PROVER_TIMEOUT_SECS),
            ),
            receipt_timeout: Duration::from_secs(
                t.receipt_secs.unwrap_or(DEFAULT_RECEIPT_TIMEOUT_SECS),
            ),
            receipt_poll_interval: Duration::from_millis(
                t.receipt_poll_ms.unwrap_or(DEFAULT_RECEIPT_POLL_MS),
            ),
            http_timeout: Duration::from_secs(t.http_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS)),
        })
    }

    /// Read and parse a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e.to_string()))?;
        Self::from_yaml_str(&raw)
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `PASSID_RPC_URL` (default: `https://rpc.evm.mainnet.rarimo.com`)
    /// - `PASSID_RELAYER_URL` (default: `https://api.app.rarime.com`)
    /// - `PASSID_RELAYER_API_KEY` (optional)
    /// - `PASSID_REGISTRATION_ADDRESS` (required)
    /// - `PASSID_STATE_KEEPER_ADDRESS` (required)
    /// - `PASSID_CERTIFICATES_SMT_ADDRESS` (required)
    /// - `PASSID_PROVER_TIMEOUT_SECS` (default: 300)
    /// - `PASSID_RECEIPT_TIMEOUT_SECS` (default: 120)
    /// - `PASSID_RECEIPT_POLL_MS` (default: 1000)
    /// - `PASSID_HTTP_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let address = |var: &str| -> Result<Address, ConfigError> {
            let raw = lookup(var).ok_or_else(|| ConfigError::Missing(var.to_string()))?;
            parse_address(var, &raw)
        };
        let number = |var: &str, default: u64| -> Result<u64, ConfigError> {
            match lookup(var) {
                None => Ok(default),
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidNumber(var.to_string(), raw)),
            }
        };

        Ok(Self {
            rpc_url: env_url(&lookup, "PASSID_RPC_URL", DEFAULT_RPC_URL)?,
            relayer_url: env_url(&lookup, "PASSID_RELAYER_URL", DEFAULT_RELAYER_URL)?,
            relayer_api_key: lookup("PASSID_RELAYER_API_KEY").filter(|k| !k.is_empty()),
            registration_contract: address("PASSID_REGISTRATION_ADDRESS")?,
            state_keeper_contract: address("PASSID_STATE_KEEPER_ADDRESS")?,
            certificates_smt_contract: address("PASSID_CERTIFICATES_SMT_ADDRESS")?,
            prover_timeout: Duration::from_secs(number(
                "PASSID_PROVER_TIMEOUT_SECS",
                DEFAULT_PROVER_TIMEOUT_SECS,
            )?),
            receipt_timeout: Duration::from_secs(number(
                "PASSID_RECEIPT_TIMEOUT_SECS",
                DEFAULT_RECEIPT_TIMEOUT_SECS,
            )?),
            receipt_poll_interval: Duration::from_millis(number(
                "PASSID_RECEIPT_POLL_MS",
                DEFAULT_RECEIPT_POLL_MS,
            )?),
            http_timeout: Duration::from_secs(number(
                "PASSID_HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
        })
    }

    /// A configuration pointing both endpoints at local servers, with short
    /// timeouts and fixed contract addresses (for testing).
    pub fn local(rpc_url: &str, relayer_url: &str) -> Result<Self, ConfigError> {
        let fixed = |last: u8| {
            let mut a = [0u8; 20];
            a[19] = last;
            Address::new(a)
        };
        Ok(Self {
            rpc_url: parse_url("rpc_url", rpc_url)?,
            relayer_url: parse_url("relayer_url", relayer_url)?,
            relayer_api_key: None,
            registration_contract: fixed(1),
            state_keeper_contract: fixed(2),
            certificates_smt_contract: fixed(3),
            prover_timeout: Duration::from_secs(5),
            receipt_timeout: Duration::from_secs(2),
            receipt_poll_interval: Duration::from_millis(10),
            http_timeout: Duration::from_secs(5),
        })
    }
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(field.to_string(), e.to_string()))
}

fn parse_address(field: &str, raw: &str) -> Result<Address, ConfigError> {
    raw.parse()
        .map_err(|_| ConfigError::InvalidAddress(field.to_string(), raw.to_string()))
}

fn env_url<F>(lookup: &F, var: &str, default: &str) -> Result<Url, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(var).unwrap_or_else(|| default.to_string());
    parse_url(var, &raw)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(String),
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid address for {0}: {1:?} (expected 0x followed by 40 hex digits)")]
    InvalidAddress(String, String),
    #[error("invalid number for {0}: {1:?}")]
    InvalidNumber(String, String),
    #[error("invalid YAML: {0}")]
    Yaml(String),
    #[error("cannot read {0}: {1}")]
    Io(String, String),
}
