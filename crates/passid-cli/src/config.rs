//! # Config CLI — load and check the registration configuration.
//!
//! The configuration comes from `--config <file.yaml>` when given and from
//! `PASSID_*` environment variables otherwise.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use passid_registration::RegistrationConfig;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate the configuration and print it with secrets redacted.
    Check,
}

/// Load from `path` if given, else from the environment.
pub fn load_config(path: Option<&Path>) -> Result<RegistrationConfig> {
    match path {
        Some(path) => RegistrationConfig::from_yaml_file(path)
            .with_context(|| format!("invalid configuration file {}", path.display())),
        None => RegistrationConfig::from_env().context("invalid PASSID_* environment"),
    }
}

/// Execute the config subcommand.
pub fn run_config(args: &ConfigArgs, path: Option<&Path>) -> Result<u8> {
    match args.command {
        ConfigCommand::Check => {
            let config = load_config(path)?;
            println!("{config:#?}");
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
rpc_url: "http://127.0.0.1:8545"
relayer_url: "http://127.0.0.1:8000"
relayer_api_key: "super-secret"
contracts:
  registration: "0x00000000000000000000000000000000000000a1"
  state_keeper: "0x00000000000000000000000000000000000000b2"
  certificates_smt: "0x00000000000000000000000000000000000000c3"
timeouts:
  prover_secs: 60
"#;

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passid.yaml");
        std::fs::write(&path, YAML).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.rpc_url.as_str(), "http://127.0.0.1:8545/");
        assert_eq!(config.prover_timeout.as_secs(), 60);
        assert!(!format!("{config:?}").contains("super-secret"));
    }

    #[test]
    fn load_config_names_the_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "contracts: [").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }
}
