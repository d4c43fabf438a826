//! # passid CLI entry point
//!
//! Parses command-line arguments, initializes logging and dispatches to
//! subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use passid_cli::circuit::{run_circuit, CircuitArgs};
use passid_cli::config::{load_config, run_config, ConfigArgs};
use passid_cli::status::{run_status, StatusArgs};
use passid_cli::tree::{run_tree, TreeArgs};

/// passid operator CLI.
///
/// Certificate tree tooling, circuit selection and naming, configuration
/// checks and passport status reads for the passport identity registry.
#[derive(Parser, Debug)]
#[command(name = "passid", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Path to a YAML configuration file. Defaults to PASSID_* variables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// CSCA certificate tree roots, proofs and path verification.
    Tree(TreeArgs),

    /// Circuit catalog lookups and circuit naming.
    Circuit(CircuitArgs),

    /// Load and check the registration configuration.
    Config(ConfigArgs),

    /// Read the on-chain binding of a passport.
    Status(StatusArgs),
}

fn init_tracing(verbose: u8, json: bool) {
    // RUST_LOG wins over -v.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "passid CLI starting");

    let config_path = cli.config.as_deref();
    let result = match &cli.command {
        Commands::Tree(args) => run_tree(args),
        Commands::Circuit(args) => run_circuit(args),
        Commands::Config(args) => run_config(args, config_path),
        Commands::Status(args) => {
            load_config(config_path).and_then(|config| run_status(args, &config))
        }
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
