//! # CLI Interface
//!
//! Defines the command-line argument structure for `attestify-node` using
//! `clap` derive. Supports four subcommands: `run`, `init`, `status`,
//! and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use attestify_vault::config::{
    DEFAULT_RESERVE_RATIO_BPS, DEFAULT_YIELD_BPS_PER_YEAR, MIN_DEPOSIT,
};

/// Attestify vault daemon.
///
/// Runs the share-accounting vault: accepts deposits from verified
/// principals, allocates capital between the liquid reserve and the yield
/// strategy, serves the REST API, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "attestify-node",
    about = "Attestify vault daemon",
    version,
    propagate_version = true
)]
pub struct AttestifyCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the vault daemon binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the vault daemon.
    Run(RunArgs),
    /// Initialize a new data directory with an empty vault ledger.
    Init(InitArgs),
    /// Query the status of a running daemon via its API endpoint.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the daemon data directory where the ledger is stored.
    ///
    /// Created on first run if it does not exist.
    #[arg(long, short = 'd', env = "ATTESTIFY_DATA_DIR", default_value = "~/.attestify")]
    pub data_dir: PathBuf,

    /// Port for the REST API.
    #[arg(long, env = "ATTESTIFY_API_PORT", default_value_t = 8971)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "ATTESTIFY_METRICS_PORT", default_value_t = 8972)]
    pub metrics_port: u16,

    /// Principal id of the vault owner, authorized for admin endpoints.
    ///
    /// Only consulted when the ledger is created; a restored snapshot
    /// keeps its persisted owner.
    #[arg(long, env = "ATTESTIFY_OWNER", default_value = "owner")]
    pub owner: String,

    /// Target reserve ratio in basis points (fresh ledgers only).
    #[arg(long, env = "ATTESTIFY_RESERVE_RATIO_BPS", default_value_t = DEFAULT_RESERVE_RATIO_BPS)]
    pub reserve_ratio_bps: u32,

    /// Minimum deposit in smallest units (fresh ledgers only).
    #[arg(long, env = "ATTESTIFY_MIN_DEPOSIT", default_value_t = MIN_DEPOSIT)]
    pub min_deposit: u128,

    /// Simulated strategy yield in basis points per year.
    #[arg(long, env = "ATTESTIFY_YIELD_BPS", default_value_t = DEFAULT_YIELD_BPS_PER_YEAR)]
    pub yield_bps: u32,

    /// Seconds between yield accrual ticks.
    #[arg(long, env = "ATTESTIFY_ACCRUAL_INTERVAL_SECS", default_value_t = 60)]
    pub accrual_interval_secs: u64,

    /// Principals to pre-verify at startup. Repeatable.
    #[arg(long = "allow", env = "ATTESTIFY_ALLOW", value_delimiter = ',')]
    pub allow: Vec<String>,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "ATTESTIFY_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "ATTESTIFY_DATA_DIR", default_value = "~/.attestify")]
    pub data_dir: PathBuf,

    /// Principal id of the vault owner.
    #[arg(long, env = "ATTESTIFY_OWNER", default_value = "owner")]
    pub owner: String,

    /// Target reserve ratio in basis points.
    #[arg(long, default_value_t = DEFAULT_RESERVE_RATIO_BPS)]
    pub reserve_ratio_bps: u32,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// API endpoint of the running daemon.
    #[arg(long, default_value = "http://127.0.0.1:8971")]
    pub api_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        AttestifyCli::command().debug_assert();
    }

    #[test]
    fn run_args_parse_with_defaults() {
        let cli = AttestifyCli::parse_from(["attestify-node", "run"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(args.api_port, 8971);
        assert_eq!(args.metrics_port, 8972);
        assert_eq!(args.owner, "owner");
        assert_eq!(args.reserve_ratio_bps, DEFAULT_RESERVE_RATIO_BPS);
    }

    #[test]
    fn allow_flag_is_repeatable() {
        let cli = AttestifyCli::parse_from([
            "attestify-node",
            "run",
            "--allow",
            "alice",
            "--allow",
            "bob",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(args.allow, vec!["alice", "bob"]);
    }
}
