//! # CLI Interface
//!
//! Command-line argument structure for `asset-node`, using `clap` derive.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Asset ledger node.
///
/// Runs a complete in-process ledger network (notary, participants and
/// their signing responders) from a TOML file, replays the issuances and
/// transfers it lists, and reports what committed.
#[derive(Parser, Debug)]
#[command(
    name = "asset-node",
    about = "Asset ledger node",
    version,
    propagate_version = true
)]
pub struct AssetNodeCli {
    /// Log output format: "pretty" or "json".
    #[arg(long, global = true, env = "ASSET_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a network from a configuration file and replay its script.
    Simulate(SimulateArgs),
    /// Load and validate a configuration file without running anything.
    CheckConfig(CheckConfigArgs),
    /// Generate a party keypair and print it.
    Keygen(KeygenArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Path to the network configuration file (TOML).
    #[arg(long, short = 'c', env = "ASSET_CONFIG")]
    pub config: PathBuf,

    /// Print the report as JSON on stdout instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Also print Prometheus metrics in text exposition format.
    #[arg(long)]
    pub metrics: bool,
}

#[derive(Parser, Debug)]
pub struct CheckConfigArgs {
    #[arg(long, short = 'c', env = "ASSET_CONFIG")]
    pub config: PathBuf,
}

#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Name to derive the party address for.
    #[arg(long, default_value = "party")]
    pub name: String,
}
