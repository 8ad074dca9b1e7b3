// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Asset Ledger Node
//!
//! Entry point for the `asset-node` binary. Parses CLI arguments,
//! initializes logging and metrics, and dispatches to a subcommand:
//!
//! - `simulate`     — run a configured network and replay its script
//! - `check-config` — validate a configuration file
//! - `keygen`       — generate a party keypair
//! - `version`      — print build version information

mod cli;
mod config;
mod logging;
mod metrics;
mod simulation;

use anyhow::{Context, Result};
use clap::Parser;

use asset_ledger::{LedgerKeypair, Party};

use cli::{AssetNodeCli, Commands};
use config::NodeConfig;
use logging::LogFormat;
use metrics::NodeMetrics;
use simulation::{Simulation, SimulationReport, StepOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = AssetNodeCli::parse();
    logging::init_logging(logging::DEFAULT_FILTER, LogFormat::from_str_lossy(&cli.log_format));

    match cli.command {
        Commands::Simulate(args) => simulate(args).await,
        Commands::CheckConfig(args) => check_config(args),
        Commands::Keygen(args) => keygen(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

async fn simulate(args: cli::SimulateArgs) -> Result<()> {
    let config = NodeConfig::load(&args.config)?;
    tracing::info!(
        config = %args.config.display(),
        parties = config.parties.len(),
        issuances = config.issuances.len(),
        transfers = config.transfers.len(),
        "starting simulation"
    );

    let metrics = NodeMetrics::new().context("failed to create prometheus registry")?;
    let simulation = Simulation::start(&config, metrics.clone())?;
    let report = simulation.run(&config).await?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize report")?
        );
    } else {
        print_report(&report);
    }

    if args.metrics {
        print!("{}", metrics.encode().context("failed to encode metrics")?);
    }

    tracing::info!(
        committed = report.committed(),
        steps = report.steps.len(),
        "simulation finished"
    );
    Ok(())
}

fn check_config(args: cli::CheckConfigArgs) -> Result<()> {
    let config = NodeConfig::load(&args.config)?;
    println!("{} is valid.", args.config.display());
    println!("  Notary     : {}", config.notary);
    println!("  Parties    : {}", config.parties.len());
    println!("  Issuers    : {}", config.whitelist.issuers.join(", "));
    println!("  Time window: {:?}", config.ledger.time_window());
    println!("  Timeout    : {:?}", config.ledger.counterparty_timeout());
    println!(
        "  Script     : {} issuance(s), {} transfer(s)",
        config.issuances.len(),
        config.transfers.len()
    );
    Ok(())
}

fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let keypair = LedgerKeypair::generate();
    let party = Party::from_keypair(args.name, &keypair);

    tracing::info!(party = %party, address = %party.address(), "keypair generated");
    println!("name       = {:?}", party.name);
    println!("address    = {:?}", party.address());
    println!("public_key = {:?}", party.owning_key.to_hex());
    println!("secret_key = {:?}", hex::encode(keypair.secret_key_bytes()));
    Ok(())
}

fn print_report(report: &SimulationReport) {
    println!("Notary: {}", report.notary);
    println!();
    for step in &report.steps {
        match &step.outcome {
            StepOutcome::Committed { tx_hash } => {
                println!("  ok    {} -> {} ({}ms)", step.step, &tx_hash[..16], step.elapsed_ms)
            }
            StepOutcome::Failed { error } => println!("  FAIL  {}: {}", step.step, error),
        }
    }
    println!();
    println!("Holdings:");
    for h in &report.holdings {
        println!(
            "  {:<12} {:<24} issued by {:<12} at {}",
            h.owner, h.content, h.issuer, h.state_ref
        );
    }
    println!();
    println!(
        "{} of {} step(s) committed, {} transaction(s) on the ledger, finished {}",
        report.committed(),
        report.steps.len(),
        report.transactions,
        chrono::Utc::now().to_rfc3339()
    );
}

fn print_version() {
    println!("asset-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol   {}", asset_ledger::config::PROTOCOL_VERSION);
    println!("rustc      {}", rustc_version());
}

fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
