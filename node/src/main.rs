// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Lockbox Node
//!
//! Entry point for the `lockbox-node` binary. Parses CLI arguments,
//! initializes logging, and dispatches to one of:
//!
//! - `simulate`: run the canonical scenarios on an in-memory deployment
//! - `domain`: print a deployment's signing domain separator
//! - `sign`: sign an operation envelope with an operating key
//! - `version`: print build version information
//!
//! Command output is JSON on stdout; logs go to stderr.

mod cli;
mod logging;
mod simulate;

use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use clap::Parser;
use serde::Serialize;

use lockbox_contracts::authorization::DomainSeparator;
use lockbox_contracts::config::LockboxConfig;
use lockbox_contracts::{Address, Envelope, Operation};
use lockbox_protocol::config::{
    chain_id_for_network, network_name, DEFAULT_SIGNATURE_TTL, PROTOCOL_NAME, PROTOCOL_VERSION,
};
use lockbox_protocol::crypto::keys::LockboxKeypair;

use cli::{Commands, DeploymentArgs, LockboxNodeCli};
use logging::LogFormat;

const DEFAULT_LOG_LEVEL: &str = "lockbox_node=info,lockbox_contracts=info";

fn main() -> Result<()> {
    let cli = LockboxNodeCli::parse();

    match cli.command {
        Commands::Simulate(args) => run_simulation(args),
        Commands::Domain(args) => {
            logging::init_logging("lockbox_node=warn", LogFormat::Pretty);
            print_domain(&args.deployment)
        }
        Commands::Sign(args) => {
            logging::init_logging("lockbox_node=warn", LogFormat::Pretty);
            sign_envelope(args)
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Runs every built-in scenario and prints the summary. Fails when any
/// scenario did not behave as expected.
fn run_simulation(args: cli::SimulateArgs) -> Result<()> {
    logging::init_logging(DEFAULT_LOG_LEVEL, LogFormat::from_str_lossy(&args.log_format));

    let admin = Address::derive("simulation admin");
    let contract = Address::derive("simulation lockbox");
    let config = LockboxConfig::for_network(&args.network, contract, admin)
        .ok_or_else(|| anyhow!("unknown network: {}", args.network))?;
    tracing::info!(network = %args.network, chain_id = config.chain_id, "starting simulation");

    let summary = simulate::run(&args.network, &config)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.passed != summary.total {
        return Err(anyhow!(
            "{} of {} scenarios failed",
            summary.total - summary.passed,
            summary.total
        ));
    }
    Ok(())
}

/// Chain id and contract address for `args`.
fn resolve_deployment(args: &DeploymentArgs) -> Result<(u64, Address)> {
    let chain_id = match args.chain_id {
        Some(id) => id,
        None => chain_id_for_network(&args.network)
            .ok_or_else(|| anyhow!("unknown network: {}", args.network))?,
    };
    let contract = Address::from_str(&args.contract)
        .with_context(|| format!("invalid contract address: {}", args.contract))?;
    Ok((chain_id, contract))
}

#[derive(Serialize)]
struct DomainReport {
    name: &'static str,
    version: &'static str,
    chain_id: u64,
    network: String,
    contract: Address,
    domain: String,
}

fn print_domain(args: &DeploymentArgs) -> Result<()> {
    let (chain_id, contract) = resolve_deployment(args)?;
    let domain = DomainSeparator::new(PROTOCOL_NAME, PROTOCOL_VERSION, chain_id, contract);
    let report = DomainReport {
        name: PROTOCOL_NAME,
        version: PROTOCOL_VERSION,
        chain_id,
        network: network_name(chain_id),
        contract,
        domain: domain.to_hex(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn sign_envelope(args: cli::SignArgs) -> Result<()> {
    let (chain_id, contract) = resolve_deployment(&args.deployment)?;
    let domain = DomainSeparator::new(PROTOCOL_NAME, PROTOCOL_VERSION, chain_id, contract);

    let operation: Operation =
        serde_json::from_str(&args.operation).context("failed to parse operation JSON")?;
    let keypair = LockboxKeypair::from_hex(&args.key).context("invalid operating key")?;

    let ttl_secs = args.ttl_secs.unwrap_or(DEFAULT_SIGNATURE_TTL.as_secs());
    let ttl = Duration::seconds(i64::try_from(ttl_secs).context("ttl out of range")?);
    let expiry = Utc::now() + ttl;

    let envelope = Envelope::sign(
        &keypair,
        &domain,
        args.vault,
        args.nonce,
        &operation,
        args.reference,
        expiry,
    )?;
    tracing::info!(
        vault_id = args.vault,
        nonce = args.nonce,
        kind = ?operation.kind(),
        signer = %Address::from(keypair.public_key()),
        "envelope signed"
    );
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn print_version() {
    println!("lockbox-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol     {} v{}", PROTOCOL_NAME, PROTOCOL_VERSION);
    println!("rustc        {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
