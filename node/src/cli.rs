//! # CLI Interface
//!
//! Command-line structure for `lockbox-node`, via `clap` derive. Four
//! subcommands: `simulate`, `domain`, `sign`, and `version`.

use clap::{Parser, Subcommand};

/// Lockbox operator tool.
///
/// Runs the canonical vault scenarios against an in-memory devnet, prints
/// signing domains, and signs operation envelopes for a vault's operating
/// key.
#[derive(Parser, Debug)]
#[command(
    name = "lockbox-node",
    about = "Lockbox operator tool",
    version,
    propagate_version = true
)]
pub struct LockboxNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the built-in scenarios on an in-memory deployment and print a
    /// JSON summary.
    Simulate(SimulateArgs),
    /// Print the signing domain separator of a deployment.
    Domain(DomainArgs),
    /// Sign an operation envelope with an operating key.
    Sign(SignArgs),
    /// Print version information and exit.
    Version,
}

/// Where a lockbox is deployed. The chain id, when given, wins over the
/// network name.
#[derive(clap::Args, Debug, Clone)]
pub struct DeploymentArgs {
    /// Network name: mainnet, testnet, or devnet.
    #[arg(long, env = "LOCKBOX_NETWORK", default_value = "devnet")]
    pub network: String,

    /// Explicit chain id.
    #[arg(long, env = "LOCKBOX_CHAIN_ID")]
    pub chain_id: Option<u64>,

    /// Hex address of the lockbox contract.
    #[arg(long, env = "LOCKBOX_CONTRACT")]
    pub contract: String,
}

#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Network to simulate: mainnet, testnet, or devnet.
    #[arg(long, env = "LOCKBOX_NETWORK", default_value = "devnet")]
    pub network: String,

    /// Log output format: pretty or json.
    #[arg(long, env = "LOCKBOX_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

#[derive(Parser, Debug)]
pub struct DomainArgs {
    #[command(flatten)]
    pub deployment: DeploymentArgs,
}

#[derive(Parser, Debug)]
pub struct SignArgs {
    #[command(flatten)]
    pub deployment: DeploymentArgs,

    /// Operation to authorize, as JSON, e.g.
    /// `{"op":"withdraw_native","amount":100,"recipient":"0x.."}`.
    #[arg(long)]
    pub operation: String,

    /// Hex-encoded Ed25519 secret key of the vault's operating key.
    ///
    /// **Never pass this flag on a shared machine**; prefer the env var.
    #[arg(long, env = "LOCKBOX_OPERATING_KEY")]
    pub key: String,

    /// Vault the envelope is bound to.
    #[arg(long)]
    pub vault: u64,

    /// The vault's current nonce.
    #[arg(long)]
    pub nonce: u64,

    /// Opaque reference id echoed in events.
    #[arg(long, default_value_t = 0)]
    pub reference: u64,

    /// Seconds until the envelope expires. Defaults to the protocol's
    /// signature TTL.
    #[arg(long)]
    pub ttl_secs: Option<u64>,
}
