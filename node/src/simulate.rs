//! # Devnet Simulation
//!
//! Spins up an in-memory deployment with a funded owner, a standard token,
//! a fully-taxed token, an NFT collection, and a fixed-rate router, then
//! walks the canonical vault scenarios against it. Each scenario runs on a
//! fresh deployment and reports whether the lockbox behaved as expected.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Duration;
use serde::Serialize;

use lockbox_contracts::assets::TokenKind;
use lockbox_contracts::config::LockboxConfig;
use lockbox_contracts::counterparty::FixedRateRouter;
use lockbox_contracts::{
    Address, Amount, Asset, Envelope, Lockbox, LockboxError, Msg, Operation, SwapRequest,
    VaultContents, VaultId, World,
};
use lockbox_protocol::crypto::keys::LockboxKeypair;

/// One whole native unit (18 decimals).
pub const ONE: Amount = 1_000_000_000_000_000_000;

const TOKEN_SUPPLY: Amount = 1_000_000 * ONE;

#[derive(Debug, Serialize)]
pub struct ScenarioReport {
    pub scenario: &'static str,
    pub description: &'static str,
    pub passed: bool,
    /// What happened, in one line.
    pub outcome: String,
    /// The vault's holdings afterwards, when it still exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault: Option<VaultContents>,
}

#[derive(Debug, Serialize)]
pub struct SimulationSummary {
    pub network: String,
    pub chain_id: u64,
    pub domain: String,
    pub lockbox: Address,
    pub passed: usize,
    pub total: usize,
    pub scenarios: Vec<ScenarioReport>,
}

// ---------------------------------------------------------------------------
// Devnet
// ---------------------------------------------------------------------------

struct Devnet {
    lockbox: Lockbox,
    world: World,
    admin: Address,
    owner: Address,
    key: LockboxKeypair,
    usd: Address,
    void: Address,
    punks: Address,
    router: Address,
    reference: u64,
}

impl Devnet {
    fn new(config: &LockboxConfig) -> Result<Self> {
        let lockbox = Lockbox::new(config.clone());
        let this = lockbox.address();
        let mut world = World::new();
        let owner = Address::derive("devnet owner");
        let usd = Address::derive("devnet usd");
        let void = Address::derive("devnet void");
        let punks = Address::derive("devnet punks");
        let router = Address::derive("devnet router");

        let assets = world.assets_mut();
        assets.mint_native(owner, 10 * ONE)?;
        assets.mint_native(router, 10 * ONE)?;
        assets.deploy_token(usd, "USD", TokenKind::Standard)?;
        assets.deploy_token(void, "VOID", TokenKind::FeeOnTransfer { fee_bps: 10_000 })?;
        for token in [usd, void] {
            let t = assets.token_mut(token)?;
            t.mint(owner, TOKEN_SUPPLY)?;
            t.approve(owner, this, Amount::MAX);
        }
        assets.token_mut(usd)?.mint(router, TOKEN_SUPPLY)?;
        assets.deploy_collection(punks, "Punks")?;
        for item in 1..=3 {
            assets.mint_nft(punks, owner, item)?;
        }
        assets.collection_mut(punks)?.set_approval_for_all(owner, this, true);

        world.deploy_code(
            router,
            Arc::new(FixedRateRouter::new(Asset::Native, Asset::Fungible(usd), 2, 1)),
        );

        Ok(Self {
            lockbox,
            world,
            admin: config.admin,
            owner,
            key: LockboxKeypair::generate(),
            usd,
            void,
            punks,
            router,
            reference: 0,
        })
    }

    fn create_vault(&mut self, native: Amount) -> Result<VaultId> {
        let key = Address::from(self.key.public_key());
        self.reference += 1;
        let id = self.lockbox.create_with_native(
            &mut self.world,
            Msg::with_value(self.owner, native),
            self.owner,
            key,
            self.reference,
        )?;
        Ok(id)
    }

    fn envelope(&mut self, vault_id: VaultId, operation: &Operation) -> Result<Envelope> {
        let nonce = self.lockbox.nonce_of(self.owner, vault_id)?;
        self.reference += 1;
        let expiry = self.world.now() + Duration::minutes(5);
        let envelope = Envelope::sign(
            &self.key,
            self.lockbox.domain(),
            vault_id,
            nonce,
            operation,
            self.reference,
            expiry,
        )?;
        Ok(envelope)
    }

    fn contents(&self, vault_id: VaultId) -> Option<VaultContents> {
        self.lockbox.full_vault(self.owner, vault_id).ok()
    }
}

/// `Ok(description)` when `result` failed with exactly `expected`.
fn expect_rejection<T>(result: Result<T, LockboxError>, expected: LockboxError) -> Result<String> {
    match result {
        Err(err) if err == expected => Ok(format!("rejected: {err}")),
        Err(err) => bail!("expected {expected}, got {err}"),
        Ok(_) => bail!("expected {expected}, but the call succeeded"),
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

type Scenario = fn(&mut Devnet) -> Result<(String, Option<VaultContents>)>;

const SCENARIOS: [(&str, &str, Scenario); 7] = [
    ("A", "withdraw half of a 1.0 native vault", scenario_a),
    ("B", "deposit a 100%-fee token", scenario_b),
    ("C", "withdraw two NFTs one at a time", scenario_c),
    ("D", "replay a used envelope", scenario_d),
    ("E", "swap native for native", scenario_e),
    ("F", "burn a vault that still holds assets", scenario_f),
    ("G", "swap native for tokens through the router", scenario_g),
];

fn scenario_a(net: &mut Devnet) -> Result<(String, Option<VaultContents>)> {
    let id = net.create_vault(ONE)?;
    let recipient = Address::derive("devnet recipient");
    let half = ONE / 2;
    let env = net.envelope(id, &Operation::WithdrawNative { amount: half, recipient })?;
    let owner = net.owner;
    net.lockbox
        .withdraw_native(&mut net.world, owner, id, &env, half, recipient)?;

    let received = net.world.assets().native_balance(recipient);
    let kept = net.lockbox.native_balance(owner, id)?;
    if received != half || kept != half {
        bail!("recipient got {received}, vault kept {kept}");
    }
    Ok((format!("recipient +{half}, vault keeps {kept}"), net.contents(id)))
}

fn scenario_b(net: &mut Devnet) -> Result<(String, Option<VaultContents>)> {
    let id = net.create_vault(ONE)?;
    let (owner, void) = (net.owner, net.void);
    let result = net
        .lockbox
        .deposit_fungible(&mut net.world, owner, id, void, 100, 0);
    Ok((expect_rejection(result, LockboxError::ZeroAmount)?, net.contents(id)))
}

fn scenario_c(net: &mut Devnet) -> Result<(String, Option<VaultContents>)> {
    let id = net.create_vault(ONE)?;
    let (owner, punks) = (net.owner, net.punks);
    for item in [1, 2] {
        net.lockbox
            .deposit_nonfungible(&mut net.world, owner, id, punks, item, 0)?;
    }
    for item in [1, 2] {
        let op = Operation::WithdrawNonFungible {
            collection: punks,
            item,
            recipient: owner,
        };
        let env = net.envelope(id, &op)?;
        net.lockbox
            .withdraw_nonfungible(&mut net.world, owner, id, &env, punks, item, owner)?;
    }
    let contents = net.contents(id).context("vault vanished")?;
    if !contents.nfts.is_empty() {
        bail!("listing still holds {} items", contents.nfts.len());
    }
    Ok(("listing [1, 2] -> [2] -> []".to_string(), Some(contents)))
}

fn scenario_d(net: &mut Devnet) -> Result<(String, Option<VaultContents>)> {
    let id = net.create_vault(ONE)?;
    let (owner, recipient) = (net.owner, Address::derive("devnet recipient"));
    let env = net.envelope(id, &Operation::WithdrawNative { amount: 1, recipient })?;
    net.lockbox
        .withdraw_native(&mut net.world, owner, id, &env, 1, recipient)?;
    let replay = net
        .lockbox
        .withdraw_native(&mut net.world, owner, id, &env, 1, recipient);
    Ok((expect_rejection(replay, LockboxError::InvalidMessageHash)?, net.contents(id)))
}

fn scenario_e(net: &mut Devnet) -> Result<(String, Option<VaultContents>)> {
    let id = net.create_vault(ONE)?;
    let request = SwapRequest {
        asset_in: Asset::Native,
        asset_out: Asset::Native,
        amount_in: ONE / 10,
        min_amount_out: 0,
        router: net.router,
        payload: Vec::new(),
        recipient: None,
    };
    let env = net.envelope(id, &Operation::Swap(request.clone()))?;
    let owner = net.owner;
    let result = net.lockbox.swap(&mut net.world, owner, id, &env, &request);
    Ok((expect_rejection(result, LockboxError::InvalidSwap)?, net.contents(id)))
}

fn scenario_f(net: &mut Devnet) -> Result<(String, Option<VaultContents>)> {
    let id = net.create_vault(ONE)?;
    let (owner, admin, punks) = (net.owner, net.admin, net.punks);
    net.lockbox
        .deposit_nonfungible(&mut net.world, owner, id, punks, 3, 0)?;
    let env = net.envelope(id, &Operation::Burn)?;
    net.lockbox.burn(&mut net.world, owner, id, &env)?;

    expect_rejection(net.lockbox.owner_of(id), LockboxError::VaultNotFound(id))?;
    let left = net.lockbox.forfeited_holdings(admin, id)?;
    Ok((
        format!("burned; {} native and {} nft(s) forfeited", left.native, left.nfts.len()),
        Some(left),
    ))
}

fn scenario_g(net: &mut Devnet) -> Result<(String, Option<VaultContents>)> {
    let id = net.create_vault(ONE)?;
    let request = SwapRequest {
        asset_in: Asset::Native,
        asset_out: Asset::Fungible(net.usd),
        amount_in: ONE / 4,
        min_amount_out: ONE / 2,
        router: net.router,
        payload: Vec::new(),
        recipient: None,
    };
    let env = net.envelope(id, &Operation::Swap(request.clone()))?;
    let owner = net.owner;
    let outcome = net.lockbox.swap(&mut net.world, owner, id, &env, &request)?;
    Ok((
        format!("consumed {}, received {}", outcome.consumed, outcome.received),
        net.contents(id),
    ))
}

/// Run every scenario on its own fresh deployment.
pub fn run(network: &str, config: &LockboxConfig) -> Result<SimulationSummary> {
    let mut scenarios = Vec::with_capacity(SCENARIOS.len());
    for (name, description, scenario) in SCENARIOS {
        let mut net = Devnet::new(config).context("failed to set up devnet")?;
        let report = match scenario(&mut net) {
            Ok((outcome, vault)) => {
                tracing::info!(scenario = name, %outcome, "scenario passed");
                ScenarioReport {
                    scenario: name,
                    description,
                    passed: true,
                    outcome,
                    vault,
                }
            }
            Err(err) => {
                tracing::error!(scenario = name, error = %err, "scenario failed");
                ScenarioReport {
                    scenario: name,
                    description,
                    passed: false,
                    outcome: format!("{err:#}"),
                    vault: None,
                }
            }
        };
        scenarios.push(report);
    }

    Ok(SimulationSummary {
        network: network.to_string(),
        chain_id: config.chain_id,
        domain: config.domain().to_hex(),
        lockbox: config.address,
        passed: scenarios.iter().filter(|s| s.passed).count(),
        total: scenarios.len(),
        scenarios,
    })
}
