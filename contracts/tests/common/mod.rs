//! Shared fixtures for the lockbox integration tests: a funded devnet world,
//! envelope helpers, and a handful of misbehaving external contracts.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use lockbox_contracts::assets::TokenKind;
use lockbox_contracts::config::LockboxConfig;
use lockbox_contracts::world::{ExternalContract, ExternalError, Host};
use lockbox_contracts::{
    Address, Amount, Asset, Envelope, Lockbox, Msg, NftKey, Operation, Selector, VaultId, World,
};
use lockbox_protocol::crypto::keys::LockboxKeypair;

pub const START_NATIVE: Amount = 1_000_000;
pub const START_TOKENS: Amount = 1_000_000;

pub fn addr(label: &str) -> Address {
    Address::derive(label)
}

pub fn genesis() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

pub struct Harness {
    pub lockbox: Lockbox,
    pub world: World,
    pub admin: Address,
    pub owner: Address,
    pub key: LockboxKeypair,
    /// Standard token.
    pub usd: Address,
    /// 2.5% fee-on-transfer token.
    pub fee: Address,
    /// Token that takes 100% of every transfer.
    pub void: Address,
    /// Token that ignores allowances.
    pub bug: Address,
    pub punks: Address,
    reference: u64,
}

impl Harness {
    pub fn new() -> Self {
        let admin = addr("admin");
        let owner = addr("owner");
        let lockbox = Lockbox::new(LockboxConfig::devnet(addr("lockbox"), admin));
        let mut world = World::at(genesis());

        let usd = addr("usd");
        let fee = addr("fee");
        let void = addr("void");
        let bug = addr("bug");
        let punks = addr("punks");

        let assets = world.assets_mut();
        assets.mint_native(owner, START_NATIVE).unwrap();
        assets.deploy_token(usd, "USD", TokenKind::Standard).unwrap();
        assets
            .deploy_token(fee, "FEE", TokenKind::FeeOnTransfer { fee_bps: 250 })
            .unwrap();
        assets
            .deploy_token(void, "VOID", TokenKind::FeeOnTransfer { fee_bps: 10_000 })
            .unwrap();
        assets.deploy_token(bug, "BUG", TokenKind::UncheckedAllowance).unwrap();
        for token in [usd, fee, void, bug] {
            let t = assets.token_mut(token).unwrap();
            t.mint(owner, START_TOKENS).unwrap();
            t.approve(owner, lockbox.address(), Amount::MAX);
        }
        assets.deploy_collection(punks, "Punks").unwrap();
        for item in 1..=5 {
            assets.mint_nft(punks, owner, item).unwrap();
        }
        assets
            .collection_mut(punks)
            .unwrap()
            .set_approval_for_all(owner, lockbox.address(), true);

        Self {
            lockbox,
            world,
            admin,
            owner,
            key: LockboxKeypair::from_seed(&[7u8; 32]),
            usd,
            fee,
            void,
            bug,
            punks,
            reference: 0,
        }
    }

    pub fn key_address(&self) -> Address {
        Address::from(self.key.public_key())
    }

    pub fn lockbox_address(&self) -> Address {
        self.lockbox.address()
    }

    pub fn create_native_vault(&mut self, amount: Amount) -> VaultId {
        let key = self.key_address();
        self.lockbox
            .create_with_native(&mut self.world, Msg::with_value(self.owner, amount), self.owner, key, 0)
            .unwrap()
    }

    /// Sign `operation` for the vault's current nonce with the harness key.
    pub fn envelope(&mut self, vault_id: VaultId, operation: &Operation) -> Envelope {
        let nonce = self.lockbox.vault(vault_id).unwrap().nonce;
        self.reference += 1;
        let expiry = self.world.now() + Duration::minutes(10);
        Envelope::sign(
            &self.key,
            self.lockbox.domain(),
            vault_id,
            nonce,
            operation,
            self.reference,
            expiry,
        )
        .unwrap()
    }

    pub fn native_of(&self, vault_id: VaultId) -> Amount {
        self.lockbox.native_balance(self.owner, vault_id).unwrap()
    }

    pub fn tokens_of(&self, vault_id: VaultId, token: Address) -> Amount {
        self.lockbox.token_balance(self.owner, vault_id, token).unwrap()
    }

    pub fn native_held(&self, holder: Address) -> Amount {
        self.world.assets().native_balance(holder)
    }

    pub fn token_held(&self, token: Address, holder: Address) -> Amount {
        self.world.assets().token(token).unwrap().balance_of(holder)
    }

    /// Deploy `code` at a fresh address and give it some inventory.
    pub fn deploy(&mut self, label: &str, code: Arc<dyn ExternalContract>) -> Address {
        let at = addr(label);
        self.world.deploy_code(at, code);
        let assets = self.world.assets_mut();
        assets.mint_native(at, START_NATIVE).unwrap();
        for token in [self.usd, self.fee] {
            assets.token_mut(token).unwrap().mint(at, START_TOKENS).unwrap();
        }
        at
    }

    /// The lockbox holds at least what its ledgers attribute, for every
    /// asset, and every attributed NFT is really at the lockbox address.
    pub fn assert_solvent(&self) {
        let this = self.lockbox_address();
        let ledgers: Vec<_> = self.lockbox.ledgers().collect();

        let attributed: Amount = ledgers.iter().map(|l| l.native()).sum();
        assert!(
            self.native_held(this) >= attributed,
            "native: held {} < attributed {}",
            self.native_held(this),
            attributed
        );

        for token in [self.usd, self.fee, self.void, self.bug] {
            let attributed: Amount = ledgers.iter().map(|l| l.token_balance(&token)).sum();
            assert!(self.token_held(token, this) >= attributed, "token {token} undercollateralized");
        }

        for ledger in &ledgers {
            assert!(ledger.is_consistent());
            for key in ledger.nfts() {
                let owner = self
                    .world
                    .assets()
                    .collection(key.collection)
                    .unwrap()
                    .owner_of(key.item);
                assert_eq!(owner, Some(this));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Misbehaving contracts
// ---------------------------------------------------------------------------

/// Refuses native currency and answers NFT transfers with the wrong selector.
pub struct Rejecting;

impl ExternalContract for Rejecting {
    fn on_native_received(&self, _host: &mut Host<'_>, _from: Address, _amount: Amount) -> Result<(), ExternalError> {
        Err(ExternalError::Reverted("no thanks".into()))
    }

    fn on_nft_received(
        &self,
        _host: &mut Host<'_>,
        _operator: Address,
        _from: Address,
        _key: NftKey,
    ) -> Result<Selector, ExternalError> {
        Ok([0xde, 0xad, 0xbe, 0xef])
    }
}

/// Tries to call back into the lockbox when paid. With `swallow`, it
/// ignores the refusal and reports success.
pub struct Reentrant {
    pub swallow: bool,
}

impl ExternalContract for Reentrant {
    fn on_native_received(&self, host: &mut Host<'_>, _from: Address, _amount: Amount) -> Result<(), ExternalError> {
        let attempt = host.reenter_lockbox();
        if self.swallow {
            Ok(())
        } else {
            attempt
        }
    }

    fn execute(&self, host: &mut Host<'_>, _caller: Address, _value: Amount, _payload: &[u8]) -> Result<(), ExternalError> {
        let _ = host.reenter_lockbox();
        Ok(())
    }
}

/// A router that does exactly what it is told: keep `take` of the input
/// (returning any native remainder), pay `pay` of the output.
pub struct ScriptedRouter {
    pub input: Asset,
    pub output: Asset,
    pub take: Amount,
    pub pay: Amount,
    pub fail: bool,
}

impl ExternalContract for ScriptedRouter {
    fn execute(&self, host: &mut Host<'_>, caller: Address, value: Amount, _payload: &[u8]) -> Result<(), ExternalError> {
        if self.fail {
            return Err(ExternalError::Reverted("scripted failure".into()));
        }
        let this = host.this();
        match self.input {
            Asset::Native => {
                if value > self.take {
                    host.send_native(caller, value - self.take)?;
                }
            }
            Asset::Fungible(token) => host.transfer_token_from(token, caller, this, self.take)?,
        }
        if self.pay > 0 {
            match self.output {
                Asset::Native => host.send_native(caller, self.pay)?,
                Asset::Fungible(token) => host.transfer_token(token, caller, self.pay)?,
            }
        }
        Ok(())
    }
}

/// Keeps whatever native value it is sent and pulls the caller's entire
/// balance of `token`. Only succeeds against tokens that skip allowance
/// checks.
pub struct Drainer {
    pub token: Address,
}

impl ExternalContract for Drainer {
    fn execute(&self, host: &mut Host<'_>, caller: Address, _value: Amount, _payload: &[u8]) -> Result<(), ExternalError> {
        let this = host.this();
        let balance = host.token_balance(self.token, caller)?;
        if balance > 0 {
            host.transfer_token_from(self.token, caller, this, balance)?;
        }
        Ok(())
    }
}
