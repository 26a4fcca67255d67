//! # Lockbox
//!
//! The vault contract itself. Each vault is a soulbound identity with an
//! owner, an operating key, and a nonce; the assets it holds sit at the
//! lockbox's own address and are attributed to vaults by the ledger.
//!
//! ## Call model
//!
//! Every state-changing entry point runs inside [`Lockbox::transact`]:
//!
//! 1. take the reentrancy guard,
//! 2. snapshot lockbox state and external asset state,
//! 3. accept any attached native value,
//! 4. run the operation,
//! 5. on error, restore both snapshots,
//! 6. release the guard.
//!
//! So an entry point either completes with all of its effects, or fails
//! with exactly one error and no effects at all, including no events.
//!
//! The entry points themselves live next to the concern they implement:
//! deposits and withdrawals in [`crate::custody`], swaps in
//! [`crate::swap`], minting, burning, metadata, and the identity surface
//! in [`crate::lifecycle`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::authorization::DomainSeparator;
use crate::config::LockboxConfig;
use crate::error::LockboxError;
use crate::events::LockboxEvent;
use crate::guard::ReentrancyGuard;
use crate::ledger::{TokenBalance, VaultLedger};
use crate::types::{Address, Msg, NftKey, Selector, VaultId};
use crate::world::{Host, World, NFT_RECEIVED};

/// A vault identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub id: VaultId,
    pub owner: Address,
    /// Address of the Ed25519 key that must sign outbound operations.
    pub operating_key: Address,
    /// Nonce the next signed operation must bind to.
    pub nonce: u64,
    /// Custom metadata URI, if one was set.
    pub metadata: Option<String>,
}

/// Owner's view of everything a vault holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultContents {
    pub vault_id: VaultId,
    pub native: u128,
    pub tokens: Vec<TokenBalance>,
    pub nfts: Vec<NftKey>,
}

impl VaultContents {
    fn from_ledger(vault_id: VaultId, ledger: &VaultLedger) -> Self {
        Self {
            vault_id,
            native: ledger.native(),
            tokens: ledger.tokens(),
            nfts: ledger.nfts().to_vec(),
        }
    }
}

/// Set-once default metadata prefix.
#[derive(Debug, Clone, Default)]
pub(crate) struct DefaultMetadata {
    pub(crate) prefix: String,
    pub(crate) initialized: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct LockboxState {
    pub(crate) vaults: BTreeMap<VaultId, Vault>,
    pub(crate) ledgers: BTreeMap<VaultId, VaultLedger>,
    /// Ledgers of burned vaults. Whatever they held stays at the lockbox
    /// address but no vault can reach it any more.
    pub(crate) forfeited: BTreeMap<VaultId, VaultLedger>,
    pub(crate) vault_counts: BTreeMap<Address, u64>,
    pub(crate) approvals: BTreeMap<VaultId, Address>,
    pub(crate) operators: BTreeSet<(Address, Address)>,
    pub(crate) default_metadata: DefaultMetadata,
    pub(crate) next_vault_id: VaultId,
    pub(crate) events: Vec<LockboxEvent>,
}

#[derive(Debug)]
pub struct Lockbox {
    config: LockboxConfig,
    domain: DomainSeparator,
    guard: ReentrancyGuard,
    pub(crate) state: LockboxState,
}

impl Lockbox {
    pub fn new(config: LockboxConfig) -> Self {
        let domain = config.domain();
        Self {
            config,
            domain,
            guard: ReentrancyGuard::new(),
            state: LockboxState::default(),
        }
    }

    pub fn address(&self) -> Address {
        self.config.address
    }

    pub fn admin(&self) -> Address {
        self.config.admin
    }

    pub fn config(&self) -> &LockboxConfig {
        &self.config
    }

    pub fn domain(&self) -> &DomainSeparator {
        &self.domain
    }

    // -----------------------------------------------------------------------
    // Call plumbing
    // -----------------------------------------------------------------------

    /// Run `op` atomically under the reentrancy guard.
    pub(crate) fn transact<T>(
        &mut self,
        world: &mut World,
        msg: Msg,
        entry_point: &'static str,
        op: impl FnOnce(&mut Self, &mut World) -> Result<T, LockboxError>,
    ) -> Result<T, LockboxError> {
        self.guard.enter()?;
        let state_snapshot = self.state.clone();
        let assets_snapshot = world.assets().clone();

        let result = match self.accept_value(world, msg) {
            Ok(()) => op(self, world),
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            warn!(
                entry_point,
                sender = %msg.sender,
                category = ?err.category(),
                error = %err,
                "lockbox call reverted"
            );
            self.state = state_snapshot;
            *world.assets_mut() = assets_snapshot;
        }
        self.guard.exit();
        result
    }

    fn accept_value(&self, world: &mut World, msg: Msg) -> Result<(), LockboxError> {
        world
            .assets_mut()
            .move_native(msg.sender, self.address(), msg.value)?;
        Ok(())
    }

    /// Let external code run with the lockbox as the acting identity. Any
    /// attempt to reenter during `f` fails the call, even if the external
    /// code swallowed the refusal.
    pub(crate) fn interact<R>(
        &self,
        world: &mut World,
        f: impl FnOnce(&mut Host<'_>) -> Result<R, LockboxError>,
    ) -> Result<R, LockboxError> {
        let mut attempts = 0u32;
        let result = {
            let this = self.address();
            let mut host = world.host(this, this, &self.guard, &mut attempts);
            f(&mut host)
        };
        if attempts > 0 {
            return Err(LockboxError::ReentrantCall);
        }
        result
    }

    pub(crate) fn emit(&mut self, event: LockboxEvent) {
        self.state.events.push(event);
    }

    pub(crate) fn require_vault(&self, vault_id: VaultId) -> Result<&Vault, LockboxError> {
        self.state
            .vaults
            .get(&vault_id)
            .ok_or(LockboxError::VaultNotFound(vault_id))
    }

    pub(crate) fn require_owner(&self, vault_id: VaultId, caller: Address) -> Result<&Vault, LockboxError> {
        let vault = self.require_vault(vault_id)?;
        if vault.owner != caller {
            return Err(LockboxError::NotOwner { vault_id, caller });
        }
        Ok(vault)
    }

    pub(crate) fn ledger_mut(&mut self, vault_id: VaultId) -> Result<&mut VaultLedger, LockboxError> {
        self.state
            .ledgers
            .get_mut(&vault_id)
            .ok_or(LockboxError::VaultNotFound(vault_id))
    }

    // -----------------------------------------------------------------------
    // Inbound surface
    // -----------------------------------------------------------------------

    /// Plain native transfers are refused so value can never arrive without
    /// being attributed to a vault.
    pub fn receive(&mut self, _world: &mut World, _msg: Msg) -> Result<(), LockboxError> {
        Err(LockboxError::UseDepositEntryPoint)
    }

    /// Calls to unknown entry points are refused.
    pub fn fallback(&mut self, _world: &mut World, _msg: Msg, _data: &[u8]) -> Result<(), LockboxError> {
        Err(LockboxError::NoFallback)
    }

    /// NFT acceptance callback. Always accepts; only items pulled by a
    /// deposit are ever attributed to a vault.
    pub fn on_nft_received(_operator: Address, _from: Address, _key: NftKey) -> Selector {
        NFT_RECEIVED
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn vault(&self, vault_id: VaultId) -> Result<&Vault, LockboxError> {
        self.require_vault(vault_id)
    }

    pub fn owner_of(&self, vault_id: VaultId) -> Result<Address, LockboxError> {
        Ok(self.require_vault(vault_id)?.owner)
    }

    /// Current nonce of a vault. Owner only.
    pub fn nonce_of(&self, caller: Address, vault_id: VaultId) -> Result<u64, LockboxError> {
        Ok(self.require_owner(vault_id, caller)?.nonce)
    }

    /// Current operating key of a vault. Owner only.
    pub fn operating_key_of(&self, caller: Address, vault_id: VaultId) -> Result<Address, LockboxError> {
        Ok(self.require_owner(vault_id, caller)?.operating_key)
    }

    /// Full holdings of a vault. Owner only.
    pub fn full_vault(&self, caller: Address, vault_id: VaultId) -> Result<VaultContents, LockboxError> {
        self.require_owner(vault_id, caller)?;
        let ledger = self
            .state
            .ledgers
            .get(&vault_id)
            .ok_or(LockboxError::VaultNotFound(vault_id))?;
        Ok(VaultContents::from_ledger(vault_id, ledger))
    }

    /// Number of live vaults owned by `owner`.
    pub fn vault_count_of(&self, owner: Address) -> u64 {
        self.state.vault_counts.get(&owner).copied().unwrap_or(0)
    }

    pub fn total_vaults(&self) -> usize {
        self.state.vaults.len()
    }

    /// What a burned vault left behind. Admin only.
    pub fn forfeited_holdings(&self, caller: Address, vault_id: VaultId) -> Result<VaultContents, LockboxError> {
        if caller != self.admin() {
            return Err(LockboxError::Unauthorized(caller));
        }
        let ledger = self
            .state
            .forfeited
            .get(&vault_id)
            .ok_or(LockboxError::VaultNotFound(vault_id))?;
        Ok(VaultContents::from_ledger(vault_id, ledger))
    }

    pub fn events(&self) -> &[LockboxEvent] {
        &self.state.events
    }

    /// Ledgers of every live and burned vault. Used for conservation checks.
    pub fn ledgers(&self) -> impl Iterator<Item = &VaultLedger> {
        self.state.ledgers.values().chain(self.state.forfeited.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lockbox() -> Lockbox {
        Lockbox::new(LockboxConfig::devnet(
            Address::derive("lockbox"),
            Address::derive("admin"),
        ))
    }

    #[test]
    fn plain_native_and_unknown_calls_are_refused() {
        let mut lb = lockbox();
        let mut world = World::default();
        let sender = Address::derive("alice");
        world.assets_mut().mint_native(sender, 5).unwrap();

        assert_eq!(
            lb.receive(&mut world, Msg::with_value(sender, 5)),
            Err(LockboxError::UseDepositEntryPoint)
        );
        assert_eq!(
            lb.fallback(&mut world, Msg::new(sender), &[1, 2, 3]),
            Err(LockboxError::NoFallback)
        );
        assert_eq!(world.assets().native_balance(sender), 5);
    }

    #[test]
    fn failed_transaction_restores_everything() {
        let mut lb = lockbox();
        let mut world = World::default();
        let sender = Address::derive("alice");
        world.assets_mut().mint_native(sender, 5).unwrap();

        let result: Result<(), _> = lb.transact(&mut world, Msg::with_value(sender, 5), "test", |lb, _| {
            lb.emit(LockboxEvent::DefaultMetadataSet);
            Err(LockboxError::ZeroAmount)
        });
        assert_eq!(result, Err(LockboxError::ZeroAmount));
        assert!(lb.events().is_empty());
        assert_eq!(world.assets().native_balance(sender), 5);
        assert_eq!(world.assets().native_balance(lb.address()), 0);
        assert!(!lb.guard.is_entered());
    }

    #[test]
    fn value_is_accepted_before_the_operation() {
        let mut lb = lockbox();
        let mut world = World::default();
        let sender = Address::derive("alice");
        world.assets_mut().mint_native(sender, 5).unwrap();

        lb.transact(&mut world, Msg::with_value(sender, 3), "test", |lb, world| {
            assert_eq!(world.assets().native_balance(lb.address()), 3);
            Ok(())
        })
        .unwrap();
        assert_eq!(world.assets().native_balance(sender), 2);
    }

    #[test]
    fn nft_callback_returns_magic_value() {
        let key = NftKey::new(Address::derive("punks"), 1);
        assert_eq!(
            Lockbox::on_nft_received(Address::ZERO, Address::ZERO, key),
            NFT_RECEIVED
        );
    }
}
