//! # Execution World
//!
//! The environment a lockbox runs in: the clock, the external asset
//! contracts, and any code (receivers, swap counter-parties) deployed at
//! addresses.
//!
//! External code never gets a reference to the lockbox. It talks to the
//! world through a [`Host`], which carries the identity it is acting as and
//! lets it move assets, query balances, call other code, and *attempt* to
//! call back into the lockbox. That last one always fails while the lockbox
//! is mid-call, and the lockbox notices the attempt even if the external
//! code swallows the error.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::assets::{AssetError, AssetLedger};
use crate::guard::ReentrancyGuard;
use crate::lockbox::Lockbox;
use crate::types::{Address, Amount, ItemId, NftKey, Selector};

/// Magic value a contract returns from `on_nft_received` to accept an item.
pub const NFT_RECEIVED: Selector = [0x15, 0x0b, 0x7a, 0x02];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExternalError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("call reverted: {0}")]
    Reverted(String),

    #[error("lockbox refused a reentrant call")]
    Reentrancy,

    #[error("no code at {0} implements this entry point")]
    Unsupported(Address),

    #[error("{0} did not accept the NFT")]
    NftRejected(Address),
}

/// Code deployed at an address. Every hook has a default: accept native,
/// accept NFTs, refuse arbitrary calls.
pub trait ExternalContract: Send + Sync {
    fn on_native_received(
        &self,
        _host: &mut Host<'_>,
        _from: Address,
        _amount: Amount,
    ) -> Result<(), ExternalError> {
        Ok(())
    }

    fn on_nft_received(
        &self,
        _host: &mut Host<'_>,
        _operator: Address,
        _from: Address,
        _key: NftKey,
    ) -> Result<Selector, ExternalError> {
        Ok(NFT_RECEIVED)
    }

    fn execute(
        &self,
        host: &mut Host<'_>,
        _caller: Address,
        _value: Amount,
        _payload: &[u8],
    ) -> Result<(), ExternalError> {
        Err(ExternalError::Unsupported(host.this()))
    }
}

pub type CodeRegistry = BTreeMap<Address, Arc<dyn ExternalContract>>;

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

pub struct World {
    now: DateTime<Utc>,
    assets: AssetLedger,
    code: CodeRegistry,
}

impl World {
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// A world whose clock starts at `now`.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            assets: AssetLedger::new(),
            code: CodeRegistry::new(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn set_now(&mut self, now: DateTime<Utc>) {
        self.now = now;
    }

    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    pub fn assets(&self) -> &AssetLedger {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut AssetLedger {
        &mut self.assets
    }

    pub fn deploy_code(&mut self, address: Address, code: Arc<dyn ExternalContract>) {
        self.code.insert(address, code);
    }

    pub fn has_code(&self, address: Address) -> bool {
        self.code.contains_key(&address)
    }

    /// A host acting as `this`. `guard` is the lockbox's reentrancy guard;
    /// reentry attempts are counted into `reentry_attempts`.
    pub fn host<'a>(
        &'a mut self,
        this: Address,
        lockbox: Address,
        guard: &'a ReentrancyGuard,
        reentry_attempts: &'a mut u32,
    ) -> Host<'a> {
        Host {
            this,
            lockbox,
            assets: &mut self.assets,
            code: &self.code,
            guard,
            reentry_attempts,
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("now", &self.now)
            .field("code", &self.code.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// What external code sees of the world while it runs.
pub struct Host<'a> {
    this: Address,
    lockbox: Address,
    assets: &'a mut AssetLedger,
    code: &'a CodeRegistry,
    guard: &'a ReentrancyGuard,
    reentry_attempts: &'a mut u32,
}

impl<'a> Host<'a> {
    /// The address this code is running as.
    pub fn this(&self) -> Address {
        self.this
    }

    /// Address of the lockbox that started the current call chain.
    pub fn lockbox(&self) -> Address {
        self.lockbox
    }

    fn nested(&mut self, this: Address) -> Host<'_> {
        Host {
            this,
            lockbox: self.lockbox,
            assets: &mut *self.assets,
            code: self.code,
            guard: self.guard,
            reentry_attempts: &mut *self.reentry_attempts,
        }
    }

    // --- queries ---

    pub fn native_balance(&self, holder: Address) -> Amount {
        self.assets.native_balance(holder)
    }

    pub fn token_balance(&self, token: Address, holder: Address) -> Result<Amount, ExternalError> {
        Ok(self.assets.token(token)?.balance_of(holder))
    }

    pub fn token_allowance(&self, token: Address, owner: Address, spender: Address) -> Result<Amount, ExternalError> {
        Ok(self.assets.token(token)?.allowance(owner, spender))
    }

    pub fn nft_owner(&self, key: NftKey) -> Result<Option<Address>, ExternalError> {
        Ok(self.assets.collection(key.collection)?.owner_of(key.item))
    }

    // --- native ---

    /// Send native currency from `this`, running the recipient's receive
    /// hook if it has code. The lockbox itself has no hook: value sent to it
    /// is simply credited to its address.
    pub fn send_native(&mut self, to: Address, amount: Amount) -> Result<(), ExternalError> {
        let from = self.this;
        self.assets.move_native(from, to, amount)?;
        if to == self.lockbox {
            return Ok(());
        }
        if let Some(code) = self.code.get(&to).cloned() {
            code.on_native_received(&mut self.nested(to), from, amount)?;
        }
        Ok(())
    }

    /// Call `target`'s `execute` entry point with `value` attached.
    pub fn call(&mut self, target: Address, value: Amount, payload: &[u8]) -> Result<(), ExternalError> {
        let caller = self.this;
        let code = self
            .code
            .get(&target)
            .cloned()
            .ok_or(ExternalError::Unsupported(target))?;
        self.assets.move_native(caller, target, value)?;
        code.execute(&mut self.nested(target), caller, value, payload)
    }

    // --- fungible ---

    pub fn transfer_token(&mut self, token: Address, to: Address, amount: Amount) -> Result<(), ExternalError> {
        let from = self.this;
        self.assets.token_mut(token)?.transfer(from, to, amount)?;
        Ok(())
    }

    pub fn transfer_token_from(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), ExternalError> {
        let spender = self.this;
        self.assets
            .token_mut(token)?
            .transfer_from(spender, from, to, amount)?;
        Ok(())
    }

    pub fn approve_token(&mut self, token: Address, spender: Address, amount: Amount) -> Result<(), ExternalError> {
        let owner = self.this;
        self.assets.token_mut(token)?.approve(owner, spender, amount);
        Ok(())
    }

    // --- non-fungible ---

    /// Safe-transfer an NFT with `this` as operator. A recipient with code
    /// must answer [`NFT_RECEIVED`] or the transfer fails.
    pub fn safe_transfer_nft(&mut self, key: NftKey, from: Address, to: Address) -> Result<(), ExternalError> {
        let operator = self.this;
        self.assets
            .collection_mut(key.collection)?
            .transfer(key.collection, operator, from, to, key.item)?;

        let answer = if to == self.lockbox {
            Lockbox::on_nft_received(operator, from, key)
        } else if let Some(code) = self.code.get(&to).cloned() {
            code.on_nft_received(&mut self.nested(to), operator, from, key)?
        } else {
            return Ok(());
        };

        if answer != NFT_RECEIVED {
            return Err(ExternalError::NftRejected(to));
        }
        Ok(())
    }

    pub fn approve_nft(&mut self, collection: Address, approved: Address, item: ItemId) -> Result<(), ExternalError> {
        self.assets.collection_mut(collection)?.approve(approved, item);
        Ok(())
    }

    // --- lockbox ---

    /// Try to call back into the lockbox. Refused while the lockbox is
    /// mid-call, and the attempt is recorded either way.
    pub fn reenter_lockbox(&mut self) -> Result<(), ExternalError> {
        if self.guard.is_entered() {
            *self.reentry_attempts += 1;
            return Err(ExternalError::Reentrancy);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::TokenKind;

    struct Echo;

    impl ExternalContract for Echo {
        fn on_native_received(
            &self,
            host: &mut Host<'_>,
            from: Address,
            amount: Amount,
        ) -> Result<(), ExternalError> {
            host.send_native(from, amount)
        }
    }

    struct Grumpy;

    impl ExternalContract for Grumpy {
        fn on_nft_received(
            &self,
            _host: &mut Host<'_>,
            _operator: Address,
            _from: Address,
            _key: NftKey,
        ) -> Result<Selector, ExternalError> {
            Ok([0, 0, 0, 0])
        }
    }

    fn addr(label: &str) -> Address {
        Address::derive(label)
    }

    #[test]
    fn native_hook_runs_as_recipient() {
        let mut world = World::at(Utc::now());
        world.assets_mut().mint_native(addr("alice"), 10).unwrap();
        world.deploy_code(addr("echo"), Arc::new(Echo));

        let guard = ReentrancyGuard::new();
        let mut attempts = 0;
        let mut host = world.host(addr("alice"), addr("lockbox"), &guard, &mut attempts);
        host.send_native(addr("echo"), 4).unwrap();

        assert_eq!(world.assets().native_balance(addr("alice")), 10);
        assert_eq!(world.assets().native_balance(addr("echo")), 0);
    }

    #[test]
    fn nft_rejected_by_wrong_selector() {
        let mut world = World::at(Utc::now());
        let punks = addr("punks");
        world.assets_mut().deploy_collection(punks, "Punks").unwrap();
        world.assets_mut().mint_nft(punks, addr("alice"), 1).unwrap();
        world.deploy_code(addr("grumpy"), Arc::new(Grumpy));

        let guard = ReentrancyGuard::new();
        let mut attempts = 0;
        let mut host = world.host(addr("alice"), addr("lockbox"), &guard, &mut attempts);
        let err = host
            .safe_transfer_nft(NftKey::new(punks, 1), addr("alice"), addr("grumpy"))
            .unwrap_err();
        assert_eq!(err, ExternalError::NftRejected(addr("grumpy")));
    }

    #[test]
    fn reentry_is_counted_while_guard_held() {
        let mut world = World::default();
        let mut guard = ReentrancyGuard::new();
        let mut attempts = 0;
        {
            let mut host = world.host(addr("x"), addr("lockbox"), &guard, &mut attempts);
            assert!(host.reenter_lockbox().is_ok());
        }
        guard.enter().unwrap();
        {
            let mut host = world.host(addr("x"), addr("lockbox"), &guard, &mut attempts);
            assert_eq!(host.reenter_lockbox(), Err(ExternalError::Reentrancy));
        }
        assert_eq!(attempts, 1);
    }

    #[test]
    fn call_without_code_is_unsupported() {
        let mut world = World::default();
        world
            .assets_mut()
            .deploy_token(addr("usd"), "USD", TokenKind::Standard)
            .unwrap();
        let guard = ReentrancyGuard::new();
        let mut attempts = 0;
        let mut host = world.host(addr("x"), addr("lockbox"), &guard, &mut attempts);
        assert_eq!(
            host.call(addr("nobody"), 0, b""),
            Err(ExternalError::Unsupported(addr("nobody")))
        );
    }
}
