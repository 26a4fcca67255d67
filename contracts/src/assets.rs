//! # External Asset Contracts
//!
//! The conventional collaborators a lockbox custodies assets in: native
//! balances, fungible tokens, and NFT collections. These are deliberately
//! dumb data (balance, allowance and ownership tables)
//! because the lockbox never trusts them to account for themselves. It
//! measures its own balance before and after every interaction and believes
//! only the difference.
//!
//! Tokens come in a few flavours so that the lockbox's defences can be
//! exercised against realistic misbehaviour:
//!
//! - [`TokenKind::Standard`]: does what it says.
//! - [`TokenKind::FeeOnTransfer`]: skims a basis-point fee from every
//!   transfer and burns it. 10 000 bps delivers nothing at all.
//! - [`TokenKind::UncheckedAllowance`]: a buggy token that lets any spender
//!   move any holder's balance.
//!
//! The whole [`AssetLedger`] is `Clone` so a failed contract call can be
//! rolled back by restoring a snapshot.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Address, Amount, Asset, ItemId};

/// Basis-point denominator for transfer fees.
pub const BPS_DENOMINATOR: u32 = 10_000;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by external asset contracts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssetError {
    #[error("no token contract deployed at {0}")]
    UnknownToken(Address),

    #[error("no NFT collection deployed at {0}")]
    UnknownCollection(Address),

    #[error("a contract is already deployed at {0}")]
    AlreadyDeployed(Address),

    #[error("insufficient native balance for {holder}: available {available}, requested {requested}")]
    InsufficientNative {
        holder: Address,
        available: Amount,
        requested: Amount,
    },

    #[error("insufficient token balance for {holder}: available {available}, requested {requested}")]
    InsufficientBalance {
        holder: Address,
        available: Amount,
        requested: Amount,
    },

    #[error("insufficient allowance: {spender} may move {allowance} of {owner}'s tokens, requested {requested}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        allowance: Amount,
        requested: Amount,
    },

    #[error("item {item} does not exist in collection {collection}")]
    NonexistentItem { collection: Address, item: ItemId },

    #[error("item {item} already exists in collection {collection}")]
    ItemExists { collection: Address, item: ItemId },

    #[error("{operator} is not allowed to move item {item} owned by {owner}")]
    NotOwnerOrApproved {
        operator: Address,
        owner: Address,
        item: ItemId,
    },

    #[error("transfer to the zero address")]
    TransferToZero,

    #[error("balance overflow")]
    Overflow,
}

// ---------------------------------------------------------------------------
// Fungible tokens
// ---------------------------------------------------------------------------

/// Transfer semantics of a token contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Standard,
    /// Burns `fee_bps / 10_000` of every transfer in flight.
    FeeOnTransfer { fee_bps: u32 },
    /// Ignores allowances on `transfer_from`.
    UncheckedAllowance,
}

/// A fungible token contract with a conventional balance/allowance interface.
#[derive(Debug, Clone)]
pub struct FungibleToken {
    symbol: String,
    kind: TokenKind,
    total_supply: Amount,
    balances: BTreeMap<Address, Amount>,
    allowances: BTreeMap<(Address, Address), Amount>,
}

impl FungibleToken {
    pub fn new(symbol: impl Into<String>, kind: TokenKind) -> Self {
        Self {
            symbol: symbol.into(),
            kind,
            total_supply: 0,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn balance_of(&self, holder: Address) -> Amount {
        self.balances.get(&holder).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> Amount {
        self.allowances.get(&(owner, spender)).copied().unwrap_or(0)
    }

    /// Create new supply out of thin air. Test fixtures and faucets.
    pub fn mint(&mut self, to: Address, amount: Amount) -> Result<(), AssetError> {
        if to.is_zero() {
            return Err(AssetError::TransferToZero);
        }
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(AssetError::Overflow)?;
        let balance = self.balances.entry(to).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(AssetError::Overflow)?;
        Ok(())
    }

    /// Set (not increase) `spender`'s allowance over `owner`'s balance.
    pub fn approve(&mut self, owner: Address, spender: Address, amount: Amount) {
        if amount == 0 {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
    }

    /// Move `amount` out of `from`. The recipient receives `amount` minus
    /// whatever fee this token skims.
    pub fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), AssetError> {
        if to.is_zero() {
            return Err(AssetError::TransferToZero);
        }
        let available = self.balance_of(from);
        if available < amount {
            return Err(AssetError::InsufficientBalance {
                holder: from,
                available,
                requested: amount,
            });
        }

        let fee = match self.kind {
            TokenKind::FeeOnTransfer { fee_bps } => {
                amount.saturating_mul(Amount::from(fee_bps.min(BPS_DENOMINATOR)))
                    / Amount::from(BPS_DENOMINATOR)
            }
            _ => 0,
        };
        let delivered = amount - fee;

        self.set_balance(from, available - amount);
        let to_balance = self
            .balance_of(to)
            .checked_add(delivered)
            .ok_or(AssetError::Overflow)?;
        self.set_balance(to, to_balance);
        self.total_supply -= fee;
        Ok(())
    }

    /// Spend `spender`'s allowance over `from` to move `amount` to `to`.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), AssetError> {
        let checks_allowance = self.kind != TokenKind::UncheckedAllowance;
        if checks_allowance && spender != from {
            let allowance = self.allowance(from, spender);
            if allowance < amount {
                return Err(AssetError::InsufficientAllowance {
                    owner: from,
                    spender,
                    allowance,
                    requested: amount,
                });
            }
            self.approve(from, spender, allowance - amount);
        }
        self.transfer(from, to, amount)
    }

    fn set_balance(&mut self, holder: Address, amount: Amount) {
        if amount == 0 {
            self.balances.remove(&holder);
        } else {
            self.balances.insert(holder, amount);
        }
    }
}

// ---------------------------------------------------------------------------
// NFT collections
// ---------------------------------------------------------------------------

/// An NFT collection with per-item and operator approvals.
#[derive(Debug, Clone, Default)]
pub struct NftCollection {
    name: String,
    owners: BTreeMap<ItemId, Address>,
    item_approvals: BTreeMap<ItemId, Address>,
    operators: BTreeSet<(Address, Address)>,
}

impl NftCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner_of(&self, item: ItemId) -> Option<Address> {
        self.owners.get(&item).copied()
    }

    pub fn mint(&mut self, collection: Address, to: Address, item: ItemId) -> Result<(), AssetError> {
        if to.is_zero() {
            return Err(AssetError::TransferToZero);
        }
        if self.owners.contains_key(&item) {
            return Err(AssetError::ItemExists { collection, item });
        }
        self.owners.insert(item, to);
        Ok(())
    }

    pub fn approve(&mut self, approved: Address, item: ItemId) {
        self.item_approvals.insert(item, approved);
    }

    pub fn set_approval_for_all(&mut self, owner: Address, operator: Address, approved: bool) {
        if approved {
            self.operators.insert((owner, operator));
        } else {
            self.operators.remove(&(owner, operator));
        }
    }

    /// Move `item` from `from` to `to` on behalf of `operator`.
    pub fn transfer(
        &mut self,
        collection: Address,
        operator: Address,
        from: Address,
        to: Address,
        item: ItemId,
    ) -> Result<(), AssetError> {
        if to.is_zero() {
            return Err(AssetError::TransferToZero);
        }
        let owner = self
            .owner_of(item)
            .ok_or(AssetError::NonexistentItem { collection, item })?;

        let authorized = operator == owner
            || self.item_approvals.get(&item) == Some(&operator)
            || self.operators.contains(&(owner, operator));
        if owner != from || !authorized {
            return Err(AssetError::NotOwnerOrApproved {
                operator,
                owner,
                item,
            });
        }

        self.item_approvals.remove(&item);
        self.owners.insert(item, to);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AssetLedger
// ---------------------------------------------------------------------------

/// Every external asset the lockbox can interact with.
#[derive(Debug, Clone, Default)]
pub struct AssetLedger {
    native: BTreeMap<Address, Amount>,
    tokens: BTreeMap<Address, FungibleToken>,
    collections: BTreeMap<Address, NftCollection>,
}

impl AssetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // --- native ---

    pub fn native_balance(&self, holder: Address) -> Amount {
        self.native.get(&holder).copied().unwrap_or(0)
    }

    /// Faucet: create native currency for `to`.
    pub fn mint_native(&mut self, to: Address, amount: Amount) -> Result<(), AssetError> {
        let balance = self.native.entry(to).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(AssetError::Overflow)?;
        Ok(())
    }

    /// Move native currency. No receiver hooks run here; see
    /// [`crate::world::Host::send_native`] for transfers that notify code.
    pub fn move_native(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), AssetError> {
        if amount == 0 {
            return Ok(());
        }
        if to.is_zero() {
            return Err(AssetError::TransferToZero);
        }
        let available = self.native_balance(from);
        if available < amount {
            return Err(AssetError::InsufficientNative {
                holder: from,
                available,
                requested: amount,
            });
        }
        self.native.insert(from, available - amount);
        let credited = self
            .native_balance(to)
            .checked_add(amount)
            .ok_or(AssetError::Overflow)?;
        self.native.insert(to, credited);
        Ok(())
    }

    // --- tokens ---

    pub fn deploy_token(
        &mut self,
        address: Address,
        symbol: impl Into<String>,
        kind: TokenKind,
    ) -> Result<(), AssetError> {
        if self.tokens.contains_key(&address) || self.collections.contains_key(&address) {
            return Err(AssetError::AlreadyDeployed(address));
        }
        self.tokens.insert(address, FungibleToken::new(symbol, kind));
        Ok(())
    }

    pub fn token(&self, address: Address) -> Result<&FungibleToken, AssetError> {
        self.tokens
            .get(&address)
            .ok_or(AssetError::UnknownToken(address))
    }

    pub fn token_mut(&mut self, address: Address) -> Result<&mut FungibleToken, AssetError> {
        self.tokens
            .get_mut(&address)
            .ok_or(AssetError::UnknownToken(address))
    }

    // --- collections ---

    pub fn deploy_collection(&mut self, address: Address, name: impl Into<String>) -> Result<(), AssetError> {
        if self.tokens.contains_key(&address) || self.collections.contains_key(&address) {
            return Err(AssetError::AlreadyDeployed(address));
        }
        self.collections.insert(address, NftCollection::new(name));
        Ok(())
    }

    pub fn collection(&self, address: Address) -> Result<&NftCollection, AssetError> {
        self.collections
            .get(&address)
            .ok_or(AssetError::UnknownCollection(address))
    }

    pub fn collection_mut(&mut self, address: Address) -> Result<&mut NftCollection, AssetError> {
        self.collections
            .get_mut(&address)
            .ok_or(AssetError::UnknownCollection(address))
    }

    /// Mint `item` of `collection` to `to`.
    pub fn mint_nft(&mut self, collection: Address, to: Address, item: ItemId) -> Result<(), AssetError> {
        self.collection_mut(collection)?.mint(collection, to, item)
    }

    /// Native and every fungible asset `holder` has a non-zero balance of.
    pub fn holdings_of(&self, holder: Address) -> Vec<(Asset, Amount)> {
        let native = Some((Asset::Native, self.native_balance(holder)));
        let tokens = self
            .tokens
            .iter()
            .map(|(address, token)| (Asset::Fungible(*address), token.balance_of(holder)));
        native
            .into_iter()
            .chain(tokens)
            .filter(|(_, balance)| *balance > 0)
            .collect()
    }

    /// `holder`'s balance of `asset` as the asset contract reports it.
    pub fn balance_of(&self, asset: Asset, holder: Address) -> Result<Amount, AssetError> {
        match asset {
            Asset::Native => Ok(self.native_balance(holder)),
            Asset::Fungible(token) => Ok(self.token(token)?.balance_of(holder)),
        }
    }
}
