//! # Vault Ledger
//!
//! Per-vault record of what the lockbox holds on a vault's behalf: a native
//! balance, fungible balances keyed by token, and a set of NFT holdings.
//!
//! Both the token listing and the NFT set are [`IndexedSet`]s: a dense
//! `Vec` for enumeration plus a position index, so membership, insertion,
//! and removal are all O(1). Removal swaps the last element into the hole,
//! which means enumeration order is *not* insertion order once anything has
//! been removed. Callers must not depend on it.
//!
//! Invariant: a token appears in the listing if and only if its balance is
//! non-zero.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::types::{Address, Amount, NftKey};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient native balance: available {available}, requested {requested}")]
    InsufficientNative { available: Amount, requested: Amount },

    #[error("insufficient balance of {token}: available {available}, requested {requested}")]
    InsufficientToken {
        token: Address,
        available: Amount,
        requested: Amount,
    },

    #[error("ledger balance overflow")]
    Overflow,
}

// ---------------------------------------------------------------------------
// IndexedSet
// ---------------------------------------------------------------------------

/// An enumerable set with O(1) membership, insertion, and swap-removal.
#[derive(Debug, Clone)]
pub struct IndexedSet<K> {
    items: Vec<K>,
    positions: HashMap<K, usize>,
}

impl<K> Default for IndexedSet<K> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash> IndexedSet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.positions.contains_key(key)
    }

    pub fn position(&self, key: &K) -> Option<usize> {
        self.positions.get(key).copied()
    }

    /// Returns `false` if the key was already present.
    pub fn insert(&mut self, key: K) -> bool {
        if self.positions.contains_key(&key) {
            return false;
        }
        self.positions.insert(key, self.items.len());
        self.items.push(key);
        true
    }

    /// Returns `false` if the key was absent.
    pub fn remove(&mut self, key: &K) -> bool {
        let Some(index) = self.positions.remove(key) else {
            return false;
        };
        self.items.swap_remove(index);
        if let Some(moved) = self.items.get(index) {
            self.positions.insert(*moved, index);
        }
        true
    }

    pub fn as_slice(&self) -> &[K] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, K> {
        self.items.iter()
    }

    /// Check that every position entry points at its own key and that
    /// there are no duplicates. Used by tests.
    pub fn is_consistent(&self) -> bool {
        self.items.len() == self.positions.len()
            && self
                .items
                .iter()
                .enumerate()
                .all(|(i, key)| self.positions.get(key) == Some(&i))
    }
}

impl<K: Copy + Eq + Hash> FromIterator<K> for IndexedSet<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = Self::new();
        for key in iter {
            set.insert(key);
        }
        set
    }
}

impl<K: Serialize> Serialize for IndexedSet<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de, K: Deserialize<'de> + Copy + Eq + Hash> Deserialize<'de> for IndexedSet<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<K>::deserialize(deserializer)?;
        Ok(items.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// VaultLedger
// ---------------------------------------------------------------------------

/// One fungible position, as reported by enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub token: Address,
    pub balance: Amount,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultLedger {
    native: Amount,
    token_balances: HashMap<Address, Amount>,
    token_listing: IndexedSet<Address>,
    holdings: IndexedSet<NftKey>,
}

impl VaultLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.native == 0 && self.token_listing.is_empty() && self.holdings.is_empty()
    }

    // --- native ---

    pub fn native(&self) -> Amount {
        self.native
    }

    pub fn credit_native(&mut self, amount: Amount) -> Result<Amount, LedgerError> {
        self.native = self.native.checked_add(amount).ok_or(LedgerError::Overflow)?;
        Ok(self.native)
    }

    pub fn debit_native(&mut self, amount: Amount) -> Result<Amount, LedgerError> {
        self.native = self
            .native
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientNative {
                available: self.native,
                requested: amount,
            })?;
        Ok(self.native)
    }

    // --- fungible ---

    pub fn token_balance(&self, token: &Address) -> Amount {
        self.token_balances.get(token).copied().unwrap_or(0)
    }

    /// Credit `amount` of `token`. A zero credit does not create an entry.
    pub fn credit_token(&mut self, token: Address, amount: Amount) -> Result<Amount, LedgerError> {
        if amount == 0 {
            return Ok(self.token_balance(&token));
        }
        let balance = self
            .token_balance(&token)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.token_balances.insert(token, balance);
        self.token_listing.insert(token);
        Ok(balance)
    }

    /// Debit `amount` of `token`, dropping the entry when it reaches zero.
    pub fn debit_token(&mut self, token: Address, amount: Amount) -> Result<Amount, LedgerError> {
        let available = self.token_balance(&token);
        let remaining = available
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientToken {
                token,
                available,
                requested: amount,
            })?;

        if remaining == 0 {
            self.token_balances.remove(&token);
            self.token_listing.remove(&token);
        } else {
            self.token_balances.insert(token, remaining);
        }
        Ok(remaining)
    }

    pub fn token_count(&self) -> usize {
        self.token_listing.len()
    }

    pub fn tokens(&self) -> Vec<TokenBalance> {
        self.token_listing
            .iter()
            .map(|token| TokenBalance {
                token: *token,
                balance: self.token_balance(token),
            })
            .collect()
    }

    // --- non-fungible ---

    pub fn holds_nft(&self, key: &NftKey) -> bool {
        self.holdings.contains(key)
    }

    pub fn insert_nft(&mut self, key: NftKey) -> bool {
        self.holdings.insert(key)
    }

    pub fn remove_nft(&mut self, key: &NftKey) -> bool {
        self.holdings.remove(key)
    }

    pub fn nfts(&self) -> &[NftKey] {
        self.holdings.as_slice()
    }

    /// Listing, balance table, and NFT index all agree with each other.
    pub fn is_consistent(&self) -> bool {
        self.token_listing.is_consistent()
            && self.holdings.is_consistent()
            && self.token_listing.len() == self.token_balances.len()
            && self
                .token_listing
                .iter()
                .all(|token| self.token_balance(token) > 0)
    }
}
