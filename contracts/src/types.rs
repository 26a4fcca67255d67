//! # Core Types
//!
//! Identities, amounts, and asset descriptors shared by every Lockbox module.
//!
//! An [`Address`] is a 32-byte identity. Accounts, token contracts, NFT
//! collections, swap counter-parties, and operating keys all live in the
//! same address space. An operating key's address is simply its Ed25519
//! public key bytes. [`Address::ZERO`] is the null identity: never a valid
//! recipient, never a valid key, never a valid asset contract.

use std::fmt;
use std::str::FromStr;

use lockbox_protocol::crypto::hash::domain_separated_hash;
use lockbox_protocol::crypto::keys::LockboxPublicKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Vault identifier, assigned sequentially at mint.
pub type VaultId = u64;

/// Amounts in the smallest unit of whatever asset they describe.
pub type Amount = u128;

/// Identifier of an item inside an NFT collection.
pub type ItemId = u128;

/// Opaque caller correlation id, echoed into events.
pub type ReferenceId = u64;

/// A 4-byte interface or callback selector.
pub type Selector = [u8; 4];

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 32-byte identity. Serialized as lowercase hex so it can key JSON maps.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 32]);

impl Address {
    /// The null identity.
    pub const ZERO: Address = Address([0u8; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Deterministic address for a human label. Devnet fixtures and tests
    /// only; labels are not secrets.
    pub fn derive(label: &str) -> Self {
        Self(domain_separated_hash("lockbox 2026 label address", label.as_bytes()))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Interpret this address as an Ed25519 public key.
    pub fn to_public_key(&self) -> LockboxPublicKey {
        LockboxPublicKey::from_bytes(self.0)
    }
}

impl From<LockboxPublicKey> for Address {
    fn from(key: LockboxPublicKey) -> Self {
        Self(*key.as_bytes())
    }
}

impl FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches("0x");
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(trimmed, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            write!(f, "Address(ZERO)")
        } else {
            write!(f, "Address({}..)", &self.to_hex()[..12])
        }
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// Something a vault can hold a balance of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Asset {
    /// The chain's native currency.
    Native,
    /// A fungible token, identified by its contract address.
    Fungible(Address),
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => write!(f, "native"),
            Asset::Fungible(token) => write!(f, "token {}", token),
        }
    }
}

/// Composite key of a non-fungible holding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NftKey {
    pub collection: Address,
    pub item: ItemId,
}

impl NftKey {
    pub fn new(collection: Address, item: ItemId) -> Self {
        Self { collection, item }
    }
}

// ---------------------------------------------------------------------------
// Msg
// ---------------------------------------------------------------------------

/// Caller context of a contract call: who is calling, and how much native
/// value is attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Msg {
    pub sender: Address,
    pub value: Amount,
}

impl Msg {
    /// A call with no value attached.
    pub fn new(sender: Address) -> Self {
        Self { sender, value: 0 }
    }

    pub fn with_value(sender: Address, value: Amount) -> Self {
        Self { sender, value }
    }
}
