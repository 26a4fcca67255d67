// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Lockbox Contracts
//!
//! A non-custodial vault contract. Each vault is a soulbound identity that
//! holds native currency, fungible tokens, and NFTs on its owner's behalf.
//! Moving anything out requires the owner as caller *and* a fresh signature
//! from the vault's operating key, bound to this deployment, this vault,
//! and the vault's current nonce.
//!
//! ## Modules
//!
//! - **lockbox**: the contract, its atomic call wrapper, and views.
//! - **authorization**: operation hashing, envelopes, and signer checks.
//! - **ledger**: per-vault balances with O(1) enumerable sets.
//! - **custody**: deposits and withdrawals, single and batched.
//! - **swap**: exchanges through untrusted counter-parties.
//! - **lifecycle**: minting, key rotation, metadata, burning, and the
//!   soulbound identity surface.
//! - **world / assets**: the clock, external asset contracts, and the
//!   [`world::Host`] that external code acts through.
//! - **counterparty**: a fixed-rate reference router.
//!
//! ## Design Principles
//!
//! 1. Every ledger operation is checked arithmetic. Money does not wrap.
//! 2. Entry points are atomic. All effects or none, exactly one error.
//! 3. External contracts are measured, never believed.
//! 4. Every public type is serializable (serde) for wire transport and
//!    persistent storage.

pub mod assets;
pub mod authorization;
pub mod config;
pub mod counterparty;
pub mod custody;
pub mod error;
pub mod events;
pub mod guard;
pub mod ledger;
pub mod lifecycle;
pub mod lockbox;
pub mod swap;
pub mod types;
pub mod world;

pub use authorization::{Envelope, Operation, OperationKind};
pub use custody::{AssetBatch, BatchWithdrawal};
pub use error::{ErrorCategory, LockboxError};
pub use events::LockboxEvent;
pub use lockbox::{Lockbox, Vault, VaultContents};
pub use swap::{SwapOutcome, SwapRequest};
pub use types::{Address, Amount, Asset, ItemId, Msg, NftKey, ReferenceId, Selector, VaultId};
pub use world::World;
