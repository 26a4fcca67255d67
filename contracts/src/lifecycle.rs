//! # Vault Lifecycle
//!
//! Creating vaults, rotating their keys, setting their metadata, burning
//! them, and the soulbound identity surface.
//!
//! A vault can only be minted to the caller, and always arrives funded:
//! every creation entry point deposits something in the same call. Vault
//! identities are locked forever. Every transfer fails with
//! [`LockboxError::TransfersDisabled`] no matter what approvals say.
//! Approvals are still recorded because wallets expect the calls to work.

use tracing::info;

use lockbox_protocol::config::INITIAL_NONCE;

use crate::authorization::{Envelope, Operation};
use crate::custody::{check_batch_shape, AssetBatch, DepositOrigin};
use crate::error::LockboxError;
use crate::events::LockboxEvent;
use crate::ledger::VaultLedger;
use crate::lockbox::{Lockbox, Vault};
use crate::types::{Address, Amount, ItemId, Msg, NftKey, ReferenceId, Selector, VaultId};
use crate::world::World;

pub const INTERFACE_ERC165: Selector = [0x01, 0xff, 0xc9, 0xa7];
pub const INTERFACE_ERC721: Selector = [0x80, 0xac, 0x58, 0xcd];
pub const INTERFACE_ERC721_METADATA: Selector = [0x5b, 0x5e, 0x13, 0x9f];
/// Minimal soulbound (locked) token interface.
pub const INTERFACE_ERC5192: Selector = [0xb4, 0x5a, 0x3c, 0x0e];
pub const INTERFACE_ERC721_RECEIVER: Selector = [0x15, 0x0b, 0x7a, 0x02];

const SUPPORTED_INTERFACES: [Selector; 5] = [
    INTERFACE_ERC165,
    INTERFACE_ERC721,
    INTERFACE_ERC721_METADATA,
    INTERFACE_ERC5192,
    INTERFACE_ERC721_RECEIVER,
];

impl Lockbox {
    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Mint a vault to the caller funded with the attached native value.
    pub fn create_with_native(
        &mut self,
        world: &mut World,
        msg: Msg,
        to: Address,
        operating_key: Address,
        reference: ReferenceId,
    ) -> Result<VaultId, LockboxError> {
        self.transact(world, msg, "create_with_native", |lockbox, _world| {
            check_mint(msg.sender, to, operating_key)?;
            if msg.value == 0 {
                return Err(LockboxError::ZeroAmount);
            }
            let vault_id = lockbox.mint(to, operating_key, reference);
            lockbox.ledger_mut(vault_id)?.credit_native(msg.value)?;
            Ok(vault_id)
        })
    }

    /// Mint a vault funded with `amount` of `token` pulled from the caller.
    pub fn create_with_fungible(
        &mut self,
        world: &mut World,
        sender: Address,
        to: Address,
        operating_key: Address,
        token: Address,
        amount: Amount,
        reference: ReferenceId,
    ) -> Result<VaultId, LockboxError> {
        self.transact(world, Msg::new(sender), "create_with_fungible", |lockbox, world| {
            check_mint(sender, to, operating_key)?;
            if token.is_zero() {
                return Err(LockboxError::ZeroTokenAddress);
            }
            if amount == 0 {
                return Err(LockboxError::ZeroAmount);
            }
            let vault_id = lockbox.mint(to, operating_key, reference);
            lockbox.deposit_fungible_into(world, DepositOrigin::Creation, sender, vault_id, token, amount)?;
            Ok(vault_id)
        })
    }

    /// Mint a vault funded with one NFT pulled from the caller.
    pub fn create_with_nonfungible(
        &mut self,
        world: &mut World,
        sender: Address,
        to: Address,
        operating_key: Address,
        collection: Address,
        item: ItemId,
        reference: ReferenceId,
    ) -> Result<VaultId, LockboxError> {
        self.transact(world, Msg::new(sender), "create_with_nonfungible", |lockbox, world| {
            check_mint(sender, to, operating_key)?;
            if collection.is_zero() {
                return Err(LockboxError::ZeroTokenAddress);
            }
            let vault_id = lockbox.mint(to, operating_key, reference);
            lockbox.deposit_nonfungible_into(
                world,
                DepositOrigin::Creation,
                sender,
                vault_id,
                NftKey::new(collection, item),
            )?;
            Ok(vault_id)
        })
    }

    /// Mint a vault funded with a mixed batch. `batch.native` must equal the
    /// attached value.
    pub fn create_with_batch(
        &mut self,
        world: &mut World,
        msg: Msg,
        to: Address,
        operating_key: Address,
        batch: &AssetBatch,
        reference: ReferenceId,
    ) -> Result<VaultId, LockboxError> {
        self.transact(world, msg, "create_with_batch", |lockbox, world| {
            check_mint(msg.sender, to, operating_key)?;
            check_batch_shape(batch, msg.value)?;
            let vault_id = lockbox.mint(to, operating_key, reference);
            lockbox.deposit_batch_into(world, DepositOrigin::Creation, msg.sender, vault_id, batch)?;
            Ok(vault_id)
        })
    }

    fn mint(&mut self, owner: Address, operating_key: Address, reference: ReferenceId) -> VaultId {
        let vault_id = self.state.next_vault_id;
        self.state.next_vault_id += 1;

        self.state.vaults.insert(
            vault_id,
            Vault {
                id: vault_id,
                owner,
                operating_key,
                nonce: INITIAL_NONCE,
                metadata: None,
            },
        );
        self.state.ledgers.insert(vault_id, VaultLedger::new());
        *self.state.vault_counts.entry(owner).or_insert(0) += 1;

        self.emit(LockboxEvent::Transfer {
            from: Address::ZERO,
            to: owner,
            vault_id,
        });
        self.emit(LockboxEvent::Locked { vault_id });
        self.emit(LockboxEvent::Minted { vault_id, reference });
        info!(vault_id, %owner, %operating_key, "vault minted");
        vault_id
    }

    // -----------------------------------------------------------------------
    // Signed lifecycle operations
    // -----------------------------------------------------------------------

    /// Replace the vault's operating key. Rotating to the zero key is
    /// allowed and leaves the vault with no valid signer.
    pub fn rotate_key(
        &mut self,
        world: &mut World,
        sender: Address,
        vault_id: VaultId,
        envelope: &Envelope,
        new_key: Address,
    ) -> Result<(), LockboxError> {
        self.transact(world, Msg::new(sender), "rotate_key", |lockbox, world| {
            lockbox.require_owner(vault_id, sender)?;
            lockbox.authorize(world.now(), vault_id, &Operation::RotateKey { new_key }, envelope)?;

            let vault = lockbox.vault_mut(vault_id)?;
            vault.operating_key = new_key;
            lockbox.emit(LockboxEvent::KeyRotated {
                vault_id,
                reference: envelope.reference,
            });
            info!(vault_id, %new_key, "operating key rotated");
            Ok(())
        })
    }

    /// Set or clear (empty string) the vault's custom metadata URI.
    pub fn set_metadata(
        &mut self,
        world: &mut World,
        sender: Address,
        vault_id: VaultId,
        envelope: &Envelope,
        uri: &str,
    ) -> Result<(), LockboxError> {
        self.transact(world, Msg::new(sender), "set_metadata", |lockbox, world| {
            lockbox.require_owner(vault_id, sender)?;
            let operation = Operation::SetMetadata {
                uri: uri.to_string(),
            };
            lockbox.authorize(world.now(), vault_id, &operation, envelope)?;

            let vault = lockbox.vault_mut(vault_id)?;
            vault.metadata = (!uri.is_empty()).then(|| uri.to_string());
            lockbox.emit(LockboxEvent::MetadataUpdated {
                vault_id,
                reference: envelope.reference,
            });
            Ok(())
        })
    }

    /// Destroy the vault. Anything still attributed to it is forfeited:
    /// it stays at the lockbox address and no vault can withdraw it.
    pub fn burn(
        &mut self,
        world: &mut World,
        sender: Address,
        vault_id: VaultId,
        envelope: &Envelope,
    ) -> Result<(), LockboxError> {
        self.transact(world, Msg::new(sender), "burn", |lockbox, world| {
            let owner = lockbox.require_owner(vault_id, sender)?.owner;
            lockbox.authorize(world.now(), vault_id, &Operation::Burn, envelope)?;

            lockbox.state.vaults.remove(&vault_id);
            lockbox.state.approvals.remove(&vault_id);
            if let Some(count) = lockbox.state.vault_counts.get_mut(&owner) {
                *count = count.saturating_sub(1);
            }
            let ledger = lockbox.state.ledgers.remove(&vault_id).unwrap_or_default();
            let forfeited = !ledger.is_empty();
            lockbox.state.forfeited.insert(vault_id, ledger);

            lockbox.emit(LockboxEvent::Transfer {
                from: owner,
                to: Address::ZERO,
                vault_id,
            });
            lockbox.emit(LockboxEvent::Burned {
                vault_id,
                reference: envelope.reference,
            });
            info!(vault_id, forfeited, "vault burned");
            Ok(())
        })
    }

    fn vault_mut(&mut self, vault_id: VaultId) -> Result<&mut Vault, LockboxError> {
        self.state
            .vaults
            .get_mut(&vault_id)
            .ok_or(LockboxError::VaultNotFound(vault_id))
    }

    // -----------------------------------------------------------------------
    // Metadata
    // -----------------------------------------------------------------------

    /// Set the default metadata prefix. Admin only, and only once.
    pub fn set_default_metadata_prefix(
        &mut self,
        world: &mut World,
        sender: Address,
        prefix: &str,
    ) -> Result<(), LockboxError> {
        self.transact(world, Msg::new(sender), "set_default_metadata_prefix", |lockbox, _world| {
            if sender != lockbox.admin() {
                return Err(LockboxError::Unauthorized(sender));
            }
            let default = &mut lockbox.state.default_metadata;
            if default.initialized {
                return Err(LockboxError::DefaultUriAlreadySet);
            }
            default.prefix = prefix.to_string();
            default.initialized = true;
            lockbox.emit(LockboxEvent::DefaultMetadataSet);
            info!(prefix, "default metadata prefix set");
            Ok(())
        })
    }

    /// The vault's custom URI, or the default prefix followed by the vault
    /// id, or [`LockboxError::NoUri`].
    pub fn resolve_metadata(&self, vault_id: VaultId) -> Result<String, LockboxError> {
        let vault = self.require_vault(vault_id)?;
        if let Some(uri) = &vault.metadata {
            return Ok(uri.clone());
        }
        let default = &self.state.default_metadata;
        if default.initialized && !default.prefix.is_empty() {
            return Ok(format!("{}{}", default.prefix, vault_id));
        }
        Err(LockboxError::NoUri)
    }

    // -----------------------------------------------------------------------
    // Soulbound identity surface
    // -----------------------------------------------------------------------

    pub fn transfer_from(
        &mut self,
        _world: &mut World,
        _sender: Address,
        _from: Address,
        _to: Address,
        _vault_id: VaultId,
    ) -> Result<(), LockboxError> {
        Err(LockboxError::TransfersDisabled)
    }

    pub fn safe_transfer_from(
        &mut self,
        _world: &mut World,
        _sender: Address,
        _from: Address,
        _to: Address,
        _vault_id: VaultId,
        _data: &[u8],
    ) -> Result<(), LockboxError> {
        Err(LockboxError::TransfersDisabled)
    }

    /// Record an approval. It grants nothing, since transfers are disabled.
    pub fn approve(
        &mut self,
        world: &mut World,
        sender: Address,
        approved: Address,
        vault_id: VaultId,
    ) -> Result<(), LockboxError> {
        self.transact(world, Msg::new(sender), "approve", |lockbox, _world| {
            let owner = lockbox.require_vault(vault_id)?.owner;
            if sender != owner && !lockbox.is_approved_for_all(owner, sender) {
                return Err(LockboxError::NotOwner {
                    vault_id,
                    caller: sender,
                });
            }
            if approved.is_zero() {
                lockbox.state.approvals.remove(&vault_id);
            } else {
                lockbox.state.approvals.insert(vault_id, approved);
            }
            lockbox.emit(LockboxEvent::Approval {
                owner,
                approved,
                vault_id,
            });
            Ok(())
        })
    }

    pub fn get_approved(&self, vault_id: VaultId) -> Result<Option<Address>, LockboxError> {
        self.require_vault(vault_id)?;
        Ok(self.state.approvals.get(&vault_id).copied())
    }

    pub fn set_approval_for_all(
        &mut self,
        world: &mut World,
        sender: Address,
        operator: Address,
        approved: bool,
    ) -> Result<(), LockboxError> {
        self.transact(world, Msg::new(sender), "set_approval_for_all", |lockbox, _world| {
            if operator.is_zero() {
                return Err(LockboxError::ZeroAddress);
            }
            if approved {
                lockbox.state.operators.insert((sender, operator));
            } else {
                lockbox.state.operators.remove(&(sender, operator));
            }
            lockbox.emit(LockboxEvent::ApprovalForAll {
                owner: sender,
                operator,
                approved,
            });
            Ok(())
        })
    }

    pub fn is_approved_for_all(&self, owner: Address, operator: Address) -> bool {
        self.state.operators.contains(&(owner, operator))
    }

    /// Every live vault is locked.
    pub fn is_locked(&self, vault_id: VaultId) -> Result<bool, LockboxError> {
        self.require_vault(vault_id)?;
        Ok(true)
    }

    pub fn supports_interface(&self, interface_id: Selector) -> bool {
        SUPPORTED_INTERFACES.contains(&interface_id)
    }
}

fn check_mint(sender: Address, to: Address, operating_key: Address) -> Result<(), LockboxError> {
    if to != sender {
        return Err(LockboxError::SelfMintOnly);
    }
    if operating_key.is_zero() {
        return Err(LockboxError::ZeroKey);
    }
    Ok(())
}
