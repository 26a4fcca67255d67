//! # Custody
//!
//! Deposits and withdrawals for all three asset classes, singly and in
//! batches.
//!
//! Deposits are permissionless for the owner (no signature). They credit
//! the vault with what the lockbox *measured* arriving, never with what the
//! caller claimed: a fee-on-transfer token that delivers 975 of a declared
//! 1000 credits 975, and one that delivers nothing fails with
//! [`LockboxError::ZeroAmount`].
//!
//! Withdrawals require the owner as caller and a fresh operating-key
//! signature. The ledger is debited before any asset leaves.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::authorization::{Envelope, Operation};
use crate::error::LockboxError;
use crate::events::LockboxEvent;
use crate::lockbox::Lockbox;
use crate::types::{Address, Amount, ItemId, Msg, NftKey, ReferenceId, VaultId};
use crate::world::World;

/// A mixed set of assets: native amount, paired token/amount arrays, and
/// paired collection/item arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBatch {
    #[serde(default)]
    pub native: Amount,
    #[serde(default)]
    pub tokens: Vec<Address>,
    #[serde(default)]
    pub token_amounts: Vec<Amount>,
    #[serde(default)]
    pub collections: Vec<Address>,
    #[serde(default)]
    pub items: Vec<ItemId>,
}

impl AssetBatch {
    pub fn native(amount: Amount) -> Self {
        Self {
            native: amount,
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: Address, amount: Amount) -> Self {
        self.tokens.push(token);
        self.token_amounts.push(amount);
        self
    }

    pub fn with_nft(mut self, collection: Address, item: ItemId) -> Self {
        self.collections.push(collection);
        self.items.push(item);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.native == 0 && self.tokens.is_empty() && self.collections.is_empty()
    }

    /// First pair of arrays whose lengths disagree, as `(left, right)`.
    pub(crate) fn length_mismatch(&self) -> Option<(usize, usize)> {
        if self.tokens.len() != self.token_amounts.len() {
            return Some((self.tokens.len(), self.token_amounts.len()));
        }
        if self.collections.len() != self.items.len() {
            return Some((self.collections.len(), self.items.len()));
        }
        None
    }

    pub(crate) fn token_pairs(&self) -> impl Iterator<Item = (Address, Amount)> + '_ {
        self.tokens.iter().copied().zip(self.token_amounts.iter().copied())
    }

    pub(crate) fn nft_keys(&self) -> impl Iterator<Item = NftKey> + '_ {
        self.collections
            .iter()
            .zip(self.items.iter())
            .map(|(collection, item)| NftKey::new(*collection, *item))
    }
}

/// Parameters of a signed batch withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchWithdrawal {
    pub assets: AssetBatch,
    pub recipient: Address,
}

/// Which entry point a deposit runs under. Vault creation reports a null
/// asset contract as [`LockboxError::ZeroTokenAddress`], plain deposits as
/// [`LockboxError::ZeroAddress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DepositOrigin {
    Creation,
    Deposit,
}

impl DepositOrigin {
    fn null_asset(self) -> LockboxError {
        match self {
            DepositOrigin::Creation => LockboxError::ZeroTokenAddress,
            DepositOrigin::Deposit => LockboxError::ZeroAddress,
        }
    }
}

impl Lockbox {
    // -----------------------------------------------------------------------
    // Deposits
    // -----------------------------------------------------------------------

    /// Deposit the attached native value into `vault_id`.
    pub fn deposit_native(
        &mut self,
        world: &mut World,
        msg: Msg,
        vault_id: VaultId,
        reference: ReferenceId,
    ) -> Result<(), LockboxError> {
        self.transact(world, msg, "deposit_native", |lockbox, _world| {
            lockbox.require_owner(vault_id, msg.sender)?;
            if msg.value == 0 {
                return Err(LockboxError::ZeroAmount);
            }
            lockbox.ledger_mut(vault_id)?.credit_native(msg.value)?;
            lockbox.emit(LockboxEvent::Deposited { vault_id, reference });
            info!(vault_id, amount = msg.value, "native deposited");
            Ok(())
        })
    }

    /// Pull `amount` of `token` from the caller. Returns the amount actually
    /// credited.
    pub fn deposit_fungible(
        &mut self,
        world: &mut World,
        sender: Address,
        vault_id: VaultId,
        token: Address,
        amount: Amount,
        reference: ReferenceId,
    ) -> Result<Amount, LockboxError> {
        self.transact(world, Msg::new(sender), "deposit_fungible", |lockbox, world| {
            lockbox.require_owner(vault_id, sender)?;
            let received =
                lockbox.deposit_fungible_into(world, DepositOrigin::Deposit, sender, vault_id, token, amount)?;
            lockbox.emit(LockboxEvent::Deposited { vault_id, reference });
            Ok(received)
        })
    }

    /// Pull one NFT from the caller.
    pub fn deposit_nonfungible(
        &mut self,
        world: &mut World,
        sender: Address,
        vault_id: VaultId,
        collection: Address,
        item: ItemId,
        reference: ReferenceId,
    ) -> Result<(), LockboxError> {
        self.transact(world, Msg::new(sender), "deposit_nonfungible", |lockbox, world| {
            lockbox.require_owner(vault_id, sender)?;
            lockbox.deposit_nonfungible_into(
                world,
                DepositOrigin::Deposit,
                sender,
                vault_id,
                NftKey::new(collection, item),
            )?;
            lockbox.emit(LockboxEvent::Deposited { vault_id, reference });
            Ok(())
        })
    }

    /// Deposit a mixed batch. `batch.native` must equal the attached value.
    pub fn batch_deposit(
        &mut self,
        world: &mut World,
        msg: Msg,
        vault_id: VaultId,
        batch: &AssetBatch,
        reference: ReferenceId,
    ) -> Result<(), LockboxError> {
        self.transact(world, msg, "batch_deposit", |lockbox, world| {
            lockbox.require_owner(vault_id, msg.sender)?;
            check_batch_shape(batch, msg.value)?;
            lockbox.deposit_batch_into(world, DepositOrigin::Deposit, msg.sender, vault_id, batch)?;
            lockbox.emit(LockboxEvent::Deposited { vault_id, reference });
            Ok(())
        })
    }

    pub(crate) fn deposit_batch_into(
        &mut self,
        world: &mut World,
        origin: DepositOrigin,
        from: Address,
        vault_id: VaultId,
        batch: &AssetBatch,
    ) -> Result<(), LockboxError> {
        if batch.native > 0 {
            self.ledger_mut(vault_id)?.credit_native(batch.native)?;
        }
        for (token, amount) in batch.token_pairs() {
            self.deposit_fungible_into(world, origin, from, vault_id, token, amount)?;
        }
        for key in batch.nft_keys() {
            self.deposit_nonfungible_into(world, origin, from, vault_id, key)?;
        }
        info!(
            vault_id,
            native = batch.native,
            tokens = batch.tokens.len(),
            nfts = batch.items.len(),
            "batch deposited"
        );
        Ok(())
    }

    pub(crate) fn deposit_fungible_into(
        &mut self,
        world: &mut World,
        origin: DepositOrigin,
        from: Address,
        vault_id: VaultId,
        token: Address,
        amount: Amount,
    ) -> Result<Amount, LockboxError> {
        if token.is_zero() {
            return Err(origin.null_asset());
        }
        if amount == 0 {
            return Err(LockboxError::ZeroAmount);
        }

        let this = self.address();
        let before = world.assets().token(token)?.balance_of(this);
        self.interact(world, |host| {
            host.transfer_token_from(token, from, this, amount)?;
            Ok(())
        })?;
        let after = world.assets().token(token)?.balance_of(this);

        let received = after.saturating_sub(before);
        if received == 0 {
            return Err(LockboxError::ZeroAmount);
        }
        self.ledger_mut(vault_id)?.credit_token(token, received)?;
        info!(vault_id, %token, declared = amount, received, "token deposited");
        Ok(received)
    }

    pub(crate) fn deposit_nonfungible_into(
        &mut self,
        world: &mut World,
        origin: DepositOrigin,
        from: Address,
        vault_id: VaultId,
        key: NftKey,
    ) -> Result<(), LockboxError> {
        if key.collection.is_zero() {
            return Err(origin.null_asset());
        }

        let this = self.address();
        self.interact(world, |host| {
            host.safe_transfer_nft(key, from, this)?;
            Ok(())
        })?;
        if world.assets().collection(key.collection)?.owner_of(key.item) != Some(this) {
            return Err(LockboxError::NftNotFound {
                collection: key.collection,
                item: key.item,
            });
        }

        if !self.ledger_mut(vault_id)?.insert_nft(key) {
            return Err(LockboxError::DuplicateEntry(format!(
                "item {} of {}",
                key.item, key.collection
            )));
        }
        info!(vault_id, collection = %key.collection, item = %key.item, "nft deposited");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Withdrawals
    // -----------------------------------------------------------------------

    pub fn withdraw_native(
        &mut self,
        world: &mut World,
        sender: Address,
        vault_id: VaultId,
        envelope: &Envelope,
        amount: Amount,
        recipient: Address,
    ) -> Result<(), LockboxError> {
        self.transact(world, Msg::new(sender), "withdraw_native", |lockbox, world| {
            lockbox.require_owner(vault_id, sender)?;
            if recipient.is_zero() {
                return Err(LockboxError::ZeroAddress);
            }
            let operation = Operation::WithdrawNative { amount, recipient };
            lockbox.authorize(world.now(), vault_id, &operation, envelope)?;

            lockbox.ledger_mut(vault_id)?.debit_native(amount)?;
            lockbox.push_native(world, recipient, amount)?;

            lockbox.emit(LockboxEvent::Withdrawn {
                vault_id,
                reference: envelope.reference,
            });
            info!(vault_id, amount, %recipient, "native withdrawn");
            Ok(())
        })
    }

    pub fn withdraw_fungible(
        &mut self,
        world: &mut World,
        sender: Address,
        vault_id: VaultId,
        envelope: &Envelope,
        token: Address,
        amount: Amount,
        recipient: Address,
    ) -> Result<(), LockboxError> {
        self.transact(world, Msg::new(sender), "withdraw_fungible", |lockbox, world| {
            lockbox.require_owner(vault_id, sender)?;
            if recipient.is_zero() {
                return Err(LockboxError::ZeroAddress);
            }
            let operation = Operation::WithdrawFungible {
                token,
                amount,
                recipient,
            };
            lockbox.authorize(world.now(), vault_id, &operation, envelope)?;

            lockbox.ledger_mut(vault_id)?.debit_token(token, amount)?;
            lockbox.push_fungible(world, token, recipient, amount)?;

            lockbox.emit(LockboxEvent::Withdrawn {
                vault_id,
                reference: envelope.reference,
            });
            info!(vault_id, %token, amount, %recipient, "token withdrawn");
            Ok(())
        })
    }

    pub fn withdraw_nonfungible(
        &mut self,
        world: &mut World,
        sender: Address,
        vault_id: VaultId,
        envelope: &Envelope,
        collection: Address,
        item: ItemId,
        recipient: Address,
    ) -> Result<(), LockboxError> {
        self.transact(world, Msg::new(sender), "withdraw_nonfungible", |lockbox, world| {
            lockbox.require_owner(vault_id, sender)?;
            if recipient.is_zero() {
                return Err(LockboxError::ZeroAddress);
            }
            let operation = Operation::WithdrawNonFungible {
                collection,
                item,
                recipient,
            };
            lockbox.authorize(world.now(), vault_id, &operation, envelope)?;

            let key = NftKey::new(collection, item);
            if !lockbox.ledger_mut(vault_id)?.remove_nft(&key) {
                return Err(LockboxError::NftNotFound { collection, item });
            }
            lockbox.push_nonfungible(world, key, recipient)?;

            lockbox.emit(LockboxEvent::Withdrawn {
                vault_id,
                reference: envelope.reference,
            });
            info!(vault_id, %collection, %item, %recipient, "nft withdrawn");
            Ok(())
        })
    }

    /// Withdraw a mixed batch to one recipient. Each asset may appear at
    /// most once.
    pub fn batch_withdraw(
        &mut self,
        world: &mut World,
        sender: Address,
        vault_id: VaultId,
        envelope: &Envelope,
        withdrawal: &BatchWithdrawal,
    ) -> Result<(), LockboxError> {
        self.transact(world, Msg::new(sender), "batch_withdraw", |lockbox, world| {
            lockbox.require_owner(vault_id, sender)?;
            let BatchWithdrawal { assets, recipient } = withdrawal;
            let recipient = *recipient;
            if recipient.is_zero() {
                return Err(LockboxError::ZeroAddress);
            }
            if let Some((left, right)) = assets.length_mismatch() {
                return Err(LockboxError::MismatchedInputs { left, right });
            }
            let operation = Operation::BatchWithdraw(withdrawal.clone());
            lockbox.authorize(world.now(), vault_id, &operation, envelope)?;

            if assets.native > 0 {
                lockbox.ledger_mut(vault_id)?.debit_native(assets.native)?;
                lockbox.push_native(world, recipient, assets.native)?;
            }

            let mut seen_tokens = HashSet::new();
            for (token, amount) in assets.token_pairs() {
                if !seen_tokens.insert(token) {
                    return Err(LockboxError::DuplicateEntry(format!("token {token}")));
                }
                lockbox.ledger_mut(vault_id)?.debit_token(token, amount)?;
                lockbox.push_fungible(world, token, recipient, amount)?;
            }

            let mut seen_items = HashSet::new();
            for key in assets.nft_keys() {
                if !seen_items.insert(key) {
                    return Err(LockboxError::DuplicateEntry(format!(
                        "item {} of {}",
                        key.item, key.collection
                    )));
                }
                if !lockbox.ledger_mut(vault_id)?.remove_nft(&key) {
                    return Err(LockboxError::NftNotFound {
                        collection: key.collection,
                        item: key.item,
                    });
                }
                lockbox.push_nonfungible(world, key, recipient)?;
            }

            lockbox.emit(LockboxEvent::Withdrawn {
                vault_id,
                reference: envelope.reference,
            });
            info!(
                vault_id,
                native = assets.native,
                tokens = assets.tokens.len(),
                nfts = assets.items.len(),
                %recipient,
                "batch withdrawn"
            );
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Outbound transfers
    // -----------------------------------------------------------------------

    pub(crate) fn push_native(&self, world: &mut World, to: Address, amount: Amount) -> Result<(), LockboxError> {
        self.interact(world, |host| {
            host.send_native(to, amount)
                .map_err(|e| LockboxError::NativeTransferFailed {
                    recipient: to,
                    reason: e.to_string(),
                })
        })
    }

    pub(crate) fn push_fungible(
        &self,
        world: &mut World,
        token: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), LockboxError> {
        self.interact(world, |host| {
            host.transfer_token(token, to, amount)?;
            Ok(())
        })
    }

    pub(crate) fn push_nonfungible(&self, world: &mut World, key: NftKey, to: Address) -> Result<(), LockboxError> {
        self.interact(world, |host| {
            let this = host.this();
            host.safe_transfer_nft(key, this, to)?;
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    /// Native balance attributed to a vault. Owner only.
    pub fn native_balance(&self, caller: Address, vault_id: VaultId) -> Result<Amount, LockboxError> {
        self.require_owner(vault_id, caller)?;
        Ok(self
            .state
            .ledgers
            .get(&vault_id)
            .map(|ledger| ledger.native())
            .unwrap_or(0))
    }

    /// Token balance attributed to a vault. Owner only.
    pub fn token_balance(&self, caller: Address, vault_id: VaultId, token: Address) -> Result<Amount, LockboxError> {
        self.require_owner(vault_id, caller)?;
        Ok(self
            .state
            .ledgers
            .get(&vault_id)
            .map(|ledger| ledger.token_balance(&token))
            .unwrap_or(0))
    }
}

/// Shape checks shared by batch deposit and batch creation.
pub(crate) fn check_batch_shape(batch: &AssetBatch, attached: Amount) -> Result<(), LockboxError> {
    if let Some((left, right)) = batch.length_mismatch() {
        return Err(LockboxError::ArrayLengthMismatch { left, right });
    }
    if batch.native != attached {
        return Err(LockboxError::ValueMismatch {
            declared: batch.native,
            supplied: attached,
        });
    }
    if batch.is_empty() {
        return Err(LockboxError::ZeroAmount);
    }
    Ok(())
}
