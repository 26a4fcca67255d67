//! # Operation Authorization
//!
//! Every outbound or identity-changing vault operation must carry a
//! signature by the vault's operating key over a *message hash* that binds:
//!
//! 1. this deployment (the [`DomainSeparator`]: name, version, chain id,
//!    contract address),
//! 2. the vault id,
//! 3. the vault's current nonce,
//! 4. the operation kind,
//! 5. a digest of the operation's parameters, reference id, and expiry.
//!
//! The caller supplies the message hash alongside the signature. The
//! lockbox recomputes it from the operation it is actually about to
//! perform; any difference is [`LockboxError::InvalidMessageHash`]. Because
//! the nonce is part of the hash and advances on every successful
//! authorization, a replayed envelope always fails the hash check.
//!
//! Hash construction:
//!
//! ```text
//! payload = BLAKE3-derive_key(PAYLOAD_CONTEXT, bincode(operation, reference, expiry_secs, expiry_nanos))
//! message = BLAKE3(domain || vault_id_be || nonce_be || kind_code || payload)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use lockbox_protocol::config::{DOMAIN_CONTEXT, PAYLOAD_CONTEXT};
use lockbox_protocol::crypto::hash::{blake3_hash_multi, domain_separated_hash, Hash32};
use lockbox_protocol::crypto::keys::LockboxKeypair;
use lockbox_protocol::crypto::signatures::{recover, sign_recoverable, RecoverableSignature};

use crate::custody::BatchWithdrawal;
use crate::error::LockboxError;
use crate::lockbox::Lockbox;
use crate::swap::SwapRequest;
use crate::types::{Address, Amount, ItemId, ReferenceId, VaultId};

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// The kind of a signed operation. The code is part of the message hash, so
/// these values are frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    RotateKey,
    WithdrawNative,
    WithdrawFungible,
    WithdrawNonFungible,
    Burn,
    SetMetadata,
    BatchWithdraw,
    Swap,
}

impl OperationKind {
    pub const fn code(self) -> u8 {
        match self {
            OperationKind::RotateKey => 0,
            OperationKind::WithdrawNative => 1,
            OperationKind::WithdrawFungible => 2,
            OperationKind::WithdrawNonFungible => 3,
            OperationKind::Burn => 4,
            OperationKind::SetMetadata => 5,
            OperationKind::BatchWithdraw => 6,
            OperationKind::Swap => 7,
        }
    }
}

/// A signed operation together with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    RotateKey {
        new_key: Address,
    },
    WithdrawNative {
        amount: Amount,
        recipient: Address,
    },
    WithdrawFungible {
        token: Address,
        amount: Amount,
        recipient: Address,
    },
    WithdrawNonFungible {
        collection: Address,
        item: ItemId,
        recipient: Address,
    },
    Burn,
    SetMetadata {
        uri: String,
    },
    BatchWithdraw(BatchWithdrawal),
    Swap(SwapRequest),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::RotateKey { .. } => OperationKind::RotateKey,
            Operation::WithdrawNative { .. } => OperationKind::WithdrawNative,
            Operation::WithdrawFungible { .. } => OperationKind::WithdrawFungible,
            Operation::WithdrawNonFungible { .. } => OperationKind::WithdrawNonFungible,
            Operation::Burn => OperationKind::Burn,
            Operation::SetMetadata { .. } => OperationKind::SetMetadata,
            Operation::BatchWithdraw(_) => OperationKind::BatchWithdraw,
            Operation::Swap(_) => OperationKind::Swap,
        }
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Binds signatures to one deployment on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSeparator(Hash32);

impl DomainSeparator {
    pub fn new(name: &str, version: &str, chain_id: u64, contract: Address) -> Self {
        let mut data = Vec::with_capacity(name.len() + version.len() + 56);
        data.extend_from_slice(&(name.len() as u64).to_be_bytes());
        data.extend_from_slice(name.as_bytes());
        data.extend_from_slice(&(version.len() as u64).to_be_bytes());
        data.extend_from_slice(version.as_bytes());
        data.extend_from_slice(&chain_id.to_be_bytes());
        data.extend_from_slice(contract.as_bytes());
        Self(domain_separated_hash(DOMAIN_CONTEXT, &data))
    }

    pub fn as_bytes(&self) -> &Hash32 {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Digest of an operation's parameters, reference id, and expiry.
pub fn payload_hash(
    operation: &Operation,
    reference: ReferenceId,
    expiry: DateTime<Utc>,
) -> Result<Hash32, LockboxError> {
    let expiry = (expiry.timestamp(), expiry.timestamp_subsec_nanos());
    let encoded = bincode::serialize(&(operation, reference, expiry))
        .map_err(|e| LockboxError::Encoding(e.to_string()))?;
    Ok(domain_separated_hash(PAYLOAD_CONTEXT, &encoded))
}

/// The hash the operating key signs.
pub fn message_hash(
    domain: &DomainSeparator,
    vault_id: VaultId,
    nonce: u64,
    kind: OperationKind,
    payload: &Hash32,
) -> Hash32 {
    blake3_hash_multi(&[
        domain.as_bytes(),
        &vault_id.to_be_bytes(),
        &nonce.to_be_bytes(),
        &[kind.code()],
        payload,
    ])
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Everything a caller submits to prove the operating key approved an
/// operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub message_hash: Hash32,
    pub signature: RecoverableSignature,
    pub reference: ReferenceId,
    pub expiry: DateTime<Utc>,
}

impl Envelope {
    /// Off-chain helper: compute the message hash for `operation` at
    /// `nonce` and sign it with `keypair`.
    pub fn sign(
        keypair: &LockboxKeypair,
        domain: &DomainSeparator,
        vault_id: VaultId,
        nonce: u64,
        operation: &Operation,
        reference: ReferenceId,
        expiry: DateTime<Utc>,
    ) -> Result<Self, LockboxError> {
        let payload = payload_hash(operation, reference, expiry)?;
        let message_hash = message_hash(domain, vault_id, nonce, operation.kind(), &payload);
        Ok(Self {
            message_hash,
            signature: sign_recoverable(keypair, &message_hash),
            reference,
            expiry,
        })
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

impl Lockbox {
    /// Verify `envelope` authorizes `operation` on `vault_id` right now, and
    /// consume the vault's nonce. Callers check existence and ownership
    /// first; an unknown vault here is still reported as not found.
    pub(crate) fn authorize(
        &mut self,
        now: DateTime<Utc>,
        vault_id: VaultId,
        operation: &Operation,
        envelope: &Envelope,
    ) -> Result<(), LockboxError> {
        let domain = *self.domain();
        let vault = self
            .state
            .vaults
            .get_mut(&vault_id)
            .ok_or(LockboxError::VaultNotFound(vault_id))?;

        if now >= envelope.expiry {
            return Err(LockboxError::SignatureExpired {
                expiry: envelope.expiry,
                now,
            });
        }

        let payload = payload_hash(operation, envelope.reference, envelope.expiry)?;
        let expected = message_hash(&domain, vault_id, vault.nonce, operation.kind(), &payload);
        if expected != envelope.message_hash {
            return Err(LockboxError::InvalidMessageHash);
        }

        if vault.operating_key.is_zero() {
            return Err(LockboxError::InvalidSignature);
        }
        let signer = recover(&expected, &envelope.signature)
            .map_err(|_| LockboxError::InvalidSignature)?;
        if Address::from(signer) != vault.operating_key {
            return Err(LockboxError::InvalidSignature);
        }

        vault.nonce = vault.nonce.checked_add(1).ok_or(LockboxError::AmountOverflow)?;
        debug!(
            vault_id,
            kind = ?operation.kind(),
            next_nonce = vault.nonce,
            "operation authorized"
        );
        Ok(())
    }
}
