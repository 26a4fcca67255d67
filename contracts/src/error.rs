//! # Lockbox Errors
//!
//! One error enum for every entry point. Any error aborts the whole call:
//! the lockbox restores its pre-call state and the caller sees exactly one
//! of these variants.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::assets::AssetError;
use crate::ledger::LedgerError;
use crate::types::{Address, Amount, Asset, ItemId, VaultId};
use crate::world::ExternalError;

/// Coarse grouping of [`LockboxError`] variants, used for logging and by
/// clients deciding whether a retry makes sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Authorization,
    Existence,
    Validation,
    Resource,
    External,
    Structural,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockboxError {
    // --- authorization ---
    #[error("caller {caller} does not own vault {vault_id}")]
    NotOwner { vault_id: VaultId, caller: Address },

    #[error("signature does not recover to the vault's operating key")]
    InvalidSignature,

    #[error("message hash does not match the operation bound to the current nonce")]
    InvalidMessageHash,

    #[error("signature expired at {expiry} (now {now})")]
    SignatureExpired {
        expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("caller {0} is not the lockbox admin")]
    Unauthorized(Address),

    // --- existence ---
    #[error("vault {0} does not exist")]
    VaultNotFound(VaultId),

    // --- validation ---
    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("the zero address is not allowed here")]
    ZeroAddress,

    #[error("asset contract address must not be zero")]
    ZeroTokenAddress,

    #[error("operating key must not be zero")]
    ZeroKey,

    #[error("paired arrays differ in length: {left} vs {right}")]
    ArrayLengthMismatch { left: usize, right: usize },

    #[error("withdrawal inputs differ in length: {left} vs {right}")]
    MismatchedInputs { left: usize, right: usize },

    #[error("declared native amount {declared} does not match attached value {supplied}")]
    ValueMismatch { declared: Amount, supplied: Amount },

    #[error("vaults can only be minted to the caller")]
    SelfMintOnly,

    #[error("invalid swap parameters")]
    InvalidSwap,

    #[error("duplicate entry in batch: {0}")]
    DuplicateEntry(String),

    #[error("operation could not be encoded: {0}")]
    Encoding(String),

    // --- resource ---
    #[error("insufficient native balance: available {available}, requested {requested}")]
    NoNativeBalance { available: Amount, requested: Amount },

    #[error("insufficient balance of token {token}: available {available}, requested {requested}")]
    InsufficientTokenBalance {
        token: Address,
        available: Amount,
        requested: Amount,
    },

    #[error("vault does not hold item {item} of collection {collection}")]
    NftNotFound { collection: Address, item: ItemId },

    #[error("amount overflow")]
    AmountOverflow,

    // --- external ---
    #[error("native transfer to {recipient} failed: {reason}")]
    NativeTransferFailed { recipient: Address, reason: String },

    #[error("token or collection call failed: {0}")]
    TokenTransferFailed(#[from] AssetError),

    #[error("external call failed: {0}")]
    External(ExternalError),

    #[error("swap counter-party call failed: {0}")]
    RouterCallFailed(String),

    #[error("counter-party consumed {consumed}, more than the authorized {authorized}")]
    RouterOverspent { consumed: Amount, authorized: Amount },

    #[error("counter-party drained {asset}: lockbox balance fell from {before} to {after}")]
    RouterDrained { asset: Asset, before: Amount, after: Amount },

    #[error("swap returned {received}, below the minimum {minimum}")]
    SlippageExceeded { received: Amount, minimum: Amount },

    // --- structural ---
    #[error("vault identities are soulbound and cannot be transferred")]
    TransfersDisabled,

    #[error("default metadata prefix is already set")]
    DefaultUriAlreadySet,

    #[error("vault has no metadata and no default prefix is set")]
    NoUri,

    #[error("plain native transfers are refused; use a deposit entry point")]
    UseDepositEntryPoint,

    #[error("unknown entry point")]
    NoFallback,

    #[error("reentrant call into the lockbox")]
    ReentrantCall,
}

impl LockboxError {
    pub fn category(&self) -> ErrorCategory {
        use LockboxError::*;
        match self {
            NotOwner { .. }
            | InvalidSignature
            | InvalidMessageHash
            | SignatureExpired { .. }
            | Unauthorized(_) => ErrorCategory::Authorization,

            VaultNotFound(_) => ErrorCategory::Existence,

            ZeroAmount
            | ZeroAddress
            | ZeroTokenAddress
            | ZeroKey
            | ArrayLengthMismatch { .. }
            | MismatchedInputs { .. }
            | ValueMismatch { .. }
            | SelfMintOnly
            | InvalidSwap
            | DuplicateEntry(_)
            | Encoding(_) => ErrorCategory::Validation,

            NoNativeBalance { .. }
            | InsufficientTokenBalance { .. }
            | NftNotFound { .. }
            | AmountOverflow => ErrorCategory::Resource,

            NativeTransferFailed { .. }
            | TokenTransferFailed(_)
            | External(_)
            | RouterCallFailed(_)
            | RouterOverspent { .. }
            | RouterDrained { .. }
            | SlippageExceeded { .. } => ErrorCategory::External,

            TransfersDisabled
            | DefaultUriAlreadySet
            | NoUri
            | UseDepositEntryPoint
            | NoFallback
            | ReentrantCall => ErrorCategory::Structural,
        }
    }
}

impl From<LedgerError> for LockboxError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientNative {
                available,
                requested,
            } => LockboxError::NoNativeBalance {
                available,
                requested,
            },
            LedgerError::InsufficientToken {
                token,
                available,
                requested,
            } => LockboxError::InsufficientTokenBalance {
                token,
                available,
                requested,
            },
            LedgerError::Overflow => LockboxError::AmountOverflow,
        }
    }
}

impl From<ExternalError> for LockboxError {
    fn from(err: ExternalError) -> Self {
        match err {
            ExternalError::Asset(inner) => LockboxError::TokenTransferFailed(inner),
            other => LockboxError::External(other),
        }
    }
}
