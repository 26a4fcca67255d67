//! Lockbox events.
//!
//! Every successful entry point appends its events to the lockbox's log. A
//! failed call leaves no events behind. Reference ids are opaque and only
//! echoed back for off-chain correlation.

use serde::{Deserialize, Serialize};

use crate::types::{Address, ReferenceId, VaultId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LockboxEvent {
    /// Identity mint (`from` is zero) or burn (`to` is zero).
    Transfer {
        from: Address,
        to: Address,
        vault_id: VaultId,
    },
    /// Emitted at mint: every vault identity is locked for life.
    Locked { vault_id: VaultId },
    Minted {
        vault_id: VaultId,
        reference: ReferenceId,
    },
    Deposited {
        vault_id: VaultId,
        reference: ReferenceId,
    },
    Withdrawn {
        vault_id: VaultId,
        reference: ReferenceId,
    },
    SwapExecuted {
        vault_id: VaultId,
        reference: ReferenceId,
    },
    KeyRotated {
        vault_id: VaultId,
        reference: ReferenceId,
    },
    MetadataUpdated {
        vault_id: VaultId,
        reference: ReferenceId,
    },
    DefaultMetadataSet,
    Burned {
        vault_id: VaultId,
        reference: ReferenceId,
    },
    Approval {
        owner: Address,
        approved: Address,
        vault_id: VaultId,
    },
    ApprovalForAll {
        owner: Address,
        operator: Address,
        approved: bool,
    },
}

impl LockboxEvent {
    /// The vault this event concerns, if any.
    pub fn vault_id(&self) -> Option<VaultId> {
        use LockboxEvent::*;
        match self {
            Transfer { vault_id, .. }
            | Locked { vault_id }
            | Minted { vault_id, .. }
            | Deposited { vault_id, .. }
            | Withdrawn { vault_id, .. }
            | SwapExecuted { vault_id, .. }
            | KeyRotated { vault_id, .. }
            | MetadataUpdated { vault_id, .. }
            | Burned { vault_id, .. }
            | Approval { vault_id, .. } => Some(*vault_id),
            DefaultMetadataSet | ApprovalForAll { .. } => None,
        }
    }
}
