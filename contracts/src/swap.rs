//! # Swaps
//!
//! Exchange part of a vault's holdings through an untrusted counter-party
//! contract (a "router"). The lockbox does not know or care how the router
//! prices anything; it only enforces the outcome by measuring its own
//! balances around the call:
//!
//! - the router may consume at most `amount_in` of the input asset
//!   ([`LockboxError::RouterOverspent`] otherwise),
//! - anything it leaves unconsumed is refunded to the vault,
//! - no other balance of the lockbox may shrink, since those assets belong
//!   to other vaults ([`LockboxError::RouterDrained`] otherwise),
//! - at least `min_amount_out` of the output asset must arrive
//!   ([`LockboxError::SlippageExceeded`] otherwise).
//!
//! Fungible input is offered through an allowance of exactly `amount_in`,
//! which is reset to zero after the call whether or not the router used it.
//! Native input is sent along with the call.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::authorization::{Envelope, Operation};
use crate::error::LockboxError;
use crate::events::LockboxEvent;
use crate::lockbox::Lockbox;
use crate::types::{Address, Amount, Asset, Msg, VaultId};
use crate::world::World;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub asset_in: Asset,
    pub asset_out: Asset,
    pub amount_in: Amount,
    pub min_amount_out: Amount,
    /// Counter-party contract.
    pub router: Address,
    /// Opaque call data forwarded to the router.
    #[serde(default, with = "hex_payload")]
    pub payload: Vec<u8>,
    /// Where the output goes. `None`, the zero address, or the lockbox
    /// itself credits the vault.
    #[serde(default)]
    pub recipient: Option<Address>,
}

/// What a swap actually did, as measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SwapOutcome {
    /// Input the router took.
    pub consumed: Amount,
    /// Input returned to the vault.
    pub refunded: Amount,
    /// Output that arrived at the lockbox.
    pub received: Amount,
    pub credited_to_vault: bool,
}

impl SwapRequest {
    fn validate(&self) -> Result<(), LockboxError> {
        if self.asset_in == self.asset_out {
            return Err(LockboxError::InvalidSwap);
        }
        if self.amount_in == 0 {
            return Err(LockboxError::ZeroAmount);
        }
        if self.router.is_zero() {
            return Err(LockboxError::ZeroAddress);
        }
        for asset in [self.asset_in, self.asset_out] {
            if asset == Asset::Fungible(Address::ZERO) {
                return Err(LockboxError::ZeroAddress);
            }
        }
        Ok(())
    }

    fn effective_recipient(&self, lockbox: Address) -> Option<Address> {
        self.recipient.filter(|r| !r.is_zero() && *r != lockbox)
    }
}

impl Lockbox {
    pub fn swap(
        &mut self,
        world: &mut World,
        sender: Address,
        vault_id: VaultId,
        envelope: &Envelope,
        request: &SwapRequest,
    ) -> Result<SwapOutcome, LockboxError> {
        self.transact(world, Msg::new(sender), "swap", |lockbox, world| {
            lockbox.require_owner(vault_id, sender)?;
            request.validate()?;
            let operation = Operation::Swap(request.clone());
            lockbox.authorize(world.now(), vault_id, &operation, envelope)?;

            lockbox.debit(vault_id, request.asset_in, request.amount_in)?;

            let this = lockbox.address();
            let holdings = world.assets().holdings_of(this);
            let in_before = world.assets().balance_of(request.asset_in, this)?;
            let out_before = world.assets().balance_of(request.asset_out, this)?;

            lockbox.interact(world, |host| {
                let value = match request.asset_in {
                    Asset::Native => request.amount_in,
                    Asset::Fungible(token) => {
                        host.approve_token(token, request.router, request.amount_in)?;
                        0
                    }
                };
                let call = host.call(request.router, value, &request.payload);
                if let Asset::Fungible(token) = request.asset_in {
                    host.approve_token(token, request.router, 0)?;
                }
                call.map_err(|e| LockboxError::RouterCallFailed(e.to_string()))
            })?;

            let in_after = world.assets().balance_of(request.asset_in, this)?;
            let consumed = in_before.saturating_sub(in_after);
            if consumed > request.amount_in {
                return Err(LockboxError::RouterOverspent {
                    consumed,
                    authorized: request.amount_in,
                });
            }

            for &(asset, before) in &holdings {
                if asset == request.asset_in {
                    continue;
                }
                let after = world.assets().balance_of(asset, this)?;
                if after < before {
                    return Err(LockboxError::RouterDrained { asset, before, after });
                }
            }

            let out_after = world.assets().balance_of(request.asset_out, this)?;
            let received = out_after
                .checked_sub(out_before)
                .ok_or(LockboxError::RouterDrained {
                    asset: request.asset_out,
                    before: out_before,
                    after: out_after,
                })?;
            if received < request.min_amount_out {
                return Err(LockboxError::SlippageExceeded {
                    received,
                    minimum: request.min_amount_out,
                });
            }

            let refunded = request.amount_in - consumed;
            if refunded > 0 {
                lockbox.credit(vault_id, request.asset_in, refunded)?;
            }

            let recipient = request.effective_recipient(this);
            match recipient {
                None => lockbox.credit(vault_id, request.asset_out, received)?,
                Some(to) => match request.asset_out {
                    Asset::Native => lockbox.push_native(world, to, received)?,
                    Asset::Fungible(token) => lockbox.push_fungible(world, token, to, received)?,
                },
            }

            lockbox.emit(LockboxEvent::SwapExecuted {
                vault_id,
                reference: envelope.reference,
            });
            info!(
                vault_id,
                asset_in = %request.asset_in,
                asset_out = %request.asset_out,
                consumed,
                refunded,
                received,
                "swap executed"
            );
            Ok(SwapOutcome {
                consumed,
                refunded,
                received,
                credited_to_vault: recipient.is_none(),
            })
        })
    }

    fn debit(&mut self, vault_id: VaultId, asset: Asset, amount: Amount) -> Result<(), LockboxError> {
        let ledger = self.ledger_mut(vault_id)?;
        match asset {
            Asset::Native => ledger.debit_native(amount)?,
            Asset::Fungible(token) => ledger.debit_token(token, amount)?,
        };
        debug!(vault_id, %asset, amount, "ledger debited for swap");
        Ok(())
    }

    fn credit(&mut self, vault_id: VaultId, asset: Asset, amount: Amount) -> Result<(), LockboxError> {
        let ledger = self.ledger_mut(vault_id)?;
        match asset {
            Asset::Native => ledger.credit_native(amount)?,
            Asset::Fungible(token) => ledger.credit_token(token, amount)?,
        };
        debug!(vault_id, %asset, amount, "ledger credited from swap");
        Ok(())
    }
}

mod hex_payload {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SwapRequest {
        SwapRequest {
            asset_in: Asset::Native,
            asset_out: Asset::Fungible(Address::derive("usd")),
            amount_in: 10,
            min_amount_out: 1,
            router: Address::derive("router"),
            payload: vec![0xab],
            recipient: None,
        }
    }

    #[test]
    fn validation_rules() {
        assert!(request().validate().is_ok());

        let same = SwapRequest {
            asset_out: Asset::Native,
            ..request()
        };
        assert_eq!(same.validate(), Err(LockboxError::InvalidSwap));

        let zero = SwapRequest {
            amount_in: 0,
            ..request()
        };
        assert_eq!(zero.validate(), Err(LockboxError::ZeroAmount));

        let no_router = SwapRequest {
            router: Address::ZERO,
            ..request()
        };
        assert_eq!(no_router.validate(), Err(LockboxError::ZeroAddress));

        let null_token = SwapRequest {
            asset_out: Asset::Fungible(Address::ZERO),
            ..request()
        };
        assert_eq!(null_token.validate(), Err(LockboxError::ZeroAddress));
    }

    #[test]
    fn zero_or_lockbox_recipient_means_vault() {
        let lockbox = Address::derive("lockbox");
        let req = SwapRequest {
            recipient: Some(Address::ZERO),
            ..request()
        };
        assert_eq!(req.effective_recipient(lockbox), None);

        let req = SwapRequest {
            recipient: Some(lockbox),
            ..request()
        };
        assert_eq!(req.effective_recipient(lockbox), None);

        let bob = Address::derive("bob");
        let req = SwapRequest {
            recipient: Some(bob),
            ..request()
        };
        assert_eq!(req.effective_recipient(lockbox), Some(bob));
    }

    #[test]
    fn payload_is_hex_in_json() {
        let json = serde_json::to_value(request()).unwrap();
        assert_eq!(json["payload"], "ab");
        let back: SwapRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, request());
    }
}
