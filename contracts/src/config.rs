//! Lockbox deployment configuration.
//!
//! Everything that identifies one lockbox deployment: which chain, at which
//! address, administered by whom, and under which signing-domain name and
//! version. The domain separator is derived from these fields, so changing
//! any of them invalidates every signature issued against the old values.

use serde::{Deserialize, Serialize};

use lockbox_protocol::config::{
    chain_id_for_network, CHAIN_ID_DEVNET, CHAIN_ID_MAINNET, CHAIN_ID_TESTNET, PROTOCOL_NAME,
    PROTOCOL_VERSION,
};

use crate::authorization::DomainSeparator;
use crate::types::Address;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockboxConfig {
    pub chain_id: u64,
    pub address: Address,
    pub admin: Address,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_name() -> String {
    PROTOCOL_NAME.to_string()
}

fn default_version() -> String {
    PROTOCOL_VERSION.to_string()
}

impl LockboxConfig {
    pub fn new(chain_id: u64, address: Address, admin: Address) -> Self {
        Self {
            chain_id,
            address,
            admin,
            name: default_name(),
            version: default_version(),
        }
    }

    pub fn mainnet(address: Address, admin: Address) -> Self {
        Self::new(CHAIN_ID_MAINNET, address, admin)
    }

    pub fn testnet(address: Address, admin: Address) -> Self {
        Self::new(CHAIN_ID_TESTNET, address, admin)
    }

    pub fn devnet(address: Address, admin: Address) -> Self {
        Self::new(CHAIN_ID_DEVNET, address, admin)
    }

    /// Config for a named network. `None` for unknown network names.
    pub fn for_network(network: &str, address: Address, admin: Address) -> Option<Self> {
        chain_id_for_network(network).map(|chain_id| Self::new(chain_id, address, admin))
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn domain(&self) -> DomainSeparator {
        DomainSeparator::new(&self.name, &self.version, self.chain_id, self.address)
    }
}
