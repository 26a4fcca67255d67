//! # Protocol Configuration & Constants
//!
//! Every magic number in Lockbox lives here. The protocol name, version, and
//! chain id all feed the domain separator that every vault signature is bound
//! to. Change one after launch and every outstanding signature in the wild
//! stops verifying.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Identity
// ---------------------------------------------------------------------------

/// Protocol name mixed into the signing domain.
pub const PROTOCOL_NAME: &str = "Lockbox";

/// Signing-domain version. Bump it and every outstanding signature dies.
pub const PROTOCOL_VERSION: &str = "1";

/// BLAKE3 `derive_key` context for the domain separator.
pub const DOMAIN_CONTEXT: &str = "lockbox 2026 signing domain v1";

/// BLAKE3 `derive_key` context for operation payload digests.
pub const PAYLOAD_CONTEXT: &str = "lockbox 2026 operation payload v1";

// ---------------------------------------------------------------------------
// Network Identifiers
// ---------------------------------------------------------------------------

/// Mainnet chain id.
pub const CHAIN_ID_MAINNET: u64 = 0x4C4F_434B; // "LOCK"

/// Testnet chain id.
pub const CHAIN_ID_TESTNET: u64 = 0x4C4F_4354; // "LOCT"

/// Devnet chain id. Reset whenever someone feels like it.
pub const CHAIN_ID_DEVNET: u64 = 0x4C4F_4344; // "LOCD"

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

pub const SIGNING_ALGORITHM: &str = "Ed25519";

pub const SECRET_KEY_LENGTH: usize = 32;

pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Ed25519 signature length. Always 64 bytes.
pub const SIGNATURE_LENGTH: usize = 64;

pub const HASH_OUTPUT_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Signing Defaults
// ---------------------------------------------------------------------------

/// How long an off-chain signer makes an envelope valid for by default.
/// The contract enforces whatever expiry was signed; this is only the
/// helper's default.
pub const DEFAULT_SIGNATURE_TTL: Duration = Duration::from_secs(15 * 60);

/// First nonce a freshly created vault expects.
pub const INITIAL_NONCE: u64 = 1;

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Friendly name for a chain id, mainly for logging.
pub fn network_name(chain_id: u64) -> String {
    match chain_id {
        CHAIN_ID_MAINNET => "mainnet".to_string(),
        CHAIN_ID_TESTNET => "testnet".to_string(),
        CHAIN_ID_DEVNET => "devnet".to_string(),
        other => format!("unknown(0x{:08X})", other),
    }
}

/// Chain id for a network name. `None` for anything we don't recognize.
pub fn chain_id_for_network(name: &str) -> Option<u64> {
    match name.to_ascii_lowercase().as_str() {
        "mainnet" => Some(CHAIN_ID_MAINNET),
        "testnet" => Some(CHAIN_ID_TESTNET),
        "devnet" => Some(CHAIN_ID_DEVNET),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_ids_are_distinct() {
        assert_ne!(CHAIN_ID_MAINNET, CHAIN_ID_TESTNET);
        assert_ne!(CHAIN_ID_MAINNET, CHAIN_ID_DEVNET);
        assert_ne!(CHAIN_ID_TESTNET, CHAIN_ID_DEVNET);
    }

    #[test]
    fn test_network_name_roundtrip() {
        for name in ["mainnet", "testnet", "devnet"] {
            let id = chain_id_for_network(name).unwrap();
            assert_eq!(network_name(id), name);
        }
        assert_eq!(chain_id_for_network("DevNet"), Some(CHAIN_ID_DEVNET));
        assert_eq!(chain_id_for_network("moon"), None);
    }

    #[test]
    fn test_unknown_network_formatting() {
        assert_eq!(network_name(0xCAFEBABE), "unknown(0xCAFEBABE)");
    }

    #[test]
    fn test_contexts_are_distinct() {
        assert_ne!(DOMAIN_CONTEXT, PAYLOAD_CONTEXT);
    }

    #[test]
    fn test_crypto_parameter_sizes() {
        assert_eq!(SECRET_KEY_LENGTH, 32);
        assert_eq!(PUBLIC_KEY_LENGTH, 32);
        assert_eq!(SIGNATURE_LENGTH, 64);
        assert_eq!(HASH_OUTPUT_LENGTH, 32);
        assert_eq!(INITIAL_NONCE, 1);
    }
}
