//! # Cryptographic Primitives for Lockbox
//!
//! Every vault operation that moves value out is authorized by a signature
//! produced by that vault's operating key. This module holds the pieces
//! that make that check possible:
//!
//! - **Ed25519** for operating keys and signatures.
//! - **BLAKE3** for domain-separated binding hashes.
//!
//! ## A note on "rolling your own crypto"
//!
//! We don't. Everything here is a thin, type-safe wrapper around audited
//! implementations. Signer recovery in particular is nothing more than a
//! strict verification against the key the signature claims. If the claim
//! does not verify, there is no signer.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{blake3_hash, blake3_hash_multi, domain_separated_hash, Hash32};
pub use keys::{LockboxKeypair, LockboxPublicKey, LockboxSignature};
pub use signatures::{recover, sign, sign_recoverable, verify, RecoverableSignature};
