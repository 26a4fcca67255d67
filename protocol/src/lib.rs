// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Lockbox Protocol Core Library
//!
//! The shared foundation under every Lockbox vault: the keys that operate
//! vaults, the signatures that authorize outbound operations, the hashes that
//! bind those signatures to a single nonce on a single deployment, and the
//! constants that name the protocol on the wire.
//!
//! Ed25519 for signatures and BLAKE3 for binding hashes. Nothing more
//! exotic than that.
//!
//! ## Architecture
//!
//! - **crypto**: Keys, signatures (including signer recovery), and hashing.
//! - **config**: Protocol identity, network ids, and cryptographic sizes.
//!
//! ## Design Philosophy
//!
//! 1. A vault is only as safe as the check that gates it. No shortcuts in
//!    verification paths.
//! 2. No unsafe code in crypto paths.
//! 3. If it touches money, it has tests. Plural.

pub mod config;
pub mod crypto;
