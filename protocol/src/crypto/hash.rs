//! # Hashing Utilities
//!
//! - **BLAKE3**: the default. Binding hashes for vault authorization,
//!   payload digests, and domain separators all go through BLAKE3.
//!
//! ## Domain separation
//!
//! [`domain_separated_hash`] uses BLAKE3's `derive_key` mode. A context
//! string selects a different IV, so hashes under two contexts cannot
//! collide even over identical input. Don't prepend tags by hand.

/// A 32-byte digest.
pub type Hash32 = [u8; 32];

/// BLAKE3 of `data`.
pub fn blake3_hash(data: &[u8]) -> Hash32 {
    *blake3::hash(data).as_bytes()
}

/// BLAKE3 in `derive_key` mode under `context`.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> Hash32 {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Hash several byte slices as if concatenated, without the buffer.
///
/// Callers hashing variable-length parts must length-prefix them; this
/// function does not.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> Hash32 {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}
