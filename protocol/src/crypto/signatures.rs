//! # Digital Signatures
//!
//! Ed25519 signing, verification, and signer recovery.
//!
//! ## Recovery
//!
//! Vault authorization is phrased as "recover the signer, then compare it to
//! the vault's operating key". Ed25519 has no public-key recovery, so a
//! [`RecoverableSignature`] carries the key it claims to be from. Recovery
//! then means: verify the signature *strictly* under that embedded key, and
//! only if that succeeds, hand the key back. A forged claim never verifies,
//! so it never recovers.
//!
//! ## Strictness
//!
//! Recovery uses `verify_strict`, which rejects small-order keys and
//! non-canonical encodings. The null identity (all-zero key bytes) is a
//! small-order point and therefore can never recover as a signer.

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::keys::{LockboxKeypair, LockboxPublicKey, LockboxSignature};

/// Errors during signature operations.
///
/// Intentionally vague: callers are not told why verification failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error("invalid signature bytes: expected 64 bytes")]
    InvalidSignatureBytes,

    #[error("invalid public key")]
    InvalidPublicKey,
}

/// A signature bundled with the public key it claims to be from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoverableSignature {
    pub signer: LockboxPublicKey,
    pub signature: LockboxSignature,
}

/// Sign a message using a keypair.
pub fn sign(keypair: &LockboxKeypair, message: &[u8]) -> LockboxSignature {
    keypair.sign(message)
}

/// Verify a signature against a public key. `true` on success.
pub fn verify(public_key: &LockboxPublicKey, message: &[u8], signature: &LockboxSignature) -> bool {
    public_key.verify(message, signature)
}

/// Sign a message and embed the signer's public key.
pub fn sign_recoverable(keypair: &LockboxKeypair, message: &[u8]) -> RecoverableSignature {
    RecoverableSignature {
        signer: keypair.public_key(),
        signature: keypair.sign(message),
    }
}

/// Recover the signer of `message`.
///
/// # Errors
///
/// - [`SignatureError::InvalidSignatureBytes`] if the signature is not 64 bytes.
/// - [`SignatureError::InvalidPublicKey`] if the embedded key is not a point.
/// - [`SignatureError::VerificationFailed`] if strict verification fails.
pub fn recover(
    message: &[u8],
    signature: &RecoverableSignature,
) -> Result<LockboxPublicKey, SignatureError> {
    let dalek_sig = signature
        .signature
        .to_dalek_signature()
        .ok_or(SignatureError::InvalidSignatureBytes)?;

    let verifying_key = VerifyingKey::from_bytes(signature.signer.as_bytes())
        .map_err(|_| SignatureError::InvalidPublicKey)?;

    verifying_key
        .verify_strict(message, &dalek_sig)
        .map_err(|_| SignatureError::VerificationFailed)?;

    Ok(signature.signer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let kp = LockboxKeypair::generate();
        let sig = sign(&kp, b"hello, vault");
        assert!(verify(&kp.public_key(), b"hello, vault", &sig));
    }

    #[test]
    fn recover_returns_signer() {
        let kp = LockboxKeypair::generate();
        let sig = sign_recoverable(&kp, b"rotate key");
        assert_eq!(recover(b"rotate key", &sig), Ok(kp.public_key()));
    }

    #[test]
    fn recover_rejects_other_message() {
        let kp = LockboxKeypair::generate();
        let sig = sign_recoverable(&kp, b"withdraw 1");
        assert_eq!(
            recover(b"withdraw 2", &sig),
            Err(SignatureError::VerificationFailed)
        );
    }

    #[test]
    fn recover_rejects_forged_signer_claim() {
        // Alice signs, Mallory swaps in her own key as the claimed signer.
        let alice = LockboxKeypair::generate();
        let mallory = LockboxKeypair::generate();
        let mut sig = sign_recoverable(&alice, b"burn");
        sig.signer = mallory.public_key();
        assert!(recover(b"burn", &sig).is_err());
    }

    #[test]
    fn zero_key_never_recovers() {
        let forged = RecoverableSignature {
            signer: LockboxPublicKey::from_bytes([0u8; 32]),
            signature: LockboxSignature::from_bytes([0u8; 64]),
        };
        assert!(recover(b"anything", &forged).is_err());
    }

    #[test]
    fn truncated_signature_rejected() {
        let kp = LockboxKeypair::generate();
        let mut sig = sign_recoverable(&kp, b"msg");
        sig.signature = LockboxSignature::from_hex(&"00".repeat(64)).unwrap();
        assert!(recover(b"msg", &sig).is_err());
    }

    #[test]
    fn recoverable_signature_survives_json() {
        let kp = LockboxKeypair::generate();
        let sig = sign_recoverable(&kp, b"json");
        let encoded = serde_json::to_string(&sig).unwrap();
        let decoded: RecoverableSignature = serde_json::from_str(&encoded).unwrap();
        assert_eq!(recover(b"json", &decoded), Ok(kp.public_key()));
    }
}
