//! Integration tests for signed-operation authorization: nonce handling,
//! replay protection, expiry, key rotation, and signer recovery.

mod common;

use chrono::Duration;
use common::{addr, Harness};
use lockbox_contracts::config::LockboxConfig;
use lockbox_contracts::{Address, Envelope, Lockbox, LockboxError, Operation};
use lockbox_protocol::crypto::keys::LockboxKeypair;
use lockbox_protocol::crypto::signatures::sign_recoverable;

fn withdraw_op(amount: u128, recipient: Address) -> Operation {
    Operation::WithdrawNative { amount, recipient }
}

// ---------------------------------------------------------------------------
// Nonce & replay
// ---------------------------------------------------------------------------

#[test]
fn successful_operation_advances_nonce_by_one() {
    let mut h = Harness::new();
    let id = h.create_native_vault(1_000);
    assert_eq!(h.lockbox.nonce_of(h.owner, id).unwrap(), 1);

    let bob = addr("bob");
    let env = h.envelope(id, &withdraw_op(100, bob));
    h.lockbox
        .withdraw_native(&mut h.world, h.owner, id, &env, 100, bob)
        .unwrap();
    assert_eq!(h.lockbox.nonce_of(h.owner, id).unwrap(), 2);

    let env = h.envelope(id, &withdraw_op(100, bob));
    h.lockbox
        .withdraw_native(&mut h.world, h.owner, id, &env, 100, bob)
        .unwrap();
    assert_eq!(h.lockbox.nonce_of(h.owner, id).unwrap(), 3);
}

#[test]
fn replayed_envelope_fails_hash_check() {
    let mut h = Harness::new();
    let id = h.create_native_vault(1_000);
    let bob = addr("bob");

    let env = h.envelope(id, &withdraw_op(100, bob));
    h.lockbox
        .withdraw_native(&mut h.world, h.owner, id, &env, 100, bob)
        .unwrap();

    let replay = h
        .lockbox
        .withdraw_native(&mut h.world, h.owner, id, &env, 100, bob);
    assert_eq!(replay, Err(LockboxError::InvalidMessageHash));
    assert_eq!(h.native_of(id), 900);
    assert_eq!(h.lockbox.nonce_of(h.owner, id).unwrap(), 2);
}

#[test]
fn failed_operation_does_not_consume_nonce() {
    let mut h = Harness::new();
    let id = h.create_native_vault(1_000);
    let bob = addr("bob");

    // Signed correctly, but the vault cannot cover it.
    let env = h.envelope(id, &withdraw_op(5_000, bob));
    let err = h
        .lockbox
        .withdraw_native(&mut h.world, h.owner, id, &env, 5_000, bob)
        .unwrap_err();
    assert!(matches!(err, LockboxError::NoNativeBalance { .. }));
    assert_eq!(h.lockbox.nonce_of(h.owner, id).unwrap(), 1);
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

#[test]
fn tampered_parameters_fail_hash_check() {
    let mut h = Harness::new();
    let id = h.create_native_vault(1_000);
    let bob = addr("bob");

    let env = h.envelope(id, &withdraw_op(10, bob));
    assert_eq!(
        h.lockbox.withdraw_native(&mut h.world, h.owner, id, &env, 11, bob),
        Err(LockboxError::InvalidMessageHash)
    );
    assert_eq!(
        h.lockbox
            .withdraw_native(&mut h.world, h.owner, id, &env, 10, addr("mallory")),
        Err(LockboxError::InvalidMessageHash)
    );
}

#[test]
fn envelope_is_bound_to_operation_kind() {
    let mut h = Harness::new();
    let id = h.create_native_vault(1_000);

    let burn = h.envelope(id, &Operation::Burn);
    let new_key = addr("new-key");
    assert_eq!(
        h.lockbox.rotate_key(&mut h.world, h.owner, id, &burn, new_key),
        Err(LockboxError::InvalidMessageHash)
    );
}

#[test]
fn envelope_is_bound_to_vault() {
    let mut h = Harness::new();
    let first = h.create_native_vault(1_000);
    let second = h.create_native_vault(1_000);
    let bob = addr("bob");

    let env = h.envelope(first, &withdraw_op(10, bob));
    assert_eq!(
        h.lockbox
            .withdraw_native(&mut h.world, h.owner, second, &env, 10, bob),
        Err(LockboxError::InvalidMessageHash)
    );
}

#[test]
fn envelope_is_bound_to_deployment() {
    let mut h = Harness::new();
    let id = h.create_native_vault(1_000);
    let bob = addr("bob");

    // Same lockbox address, different chain.
    let foreign = Lockbox::new(LockboxConfig::testnet(h.lockbox_address(), h.admin));
    let env = Envelope::sign(
        &h.key,
        foreign.domain(),
        id,
        1,
        &withdraw_op(10, bob),
        1,
        h.world.now() + Duration::minutes(5),
    )
    .unwrap();
    assert_eq!(
        h.lockbox.withdraw_native(&mut h.world, h.owner, id, &env, 10, bob),
        Err(LockboxError::InvalidMessageHash)
    );
}

// ---------------------------------------------------------------------------
// Signer
// ---------------------------------------------------------------------------

#[test]
fn wrong_key_is_rejected() {
    let mut h = Harness::new();
    let id = h.create_native_vault(1_000);
    let bob = addr("bob");

    let stranger = LockboxKeypair::generate();
    let env = Envelope::sign(
        &stranger,
        h.lockbox.domain(),
        id,
        1,
        &withdraw_op(10, bob),
        1,
        h.world.now() + Duration::minutes(5),
    )
    .unwrap();
    assert_eq!(
        h.lockbox.withdraw_native(&mut h.world, h.owner, id, &env, 10, bob),
        Err(LockboxError::InvalidSignature)
    );
}

#[test]
fn forged_signer_claim_is_rejected() {
    let mut h = Harness::new();
    let id = h.create_native_vault(1_000);
    let bob = addr("bob");

    // Correct hash, signed by a stranger, but claiming the operating key.
    let mut env = h.envelope(id, &withdraw_op(10, bob));
    let stranger = LockboxKeypair::generate();
    let mut forged = sign_recoverable(&stranger, &env.message_hash);
    forged.signer = h.key.public_key();
    env.signature = forged;

    assert_eq!(
        h.lockbox.withdraw_native(&mut h.world, h.owner, id, &env, 10, bob),
        Err(LockboxError::InvalidSignature)
    );
}

#[test]
fn expired_envelope_is_rejected() {
    let mut h = Harness::new();
    let id = h.create_native_vault(1_000);
    let bob = addr("bob");

    let env = h.envelope(id, &withdraw_op(10, bob));
    h.world.set_now(env.expiry);
    let err = h
        .lockbox
        .withdraw_native(&mut h.world, h.owner, id, &env, 10, bob)
        .unwrap_err();
    assert!(matches!(err, LockboxError::SignatureExpired { .. }));

    h.world.set_now(env.expiry - Duration::seconds(1));
    h.lockbox
        .withdraw_native(&mut h.world, h.owner, id, &env, 10, bob)
        .unwrap();
}

#[test]
fn stretched_expiry_fails_hash_check() {
    let mut h = Harness::new();
    let id = h.create_native_vault(1_000);
    let bob = addr("bob");

    // Pushing the expiry by a fraction of a second is still a different
    // envelope.
    let mut env = h.envelope(id, &withdraw_op(10, bob));
    env.expiry = env.expiry + Duration::milliseconds(900);
    assert_eq!(
        h.lockbox.withdraw_native(&mut h.world, h.owner, id, &env, 10, bob),
        Err(LockboxError::InvalidMessageHash)
    );
    assert_eq!(h.lockbox.nonce_of(h.owner, id).unwrap(), 1);
}

// ---------------------------------------------------------------------------
// Ordering of checks
// ---------------------------------------------------------------------------

#[test]
fn ownership_is_checked_before_signature() {
    let mut h = Harness::new();
    let id = h.create_native_vault(1_000);
    let bob = addr("bob");

    let env = h.envelope(id, &withdraw_op(10, bob));
    let mallory = addr("mallory");
    assert_eq!(
        h.lockbox.withdraw_native(&mut h.world, mallory, id, &env, 10, bob),
        Err(LockboxError::NotOwner {
            vault_id: id,
            caller: mallory
        })
    );
    // The envelope was not consumed by the rejected call.
    h.lockbox
        .withdraw_native(&mut h.world, h.owner, id, &env, 10, bob)
        .unwrap();
}

#[test]
fn unknown_vault_is_not_found() {
    let mut h = Harness::new();
    let id = h.create_native_vault(1_000);
    let bob = addr("bob");
    let env = h.envelope(id, &withdraw_op(10, bob));
    assert_eq!(
        h.lockbox.withdraw_native(&mut h.world, h.owner, 42, &env, 10, bob),
        Err(LockboxError::VaultNotFound(42))
    );
}

#[test]
fn nonce_and_key_views_are_owner_only() {
    let mut h = Harness::new();
    let id = h.create_native_vault(1_000);
    assert_eq!(h.lockbox.operating_key_of(h.owner, id).unwrap(), h.key_address());
    assert!(matches!(
        h.lockbox.nonce_of(addr("mallory"), id),
        Err(LockboxError::NotOwner { .. })
    ));
    assert!(matches!(
        h.lockbox.operating_key_of(addr("mallory"), id),
        Err(LockboxError::NotOwner { .. })
    ));
}

// ---------------------------------------------------------------------------
// Key rotation
// ---------------------------------------------------------------------------

#[test]
fn rotated_key_replaces_old_key() {
    let mut h = Harness::new();
    let id = h.create_native_vault(1_000);
    let bob = addr("bob");

    let next = LockboxKeypair::generate();
    let next_addr = Address::from(next.public_key());
    let env = h.envelope(id, &Operation::RotateKey { new_key: next_addr });
    h.lockbox
        .rotate_key(&mut h.world, h.owner, id, &env, next_addr)
        .unwrap();
    assert_eq!(h.lockbox.operating_key_of(h.owner, id).unwrap(), next_addr);

    // The old key no longer authorizes anything.
    let stale = h.envelope(id, &withdraw_op(10, bob));
    assert_eq!(
        h.lockbox.withdraw_native(&mut h.world, h.owner, id, &stale, 10, bob),
        Err(LockboxError::InvalidSignature)
    );

    // The new key does, at nonce 2.
    let fresh = Envelope::sign(
        &next,
        h.lockbox.domain(),
        id,
        2,
        &withdraw_op(10, bob),
        9,
        h.world.now() + Duration::minutes(5),
    )
    .unwrap();
    h.lockbox
        .withdraw_native(&mut h.world, h.owner, id, &fresh, 10, bob)
        .unwrap();
}

#[test]
fn rotating_to_zero_key_locks_vault_forever() {
    let mut h = Harness::new();
    let id = h.create_native_vault(1_000);

    let env = h.envelope(id, &Operation::RotateKey { new_key: Address::ZERO });
    h.lockbox
        .rotate_key(&mut h.world, h.owner, id, &env, Address::ZERO)
        .unwrap();

    let bob = addr("bob");
    let env = h.envelope(id, &withdraw_op(10, bob));
    assert_eq!(
        h.lockbox.withdraw_native(&mut h.world, h.owner, id, &env, 10, bob),
        Err(LockboxError::InvalidSignature)
    );
    assert_eq!(h.native_of(id), 1_000);
}
