//! End-to-end walkthroughs of the canonical vault scenarios.

mod common;

use common::{addr, Harness};
use lockbox_contracts::{Asset, LockboxError, Msg, Operation, SwapRequest};

/// One whole native unit (18 decimals).
const ONE: u128 = 1_000_000_000_000_000_000;

#[test]
fn scenario_a_partial_native_withdrawal() {
    let mut h = Harness::new();
    let owner = h.owner;
    h.world.assets_mut().mint_native(owner, ONE).unwrap();

    let key = h.key_address();
    let id = h
        .lockbox
        .create_with_native(&mut h.world, Msg::with_value(owner, ONE), owner, key, 1)
        .unwrap();

    let bob = addr("bob");
    let half = ONE / 2;
    let env = h.envelope(id, &Operation::WithdrawNative { amount: half, recipient: bob });
    h.lockbox
        .withdraw_native(&mut h.world, owner, id, &env, half, bob)
        .unwrap();

    assert_eq!(h.native_held(bob), half);
    assert_eq!(h.native_of(id), half);
    assert_eq!(h.native_held(h.lockbox_address()), half);
    h.assert_solvent();
}

#[test]
fn scenario_b_fully_taxed_token_deposit() {
    let mut h = Harness::new();
    let id = h.create_native_vault(10);
    let (owner, void) = (h.owner, h.void);
    assert_eq!(
        h.lockbox.deposit_fungible(&mut h.world, owner, id, void, 100, 0),
        Err(LockboxError::ZeroAmount)
    );
    assert_eq!(h.tokens_of(id, void), 0);
    assert!(h.lockbox.full_vault(owner, id).unwrap().tokens.is_empty());
}

#[test]
fn scenario_c_nft_listing_shrinks_to_empty() {
    let mut h = Harness::new();
    let id = h.create_native_vault(10);
    let (owner, punks) = (h.owner, h.punks);
    for item in [1, 2] {
        h.lockbox
            .deposit_nonfungible(&mut h.world, owner, id, punks, item, 0)
            .unwrap();
    }
    let items = |h: &Harness| -> Vec<u128> {
        h.lockbox
            .full_vault(h.owner, id)
            .unwrap()
            .nfts
            .iter()
            .map(|k| k.item)
            .collect()
    };
    assert_eq!(items(&h), vec![1, 2]);

    for (item, left) in [(1, vec![2]), (2, vec![])] {
        let op = Operation::WithdrawNonFungible {
            collection: punks,
            item,
            recipient: owner,
        };
        let env = h.envelope(id, &op);
        h.lockbox
            .withdraw_nonfungible(&mut h.world, owner, id, &env, punks, item, owner)
            .unwrap();
        assert_eq!(items(&h), left);
    }
    h.assert_solvent();
}

#[test]
fn scenario_d_replay_is_rejected() {
    let mut h = Harness::new();
    let id = h.create_native_vault(100);
    let (owner, bob) = (h.owner, addr("bob"));
    let env = h.envelope(id, &Operation::WithdrawNative { amount: 10, recipient: bob });
    h.lockbox
        .withdraw_native(&mut h.world, owner, id, &env, 10, bob)
        .unwrap();
    assert_eq!(
        h.lockbox.withdraw_native(&mut h.world, owner, id, &env, 10, bob),
        Err(LockboxError::InvalidMessageHash)
    );
}

#[test]
fn scenario_e_native_to_native_swap() {
    let mut h = Harness::new();
    let id = h.create_native_vault(100);
    let request = SwapRequest {
        asset_in: Asset::Native,
        asset_out: Asset::Native,
        amount_in: 10,
        min_amount_out: 0,
        router: addr("router"),
        payload: Vec::new(),
        recipient: None,
    };
    let owner = h.owner;
    let env = h.envelope(id, &Operation::Swap(request.clone()));
    assert_eq!(
        h.lockbox.swap(&mut h.world, owner, id, &env, &request),
        Err(LockboxError::InvalidSwap)
    );
    assert_eq!(h.native_of(id), 100);
}

#[test]
fn scenario_f_burn_with_assets() {
    let mut h = Harness::new();
    let id = h.create_native_vault(100);
    let (owner, admin, punks) = (h.owner, h.admin, h.punks);
    h.lockbox
        .deposit_nonfungible(&mut h.world, owner, id, punks, 4, 0)
        .unwrap();

    let env = h.envelope(id, &Operation::Burn);
    h.lockbox.burn(&mut h.world, owner, id, &env).unwrap();

    assert_eq!(h.lockbox.owner_of(id), Err(LockboxError::VaultNotFound(id)));
    assert_eq!(h.lockbox.full_vault(owner, id), Err(LockboxError::VaultNotFound(id)));
    assert_eq!(h.native_held(h.lockbox_address()), 100);
    let owner_of_punk = h.world.assets().collection(punks).unwrap().owner_of(4);
    assert_eq!(owner_of_punk, Some(h.lockbox_address()));
    assert_eq!(h.lockbox.forfeited_holdings(admin, id).unwrap().nfts.len(), 1);
    h.assert_solvent();
}
