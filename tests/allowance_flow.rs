// Confidential and public allowances end to end
mod common;

use common::Harness;
use confidential_swap::crypto::poseidon;
use confidential_swap::wallet::public_credit;
use confidential_swap::*;

async fn approve_carol(h: &mut Harness, amount: Amount) {
    let balance = h.service.read_balance(h.alice.address, h.eur).await.unwrap();
    let nonce = h.service.get_allowance(h.alice.address, h.carol.address, h.eur).await.unwrap().nonce;
    let proof = h
        .alice
        .wallet
        .prove_confidential_approve(&mut h.rng, &h.carol.pk(), &h.auditor.public_key, &balance, amount, nonce, h.eur)
        .unwrap();
    h.service
        .approve_confidential(h.alice.address, h.carol.address, h.eur, proof)
        .await
        .unwrap();
}

async fn carol_spend_proof(h: &mut Harness, amount: Amount) -> Result<CircuitProof<zkp::ConfidentialTransferFromInputs>> {
    let allowance = h.service.get_allowance(h.alice.address, h.carol.address, h.eur).await?;
    h.carol
        .wallet
        .prove_transfer_from(&mut h.rng, &allowance, &h.bob.pk(), &h.auditor.public_key, amount, h.eur)
}

#[tokio::test]
async fn test_spend_leaves_exact_remainder() {
    let mut h = Harness::funded().await;
    approve_carol(&mut h, 500).await;

    let allowance = h.service.get_allowance(h.alice.address, h.carol.address, h.eur).await.unwrap();
    assert!(!allowance.is_public);
    assert_eq!(h.carol.wallet.decrypt(&allowance.encrypted_amount).unwrap(), 500);
    assert_eq!(h.carol.wallet.decrypt_pct(&allowance.amount_pct).unwrap(), 500);

    let proof = carol_spend_proof(&mut h, 200).await.unwrap();
    assert_eq!(
        poseidon::decrypt_amount(&h.auditor.secret_key, &proof.inputs.auditor_pct).unwrap(),
        200
    );
    h.service
        .spend_confidential(h.carol.address, h.alice.address, h.bob.address, h.eur, proof)
        .await
        .unwrap();

    let allowance = h.service.get_allowance(h.alice.address, h.carol.address, h.eur).await.unwrap();
    assert_eq!(h.carol.wallet.decrypt(&allowance.encrypted_amount).unwrap(), 300);
    assert_eq!(h.balance_of(&h.bob, h.eur).await, 200);

    // 400 > 300: the witness cannot satisfy the circuit
    assert!(matches!(
        carol_spend_proof(&mut h, 400).await,
        Err(SwapError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_replayed_approval_is_rejected() {
    let mut h = Harness::funded().await;
    let balance = h.service.read_balance(h.alice.address, h.eur).await.unwrap();
    let proof = h
        .alice
        .wallet
        .prove_confidential_approve(&mut h.rng, &h.carol.pk(), &h.auditor.public_key, &balance, 500, 0, h.eur)
        .unwrap();

    h.service
        .approve_confidential(h.alice.address, h.carol.address, h.eur, proof.clone())
        .await
        .unwrap();
    let replay = h
        .service
        .approve_confidential(h.alice.address, h.carol.address, h.eur, proof)
        .await;
    assert!(matches!(replay, Err(SwapError::InvalidProof)));
}

#[tokio::test]
async fn test_stale_spend_proof_is_rejected() {
    let mut h = Harness::funded().await;
    approve_carol(&mut h, 500).await;
    let first = carol_spend_proof(&mut h, 100).await.unwrap();
    let second = carol_spend_proof(&mut h, 100).await.unwrap();

    h.service
        .spend_confidential(h.carol.address, h.alice.address, h.bob.address, h.eur, first)
        .await
        .unwrap();
    let stale = h
        .service
        .spend_confidential(h.carol.address, h.alice.address, h.bob.address, h.eur, second)
        .await;
    assert!(matches!(stale, Err(SwapError::InvalidProof)));
    assert_eq!(h.balance_of(&h.bob, h.eur).await, 100);
}

#[tokio::test]
async fn test_approval_survives_credit_but_not_debit() {
    let mut h = Harness::funded().await;
    let (alice, alice_pk, eur) = (h.alice.address, h.alice.pk(), h.eur);

    let balance = h.service.read_balance(alice, eur).await.unwrap();
    let proof = h
        .alice
        .wallet
        .prove_confidential_approve(&mut h.rng, &h.carol.pk(), &h.auditor.public_key, &balance, 100, 0, eur)
        .unwrap();
    h.fund(alice, alice_pk, eur, 50).await;
    h.service
        .approve_confidential(alice, h.carol.address, eur, proof)
        .await
        .unwrap();

    let balance = h.service.read_balance(alice, eur).await.unwrap();
    let proof = h
        .alice
        .wallet
        .prove_confidential_approve(&mut h.rng, &h.carol.pk(), &h.auditor.public_key, &balance, 100, 1, eur)
        .unwrap();
    let credit = public_credit(&mut h.rng, &h.bob.pk(), 10);
    h.service
        .spend_public(h.swap, alice, h.bob.address, eur, 10, credit)
        .await
        .unwrap();
    let result = h.service.approve_confidential(alice, h.carol.address, eur, proof).await;
    assert!(matches!(result, Err(SwapError::InvalidProof)));
}

#[tokio::test]
async fn test_cancel_clears_allowance() {
    let mut h = Harness::funded().await;
    approve_carol(&mut h, 500).await;

    let stale = carol_spend_proof(&mut h, 100).await.unwrap();
    let allowance = h.service.get_allowance(h.alice.address, h.carol.address, h.eur).await.unwrap();
    let proof = h.alice.wallet.prove_cancel_allowance(&allowance, h.carol.address).unwrap();
    h.service
        .cancel_allowance(h.alice.address, h.carol.address, h.eur, proof)
        .await
        .unwrap();

    let allowance = h.service.get_allowance(h.alice.address, h.carol.address, h.eur).await.unwrap();
    assert!(!allowance.exists());
    assert_eq!(allowance.nonce, 2);

    let result = h
        .service
        .spend_confidential(h.carol.address, h.alice.address, h.bob.address, h.eur, stale)
        .await;
    assert!(matches!(result, Err(SwapError::AllowanceNotFound)));
}

#[tokio::test]
async fn test_public_spend_moves_disclosed_amount() {
    let mut h = Harness::funded().await;
    let credit = public_credit(&mut h.rng, &h.carol.pk(), 200);
    h.service
        .spend_public(h.swap, h.alice.address, h.carol.address, h.eur, 200, credit)
        .await
        .unwrap();

    assert_eq!(h.balance_of(&h.alice, h.eur).await, 800);
    assert_eq!(h.balance_of(&h.carol, h.eur).await, 200);

    let credit = public_credit(&mut h.rng, &h.carol.pk(), 400);
    let result = h
        .service
        .spend_public(h.swap, h.alice.address, h.carol.address, h.eur, 400, credit)
        .await;
    assert!(matches!(
        result,
        Err(SwapError::InsufficientPublicAllowance { requested: 400, available: 300 })
    ));
}

#[tokio::test]
async fn test_modes_do_not_mix() {
    let mut h = Harness::funded().await;
    approve_carol(&mut h, 500).await;

    let credit = public_credit(&mut h.rng, &h.bob.pk(), 10);
    let result = h
        .service
        .spend_public(h.carol.address, h.alice.address, h.bob.address, h.eur, 10, credit)
        .await;
    assert!(matches!(result, Err(SwapError::AllowanceModeMismatch)));

    // Public allowances are for spenders without a key
    let balance = h.service.read_balance(h.alice.address, h.eur).await.unwrap();
    let proof = h.alice.wallet.prove_public_approve(&balance, 10, 1, h.eur).unwrap();
    let result = h
        .service
        .approve_public(h.alice.address, h.carol.address, h.eur, 10, proof)
        .await;
    assert!(matches!(result, Err(SwapError::SpenderIsRegistered(_))));
}

#[tokio::test]
async fn test_untracked_asset_is_refused() {
    let mut h = Harness::funded().await;
    let gbp = Address::from_label("gbp");
    let balance = h.service.read_balance(h.alice.address, h.eur).await.unwrap();
    let proof = h
        .alice
        .wallet
        .prove_confidential_approve(&mut h.rng, &h.carol.pk(), &h.auditor.public_key, &balance, 10, 0, gbp)
        .unwrap();
    let result = h
        .service
        .approve_confidential(h.alice.address, h.carol.address, gbp, proof)
        .await;
    assert!(matches!(result, Err(SwapError::UnknownAsset(_))));
}
