// Ledger state across a sled reopen
mod common;

use std::sync::Arc;

use common::Harness;
use confidential_swap::*;
use tempfile::TempDir;

#[tokio::test]
async fn test_offers_and_balances_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state");

    let id = {
        let store = Arc::new(SledStore::new(&path).unwrap());
        let mut h = Harness::with_store(store.clone());
        let (alice, alice_pk, eur) = (h.alice.address, h.alice.pk(), h.eur);
        h.fund(alice, alice_pk, eur, 1_000).await;
        h.approve_swap(&h.alice, eur, 500).await;
        let id = h.accepted_offer(300).await;
        store.flush().unwrap();
        id
    };

    let store = Arc::new(SledStore::new(&path).unwrap());
    let stats = store.stats().unwrap();
    assert_eq!(stats.offers, 1);
    assert_eq!(stats.allowances, 1);

    let h = Harness::with_store(store);
    let offer = h.service.get_offer(id).await.unwrap();
    assert_eq!(offer.state(), OfferState::Accepted);
    assert_eq!(h.alice.wallet.read_amount_to_buy(&offer).unwrap(), 300);
    assert_eq!(h.service.next_offer_id().await.unwrap(), id + 1);
    assert_eq!(h.balance_of(&h.alice, h.eur).await, 1_000);

    let allowance = h.service.get_allowance(h.alice.address, h.swap, h.eur).await.unwrap();
    assert_eq!(allowance.public_amount, 500);
}

#[tokio::test]
async fn test_failed_operation_leaves_disk_untouched() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SledStore::new(dir.path().join("state")).unwrap());
    let mut h = Harness::with_store(store.clone());
    let (alice, alice_pk, eur) = (h.alice.address, h.alice.pk(), h.eur);
    h.fund(alice, alice_pk, eur, 1_000).await;
    h.approve_swap(&h.alice, eur, 500).await;
    let before = store.scan(storage::Namespace::Balances).unwrap();

    let credit = wallet::public_credit(&mut h.rng, &h.bob.pk(), 600);
    let result = h.service.spend_public(h.swap, alice, h.bob.address, eur, 600, credit).await;
    assert!(matches!(result, Err(SwapError::InsufficientPublicAllowance { .. })));
    assert_eq!(store.scan(storage::Namespace::Balances).unwrap(), before);
}
