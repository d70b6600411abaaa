// Shared harness: three registered parties, two tracked assets, transcript proofs
#![allow(dead_code)]

use std::sync::Arc;

use ark_std::rand::rngs::StdRng;
use confidential_swap::test_helpers::test_rng;
use confidential_swap::wallet::{exact_sell_amount, public_credit};
use confidential_swap::zkp::mock_backend::{transcript_verifiers, TranscriptBackend};
use confidential_swap::*;

pub struct Party {
    pub address: Address,
    pub wallet: Wallet<TranscriptBackend>,
}

impl Party {
    fn new(label: &str, rng: &mut StdRng, registry: &MemoryRegistry) -> Self {
        let wallet = Wallet::new(KeyPair::generate(rng), TranscriptBackend).with_dlog_bound(1 << 16);
        let address = Address::from_label(label);
        registry.register(address, wallet.public_key()).unwrap();
        Self { address, wallet }
    }

    pub fn pk(&self) -> Point {
        self.wallet.public_key()
    }
}

pub struct Harness {
    pub service: SwapService,
    pub clock: Arc<FixedClock>,
    pub auditor: KeyPair,
    pub swap: Address,
    pub eur: AssetId,
    pub usd: AssetId,
    pub alice: Party,
    pub bob: Party,
    pub carol: Party,
    pub rng: StdRng,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn StateStore>) -> Self {
        let mut rng = test_rng();
        let registry = Arc::new(MemoryRegistry::new());
        let alice = Party::new("alice", &mut rng, &registry);
        let bob = Party::new("bob", &mut rng, &registry);
        let carol = Party::new("carol", &mut rng, &registry);
        let auditor = KeyPair::generate(&mut rng);

        let eur = Address::from_label("eur");
        let usd = Address::from_label("usd");
        let mut ledger = Ledger::new(store, registry, Arc::new(transcript_verifiers()), auditor.public_key);
        ledger.track_asset(eur).unwrap();
        ledger.track_asset(usd).unwrap();

        let clock = Arc::new(FixedClock::new(0));
        let swap = Address::from_label("swap-contract");
        let service = SwapService::new(SwapEngine::new(ledger, clock.clone(), swap));

        Self {
            service,
            clock,
            auditor,
            swap,
            eur,
            usd,
            alice,
            bob,
            carol,
            rng,
        }
    }

    pub async fn fund(&mut self, who: Address, pk: Point, asset: AssetId, amount: Amount) {
        let credit = public_credit(&mut self.rng, &pk, amount);
        self.service
            .credit(who, asset, credit.ciphertext, credit.pct)
            .await
            .unwrap();
    }

    pub async fn balance_of(&self, party: &Party, asset: AssetId) -> Amount {
        let balance = self.service.read_balance(party.address, asset).await.unwrap();
        party.wallet.decrypt_balance(&balance).unwrap()
    }

    /// Owner backs the swap contract with a public allowance
    pub async fn approve_swap(&self, owner: &Party, asset: AssetId, amount: Amount) {
        let balance = self.service.read_balance(owner.address, asset).await.unwrap();
        let nonce = self
            .service
            .get_allowance(owner.address, self.swap, asset)
            .await
            .unwrap()
            .nonce;
        let proof = owner
            .wallet
            .prove_public_approve(&balance, amount, nonce, asset)
            .unwrap();
        self.service
            .approve_public(owner.address, self.swap, asset, amount, proof)
            .await
            .unwrap();
    }

    pub fn terms(&self, max: Amount, rate: u128) -> OfferTerms {
        OfferTerms {
            asset_buy: self.usd,
            asset_sell: self.eur,
            rate,
            max_amount_to_sell: max,
            min_amount_to_sell: 0,
            expires_at: None,
            approval: b"alice-approval".to_vec(),
        }
    }

    /// Alice holds 1000 EUR and Bob 1000 USD, both backing the swap contract
    pub async fn funded() -> Self {
        let mut h = Self::new();
        let (alice, alice_pk, bob, bob_pk, eur, usd) =
            (h.alice.address, h.alice.pk(), h.bob.address, h.bob.pk(), h.eur, h.usd);
        h.fund(alice, alice_pk, eur, 1_000).await;
        h.fund(bob, bob_pk, usd, 1_000).await;
        h.approve_swap(&h.alice, eur, 500).await;
        h.approve_swap(&h.bob, usd, 500).await;
        h
    }

    pub async fn accepted_offer(&mut self, amount_to_buy: Amount) -> OfferId {
        let id = self
            .service
            .initiate_offer(self.alice.address, self.terms(500, 3 * Policy::PRECISION))
            .await
            .unwrap();
        let offer = self.service.get_offer(id).await.unwrap();
        let proof = self
            .bob
            .wallet
            .prove_acceptance(&mut self.rng, &offer, &self.alice.pk(), amount_to_buy)
            .unwrap();
        self.service
            .accept_offer(self.bob.address, id, b"bob-approval".to_vec(), proof)
            .await
            .unwrap();
        id
    }

    /// Alice's finalization proof and the matching settlement legs
    pub async fn finalization(
        &mut self,
        id: OfferId,
    ) -> (CircuitProof<zkp::OfferFinalizationInputs>, TransferInstructions) {
        let offer = self.service.get_offer(id).await.unwrap();
        let amount_to_buy = self.alice.wallet.read_amount_to_buy(&offer).unwrap();
        let sell_amount = exact_sell_amount(amount_to_buy, offer.rate).unwrap();
        let proof = self
            .alice
            .wallet
            .prove_finalization(&mut self.rng, &offer, &self.bob.pk(), sell_amount)
            .unwrap();
        let instructions = TransferInstructions {
            sell_leg: TransferLeg::new(
                self.eur,
                sell_amount,
                public_credit(&mut self.rng, &self.bob.pk(), sell_amount),
            ),
            buy_leg: TransferLeg::new(
                self.usd,
                amount_to_buy,
                public_credit(&mut self.rng, &self.alice.pk(), amount_to_buy),
            ),
        };
        (proof, instructions)
    }
}
