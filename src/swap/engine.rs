// Offer state machine: Open -> Accepted -> deleted
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::offer::{offer_key, Offer, OfferTerms, TransferInstructions, TransferLeg};
use crate::common::{Clock, SwapEvent};
use crate::ledger::{Changeset, Ledger};
use crate::primitives::{Address, OfferId, Policy, Result, SwapError};
use crate::storage::{read_record, Namespace};
use crate::zkp::{CircuitKind, CircuitProof, OfferAcceptanceInputs, OfferFinalizationInputs};

const NEXT_OFFER_ID_KEY: &[u8] = b"next_offer_id";
const FIRST_OFFER_ID: OfferId = 1;

fn mismatch(what: &str, kind: CircuitKind) -> SwapError {
    debug!("{} public input mismatch: {}", kind, what);
    warn!("❌ Rejected {} proof", kind);
    SwapError::InvalidProof
}

/// Owns the ledger; the swap contract address is the spender that settles
/// finalized offers out of public allowances.
pub struct SwapEngine {
    ledger: Ledger,
    clock: Arc<dyn Clock>,
    swap_address: Address,
}

impl SwapEngine {
    pub fn new(ledger: Ledger, clock: Arc<dyn Clock>, swap_address: Address) -> Self {
        Self {
            ledger,
            clock,
            swap_address,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    pub fn swap_address(&self) -> Address {
        self.swap_address
    }

    pub fn get_offer(&self, id: OfferId) -> Result<Offer> {
        read_record::<Offer>(self.ledger.store().as_ref(), Namespace::Offers, &offer_key(id))?
            .ok_or(SwapError::OfferNotFound(id))
    }

    /// Id the next initiated offer will receive
    pub fn next_offer_id(&self) -> Result<OfferId> {
        Ok(
            read_record::<OfferId>(self.ledger.store().as_ref(), Namespace::Meta, NEXT_OFFER_ID_KEY)?
                .unwrap_or(FIRST_OFFER_ID),
        )
    }

    /// Every live offer, by id
    pub fn offers(&self) -> Result<Vec<Offer>> {
        self.ledger
            .store()
            .scan(Namespace::Offers)?
            .into_iter()
            .map(|(_, bytes)| -> Result<Offer> { Ok(bincode::deserialize(&bytes)?) })
            .collect()
    }

    pub fn initiate_offer(&mut self, caller: &Address, terms: OfferTerms) -> Result<OfferId> {
        if !self.ledger.registry().is_registered(caller) {
            return Err(SwapError::NotRegistered(*caller));
        }
        if terms.rate == 0 || terms.rate > Policy::max_rate() {
            return Err(SwapError::InvalidRate);
        }
        if terms.max_amount_to_sell == 0 || terms.min_amount_to_sell > terms.max_amount_to_sell {
            return Err(SwapError::InvalidAmountBounds {
                min: terms.min_amount_to_sell,
                max: terms.max_amount_to_sell,
            });
        }

        let store = self.ledger.store();
        let mut changes = Changeset::new(store.as_ref());
        let id = changes
            .txn
            .get::<OfferId>(Namespace::Meta, NEXT_OFFER_ID_KEY)?
            .unwrap_or(FIRST_OFFER_ID);
        let offer = Offer::new(id, *caller, terms);

        changes.txn.put(Namespace::Offers, offer_key(id), &offer)?;
        changes.txn.put(Namespace::Meta, NEXT_OFFER_ID_KEY.to_vec(), &(id + 1))?;
        changes.emit(SwapEvent::OfferCreated {
            id,
            initiator: offer.initiator,
            asset_buy: offer.asset_buy,
            asset_sell: offer.asset_sell,
            rate: offer.rate,
            max_amount_to_sell: offer.max_amount_to_sell,
        });
        changes.commit(self.ledger.events())?;

        info!("📝 Offer {} created by {} (max {}, rate {})", id, caller, offer.max_amount_to_sell, offer.rate);
        Ok(id)
    }

    pub fn accept_offer(
        &mut self,
        caller: &Address,
        id: OfferId,
        approval: Vec<u8>,
        proof: &CircuitProof<OfferAcceptanceInputs>,
    ) -> Result<()> {
        let mut offer = self.get_offer(id)?;
        if offer.acceptor.is_some() {
            return Err(SwapError::OfferAlreadyAccepted(id));
        }
        let acceptor_pk = self.ledger.registry().require_key(caller)?;
        if offer.is_expired(self.clock.now()) {
            return Err(SwapError::OfferExpired(id));
        }

        // The initiator must have backed the offer with spendable funds
        if self.ledger.is_tracked(&offer.asset_sell)? {
            let allowance = self
                .ledger
                .get_allowance(&offer.initiator, &self.swap_address, &offer.asset_sell)?;
            let available = if allowance.is_public { allowance.public_amount } else { 0 };
            if available < offer.max_amount_to_sell {
                return Err(SwapError::InsufficientPublicAllowance {
                    requested: offer.max_amount_to_sell,
                    available,
                });
            }
        }

        let kind = CircuitKind::OfferAcceptance;
        let inputs = &proof.inputs;
        let initiator_pk = self
            .ledger
            .registry()
            .public_key(&offer.initiator)
            .ok_or_else(|| mismatch("initiator key", kind))?;
        if inputs.acceptor_pk != acceptor_pk || inputs.initiator_pk != initiator_pk {
            return Err(mismatch("party keys", kind));
        }
        if inputs.max_amount_to_sell != offer.max_amount_to_sell || inputs.rate != offer.rate {
            return Err(mismatch("offer terms", kind));
        }
        self.ledger.verify_proof(proof)?;

        offer.accept(*caller, &inputs.amount_to_buy, approval);

        let store = self.ledger.store();
        let mut changes = Changeset::new(store.as_ref());
        changes.txn.put(Namespace::Offers, offer_key(id), &offer)?;
        changes.emit(SwapEvent::OfferAccepted { id, acceptor: *caller });
        changes.commit(self.ledger.events())?;

        info!("🤝 Offer {} accepted by {}", id, caller);
        Ok(())
    }

    pub fn finalize_swap(
        &mut self,
        caller: &Address,
        id: OfferId,
        instructions: &[u8],
        proof: &CircuitProof<OfferFinalizationInputs>,
    ) -> Result<()> {
        let offer = self.get_offer(id)?;
        let acceptor = offer.acceptor.ok_or(SwapError::OfferNotAccepted(id))?;
        if !offer.is_participant(caller) {
            return Err(SwapError::NotOfferParticipant(id));
        }
        if proof.is_empty() {
            return Err(SwapError::EmptyProof);
        }

        let kind = CircuitKind::OfferFinalization;
        let inputs = &proof.inputs;
        let registry = self.ledger.registry();
        let initiator_pk = registry
            .public_key(&offer.initiator)
            .ok_or_else(|| mismatch("initiator key", kind))?;
        let acceptor_pk = registry
            .public_key(&acceptor)
            .ok_or_else(|| mismatch("acceptor key", kind))?;
        if inputs.initiator_pk != initiator_pk || inputs.acceptor_pk != acceptor_pk {
            return Err(mismatch("party keys", kind));
        }
        if offer.amount_to_buy_commitment.as_deref() != Some(inputs.amount_to_buy.to_bytes().as_slice()) {
            return Err(mismatch("buy commitment", kind));
        }
        if inputs.rate != offer.rate {
            return Err(mismatch("rate", kind));
        }
        self.ledger.verify_proof(proof)?;

        let store = self.ledger.store();
        let mut changes = Changeset::new(store.as_ref());
        // Gone before any leg runs
        changes.txn.delete(Namespace::Offers, offer_key(id));

        if !instructions.is_empty() {
            let instructions = TransferInstructions::decode(instructions)?;
            self.stage_leg(&mut changes, &instructions.sell_leg, &offer.asset_sell, &offer.initiator, &acceptor)?;
            self.stage_leg(&mut changes, &instructions.buy_leg, &offer.asset_buy, &acceptor, &offer.initiator)?;
        }

        changes.emit(SwapEvent::OfferFinalized { id, caller: *caller });
        changes.commit(self.ledger.events())?;

        info!("✅ Offer {} finalized by {}", id, caller);
        Ok(())
    }

    fn stage_leg(
        &self,
        changes: &mut Changeset<'_>,
        leg: &TransferLeg,
        expected_asset: &Address,
        from: &Address,
        to: &Address,
    ) -> Result<()> {
        if leg.is_skipped() {
            debug!("Settlement leg {} -> {} skipped", from, to);
            return Ok(());
        }
        if leg.asset != *expected_asset {
            return Err(SwapError::InvalidTransferInstructions(format!(
                "leg asset {} does not match offer asset {}",
                leg.asset, expected_asset
            )));
        }
        self.ledger
            .stage_spend_public(changes, &self.swap_address, from, to, &leg.asset, leg.amount, &leg.credit)
    }

    /// Withdraw an offer nobody has accepted yet
    pub fn cancel_offer(&mut self, caller: &Address, id: OfferId) -> Result<()> {
        let offer = self.get_offer(id)?;
        if offer.initiator != *caller {
            return Err(SwapError::Unauthorized(*caller));
        }
        if offer.acceptor.is_some() {
            return Err(SwapError::OfferAlreadyAccepted(id));
        }

        let store = self.ledger.store();
        let mut changes = Changeset::new(store.as_ref());
        changes.txn.delete(Namespace::Offers, offer_key(id));
        changes.emit(SwapEvent::OfferCancelled { id });
        changes.commit(self.ledger.events())?;

        info!("🗑️ Offer {} cancelled", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{FixedClock, MemoryRegistry};
    use crate::crypto::{encrypt, random_scalar, KeyPair};
    use crate::storage::MemoryStore;
    use crate::zkp::mock_backend::transcript_verifiers;
    use crate::test_helpers::test_rng;

    fn engine() -> (SwapEngine, Address, KeyPair) {
        let mut rng = test_rng();
        let registry = Arc::new(MemoryRegistry::new());
        let alice = Address::from_label("alice");
        let keys = KeyPair::generate(&mut rng);
        registry.register(alice, keys.public_key).unwrap();
        let ledger = Ledger::new(
            Arc::new(MemoryStore::new()),
            registry,
            Arc::new(transcript_verifiers()),
            KeyPair::generate(&mut rng).public_key,
        );
        let engine = SwapEngine::new(ledger, Arc::new(FixedClock::new(0)), Address::from_label("swap"));
        (engine, alice, keys)
    }

    fn terms(max: u128, min: u128, rate: u128) -> OfferTerms {
        OfferTerms {
            asset_buy: Address::from_label("usd"),
            asset_sell: Address::from_label("eur"),
            rate,
            max_amount_to_sell: max,
            min_amount_to_sell: min,
            expires_at: None,
            approval: Vec::new(),
        }
    }

    #[test]
    fn test_initiate_validates_terms() {
        let (mut engine, alice, _) = engine();
        assert!(matches!(
            engine.initiate_offer(&alice, terms(500, 0, 0)),
            Err(SwapError::InvalidRate)
        ));
        assert!(matches!(
            engine.initiate_offer(&alice, terms(500, 0, Policy::max_rate() + 1)),
            Err(SwapError::InvalidRate)
        ));
        assert!(matches!(
            engine.initiate_offer(&alice, terms(0, 0, 1)),
            Err(SwapError::InvalidAmountBounds { .. })
        ));
        assert!(matches!(
            engine.initiate_offer(&alice, terms(10, 11, 1)),
            Err(SwapError::InvalidAmountBounds { min: 11, max: 10 })
        ));
        assert!(matches!(
            engine.initiate_offer(&Address::from_label("mallory"), terms(10, 0, 1)),
            Err(SwapError::NotRegistered(_))
        ));
        assert_eq!(engine.next_offer_id().unwrap(), FIRST_OFFER_ID);
    }

    #[test]
    fn test_offer_ids_are_never_reused() {
        let (mut engine, alice, _) = engine();
        let first = engine.initiate_offer(&alice, terms(10, 0, 1)).unwrap();
        engine.cancel_offer(&alice, first).unwrap();
        let second = engine.initiate_offer(&alice, terms(10, 0, 1)).unwrap();

        assert_eq!(second, first + 1);
        assert!(matches!(engine.get_offer(first), Err(SwapError::OfferNotFound(_))));
        assert_eq!(engine.offers().unwrap().len(), 1);
    }

    #[test]
    fn test_cancel_offer_requires_initiator() {
        let (mut engine, alice, _) = engine();
        let id = engine.initiate_offer(&alice, terms(10, 0, 1)).unwrap();
        assert!(matches!(
            engine.cancel_offer(&Address::from_label("bob"), id),
            Err(SwapError::Unauthorized(_))
        ));
        assert!(engine.get_offer(id).is_ok());
    }

    #[test]
    fn test_accept_rejects_mismatched_terms() {
        let mut rng = test_rng();
        let (mut engine, alice, alice_keys) = engine();
        let bob = Address::from_label("bob");
        let bob_keys = KeyPair::generate(&mut rng);
        // Bob never registered with the engine
        let id = engine.initiate_offer(&alice, terms(500, 0, 3 * Policy::PRECISION)).unwrap();

        let inputs = OfferAcceptanceInputs {
            acceptor_pk: bob_keys.public_key,
            initiator_pk: alice_keys.public_key,
            amount_to_buy: encrypt(&alice_keys.public_key, 300, &random_scalar(&mut rng)),
            max_amount_to_sell: 500,
            rate: 3 * Policy::PRECISION,
        };
        let proof = CircuitProof::new(vec![1], inputs);
        assert!(matches!(
            engine.accept_offer(&bob, id, Vec::new(), &proof),
            Err(SwapError::NotRegistered(_))
        ));
        assert_eq!(engine.get_offer(id).unwrap().acceptor, None);
    }

    #[test]
    fn test_finalize_requires_acceptance() {
        let (mut engine, alice, alice_keys) = engine();
        let id = engine.initiate_offer(&alice, terms(500, 0, 1)).unwrap();
        let inputs = OfferFinalizationInputs {
            initiator_pk: alice_keys.public_key,
            acceptor_pk: alice_keys.public_key,
            amount_to_buy: crate::crypto::Egct::zero(),
            sell_amount: crate::crypto::Egct::zero(),
            rate: 1,
        };
        assert!(matches!(
            engine.finalize_swap(&alice, id, &[], &CircuitProof::new(Vec::new(), inputs)),
            Err(SwapError::OfferNotAccepted(_))
        ));
    }
}
