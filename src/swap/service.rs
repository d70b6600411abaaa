// Async front door that serializes every mutation
// One lock around the engine gives all callers a single total order, so two
// racing acceptances of the same offer resolve to one winner.
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};

use super::engine::SwapEngine;
use super::offer::{Offer, OfferTerms};
use crate::common::SwapEvent;
#[cfg(any(test, feature = "test-helpers"))]
use crate::crypto::{Egct, Pct};
use crate::ledger::{EncryptedAllowance, EncryptedBalance, PublicCredit};
use crate::primitives::{Address, Amount, AssetId, OfferId, Result};
use crate::zkp::{
    CancelAllowanceInputs, CircuitProof, ConfidentialApproveInputs, ConfidentialTransferFromInputs,
    OfferAcceptanceInputs, OfferFinalizationInputs, PublicApproveInputs,
};

#[derive(Clone)]
pub struct SwapService {
    engine: Arc<Mutex<SwapEngine>>,
}

impl SwapService {
    pub fn new(engine: SwapEngine) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
        }
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<SwapEvent> {
        self.engine.lock().await.ledger().events().subscribe()
    }

    pub async fn events(&self) -> Vec<SwapEvent> {
        self.engine.lock().await.ledger().events().history()
    }

    // Offers

    pub async fn initiate_offer(&self, caller: Address, terms: OfferTerms) -> Result<OfferId> {
        self.engine.lock().await.initiate_offer(&caller, terms)
    }

    pub async fn accept_offer(
        &self,
        caller: Address,
        id: OfferId,
        approval: Vec<u8>,
        proof: CircuitProof<OfferAcceptanceInputs>,
    ) -> Result<()> {
        self.engine.lock().await.accept_offer(&caller, id, approval, &proof)
    }

    pub async fn finalize_swap(
        &self,
        caller: Address,
        id: OfferId,
        instructions: Vec<u8>,
        proof: CircuitProof<OfferFinalizationInputs>,
    ) -> Result<()> {
        self.engine
            .lock()
            .await
            .finalize_swap(&caller, id, &instructions, &proof)
    }

    pub async fn cancel_offer(&self, caller: Address, id: OfferId) -> Result<()> {
        self.engine.lock().await.cancel_offer(&caller, id)
    }

    pub async fn get_offer(&self, id: OfferId) -> Result<Offer> {
        self.engine.lock().await.get_offer(id)
    }

    pub async fn next_offer_id(&self) -> Result<OfferId> {
        self.engine.lock().await.next_offer_id()
    }

    // Allowances

    pub async fn approve_confidential(
        &self,
        caller: Address,
        spender: Address,
        asset: AssetId,
        proof: CircuitProof<ConfidentialApproveInputs>,
    ) -> Result<()> {
        self.engine
            .lock()
            .await
            .ledger_mut()
            .approve_confidential(&caller, &caller, &spender, &asset, &proof)
    }

    pub async fn approve_public(
        &self,
        caller: Address,
        spender: Address,
        asset: AssetId,
        amount: Amount,
        proof: CircuitProof<PublicApproveInputs>,
    ) -> Result<()> {
        self.engine
            .lock()
            .await
            .ledger_mut()
            .approve_public(&caller, &caller, &spender, &asset, amount, &proof)
    }

    pub async fn spend_confidential(
        &self,
        caller: Address,
        owner: Address,
        receiver: Address,
        asset: AssetId,
        proof: CircuitProof<ConfidentialTransferFromInputs>,
    ) -> Result<()> {
        self.engine
            .lock()
            .await
            .ledger_mut()
            .spend_confidential(&caller, &owner, &caller, &receiver, &asset, &proof)
    }

    pub async fn spend_public(
        &self,
        caller: Address,
        owner: Address,
        receiver: Address,
        asset: AssetId,
        amount: Amount,
        credit: PublicCredit,
    ) -> Result<()> {
        self.engine
            .lock()
            .await
            .ledger_mut()
            .spend_public(&caller, &owner, &receiver, &asset, amount, &credit)
    }

    pub async fn cancel_allowance(
        &self,
        caller: Address,
        spender: Address,
        asset: AssetId,
        proof: CircuitProof<CancelAllowanceInputs>,
    ) -> Result<()> {
        self.engine
            .lock()
            .await
            .ledger_mut()
            .cancel(&caller, &caller, &spender, &asset, &proof)
    }

    pub async fn get_allowance(&self, owner: Address, spender: Address, asset: AssetId) -> Result<EncryptedAllowance> {
        self.engine.lock().await.ledger().get_allowance(&owner, &spender, &asset)
    }

    // Balances

    pub async fn read_balance(&self, account: Address, asset: AssetId) -> Result<EncryptedBalance> {
        self.engine.lock().await.ledger().read(&account, &asset)
    }

    /// Funding hook for tests. Crediting is internal to the ledger and has
    /// no caller-facing entry point in production builds.
    #[cfg(any(test, feature = "test-helpers"))]
    pub async fn credit(&self, account: Address, asset: AssetId, amount: Egct, pct: Pct) -> Result<()> {
        self.engine
            .lock()
            .await
            .ledger_mut()
            .credit(&account, &asset, &amount, pct)
    }
}
