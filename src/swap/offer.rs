// Offer record and settlement instructions
use serde::{Deserialize, Serialize};

use crate::crypto::{Egct, Pct, ScalarField};
use crate::ledger::PublicCredit;
use crate::primitives::{Address, Amount, AssetId, OfferId, Result, SwapError, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferState {
    Open,
    Accepted,
}

/// Terms the initiator proposes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferTerms {
    pub asset_buy: AssetId,
    pub asset_sell: AssetId,
    /// Fixed point, scaled by `Policy::PRECISION`
    pub rate: u128,
    pub max_amount_to_sell: Amount,
    pub min_amount_to_sell: Amount,
    pub expires_at: Option<Timestamp>,
    /// Kept verbatim, never interpreted
    pub approval: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub initiator: Address,
    pub acceptor: Option<Address>,
    pub asset_buy: AssetId,
    pub asset_sell: AssetId,
    pub rate: u128,
    pub max_amount_to_sell: Amount,
    pub min_amount_to_sell: Amount,
    pub expires_at: Option<Timestamp>,
    /// Byte encoding of the buy-amount ciphertext recorded at acceptance
    pub amount_to_buy_commitment: Option<Vec<u8>>,
    pub initiator_approval: Vec<u8>,
    pub acceptor_approval: Vec<u8>,
}

impl Offer {
    pub fn new(id: OfferId, initiator: Address, terms: OfferTerms) -> Self {
        Self {
            id,
            initiator,
            acceptor: None,
            asset_buy: terms.asset_buy,
            asset_sell: terms.asset_sell,
            rate: terms.rate,
            max_amount_to_sell: terms.max_amount_to_sell,
            min_amount_to_sell: terms.min_amount_to_sell,
            expires_at: terms.expires_at,
            amount_to_buy_commitment: None,
            initiator_approval: terms.approval,
            acceptor_approval: Vec::new(),
        }
    }

    pub fn state(&self) -> OfferState {
        if self.acceptor.is_some() {
            OfferState::Accepted
        } else {
            OfferState::Open
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        matches!(self.expires_at, Some(deadline) if now > deadline)
    }

    pub fn is_participant(&self, account: &Address) -> bool {
        self.initiator == *account || self.acceptor.as_ref() == Some(account)
    }

    pub fn accept(&mut self, acceptor: Address, amount_to_buy: &Egct, approval: Vec<u8>) {
        self.acceptor = Some(acceptor);
        self.amount_to_buy_commitment = Some(amount_to_buy.to_bytes());
        self.acceptor_approval = approval;
    }

    /// Stored buy-amount commitment, if accepted
    pub fn amount_to_buy(&self) -> Option<Egct> {
        self.amount_to_buy_commitment
            .as_deref()
            .and_then(Egct::from_bytes)
    }
}

pub fn offer_key(id: OfferId) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

/// One settlement leg. A zero asset means the leg is settled elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLeg {
    pub asset: AssetId,
    pub amount: Amount,
    pub credit: PublicCredit,
}

impl TransferLeg {
    pub fn new(asset: AssetId, amount: Amount, credit: PublicCredit) -> Self {
        Self { asset, amount, credit }
    }

    pub fn skipped() -> Self {
        Self {
            asset: Address::zero(),
            amount: 0,
            credit: PublicCredit {
                ciphertext: Egct::zero(),
                randomness: ScalarField::from(0u64),
                pct: Pct::default(),
            },
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.asset.is_zero()
    }
}

/// Settlement of a finalized offer: the initiator's asset to the acceptor
/// and the acceptor's asset to the initiator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInstructions {
    pub sell_leg: TransferLeg,
    pub buy_leg: TransferLeg,
}

impl TransferInstructions {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| SwapError::InvalidTransferInstructions(format!("undecodable: {}", e)))
    }
}
