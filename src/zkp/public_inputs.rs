// Typed public inputs, one struct per circuit
// Field order here is the order the circuits allocate their inputs and the
// order the verifier receives them.

use serde::{Deserialize, Serialize};

use super::CircuitKind;
use crate::crypto::{BaseField, Egct, Pct, Point};
use crate::primitives::{Address, Amount};

/// Public inputs of one circuit, with a fixed arity
pub trait PublicInputs: Clone + std::fmt::Debug + Serialize + for<'de> Deserialize<'de> {
    const KIND: CircuitKind;
    const ARITY: usize;

    fn to_fields(&self) -> Vec<BaseField>;
}

/// Proof bytes bound to the typed public inputs they were generated for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitProof<P> {
    pub proof: Vec<u8>,
    pub inputs: P,
}

impl<P: PublicInputs> CircuitProof<P> {
    pub fn new(proof: Vec<u8>, inputs: P) -> Self {
        Self { proof, inputs }
    }

    pub fn kind(&self) -> CircuitKind {
        P::KIND
    }

    pub fn is_empty(&self) -> bool {
        self.proof.is_empty()
    }
}

/// An address is bound as a field element; the engine compares encodings
fn address_field(address: &Address) -> BaseField {
    address.to_field()
}

/// Confidential approve: 30 inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidentialApproveInputs {
    pub owner_pk: Point,
    pub spender_pk: Point,
    pub auditor_pk: Point,
    pub owner_balance: Egct,
    pub allowance: Egct,
    pub spender_pct: Pct,
    pub auditor_pct: Pct,
    pub allowance_nonce: u64,
    pub asset: Address,
}

impl PublicInputs for ConfidentialApproveInputs {
    const KIND: CircuitKind = CircuitKind::ConfidentialApprove;
    const ARITY: usize = 30;

    fn to_fields(&self) -> Vec<BaseField> {
        let mut fields = Vec::with_capacity(Self::ARITY);
        fields.extend(self.owner_pk.to_fields());
        fields.extend(self.spender_pk.to_fields());
        fields.extend(self.auditor_pk.to_fields());
        fields.extend(self.owner_balance.to_fields());
        fields.extend(self.allowance.to_fields());
        fields.extend(self.spender_pct.to_fields());
        fields.extend(self.auditor_pct.to_fields());
        fields.push(BaseField::from(self.allowance_nonce));
        fields.push(address_field(&self.asset));
        fields
    }
}

/// Public approve: 9 inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicApproveInputs {
    pub owner_pk: Point,
    pub owner_balance: Egct,
    pub amount: Amount,
    pub allowance_nonce: u64,
    pub asset: Address,
}

impl PublicInputs for PublicApproveInputs {
    const KIND: CircuitKind = CircuitKind::PublicApprove;
    const ARITY: usize = 9;

    fn to_fields(&self) -> Vec<BaseField> {
        let mut fields = Vec::with_capacity(Self::ARITY);
        fields.extend(self.owner_pk.to_fields());
        fields.extend(self.owner_balance.to_fields());
        fields.push(BaseField::from(self.amount));
        fields.push(BaseField::from(self.allowance_nonce));
        fields.push(address_field(&self.asset));
        fields
    }
}

/// Confidential transferFrom: 34 inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidentialTransferFromInputs {
    pub spender_pk: Point,
    pub receiver_pk: Point,
    pub auditor_pk: Point,
    pub prior_allowance: Egct,
    pub new_allowance: Egct,
    pub receiver_amount: Egct,
    pub receiver_pct: Pct,
    pub auditor_pct: Pct,
    pub allowance_nonce: u64,
    pub asset: Address,
}

impl PublicInputs for ConfidentialTransferFromInputs {
    const KIND: CircuitKind = CircuitKind::ConfidentialTransferFrom;
    const ARITY: usize = 34;

    fn to_fields(&self) -> Vec<BaseField> {
        let mut fields = Vec::with_capacity(Self::ARITY);
        fields.extend(self.spender_pk.to_fields());
        fields.extend(self.receiver_pk.to_fields());
        fields.extend(self.auditor_pk.to_fields());
        fields.extend(self.prior_allowance.to_fields());
        fields.extend(self.new_allowance.to_fields());
        fields.extend(self.receiver_amount.to_fields());
        fields.extend(self.receiver_pct.to_fields());
        fields.extend(self.auditor_pct.to_fields());
        fields.push(BaseField::from(self.allowance_nonce));
        fields.push(address_field(&self.asset));
        fields
    }
}

/// Cancel allowance: 8 inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelAllowanceInputs {
    pub owner_pk: Point,
    pub allowance: Egct,
    pub allowance_nonce: u64,
    pub spender: Address,
}

impl PublicInputs for CancelAllowanceInputs {
    const KIND: CircuitKind = CircuitKind::CancelAllowance;
    const ARITY: usize = 8;

    fn to_fields(&self) -> Vec<BaseField> {
        let mut fields = Vec::with_capacity(Self::ARITY);
        fields.extend(self.owner_pk.to_fields());
        fields.extend(self.allowance.to_fields());
        fields.push(BaseField::from(self.allowance_nonce));
        fields.push(address_field(&self.spender));
        fields
    }
}

/// Offer acceptance: 10 inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferAcceptanceInputs {
    pub acceptor_pk: Point,
    pub initiator_pk: Point,
    pub amount_to_buy: Egct,
    pub max_amount_to_sell: Amount,
    pub rate: u128,
}

impl PublicInputs for OfferAcceptanceInputs {
    const KIND: CircuitKind = CircuitKind::OfferAcceptance;
    const ARITY: usize = 10;

    fn to_fields(&self) -> Vec<BaseField> {
        let mut fields = Vec::with_capacity(Self::ARITY);
        fields.extend(self.acceptor_pk.to_fields());
        fields.extend(self.initiator_pk.to_fields());
        fields.extend(self.amount_to_buy.to_fields());
        fields.push(BaseField::from(self.max_amount_to_sell));
        fields.push(BaseField::from(self.rate));
        fields
    }
}

/// Offer finalization: 13 inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferFinalizationInputs {
    pub initiator_pk: Point,
    pub acceptor_pk: Point,
    pub amount_to_buy: Egct,
    pub sell_amount: Egct,
    pub rate: u128,
}

impl PublicInputs for OfferFinalizationInputs {
    const KIND: CircuitKind = CircuitKind::OfferFinalization;
    const ARITY: usize = 13;

    fn to_fields(&self) -> Vec<BaseField> {
        let mut fields = Vec::with_capacity(Self::ARITY);
        fields.extend(self.initiator_pk.to_fields());
        fields.extend(self.acceptor_pk.to_fields());
        fields.extend(self.amount_to_buy.to_fields());
        fields.extend(self.sell_amount.to_fields());
        fields.push(BaseField::from(self.rate));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{encrypt, random_scalar, KeyPair};
    use crate::test_helpers::test_rng;

    #[test]
    fn test_offer_acceptance_arity() {
        let mut rng = test_rng();
        let acceptor = KeyPair::generate(&mut rng);
        let initiator = KeyPair::generate(&mut rng);
        let inputs = OfferAcceptanceInputs {
            acceptor_pk: acceptor.public_key,
            initiator_pk: initiator.public_key,
            amount_to_buy: encrypt(&initiator.public_key, 300, &random_scalar(&mut rng)),
            max_amount_to_sell: 500,
            rate: 3 * crate::primitives::Policy::PRECISION,
        };

        let fields = inputs.to_fields();
        assert_eq!(fields.len(), OfferAcceptanceInputs::ARITY);
        assert_eq!(fields[8], BaseField::from(500u128));
    }

    #[test]
    fn test_cancel_inputs_bind_nonce() {
        let base = CancelAllowanceInputs {
            owner_pk: Point::generator(),
            allowance: Egct::zero(),
            allowance_nonce: 1,
            spender: Address::from_label("spender"),
        };
        let mut bumped = base.clone();
        bumped.allowance_nonce = 2;
        assert_ne!(base.to_fields(), bumped.to_fields());
    }
}
