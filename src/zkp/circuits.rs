// ZK circuits for confidential allowances and P2P swap offers
// Every circuit allocates its public inputs first, in the order of the
// matching `*Inputs::to_fields`, then its witness.
use ark_r1cs_std::{fields::fp::FpVar, prelude::*};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use super::gadgets::{
    enforce_elgamal_decryption, enforce_elgamal_encryption, enforce_key_ownership, enforce_le,
    enforce_pct_encryption, input_egct, input_field, input_pct, input_point, range_bits,
    witness_field,
};
use super::public_inputs::{
    CancelAllowanceInputs, ConfidentialApproveInputs, ConfidentialTransferFromInputs,
    OfferAcceptanceInputs, OfferFinalizationInputs, PublicApproveInputs,
};
use crate::crypto::keys::scalar_to_base;
use crate::crypto::{poseidon_config, BaseField, ScalarField, SecretKey};
use crate::primitives::{Amount, Policy};

fn amount_field(amount: Amount) -> BaseField {
    BaseField::from(amount)
}

fn witness_bits(
    cs: ConstraintSystemRef<BaseField>,
    value: Option<BaseField>,
) -> Result<Vec<Boolean<BaseField>>, SynthesisError> {
    witness_field(cs, value)?.to_bits_le()
}

fn secret_bits(
    cs: ConstraintSystemRef<BaseField>,
    sk: Option<&SecretKey>,
) -> Result<Vec<Boolean<BaseField>>, SynthesisError> {
    witness_bits(cs, sk.map(SecretKey::to_base_field))
}

fn randomness_bits(
    cs: ConstraintSystemRef<BaseField>,
    r: Option<&ScalarField>,
) -> Result<Vec<Boolean<BaseField>>, SynthesisError> {
    witness_bits(cs, r.map(scalar_to_base))
}

/// Private side of a confidential approval
#[derive(Clone, Debug)]
pub struct ConfidentialApproveWitness {
    pub amount: Amount,
    pub owner_sk: SecretKey,
    pub owner_balance: Amount,
    pub allowance_randomness: ScalarField,
    pub spender_pct_randomness: ScalarField,
    pub auditor_pct_randomness: ScalarField,
}

/// Owner proves it holds the key for its balance, that the balance covers
/// the approved amount, and that the allowance ciphertext and both PCTs
/// all carry that amount.
#[derive(Clone)]
pub struct ConfidentialApproveCircuit {
    pub inputs: Option<ConfidentialApproveInputs>,
    pub witness: Option<ConfidentialApproveWitness>,
}

impl ConfidentialApproveCircuit {
    pub fn new(inputs: ConfidentialApproveInputs, witness: ConfidentialApproveWitness) -> Self {
        Self {
            inputs: Some(inputs),
            witness: Some(witness),
        }
    }

    pub fn empty() -> Self {
        Self {
            inputs: None,
            witness: None,
        }
    }
}

impl ConstraintSynthesizer<BaseField> for ConfidentialApproveCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<BaseField>) -> Result<(), SynthesisError> {
        let inputs = self.inputs.as_ref();
        let witness = self.witness.as_ref();

        let owner_pk = input_point(cs.clone(), inputs.map(|i| i.owner_pk))?;
        let spender_pk = input_point(cs.clone(), inputs.map(|i| i.spender_pk))?;
        let auditor_pk = input_point(cs.clone(), inputs.map(|i| i.auditor_pk))?;
        let balance_ct = input_egct(cs.clone(), inputs.map(|i| i.owner_balance))?;
        let allowance_ct = input_egct(cs.clone(), inputs.map(|i| i.allowance))?;
        let spender_pct = input_pct(cs.clone(), inputs.map(|i| i.spender_pct))?;
        let auditor_pct = input_pct(cs.clone(), inputs.map(|i| i.auditor_pct))?;
        // Bound to the proof only; replay is stopped by the ledger nonce
        let _nonce = input_field(cs.clone(), inputs.map(|i| BaseField::from(i.allowance_nonce)))?;
        let _asset = input_field(cs.clone(), inputs.map(|i| i.asset.to_field()))?;

        let amount = witness_field(cs.clone(), witness.map(|w| amount_field(w.amount)))?;
        let balance = witness_field(cs.clone(), witness.map(|w| amount_field(w.owner_balance)))?;
        let sk_bits = secret_bits(cs.clone(), witness.map(|w| &w.owner_sk))?;
        let allowance_r = randomness_bits(cs.clone(), witness.map(|w| &w.allowance_randomness))?;
        let spender_r = randomness_bits(cs.clone(), witness.map(|w| &w.spender_pct_randomness))?;
        let auditor_r = randomness_bits(cs.clone(), witness.map(|w| &w.auditor_pct_randomness))?;

        let amount_bits = range_bits(&amount, Policy::AMOUNT_BITS)?;
        let balance_bits = range_bits(&balance, Policy::AMOUNT_BITS)?;
        enforce_le(&amount, &balance, Policy::AMOUNT_BITS)?;

        enforce_key_ownership(&owner_pk, &sk_bits)?;
        enforce_elgamal_decryption(&sk_bits, &balance_bits, &balance_ct)?;
        enforce_elgamal_encryption(&spender_pk, &amount_bits, &allowance_r, &allowance_ct)?;

        let params = poseidon_config();
        enforce_pct_encryption(cs.clone(), params, &spender_pk, &amount, &spender_r, &spender_pct)?;
        enforce_pct_encryption(cs, params, &auditor_pk, &amount, &auditor_r, &auditor_pct)?;

        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct PublicApproveWitness {
    pub owner_sk: SecretKey,
    pub owner_balance: Amount,
}

/// Owner proves its encrypted balance covers a plaintext allowance
#[derive(Clone)]
pub struct PublicApproveCircuit {
    pub inputs: Option<PublicApproveInputs>,
    pub witness: Option<PublicApproveWitness>,
}

impl PublicApproveCircuit {
    pub fn new(inputs: PublicApproveInputs, witness: PublicApproveWitness) -> Self {
        Self {
            inputs: Some(inputs),
            witness: Some(witness),
        }
    }

    pub fn empty() -> Self {
        Self {
            inputs: None,
            witness: None,
        }
    }
}

impl ConstraintSynthesizer<BaseField> for PublicApproveCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<BaseField>) -> Result<(), SynthesisError> {
        let inputs = self.inputs.as_ref();
        let witness = self.witness.as_ref();

        let owner_pk = input_point(cs.clone(), inputs.map(|i| i.owner_pk))?;
        let balance_ct = input_egct(cs.clone(), inputs.map(|i| i.owner_balance))?;
        let amount = input_field(cs.clone(), inputs.map(|i| amount_field(i.amount)))?;
        let _nonce = input_field(cs.clone(), inputs.map(|i| BaseField::from(i.allowance_nonce)))?;
        let _asset = input_field(cs.clone(), inputs.map(|i| i.asset.to_field()))?;

        let balance = witness_field(cs.clone(), witness.map(|w| amount_field(w.owner_balance)))?;
        let sk_bits = secret_bits(cs, witness.map(|w| &w.owner_sk))?;

        range_bits(&amount, Policy::AMOUNT_BITS)?;
        let balance_bits = range_bits(&balance, Policy::AMOUNT_BITS)?;
        enforce_le(&amount, &balance, Policy::AMOUNT_BITS)?;

        enforce_key_ownership(&owner_pk, &sk_bits)?;
        enforce_elgamal_decryption(&sk_bits, &balance_bits, &balance_ct)
    }
}

#[derive(Clone, Debug)]
pub struct ConfidentialTransferFromWitness {
    pub transfer_amount: Amount,
    pub allowance_amount: Amount,
    pub spender_sk: SecretKey,
    pub new_allowance_randomness: ScalarField,
    pub receiver_randomness: ScalarField,
    pub receiver_pct_randomness: ScalarField,
    pub auditor_pct_randomness: ScalarField,
}

/// Spender proves the allowance it can decrypt covers the transfer, that the
/// new allowance is the remainder, and that the receiver ciphertext and both
/// PCTs carry the transfer amount.
#[derive(Clone)]
pub struct ConfidentialTransferFromCircuit {
    pub inputs: Option<ConfidentialTransferFromInputs>,
    pub witness: Option<ConfidentialTransferFromWitness>,
}

impl ConfidentialTransferFromCircuit {
    pub fn new(inputs: ConfidentialTransferFromInputs, witness: ConfidentialTransferFromWitness) -> Self {
        Self {
            inputs: Some(inputs),
            witness: Some(witness),
        }
    }

    pub fn empty() -> Self {
        Self {
            inputs: None,
            witness: None,
        }
    }
}

impl ConstraintSynthesizer<BaseField> for ConfidentialTransferFromCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<BaseField>) -> Result<(), SynthesisError> {
        let inputs = self.inputs.as_ref();
        let witness = self.witness.as_ref();

        let spender_pk = input_point(cs.clone(), inputs.map(|i| i.spender_pk))?;
        let receiver_pk = input_point(cs.clone(), inputs.map(|i| i.receiver_pk))?;
        let auditor_pk = input_point(cs.clone(), inputs.map(|i| i.auditor_pk))?;
        let prior_ct = input_egct(cs.clone(), inputs.map(|i| i.prior_allowance))?;
        let new_ct = input_egct(cs.clone(), inputs.map(|i| i.new_allowance))?;
        let receiver_ct = input_egct(cs.clone(), inputs.map(|i| i.receiver_amount))?;
        let receiver_pct = input_pct(cs.clone(), inputs.map(|i| i.receiver_pct))?;
        let auditor_pct = input_pct(cs.clone(), inputs.map(|i| i.auditor_pct))?;
        let _nonce = input_field(cs.clone(), inputs.map(|i| BaseField::from(i.allowance_nonce)))?;
        let _asset = input_field(cs.clone(), inputs.map(|i| i.asset.to_field()))?;

        let transfer = witness_field(cs.clone(), witness.map(|w| amount_field(w.transfer_amount)))?;
        let allowance = witness_field(cs.clone(), witness.map(|w| amount_field(w.allowance_amount)))?;
        let sk_bits = secret_bits(cs.clone(), witness.map(|w| &w.spender_sk))?;
        let new_r = randomness_bits(cs.clone(), witness.map(|w| &w.new_allowance_randomness))?;
        let receiver_r = randomness_bits(cs.clone(), witness.map(|w| &w.receiver_randomness))?;
        let receiver_pct_r = randomness_bits(cs.clone(), witness.map(|w| &w.receiver_pct_randomness))?;
        let auditor_pct_r = randomness_bits(cs.clone(), witness.map(|w| &w.auditor_pct_randomness))?;

        let transfer_bits = range_bits(&transfer, Policy::AMOUNT_BITS)?;
        let allowance_bits = range_bits(&allowance, Policy::AMOUNT_BITS)?;
        let remainder_bits = enforce_le(&transfer, &allowance, Policy::AMOUNT_BITS)?;

        enforce_key_ownership(&spender_pk, &sk_bits)?;
        enforce_elgamal_decryption(&sk_bits, &allowance_bits, &prior_ct)?;
        enforce_elgamal_encryption(&spender_pk, &remainder_bits, &new_r, &new_ct)?;
        enforce_elgamal_encryption(&receiver_pk, &transfer_bits, &receiver_r, &receiver_ct)?;

        let params = poseidon_config();
        enforce_pct_encryption(cs.clone(), params, &receiver_pk, &transfer, &receiver_pct_r, &receiver_pct)?;
        enforce_pct_encryption(cs, params, &auditor_pk, &transfer, &auditor_pct_r, &auditor_pct)?;

        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct CancelAllowanceWitness {
    pub owner_sk: SecretKey,
}

/// Owner proves key ownership over the allowance it cancels
#[derive(Clone)]
pub struct CancelAllowanceCircuit {
    pub inputs: Option<CancelAllowanceInputs>,
    pub witness: Option<CancelAllowanceWitness>,
}

impl CancelAllowanceCircuit {
    pub fn new(inputs: CancelAllowanceInputs, witness: CancelAllowanceWitness) -> Self {
        Self {
            inputs: Some(inputs),
            witness: Some(witness),
        }
    }

    pub fn empty() -> Self {
        Self {
            inputs: None,
            witness: None,
        }
    }
}

impl ConstraintSynthesizer<BaseField> for CancelAllowanceCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<BaseField>) -> Result<(), SynthesisError> {
        let inputs = self.inputs.as_ref();
        let witness = self.witness.as_ref();

        // Point inputs carry their own curve-membership checks
        let owner_pk = input_point(cs.clone(), inputs.map(|i| i.owner_pk))?;
        let _allowance = input_egct(cs.clone(), inputs.map(|i| i.allowance))?;
        let _nonce = input_field(cs.clone(), inputs.map(|i| BaseField::from(i.allowance_nonce)))?;
        let _spender = input_field(cs.clone(), inputs.map(|i| i.spender.to_field()))?;

        let sk_bits = secret_bits(cs, witness.map(|w| &w.owner_sk))?;
        enforce_key_ownership(&owner_pk, &sk_bits)
    }
}

#[derive(Clone, Debug)]
pub struct OfferAcceptanceWitness {
    pub amount_to_buy: Amount,
    pub acceptor_sk: SecretKey,
    pub randomness: ScalarField,
}

/// Acceptor proves its encrypted buy amount is within the offer's maximum
/// and is encrypted for the initiator.
#[derive(Clone)]
pub struct OfferAcceptanceCircuit {
    pub inputs: Option<OfferAcceptanceInputs>,
    pub witness: Option<OfferAcceptanceWitness>,
}

impl OfferAcceptanceCircuit {
    pub fn new(inputs: OfferAcceptanceInputs, witness: OfferAcceptanceWitness) -> Self {
        Self {
            inputs: Some(inputs),
            witness: Some(witness),
        }
    }

    pub fn empty() -> Self {
        Self {
            inputs: None,
            witness: None,
        }
    }
}

impl ConstraintSynthesizer<BaseField> for OfferAcceptanceCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<BaseField>) -> Result<(), SynthesisError> {
        let inputs = self.inputs.as_ref();
        let witness = self.witness.as_ref();

        let acceptor_pk = input_point(cs.clone(), inputs.map(|i| i.acceptor_pk))?;
        let initiator_pk = input_point(cs.clone(), inputs.map(|i| i.initiator_pk))?;
        let amount_ct = input_egct(cs.clone(), inputs.map(|i| i.amount_to_buy))?;
        let max_sell = input_field(cs.clone(), inputs.map(|i| amount_field(i.max_amount_to_sell)))?;
        // Rate is only bound here; finalization does the arithmetic
        let _rate = input_field(cs.clone(), inputs.map(|i| BaseField::from(i.rate)))?;

        let amount = witness_field(cs.clone(), witness.map(|w| amount_field(w.amount_to_buy)))?;
        let sk_bits = secret_bits(cs.clone(), witness.map(|w| &w.acceptor_sk))?;
        let r_bits = randomness_bits(cs, witness.map(|w| &w.randomness))?;

        let amount_bits = range_bits(&amount, Policy::AMOUNT_BITS)?;
        range_bits(&max_sell, Policy::AMOUNT_BITS)?;
        enforce_le(&amount, &max_sell, Policy::AMOUNT_BITS)?;

        enforce_key_ownership(&acceptor_pk, &sk_bits)?;
        enforce_elgamal_encryption(&initiator_pk, &amount_bits, &r_bits, &amount_ct)
    }
}

#[derive(Clone, Debug)]
pub struct OfferFinalizationWitness {
    pub amount_to_buy: Amount,
    pub sell_amount: Amount,
    pub initiator_sk: SecretKey,
    pub randomness: ScalarField,
}

/// Initiator proves it decrypted the acceptor's buy amount, that
/// `sell * rate == buy * PRECISION` exactly, and that the sell amount is
/// encrypted for the acceptor.
#[derive(Clone)]
pub struct OfferFinalizationCircuit {
    pub inputs: Option<OfferFinalizationInputs>,
    pub witness: Option<OfferFinalizationWitness>,
}

impl OfferFinalizationCircuit {
    pub fn new(inputs: OfferFinalizationInputs, witness: OfferFinalizationWitness) -> Self {
        Self {
            inputs: Some(inputs),
            witness: Some(witness),
        }
    }

    pub fn empty() -> Self {
        Self {
            inputs: None,
            witness: None,
        }
    }
}

impl ConstraintSynthesizer<BaseField> for OfferFinalizationCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<BaseField>) -> Result<(), SynthesisError> {
        let inputs = self.inputs.as_ref();
        let witness = self.witness.as_ref();

        let initiator_pk = input_point(cs.clone(), inputs.map(|i| i.initiator_pk))?;
        let acceptor_pk = input_point(cs.clone(), inputs.map(|i| i.acceptor_pk))?;
        let buy_ct = input_egct(cs.clone(), inputs.map(|i| i.amount_to_buy))?;
        let sell_ct = input_egct(cs.clone(), inputs.map(|i| i.sell_amount))?;
        let rate = input_field(cs.clone(), inputs.map(|i| BaseField::from(i.rate)))?;

        let buy = witness_field(cs.clone(), witness.map(|w| amount_field(w.amount_to_buy)))?;
        let sell = witness_field(cs.clone(), witness.map(|w| amount_field(w.sell_amount)))?;
        let sk_bits = secret_bits(cs.clone(), witness.map(|w| &w.initiator_sk))?;
        let r_bits = randomness_bits(cs, witness.map(|w| &w.randomness))?;

        let buy_bits = range_bits(&buy, Policy::AMOUNT_BITS)?;
        let sell_bits = range_bits(&sell, Policy::AMOUNT_BITS)?;
        // Keeps both sides of the product below the modulus
        range_bits(&rate, Policy::RATE_BITS)?;

        enforce_key_ownership(&initiator_pk, &sk_bits)?;
        enforce_elgamal_decryption(&sk_bits, &buy_bits, &buy_ct)?;

        let precision = BaseField::from(Policy::PRECISION);
        let lhs: FpVar<BaseField> = &sell * &rate;
        let rhs: FpVar<BaseField> = &buy * precision;
        lhs.enforce_equal(&rhs)?;

        enforce_elgamal_encryption(&acceptor_pk, &sell_bits, &r_bits, &sell_ct)
    }
}
