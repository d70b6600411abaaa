// Off-ledger side of the protocol
// A wallet holds one secret key, decrypts what it is entitled to see, and
// builds the witnesses and proofs the ledger asks for. Nothing here touches
// ledger state directly.
use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::crypto::poseidon::{self, encrypt_amount_with, random_nonce};
use crate::crypto::{decrypt_amount, encrypt, random_scalar, Egct, KeyPair, Pct, Point, SecretKey};
use crate::ledger::{EncryptedAllowance, EncryptedBalance, PublicCredit};
use crate::primitives::{Address, Amount, AssetId, Policy, Result, SwapError};
use crate::swap::Offer;
use crate::zkp::circuits::{
    CancelAllowanceCircuit, CancelAllowanceWitness, ConfidentialApproveCircuit, ConfidentialApproveWitness,
    ConfidentialTransferFromCircuit, ConfidentialTransferFromWitness, OfferAcceptanceCircuit,
    OfferAcceptanceWitness, OfferFinalizationCircuit, OfferFinalizationWitness, PublicApproveCircuit,
    PublicApproveWitness,
};
use crate::zkp::{
    CancelAllowanceInputs, CircuitProof, ConfidentialApproveInputs, ConfidentialTransferFromInputs,
    OfferAcceptanceInputs, OfferFinalizationInputs, Prover, ProvingBackend, PublicApproveInputs,
};

/// Default discrete-log search bound for decrypting ciphertexts
pub const DEFAULT_DLOG_BOUND: u64 = 1 << 24;

/// Largest bound whose baby-step table (2^20 points) fits comfortably in memory
pub const MAX_DLOG_BOUND: u64 = 1 << 40;

/// `amount_to_buy / rate` when it divides exactly, else `None`
pub fn exact_sell_amount(amount_to_buy: Amount, rate: u128) -> Option<Amount> {
    if rate == 0 {
        return None;
    }
    let scaled = amount_to_buy.checked_mul(Policy::PRECISION)?;
    (scaled % rate == 0).then(|| scaled / rate)
}

/// Ciphertext and PCT for a plaintext-amount credit to `receiver_pk`
pub fn public_credit<R: RngCore + CryptoRng>(rng: &mut R, receiver_pk: &Point, amount: Amount) -> PublicCredit {
    let randomness = random_scalar(rng);
    let (pct, _) = poseidon::encrypt_amount(receiver_pk, amount, rng);
    PublicCredit {
        ciphertext: encrypt(receiver_pk, amount, &randomness),
        randomness,
        pct,
    }
}

pub struct Wallet<B> {
    keys: KeyPair,
    prover: Prover<B>,
    dlog_bound: u64,
}

impl<B: ProvingBackend> Wallet<B> {
    pub fn new(keys: KeyPair, backend: B) -> Self {
        Self {
            keys,
            prover: Prover::new(backend),
            dlog_bound: DEFAULT_DLOG_BOUND,
        }
    }

    pub fn with_dlog_bound(mut self, bound: u64) -> Self {
        self.dlog_bound = bound.min(MAX_DLOG_BOUND);
        self
    }

    pub fn public_key(&self) -> Point {
        self.keys.public_key
    }

    fn secret_key(&self) -> &SecretKey {
        &self.keys.secret_key
    }

    // Decryption

    pub fn decrypt(&self, ct: &Egct) -> Result<Amount> {
        decrypt_amount(self.secret_key(), ct, self.dlog_bound)
            .map(Amount::from)
            .ok_or_else(|| SwapError::Crypto(format!("plaintext outside search bound {}", self.dlog_bound)))
    }

    pub fn decrypt_balance(&self, balance: &EncryptedBalance) -> Result<Amount> {
        self.decrypt(&balance.egct)
    }

    pub fn decrypt_pct(&self, pct: &Pct) -> Result<Amount> {
        Ok(poseidon::decrypt_amount(self.secret_key(), pct)?)
    }

    // Allowance proofs

    #[allow(clippy::too_many_arguments)]
    pub fn prove_confidential_approve<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        spender_pk: &Point,
        auditor_pk: &Point,
        balance: &EncryptedBalance,
        amount: Amount,
        allowance_nonce: u64,
        asset: AssetId,
    ) -> Result<CircuitProof<ConfidentialApproveInputs>> {
        let owner_balance = self.decrypt_balance(balance)?;
        let allowance_randomness = random_scalar(rng);
        let spender_pct_randomness = random_scalar(rng);
        let auditor_pct_randomness = random_scalar(rng);

        let inputs = ConfidentialApproveInputs {
            owner_pk: self.public_key(),
            spender_pk: *spender_pk,
            auditor_pk: *auditor_pk,
            owner_balance: balance.egct,
            allowance: encrypt(spender_pk, amount, &allowance_randomness),
            spender_pct: encrypt_amount_with(spender_pk, amount, &spender_pct_randomness, random_nonce(rng)),
            auditor_pct: encrypt_amount_with(auditor_pk, amount, &auditor_pct_randomness, random_nonce(rng)),
            allowance_nonce,
            asset,
        };
        let witness = ConfidentialApproveWitness {
            amount,
            owner_sk: *self.secret_key(),
            owner_balance,
            allowance_randomness,
            spender_pct_randomness,
            auditor_pct_randomness,
        };
        debug!("Proving confidential approval of {} on {}", amount, asset);
        Ok(self
            .prover
            .prove(inputs.clone(), ConfidentialApproveCircuit::new(inputs, witness))?)
    }

    pub fn prove_public_approve(
        &self,
        balance: &EncryptedBalance,
        amount: Amount,
        allowance_nonce: u64,
        asset: AssetId,
    ) -> Result<CircuitProof<PublicApproveInputs>> {
        let owner_balance = self.decrypt_balance(balance)?;
        let inputs = PublicApproveInputs {
            owner_pk: self.public_key(),
            owner_balance: balance.egct,
            amount,
            allowance_nonce,
            asset,
        };
        let witness = PublicApproveWitness {
            owner_sk: *self.secret_key(),
            owner_balance,
        };
        Ok(self
            .prover
            .prove(inputs.clone(), PublicApproveCircuit::new(inputs, witness))?)
    }

    /// Spend `amount` out of a confidential allowance this wallet is the
    /// spender of.
    pub fn prove_transfer_from<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        allowance: &EncryptedAllowance,
        receiver_pk: &Point,
        auditor_pk: &Point,
        amount: Amount,
        asset: AssetId,
    ) -> Result<CircuitProof<ConfidentialTransferFromInputs>> {
        let allowance_amount = self.decrypt(&allowance.encrypted_amount)?;
        let new_allowance_randomness = random_scalar(rng);
        let receiver_randomness = random_scalar(rng);
        let receiver_pct_randomness = random_scalar(rng);
        let auditor_pct_randomness = random_scalar(rng);

        // An overspend leaves the circuit unsatisfied and fails below
        let remainder = allowance_amount.saturating_sub(amount);
        let inputs = ConfidentialTransferFromInputs {
            spender_pk: self.public_key(),
            receiver_pk: *receiver_pk,
            auditor_pk: *auditor_pk,
            prior_allowance: allowance.encrypted_amount,
            new_allowance: encrypt(&self.public_key(), remainder, &new_allowance_randomness),
            receiver_amount: encrypt(receiver_pk, amount, &receiver_randomness),
            receiver_pct: encrypt_amount_with(receiver_pk, amount, &receiver_pct_randomness, random_nonce(rng)),
            auditor_pct: encrypt_amount_with(auditor_pk, amount, &auditor_pct_randomness, random_nonce(rng)),
            allowance_nonce: allowance.nonce,
            asset,
        };
        let witness = ConfidentialTransferFromWitness {
            transfer_amount: amount,
            allowance_amount,
            spender_sk: *self.secret_key(),
            new_allowance_randomness,
            receiver_randomness,
            receiver_pct_randomness,
            auditor_pct_randomness,
        };
        debug!("Proving transfer of {} out of allowance on {}", amount, asset);
        Ok(self
            .prover
            .prove(inputs.clone(), ConfidentialTransferFromCircuit::new(inputs, witness))?)
    }

    pub fn prove_cancel_allowance(
        &self,
        allowance: &EncryptedAllowance,
        spender: Address,
    ) -> Result<CircuitProof<CancelAllowanceInputs>> {
        let inputs = CancelAllowanceInputs {
            owner_pk: self.public_key(),
            allowance: allowance.encrypted_amount,
            allowance_nonce: allowance.nonce,
            spender,
        };
        let witness = CancelAllowanceWitness {
            owner_sk: *self.secret_key(),
        };
        Ok(self
            .prover
            .prove(inputs.clone(), CancelAllowanceCircuit::new(inputs, witness))?)
    }

    // Offer proofs

    /// Commit to buying `amount_to_buy`, encrypted so only the initiator
    /// can read it.
    pub fn prove_acceptance<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        offer: &Offer,
        initiator_pk: &Point,
        amount_to_buy: Amount,
    ) -> Result<CircuitProof<OfferAcceptanceInputs>> {
        let randomness = random_scalar(rng);
        let inputs = OfferAcceptanceInputs {
            acceptor_pk: self.public_key(),
            initiator_pk: *initiator_pk,
            amount_to_buy: encrypt(initiator_pk, amount_to_buy, &randomness),
            max_amount_to_sell: offer.max_amount_to_sell,
            rate: offer.rate,
        };
        let witness = OfferAcceptanceWitness {
            amount_to_buy,
            acceptor_sk: *self.secret_key(),
            randomness,
        };
        debug!("Proving acceptance of offer {}", offer.id);
        Ok(self
            .prover
            .prove(inputs.clone(), OfferAcceptanceCircuit::new(inputs, witness))?)
    }

    /// Read the acceptor's committed buy amount off an accepted offer
    pub fn read_amount_to_buy(&self, offer: &Offer) -> Result<Amount> {
        let commitment = offer
            .amount_to_buy()
            .ok_or_else(|| SwapError::InvalidInput(format!("offer {} has no buy commitment", offer.id)))?;
        self.decrypt(&commitment)
    }

    /// Prove `sell_amount` matches the committed buy amount at the offer rate
    pub fn prove_finalization<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        offer: &Offer,
        acceptor_pk: &Point,
        sell_amount: Amount,
    ) -> Result<CircuitProof<OfferFinalizationInputs>> {
        let amount_to_buy_ct = offer
            .amount_to_buy()
            .ok_or_else(|| SwapError::InvalidInput(format!("offer {} has no buy commitment", offer.id)))?;
        let amount_to_buy = self.decrypt(&amount_to_buy_ct)?;
        let randomness = random_scalar(rng);

        let inputs = OfferFinalizationInputs {
            initiator_pk: self.public_key(),
            acceptor_pk: *acceptor_pk,
            amount_to_buy: amount_to_buy_ct,
            sell_amount: encrypt(acceptor_pk, sell_amount, &randomness),
            rate: offer.rate,
        };
        let witness = OfferFinalizationWitness {
            amount_to_buy,
            sell_amount,
            initiator_sk: *self.secret_key(),
            randomness,
        };
        debug!("Proving finalization of offer {} (buy {}, sell {})", offer.id, amount_to_buy, sell_amount);
        Ok(self
            .prover
            .prove(inputs.clone(), OfferFinalizationCircuit::new(inputs, witness))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swap::OfferTerms;
    use crate::zkp::mock_backend::TranscriptBackend;
    use crate::test_helpers::test_rng;

    fn offer(max: Amount, rate: u128) -> Offer {
        Offer::new(
            1,
            Address::from_label("initiator"),
            OfferTerms {
                asset_buy: Address::from_label("usd"),
                asset_sell: Address::from_label("eur"),
                rate,
                max_amount_to_sell: max,
                min_amount_to_sell: 0,
                expires_at: None,
                approval: Vec::new(),
            },
        )
    }

    #[test]
    fn test_exact_sell_amount() {
        let rate = 3 * Policy::PRECISION;
        assert_eq!(exact_sell_amount(300, rate), Some(100));
        assert_eq!(exact_sell_amount(301, rate), None);
        assert_eq!(exact_sell_amount(1, 0), None);
        assert_eq!(exact_sell_amount(u128::MAX, 1), None);
    }

    #[test]
    fn test_dlog_bound_is_capped() {
        let wallet = Wallet::new(KeyPair::generate(&mut test_rng()), TranscriptBackend).with_dlog_bound(u64::MAX);
        assert_eq!(wallet.dlog_bound, MAX_DLOG_BOUND);
    }

    #[test]
    fn test_acceptance_over_maximum_fails_locally() {
        let mut rng = test_rng();
        let initiator = KeyPair::generate(&mut rng);
        let wallet = Wallet::new(KeyPair::generate(&mut rng), TranscriptBackend);

        let offer = offer(500, 3 * Policy::PRECISION);
        assert!(wallet.prove_acceptance(&mut rng, &offer, &initiator.public_key, 300).is_ok());
        assert!(matches!(
            wallet.prove_acceptance(&mut rng, &offer, &initiator.public_key, 600),
            Err(SwapError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_finalization_needs_exact_rate() {
        let mut rng = test_rng();
        let initiator = Wallet::new(KeyPair::generate(&mut rng), TranscriptBackend);
        let acceptor = Wallet::new(KeyPair::generate(&mut rng), TranscriptBackend);

        let mut offer = offer(500, 3 * Policy::PRECISION);
        let acceptance = acceptor
            .prove_acceptance(&mut rng, &offer, &initiator.public_key(), 300)
            .unwrap();
        offer.accept(Address::from_label("acceptor"), &acceptance.inputs.amount_to_buy, Vec::new());

        assert_eq!(initiator.read_amount_to_buy(&offer).unwrap(), 300);
        assert!(initiator
            .prove_finalization(&mut rng, &offer, &acceptor.public_key(), 100)
            .is_ok());
        assert!(matches!(
            initiator.prove_finalization(&mut rng, &offer, &acceptor.public_key(), 200),
            Err(SwapError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_public_credit_opens() {
        let mut rng = test_rng();
        let receiver = KeyPair::generate(&mut rng);
        let wallet = Wallet::new(receiver.clone(), TranscriptBackend);

        let credit = public_credit(&mut rng, &receiver.public_key, 42);
        assert!(credit.opens_to(&receiver.public_key, 42));
        assert!(!credit.opens_to(&receiver.public_key, 43));
        assert_eq!(wallet.decrypt(&credit.ciphertext).unwrap(), 42);
        assert_eq!(wallet.decrypt_pct(&credit.pct).unwrap(), 42);
    }
}
