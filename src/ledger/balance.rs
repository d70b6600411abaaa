// Encrypted balance record for one (account, asset)
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto::{Egct, Pct};
use crate::primitives::{hash_data, Address, AssetId};

/// Per-credit hints kept on a record; older ones are dropped first
pub const MAX_AMOUNT_PCTS: usize = 32;

/// Amount disclosed to the account holder at a given transaction index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountPct {
    pub pct: Pct,
    pub index: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMarker {
    pub index: u64,
    pub valid: bool,
}

/// Homomorphic balance plus the bookkeeping proofs are bound to.
///
/// `egct` is the sum of everything credited minus everything debited.
/// `transaction_index` moves on every mutation, `nonce` only on debits.
/// `history` maps a balance commitment to the index it was created at; a
/// proof may reference any balance that is still marked valid. Only
/// balances since the last debit are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBalance {
    pub egct: Egct,
    pub nonce: u64,
    pub transaction_index: u64,
    pub balance_pct: Pct,
    pub amount_pcts: Vec<AmountPct>,
    pub history: BTreeMap<String, HistoryMarker>,
}

impl Default for EncryptedBalance {
    fn default() -> Self {
        let mut balance = Self {
            egct: Egct::zero(),
            nonce: 0,
            transaction_index: 0,
            balance_pct: Pct::default(),
            amount_pcts: Vec::new(),
            history: BTreeMap::new(),
        };
        // The empty balance is a legitimate proof target
        balance.mark_current();
        balance
    }
}

impl EncryptedBalance {
    /// Commitment to a balance ciphertext at a given debit nonce
    pub fn commitment(egct: &Egct, nonce: u64) -> String {
        let mut data = egct.to_bytes();
        data.extend_from_slice(&nonce.to_le_bytes());
        hex::encode(hash_data(&data))
    }

    fn mark_current(&mut self) {
        let key = Self::commitment(&self.egct, self.nonce);
        self.history.insert(
            key,
            HistoryMarker {
                index: self.transaction_index,
                valid: true,
            },
        );
    }

    pub fn credit(&mut self, amount: &Egct, viewer_pct: Pct) {
        self.egct = self.egct.add(amount);
        self.amount_pcts.push(AmountPct {
            pct: viewer_pct,
            index: self.transaction_index,
        });
        if self.amount_pcts.len() > MAX_AMOUNT_PCTS {
            let excess = self.amount_pcts.len() - MAX_AMOUNT_PCTS;
            self.amount_pcts.drain(..excess);
        }
        self.transaction_index += 1;
        self.mark_current();
    }

    /// `new_balance_pct` replaces the holder's balance hint and clears the
    /// per-credit hints it already accounts for. `None` leaves the hints as
    /// they are; the ciphertext stays authoritative either way. Commitments
    /// from before the debit can never be proved against again and are dropped.
    pub fn debit(&mut self, amount: &Egct, new_balance_pct: Option<Pct>) {
        self.egct = self.egct.sub(amount);
        if let Some(pct) = new_balance_pct {
            self.balance_pct = pct;
            self.amount_pcts.clear();
        }
        self.nonce += 1;
        self.transaction_index += 1;
        self.history.clear();
        self.mark_current();
    }

    /// True if `egct` is a balance this account held since its last debit
    pub fn is_known_balance(&self, egct: &Egct) -> bool {
        self.history
            .get(&Self::commitment(egct, self.nonce))
            .map(|marker| marker.valid)
            .unwrap_or(false)
    }
}

pub fn balance_key(account: &Address, asset: &AssetId) -> Vec<u8> {
    let mut key = Vec::with_capacity(40);
    key.extend_from_slice(account.as_bytes());
    key.extend_from_slice(asset.as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{decrypt_amount, encrypt, random_scalar, KeyPair};
    use crate::test_helpers::test_rng;

    #[test]
    fn test_credit_then_debit() {
        let mut rng = test_rng();
        let pair = KeyPair::generate(&mut rng);
        let mut balance = EncryptedBalance::default();

        balance.credit(&encrypt(&pair.public_key, 700, &random_scalar(&mut rng)), Pct::default());
        balance.credit(&encrypt(&pair.public_key, 300, &random_scalar(&mut rng)), Pct::default());
        assert_eq!(balance.transaction_index, 2);
        assert_eq!(balance.nonce, 0);
        assert_eq!(balance.amount_pcts.len(), 2);

        balance.debit(&encrypt(&pair.public_key, 250, &random_scalar(&mut rng)), Some(Pct::default()));
        assert_eq!(balance.transaction_index, 3);
        assert_eq!(balance.nonce, 1);
        assert!(balance.amount_pcts.is_empty());
        assert_eq!(decrypt_amount(&pair.secret_key, &balance.egct, 1 << 12), Some(750));
    }

    #[test]
    fn test_debit_invalidates_older_balances() {
        let mut rng = test_rng();
        let pair = KeyPair::generate(&mut rng);
        let mut balance = EncryptedBalance::default();

        balance.credit(&encrypt(&pair.public_key, 100, &random_scalar(&mut rng)), Pct::default());
        let after_first = balance.egct;
        balance.credit(&encrypt(&pair.public_key, 50, &random_scalar(&mut rng)), Pct::default());

        // Credits keep earlier balances usable
        assert!(balance.is_known_balance(&after_first));
        assert!(balance.is_known_balance(&balance.egct.clone()));

        balance.debit(&encrypt(&pair.public_key, 10, &random_scalar(&mut rng)), None);
        assert!(!balance.is_known_balance(&after_first));
        assert!(balance.is_known_balance(&balance.egct.clone()));
        assert_eq!(balance.history.len(), 1);
    }

    #[test]
    fn test_record_size_bounded_across_cycles() {
        let mut rng = test_rng();
        let pair = KeyPair::generate(&mut rng);
        let mut balance = EncryptedBalance::default();
        balance.credit(&encrypt(&pair.public_key, 1_000, &random_scalar(&mut rng)), Pct::default());

        let mut sizes = Vec::new();
        for cycle in 0..200 {
            balance.debit(&encrypt(&pair.public_key, 1, &random_scalar(&mut rng)), None);
            balance.credit(&encrypt(&pair.public_key, 1, &random_scalar(&mut rng)), Pct::default());
            if cycle == 50 || cycle == 199 {
                sizes.push(bincode::serialize(&balance).unwrap().len());
            }
        }

        assert_eq!(sizes[0], sizes[1]);
        assert_eq!(balance.history.len(), 2);
        assert!(balance.amount_pcts.len() <= MAX_AMOUNT_PCTS);
        assert_eq!(decrypt_amount(&pair.secret_key, &balance.egct, 1 << 12), Some(1_000));
    }

    #[test]
    fn test_credit_only_account_keeps_recent_hints() {
        let mut rng = test_rng();
        let pair = KeyPair::generate(&mut rng);
        let mut balance = EncryptedBalance::default();
        for _ in 0..(MAX_AMOUNT_PCTS + 5) {
            balance.credit(&encrypt(&pair.public_key, 1, &random_scalar(&mut rng)), Pct::default());
        }
        assert_eq!(balance.amount_pcts.len(), MAX_AMOUNT_PCTS);
        assert_eq!(balance.amount_pcts[0].index, 5);
    }

    #[test]
    fn test_empty_balance_is_known() {
        let balance = EncryptedBalance::default();
        assert!(balance.is_known_balance(&Egct::zero()));
    }
}
