// Allowance record for one (owner, spender, asset)
use serde::{Deserialize, Serialize};

use crate::crypto::{Egct, Pct};
use crate::primitives::{Address, Amount, AssetId};

/// Exactly one mode is live at a time. A cleared record is kept so its
/// nonce keeps counting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedAllowance {
    /// Amount under the spender's key; zero in public mode
    pub encrypted_amount: Egct,
    /// Auditor's view of the approved amount
    pub amount_pct: Pct,
    pub is_public: bool,
    pub public_amount: Amount,
    pub nonce: u64,
}

impl Default for EncryptedAllowance {
    fn default() -> Self {
        Self {
            encrypted_amount: Egct::zero(),
            amount_pct: Pct::default(),
            is_public: false,
            public_amount: 0,
            nonce: 0,
        }
    }
}

impl EncryptedAllowance {
    pub fn exists(&self) -> bool {
        self.is_public || !self.encrypted_amount.is_zero()
    }

    pub fn set_confidential(&mut self, encrypted_amount: Egct, amount_pct: Pct) {
        self.encrypted_amount = encrypted_amount;
        self.amount_pct = amount_pct;
        self.is_public = false;
        self.public_amount = 0;
        self.nonce += 1;
    }

    pub fn set_public(&mut self, amount: Amount) {
        self.encrypted_amount = Egct::zero();
        self.amount_pct = Pct::default();
        self.is_public = true;
        self.public_amount = amount;
        self.nonce += 1;
    }

    pub fn clear(&mut self) {
        self.encrypted_amount = Egct::zero();
        self.amount_pct = Pct::default();
        self.is_public = false;
        self.public_amount = 0;
        self.nonce += 1;
    }
}

pub fn allowance_key(owner: &Address, spender: &Address, asset: &AssetId) -> Vec<u8> {
    let mut key = Vec::with_capacity(60);
    key.extend_from_slice(owner.as_bytes());
    key.extend_from_slice(spender.as_bytes());
    key.extend_from_slice(asset.as_bytes());
    key
}
