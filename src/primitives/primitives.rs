// Core primitives shared by the ledger, the offer book and the circuits
use ark_bn254::Fr;
use ark_ff::PrimeField;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Plaintext amounts. Circuits range-check these to `Policy::AMOUNT_BITS`.
pub type Amount = u128;
pub type Timestamp = u64;
pub type OfferId = u64;

/// Account or asset address (20 bytes, Ethereum style)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

/// Assets are identified by their token address
pub type AssetId = Address;

impl Address {
    pub const fn zero() -> Self {
        Address([0u8; 20])
    }

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    /// Deterministic address derived from a label, handy for tests and demos
    pub fn from_label(label: &str) -> Self {
        let digest = hash_data(label.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..]);
        Address(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> std::result::Result<Self, hex::FromHexError> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(stripped, &mut bytes)?;
        Ok(Address(bytes))
    }

    /// Field encoding used when an address is bound into a proof
    pub fn to_field(&self) -> Fr {
        Fr::from_be_bytes_mod_order(&self.0)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Protocol constants
pub struct Policy;

impl Policy {
    /// Fixed-point scale of offer rates
    pub const PRECISION: u128 = 1_000_000_000_000_000_000;

    /// Bit width every plaintext amount is range-checked to
    pub const AMOUNT_BITS: usize = 128;

    /// Bit width of a rate. Keeps `amount * rate` below the field modulus.
    pub const RATE_BITS: usize = 120;

    pub fn max_rate() -> u128 {
        (1u128 << Self::RATE_BITS) - 1
    }
}

pub fn hash_data(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}
