// Error types for the confidential swap protocol
use thiserror::Error;

use super::primitives::{Address, OfferId};

pub type Result<T> = std::result::Result<T, SwapError>;

/// Caller-facing failures.
///
/// Precondition and authorization errors are precise. Every proof failure,
/// including a public input that disagrees with stored state, collapses into
/// `InvalidProof` so nothing about the witness leaks.
#[derive(Error, Debug)]
pub enum SwapError {
    #[error("Account not registered: {0}")]
    NotRegistered(Address),

    #[error("Rate must be positive and at most 120 bits")]
    InvalidRate,

    #[error("Invalid amount bounds: min {min} max {max}")]
    InvalidAmountBounds { min: u128, max: u128 },

    #[error("Offer not found: {0}")]
    OfferNotFound(OfferId),

    #[error("Offer already accepted: {0}")]
    OfferAlreadyAccepted(OfferId),

    #[error("Offer not accepted: {0}")]
    OfferNotAccepted(OfferId),

    #[error("Offer expired: {0}")]
    OfferExpired(OfferId),

    #[error("Caller is not a participant of offer {0}")]
    NotOfferParticipant(OfferId),

    #[error("Unauthorized caller: {0}")]
    Unauthorized(Address),

    #[error("Finalization requires a proof")]
    EmptyProof,

    #[error("Allowance mode mismatch")]
    AllowanceModeMismatch,

    #[error("Allowance not found")]
    AllowanceNotFound,

    #[error("Spender {0} is a registered account, use a confidential approval")]
    SpenderIsRegistered(Address),

    #[error("Insufficient public allowance: requested {requested}, available {available}")]
    InsufficientPublicAllowance { requested: u128, available: u128 },

    #[error("Unknown asset: {0}")]
    UnknownAsset(Address),

    #[error("Invalid transfer instructions: {0}")]
    InvalidTransferInstructions(String),

    #[error("Invalid proof")]
    InvalidProof,

    /// Raised off-ledger when a witness cannot satisfy its circuit
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<crate::crypto::CryptoError> for SwapError {
    fn from(err: crate::crypto::CryptoError) -> Self {
        SwapError::Crypto(err.to_string())
    }
}

impl From<crate::zkp::ZkpError> for SwapError {
    fn from(err: crate::zkp::ZkpError) -> Self {
        match err {
            crate::zkp::ZkpError::Serialization(msg) => SwapError::Serialization(msg),
            crate::zkp::ZkpError::Io(msg) => SwapError::Storage(msg),
            crate::zkp::ZkpError::ConstraintsUnsatisfied(kind) => {
                SwapError::InvalidInput(format!("witness does not satisfy {}", kind))
            }
            _ => SwapError::InvalidProof,
        }
    }
}

impl From<bincode::Error> for SwapError {
    fn from(err: bincode::Error) -> Self {
        SwapError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for SwapError {
    fn from(err: serde_json::Error) -> Self {
        SwapError::Serialization(err.to_string())
    }
}

impl From<sled::Error> for SwapError {
    fn from(err: sled::Error) -> Self {
        SwapError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for SwapError {
    fn from(err: std::io::Error) -> Self {
        SwapError::Storage(err.to_string())
    }
}

impl SwapError {
    /// True for failures a caller can fix by changing parameters
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            SwapError::NotRegistered(_)
                | SwapError::InvalidRate
                | SwapError::InvalidAmountBounds { .. }
                | SwapError::OfferNotFound(_)
                | SwapError::OfferAlreadyAccepted(_)
                | SwapError::OfferNotAccepted(_)
                | SwapError::AllowanceModeMismatch
                | SwapError::AllowanceNotFound
                | SwapError::SpenderIsRegistered(_)
                | SwapError::InsufficientPublicAllowance { .. }
                | SwapError::UnknownAsset(_)
                | SwapError::InvalidTransferInstructions(_)
                | SwapError::InvalidInput(_)
        )
    }
}
