// Encryption primitives for confidential balances
// EC-ElGamal over BabyJubJub for homomorphic storage, Poseidon ciphertexts
// for disclosure to a designated viewer.

pub mod keys;
pub mod elgamal;
pub mod poseidon;

pub use keys::{BaseField, KeyPair, Point, ScalarField, SecretKey};
pub use elgamal::{decrypt, decrypt_amount, discrete_log, encrypt, random_scalar, Egct};
pub use poseidon::{poseidon_config, Pct};

/// Cryptographic error types
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Point is not on the curve or not in the prime-order subgroup")]
    InvalidPoint,
    #[error("Invalid secret key")]
    InvalidSecretKey,
    #[error("Poseidon ciphertext authentication failed")]
    TagMismatch,
    #[error("Message too long: {0} elements")]
    MessageTooLong(usize),
    #[error("Decrypted amount out of range")]
    AmountOutOfRange,
}

pub type Result<T> = std::result::Result<T, CryptoError>;
