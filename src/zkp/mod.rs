// Zero-knowledge circuits gating every ledger and offer transition
// Groth16 over BN254; circuits are R1CS over the BabyJubJub base field.

pub use proof_system::{CircuitVerifier, Groth16Verifier, VerifierSet};
pub use prover::{Groth16Backend, Prover, ProvingBackend};
pub use public_inputs::*;

pub mod gadgets;
pub mod circuits;
pub mod public_inputs;
pub mod proof_system;
pub mod prover;
pub mod trusted_setup;

#[cfg(any(test, feature = "test-helpers"))]
pub mod mock_backend;

use serde::{Deserialize, Serialize};

/// Error types for ZKP operations
#[derive(Debug, thiserror::Error)]
pub enum ZkpError {
    /// The witness does not satisfy the circuit. Surfaced to users as invalid
    /// input; such a proof is never produced, let alone submitted.
    #[error("Invalid input: circuit constraints not satisfied for {0}")]
    ConstraintsUnsatisfied(CircuitKind),
    #[error("Constraint synthesis failed: {0}")]
    Synthesis(String),
    #[error("No key loaded for circuit {0}")]
    MissingKey(CircuitKind),
    #[error("Proof rejected by the {0} verifier")]
    Rejected(CircuitKind),
    #[error("Public input arity mismatch for {kind}: expected {expected}, got {actual}")]
    ArityMismatch {
        kind: CircuitKind,
        expected: usize,
        actual: usize,
    },
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<ark_relations::r1cs::SynthesisError> for ZkpError {
    fn from(err: ark_relations::r1cs::SynthesisError) -> Self {
        ZkpError::Synthesis(err.to_string())
    }
}

impl From<ark_serialize::SerializationError> for ZkpError {
    fn from(err: ark_serialize::SerializationError) -> Self {
        ZkpError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ZkpError>;

/// One verifier (and one key pair) per circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CircuitKind {
    ConfidentialApprove,
    PublicApprove,
    ConfidentialTransferFrom,
    CancelAllowance,
    OfferAcceptance,
    OfferFinalization,
}

impl CircuitKind {
    pub const ALL: [CircuitKind; 6] = [
        CircuitKind::ConfidentialApprove,
        CircuitKind::PublicApprove,
        CircuitKind::ConfidentialTransferFrom,
        CircuitKind::CancelAllowance,
        CircuitKind::OfferAcceptance,
        CircuitKind::OfferFinalization,
    ];

    /// Stable identifier, also the key file stem
    pub fn id(&self) -> &'static str {
        match self {
            CircuitKind::ConfidentialApprove => "confidential_approve",
            CircuitKind::PublicApprove => "public_approve",
            CircuitKind::ConfidentialTransferFrom => "confidential_transfer_from",
            CircuitKind::CancelAllowance => "cancel_allowance",
            CircuitKind::OfferAcceptance => "offer_acceptance",
            CircuitKind::OfferFinalization => "offer_finalization",
        }
    }

    /// Number of public field inputs the verifier expects
    pub fn arity(&self) -> usize {
        match self {
            CircuitKind::ConfidentialApprove => ConfidentialApproveInputs::ARITY,
            CircuitKind::PublicApprove => PublicApproveInputs::ARITY,
            CircuitKind::ConfidentialTransferFrom => ConfidentialTransferFromInputs::ARITY,
            CircuitKind::CancelAllowance => CancelAllowanceInputs::ARITY,
            CircuitKind::OfferAcceptance => OfferAcceptanceInputs::ARITY,
            CircuitKind::OfferFinalization => OfferFinalizationInputs::ARITY,
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.id() == id)
    }
}

impl std::fmt::Display for CircuitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}
