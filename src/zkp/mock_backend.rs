// Transcript proofs for tests
// Skips the pairing work but keeps the semantics that matter to the engine:
// a proof exists only for a satisfied witness, and it binds the exact public
// inputs it was produced for.
use std::sync::Arc;

use ark_relations::r1cs::ConstraintSynthesizer;
use sha2::{Digest, Sha256};

use super::proof_system::{CircuitVerifier, VerifierSet};
use super::prover::ProvingBackend;
use super::{CircuitKind, Result};
use crate::crypto::keys::field_serde;
use crate::crypto::BaseField;

const TRANSCRIPT_DOMAIN: &[u8] = b"confidential-swap/transcript-proof/v1";

fn transcript_digest(kind: CircuitKind, public_inputs: &[BaseField]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(TRANSCRIPT_DOMAIN);
    hasher.update(kind.id().as_bytes());
    for input in public_inputs {
        hasher.update(field_serde::to_bytes(input));
    }
    hasher.finalize().into()
}

/// Prover side. `Prover` has already checked satisfiability.
#[derive(Debug, Clone, Copy, Default)]
pub struct TranscriptBackend;

impl ProvingBackend for TranscriptBackend {
    fn prove<C: ConstraintSynthesizer<BaseField>>(
        &self,
        kind: CircuitKind,
        _circuit: C,
        public_inputs: &[BaseField],
    ) -> Result<Vec<u8>> {
        Ok(transcript_digest(kind, public_inputs).to_vec())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TranscriptVerifier {
    kind: CircuitKind,
}

impl TranscriptVerifier {
    pub fn new(kind: CircuitKind) -> Self {
        Self { kind }
    }
}

impl CircuitVerifier for TranscriptVerifier {
    fn kind(&self) -> CircuitKind {
        self.kind
    }

    fn verify(&self, proof: &[u8], public_inputs: &[BaseField]) -> bool {
        public_inputs.len() == self.kind.arity() && proof == transcript_digest(self.kind, public_inputs)
    }
}

/// Transcript verifiers for every circuit
pub fn transcript_verifiers() -> VerifierSet {
    CircuitKind::ALL
        .iter()
        .fold(VerifierSet::new(), |set, kind| {
            set.with(Arc::new(TranscriptVerifier::new(*kind)))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_binds_kind_and_inputs() {
        let inputs = vec![BaseField::from(7u64); CircuitKind::CancelAllowance.arity()];
        let proof = TranscriptBackend
            .prove(CircuitKind::CancelAllowance, crate::zkp::circuits::CancelAllowanceCircuit::empty(), &inputs)
            .unwrap();

        let verifier = TranscriptVerifier::new(CircuitKind::CancelAllowance);
        assert!(verifier.verify(&proof, &inputs));

        let mut altered = inputs.clone();
        altered[0] = BaseField::from(8u64);
        assert!(!verifier.verify(&proof, &altered));
        assert!(!verifier.verify(&[], &inputs));
    }
}
