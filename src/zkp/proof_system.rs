// Groth16 verification, one prepared key per circuit
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use ark_bn254::Bn254;
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, VerifyingKey};
use ark_serialize::CanonicalDeserialize;
use ark_snark::SNARK;
use tokio::fs;
use tracing::{debug, info, warn};

use super::public_inputs::{CircuitProof, PublicInputs};
use super::{CircuitKind, Result, ZkpError};
use crate::crypto::BaseField;

/// Verifier for one circuit. Any malformed proof is simply invalid.
pub trait CircuitVerifier: Send + Sync {
    fn kind(&self) -> CircuitKind;

    fn verify(&self, proof: &[u8], public_inputs: &[BaseField]) -> bool;
}

pub struct Groth16Verifier {
    kind: CircuitKind,
    pvk: PreparedVerifyingKey<Bn254>,
}

impl Groth16Verifier {
    pub fn new(kind: CircuitKind, vk: &VerifyingKey<Bn254>) -> Self {
        Self {
            kind,
            pvk: ark_groth16::prepare_verifying_key(vk),
        }
    }

    pub fn from_bytes(kind: CircuitKind, vk_bytes: &[u8]) -> Result<Self> {
        let vk = VerifyingKey::<Bn254>::deserialize_compressed(vk_bytes)
            .map_err(|e| ZkpError::Serialization(format!("VK deserialization error for {}: {}", kind, e)))?;
        Ok(Self::new(kind, &vk))
    }
}

impl CircuitVerifier for Groth16Verifier {
    fn kind(&self) -> CircuitKind {
        self.kind
    }

    fn verify(&self, proof_bytes: &[u8], public_inputs: &[BaseField]) -> bool {
        if public_inputs.len() != self.kind.arity() {
            warn!(
                "Public input arity mismatch for {}: {} != {}",
                self.kind,
                public_inputs.len(),
                self.kind.arity()
            );
            return false;
        }

        let proof = match Proof::<Bn254>::deserialize_compressed(proof_bytes) {
            Ok(proof) => proof,
            Err(e) => {
                debug!("Malformed {} proof: {}", self.kind, e);
                return false;
            }
        };

        Groth16::<Bn254>::verify_with_processed_vk(&self.pvk, public_inputs, &proof).unwrap_or(false)
    }
}

/// All circuit verifiers the swap engine consults
#[derive(Clone, Default)]
pub struct VerifierSet {
    verifiers: HashMap<CircuitKind, Arc<dyn CircuitVerifier>>,
}

impl VerifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, verifier: Arc<dyn CircuitVerifier>) {
        self.verifiers.insert(verifier.kind(), verifier);
    }

    pub fn with(mut self, verifier: Arc<dyn CircuitVerifier>) -> Self {
        self.insert(verifier);
        self
    }

    pub fn contains(&self, kind: CircuitKind) -> bool {
        self.verifiers.contains_key(&kind)
    }

    pub fn kinds(&self) -> Vec<CircuitKind> {
        let mut kinds: Vec<_> = self.verifiers.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Verify raw bytes against a flattened input vector
    pub fn verify_raw(&self, kind: CircuitKind, proof: &[u8], public_inputs: &[BaseField]) -> Result<()> {
        let verifier = self.verifiers.get(&kind).ok_or(ZkpError::MissingKey(kind))?;
        if public_inputs.len() != kind.arity() {
            return Err(ZkpError::ArityMismatch {
                kind,
                expected: kind.arity(),
                actual: public_inputs.len(),
            });
        }
        if !verifier.verify(proof, public_inputs) {
            return Err(ZkpError::Rejected(kind));
        }
        Ok(())
    }

    pub fn verify<P: PublicInputs>(&self, proof: &CircuitProof<P>) -> Result<()> {
        self.verify_raw(P::KIND, &proof.proof, &proof.inputs.to_fields())
    }

    /// Load every `<circuit>.vk` present in `keys_dir`
    pub async fn load_dir(keys_dir: &Path) -> Result<Self> {
        let mut set = Self::new();
        for kind in CircuitKind::ALL {
            let vk_path = keys_dir.join(format!("{}.vk", kind.id()));
            if !vk_path.exists() {
                warn!("No verifying key for {} in {:?}", kind, keys_dir);
                continue;
            }
            let vk_bytes = fs::read(&vk_path)
                .await
                .map_err(|e| ZkpError::Io(format!("Failed to read VK {:?}: {}", vk_path, e)))?;
            set.insert(Arc::new(Groth16Verifier::from_bytes(kind, &vk_bytes)?));
            info!("🔑 Loaded verifying key for {}", kind);
        }
        Ok(set)
    }
}

impl std::fmt::Debug for VerifierSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifierSet").field("kinds", &self.kinds()).finish()
    }
}
