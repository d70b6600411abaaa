// Off-ledger proof generation
// The prover checks the witness against the circuit before producing anything,
// so an invalid request fails locally instead of on submission.
use std::collections::HashMap;
use std::path::Path;

use ark_bn254::Bn254;
use ark_groth16::{Groth16, ProvingKey};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use rand::rngs::OsRng;
use tokio::fs;
use tracing::{debug, info};

use super::public_inputs::{CircuitProof, PublicInputs};
use super::{CircuitKind, Result, ZkpError};
use crate::crypto::BaseField;

/// Turns a satisfied circuit into proof bytes
pub trait ProvingBackend: Send + Sync {
    fn prove<C: ConstraintSynthesizer<BaseField>>(
        &self,
        kind: CircuitKind,
        circuit: C,
        public_inputs: &[BaseField],
    ) -> Result<Vec<u8>>;
}

impl<B: ProvingBackend> ProvingBackend for std::sync::Arc<B> {
    fn prove<C: ConstraintSynthesizer<BaseField>>(
        &self,
        kind: CircuitKind,
        circuit: C,
        public_inputs: &[BaseField],
    ) -> Result<Vec<u8>> {
        (**self).prove(kind, circuit, public_inputs)
    }
}

/// Groth16 over BN254 with circuit-specific proving keys
#[derive(Default)]
pub struct Groth16Backend {
    keys: HashMap<CircuitKind, ProvingKey<Bn254>>,
}

impl Groth16Backend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: CircuitKind, pk: ProvingKey<Bn254>) {
        self.keys.insert(kind, pk);
    }

    pub fn has_key(&self, kind: CircuitKind) -> bool {
        self.keys.contains_key(&kind)
    }

    /// Load every `<circuit>.pk` present in `keys_dir`
    pub async fn load_dir(keys_dir: &Path) -> Result<Self> {
        let mut backend = Self::new();
        for kind in CircuitKind::ALL {
            let pk_path = keys_dir.join(format!("{}.pk", kind.id()));
            if !pk_path.exists() {
                continue;
            }
            let pk_bytes = fs::read(&pk_path)
                .await
                .map_err(|e| ZkpError::Io(format!("Failed to read PK {:?}: {}", pk_path, e)))?;
            let pk = ProvingKey::<Bn254>::deserialize_compressed(&pk_bytes[..])
                .map_err(|e| ZkpError::Serialization(format!("PK deserialization error: {}", e)))?;
            backend.insert(kind, pk);
            info!("🔑 Loaded proving key for {}", kind);
        }
        Ok(backend)
    }
}

impl ProvingBackend for Groth16Backend {
    fn prove<C: ConstraintSynthesizer<BaseField>>(
        &self,
        kind: CircuitKind,
        circuit: C,
        _public_inputs: &[BaseField],
    ) -> Result<Vec<u8>> {
        let pk = self.keys.get(&kind).ok_or(ZkpError::MissingKey(kind))?;
        let proof = Groth16::<Bn254>::prove(pk, circuit, &mut OsRng)?;

        let mut bytes = Vec::new();
        proof.serialize_compressed(&mut bytes)?;
        Ok(bytes)
    }
}

/// Fails with `ConstraintsUnsatisfied` unless the circuit is satisfied
pub fn check_satisfied<C: ConstraintSynthesizer<BaseField>>(kind: CircuitKind, circuit: C) -> Result<()> {
    let cs = ConstraintSystem::<BaseField>::new_ref();
    circuit.generate_constraints(cs.clone())?;
    if !cs.is_satisfied()? {
        if let Ok(Some(which)) = cs.which_is_unsatisfied() {
            debug!("{} unsatisfied at {}", kind, which);
        }
        return Err(ZkpError::ConstraintsUnsatisfied(kind));
    }
    debug!("{} satisfied with {} constraints", kind, cs.num_constraints());
    Ok(())
}

pub struct Prover<B> {
    backend: B,
}

impl<B: ProvingBackend> Prover<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn prove<P, C>(&self, inputs: P, circuit: C) -> Result<CircuitProof<P>>
    where
        P: PublicInputs,
        C: ConstraintSynthesizer<BaseField> + Clone,
    {
        check_satisfied(P::KIND, circuit.clone())?;
        let proof = self.backend.prove(P::KIND, circuit, &inputs.to_fields())?;
        Ok(CircuitProof::new(proof, inputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Egct, KeyPair};
    use crate::primitives::Address;
    use crate::zkp::circuits::{CancelAllowanceCircuit, CancelAllowanceWitness};
    use crate::zkp::public_inputs::CancelAllowanceInputs;
    use crate::test_helpers::test_rng;

    #[test]
    fn test_unsatisfied_witness_is_rejected_locally() {
        let mut rng = test_rng();
        let owner = KeyPair::generate(&mut rng);
        let impostor = KeyPair::generate(&mut rng);
        let inputs = CancelAllowanceInputs {
            owner_pk: owner.public_key,
            allowance: Egct::zero(),
            allowance_nonce: 0,
            spender: Address::from_label("spender"),
        };

        // No keys loaded: the satisfiability check fires before the backend
        let prover = Prover::new(Groth16Backend::new());
        let result = prover.prove(
            inputs.clone(),
            CancelAllowanceCircuit::new(inputs, CancelAllowanceWitness { owner_sk: impostor.secret_key }),
        );
        assert!(matches!(result, Err(ZkpError::ConstraintsUnsatisfied(CircuitKind::CancelAllowance))));
    }

    #[test]
    fn test_missing_proving_key() {
        let mut rng = test_rng();
        let owner = KeyPair::generate(&mut rng);
        let inputs = CancelAllowanceInputs {
            owner_pk: owner.public_key,
            allowance: Egct::zero(),
            allowance_nonce: 0,
            spender: Address::from_label("spender"),
        };

        let prover = Prover::new(Groth16Backend::new());
        let result = prover.prove(
            inputs.clone(),
            CancelAllowanceCircuit::new(inputs, CancelAllowanceWitness { owner_sk: owner.secret_key }),
        );
        assert!(matches!(result, Err(ZkpError::MissingKey(_))));
    }
}
