// Trusted setup ceremony for the swap and allowance circuits
// Generates Groth16 proving/verifying keys and a verifiable transcript
use ark_bn254::Bn254;
use ark_groth16::{Groth16, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use ark_std::rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, warn};

use super::circuits::{
    CancelAllowanceCircuit, ConfidentialApproveCircuit, ConfidentialTransferFromCircuit,
    OfferAcceptanceCircuit, OfferFinalizationCircuit, PublicApproveCircuit,
};
use super::{CircuitKind, Result, ZkpError};
use crate::primitives::hash_data;

const TRANSCRIPT_FILE: &str = "ceremony_transcript.json";

/// Trusted setup ceremony coordinator
pub struct TrustedSetupCeremony {
    circuits: Vec<CircuitKind>,
    config: CeremonyConfig,
    keys_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CeremonyConfig {
    pub min_participants: usize,
    pub participants: Vec<String>,
}

impl Default for CeremonyConfig {
    fn default() -> Self {
        Self {
            min_participants: 1,
            participants: vec!["swap-operator".to_string()],
        }
    }
}

/// One circuit's entry in the transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitContribution {
    pub circuit: CircuitKind,
    /// Hex sha256 of the compressed verifying key
    pub vk_hash: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CeremonyTranscript {
    pub ceremony_id: String,
    pub start_time: u64,
    pub end_time: Option<u64>,
    pub participants: Vec<String>,
    pub contributions: Vec<CircuitContribution>,
    pub verification_status: VerificationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    Pending,
    Verified,
    Failed(String),
}

fn vk_hash(vk: &VerifyingKey<Bn254>) -> Result<String> {
    let mut vk_bytes = Vec::new();
    vk.serialize_compressed(&mut vk_bytes)
        .map_err(|e| ZkpError::Serialization(format!("VK serialization error: {}", e)))?;
    Ok(hex::encode(hash_data(&vk_bytes)))
}

/// Circuit-specific Groth16 setup over the empty circuit
pub fn setup_circuit<R: RngCore + CryptoRng>(
    kind: CircuitKind,
    rng: &mut R,
) -> Result<(ProvingKey<Bn254>, VerifyingKey<Bn254>)> {
    let keys = match kind {
        CircuitKind::ConfidentialApprove => {
            Groth16::<Bn254>::circuit_specific_setup(ConfidentialApproveCircuit::empty(), rng)
        }
        CircuitKind::PublicApprove => {
            Groth16::<Bn254>::circuit_specific_setup(PublicApproveCircuit::empty(), rng)
        }
        CircuitKind::ConfidentialTransferFrom => {
            Groth16::<Bn254>::circuit_specific_setup(ConfidentialTransferFromCircuit::empty(), rng)
        }
        CircuitKind::CancelAllowance => {
            Groth16::<Bn254>::circuit_specific_setup(CancelAllowanceCircuit::empty(), rng)
        }
        CircuitKind::OfferAcceptance => {
            Groth16::<Bn254>::circuit_specific_setup(OfferAcceptanceCircuit::empty(), rng)
        }
        CircuitKind::OfferFinalization => {
            Groth16::<Bn254>::circuit_specific_setup(OfferFinalizationCircuit::empty(), rng)
        }
    }?;
    Ok(keys)
}

impl TrustedSetupCeremony {
    pub fn new(keys_dir: PathBuf, config: CeremonyConfig) -> Self {
        Self {
            circuits: CircuitKind::ALL.to_vec(),
            config,
            keys_dir,
        }
    }

    /// Restrict the ceremony to a subset of circuits
    pub fn with_circuits(mut self, circuits: &[CircuitKind]) -> Self {
        self.circuits = circuits.to_vec();
        self
    }

    pub fn circuits(&self) -> &[CircuitKind] {
        &self.circuits
    }

    pub async fn run_ceremony<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<CeremonyTranscript> {
        info!("🔐 Starting trusted setup ceremony");
        info!("📋 Circuits to setup: {:?}", self.circuits);

        let start_time = chrono::Utc::now().timestamp() as u64;
        let mut transcript = CeremonyTranscript {
            ceremony_id: format!("confidential-swap-{}", start_time),
            start_time,
            end_time: None,
            participants: self.config.participants.clone(),
            contributions: Vec::new(),
            verification_status: VerificationStatus::Pending,
        };

        fs::create_dir_all(&self.keys_dir)
            .await
            .map_err(|e| ZkpError::Io(format!("Failed to create keys directory: {}", e)))?;

        for kind in self.circuits.clone() {
            info!("⚙️  Setting up circuit: {}", kind);
            info!("⚡ Running setup computation (this may take several minutes)...");
            let (proving_key, verifying_key) = setup_circuit(kind, rng)?;

            let hash = vk_hash(&verifying_key)?;
            self.save_circuit_keys(kind, &proving_key, &verifying_key).await?;

            transcript.contributions.push(CircuitContribution {
                circuit: kind,
                vk_hash: hash.clone(),
                timestamp: chrono::Utc::now().timestamp() as u64,
            });
            info!("✅ {} setup complete", kind);
            info!("📊 Verifying key hash: {}", hash);
        }

        transcript.end_time = Some(chrono::Utc::now().timestamp() as u64);
        transcript.verification_status = VerificationStatus::Verified;
        self.save_ceremony_transcript(&transcript).await?;

        info!("✅ Trusted setup ceremony completed successfully");
        info!("🔑 Keys generated for {} circuits", self.circuits.len());

        Ok(transcript)
    }

    async fn save_circuit_keys(
        &self,
        kind: CircuitKind,
        proving_key: &ProvingKey<Bn254>,
        verifying_key: &VerifyingKey<Bn254>,
    ) -> Result<()> {
        let pk_path = self.keys_dir.join(format!("{}.pk", kind.id()));
        let mut pk_bytes = Vec::new();
        proving_key
            .serialize_compressed(&mut pk_bytes)
            .map_err(|e| ZkpError::Serialization(format!("PK serialization error: {}", e)))?;
        fs::write(&pk_path, &pk_bytes)
            .await
            .map_err(|e| ZkpError::Io(format!("Failed to write PK: {}", e)))?;

        let vk_path = self.keys_dir.join(format!("{}.vk", kind.id()));
        let mut vk_bytes = Vec::new();
        verifying_key
            .serialize_compressed(&mut vk_bytes)
            .map_err(|e| ZkpError::Serialization(format!("VK serialization error: {}", e)))?;
        fs::write(&vk_path, &vk_bytes)
            .await
            .map_err(|e| ZkpError::Io(format!("Failed to write VK: {}", e)))?;

        info!("💾 Saved keys for {} to {:?}", kind, self.keys_dir);
        info!("   📁 Proving key: {} bytes", pk_bytes.len());
        info!("   📁 Verifying key: {} bytes", vk_bytes.len());
        Ok(())
    }

    pub async fn load_circuit_keys(&self, kind: CircuitKind) -> Result<(ProvingKey<Bn254>, VerifyingKey<Bn254>)> {
        let pk_bytes = fs::read(self.keys_dir.join(format!("{}.pk", kind.id())))
            .await
            .map_err(|e| ZkpError::Io(format!("Failed to read PK: {}", e)))?;
        let proving_key = ProvingKey::<Bn254>::deserialize_compressed(&pk_bytes[..])
            .map_err(|e| ZkpError::Serialization(format!("PK deserialization error: {}", e)))?;

        let verifying_key = self.load_verifying_key(kind).await?;
        info!("🔑 Loaded keys for circuit: {}", kind);
        Ok((proving_key, verifying_key))
    }

    pub async fn load_verifying_key(&self, kind: CircuitKind) -> Result<VerifyingKey<Bn254>> {
        let vk_bytes = fs::read(self.keys_dir.join(format!("{}.vk", kind.id())))
            .await
            .map_err(|e| ZkpError::Io(format!("Failed to read VK: {}", e)))?;
        VerifyingKey::<Bn254>::deserialize_compressed(&vk_bytes[..])
            .map_err(|e| ZkpError::Serialization(format!("VK deserialization error: {}", e)))
    }

    pub fn keys_exist(&self, kind: CircuitKind) -> bool {
        self.keys_dir.join(format!("{}.pk", kind.id())).exists()
            && self.keys_dir.join(format!("{}.vk", kind.id())).exists()
    }

    async fn save_ceremony_transcript(&self, transcript: &CeremonyTranscript) -> Result<()> {
        let transcript_path = self.keys_dir.join(TRANSCRIPT_FILE);
        let transcript_json = serde_json::to_string_pretty(transcript)
            .map_err(|e| ZkpError::Serialization(format!("Transcript serialization error: {}", e)))?;
        fs::write(&transcript_path, transcript_json)
            .await
            .map_err(|e| ZkpError::Io(format!("Failed to write transcript: {}", e)))?;

        info!("📜 Ceremony transcript saved to: {:?}", transcript_path);
        Ok(())
    }

    pub async fn load_ceremony_transcript(&self) -> Result<CeremonyTranscript> {
        let transcript_json = fs::read_to_string(self.keys_dir.join(TRANSCRIPT_FILE))
            .await
            .map_err(|e| ZkpError::Io(format!("Failed to read transcript: {}", e)))?;
        serde_json::from_str(&transcript_json)
            .map_err(|e| ZkpError::Serialization(format!("Transcript deserialization error: {}", e)))
    }

    /// Check every circuit's keys on disk against the transcript hashes
    pub async fn verify_ceremony(&self) -> Result<bool> {
        info!("🔍 Verifying trusted setup ceremony...");
        let transcript = self.load_ceremony_transcript().await?;

        for kind in &self.circuits {
            if !self.keys_exist(*kind) {
                error!("❌ Missing keys for circuit: {}", kind);
                return Ok(false);
            }

            let current = vk_hash(&self.load_verifying_key(*kind).await?)?;
            let recorded = transcript.contributions.iter().find(|c| c.circuit == *kind);
            match recorded {
                Some(contribution) if contribution.vk_hash == current => {
                    info!("✅ Circuit {} keys verified", kind);
                }
                Some(_) => {
                    error!("❌ Key hash mismatch for circuit: {}", kind);
                    return Ok(false);
                }
                None => {
                    error!("❌ Circuit {} missing from transcript", kind);
                    return Ok(false);
                }
            }
        }

        if transcript.participants.len() < self.config.min_participants {
            error!(
                "❌ Insufficient participants: {} < {}",
                transcript.participants.len(),
                self.config.min_participants
            );
            return Ok(false);
        }

        match transcript.verification_status {
            VerificationStatus::Verified => {
                info!("✅ Ceremony verification successful");
                Ok(true)
            }
            VerificationStatus::Failed(ref reason) => {
                error!("❌ Ceremony verification failed: {}", reason);
                Ok(false)
            }
            VerificationStatus::Pending => {
                warn!("⏳ Ceremony verification still pending");
                Ok(false)
            }
        }
    }

    /// Verifying keys for nodes that only verify
    pub async fn export_verifying_keys(&self) -> Result<HashMap<CircuitKind, Vec<u8>>> {
        let mut exports = HashMap::new();
        for kind in &self.circuits {
            let vk_path = self.keys_dir.join(format!("{}.vk", kind.id()));
            if vk_path.exists() {
                let vk_bytes = fs::read(&vk_path)
                    .await
                    .map_err(|e| ZkpError::Io(format!("Failed to read VK: {}", e)))?;
                exports.insert(*kind, vk_bytes);
            }
        }
        Ok(exports)
    }

    pub async fn import_verifying_keys(&self, vk_data: HashMap<CircuitKind, Vec<u8>>) -> Result<()> {
        fs::create_dir_all(&self.keys_dir)
            .await
            .map_err(|e| ZkpError::Io(format!("Failed to create keys directory: {}", e)))?;

        for (kind, vk_bytes) in vk_data {
            VerifyingKey::<Bn254>::deserialize_compressed(&vk_bytes[..])
                .map_err(|e| ZkpError::Serialization(format!("Invalid VK for {}: {}", kind, e)))?;
            fs::write(self.keys_dir.join(format!("{}.vk", kind.id())), &vk_bytes)
                .await
                .map_err(|e| ZkpError::Io(format!("Failed to write VK: {}", e)))?;
            info!("📥 Imported verifying key for: {}", kind);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zkp::VerifierSet;
    use crate::test_helpers::test_rng;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_trusted_setup_ceremony() {
        let temp_dir = tempdir().unwrap();
        let mut ceremony = TrustedSetupCeremony::new(temp_dir.path().to_path_buf(), CeremonyConfig::default())
            .with_circuits(&[CircuitKind::CancelAllowance]);
        let mut rng = test_rng();

        let transcript = ceremony.run_ceremony(&mut rng).await.unwrap();
        assert_eq!(transcript.verification_status, VerificationStatus::Verified);
        assert_eq!(transcript.contributions.len(), 1);
        assert!(ceremony.keys_exist(CircuitKind::CancelAllowance));
        assert!(!ceremony.keys_exist(CircuitKind::OfferAcceptance));

        let (pk, vk) = ceremony.load_circuit_keys(CircuitKind::CancelAllowance).await.unwrap();
        assert_eq!(pk.vk, vk);
        assert!(ceremony.verify_ceremony().await.unwrap());

        let verifiers = VerifierSet::load_dir(temp_dir.path()).await.unwrap();
        assert_eq!(verifiers.kinds(), vec![CircuitKind::CancelAllowance]);
    }

    #[tokio::test]
    async fn test_key_export_import() {
        let temp_dir = tempdir().unwrap();
        let mut ceremony = TrustedSetupCeremony::new(temp_dir.path().to_path_buf(), CeremonyConfig::default())
            .with_circuits(&[CircuitKind::CancelAllowance]);
        ceremony.run_ceremony(&mut test_rng()).await.unwrap();

        let exports = ceremony.export_verifying_keys().await.unwrap();
        assert_eq!(exports.len(), 1);

        let other_dir = tempdir().unwrap();
        let importer = TrustedSetupCeremony::new(other_dir.path().to_path_buf(), CeremonyConfig::default())
            .with_circuits(&[CircuitKind::CancelAllowance]);
        importer.import_verifying_keys(exports).await.unwrap();

        // Verifying key only, no proving key
        assert!(!importer.keys_exist(CircuitKind::CancelAllowance));
        assert!(importer.load_verifying_key(CircuitKind::CancelAllowance).await.is_ok());
    }

    #[tokio::test]
    async fn test_tampered_key_fails_verification() {
        let temp_dir = tempdir().unwrap();
        let mut ceremony = TrustedSetupCeremony::new(temp_dir.path().to_path_buf(), CeremonyConfig::default())
            .with_circuits(&[CircuitKind::CancelAllowance]);
        ceremony.run_ceremony(&mut test_rng()).await.unwrap();

        // Replace the verifying key with one from a different setup
        let (_, other_vk) = setup_circuit(CircuitKind::CancelAllowance, &mut rand::thread_rng()).unwrap();
        let mut bytes = Vec::new();
        other_vk.serialize_compressed(&mut bytes).unwrap();
        fs::write(temp_dir.path().join("cancel_allowance.vk"), bytes).await.unwrap();

        assert!(!ceremony.verify_ceremony().await.unwrap());
    }
}
