// Trusted setup for every swap circuit
use std::path::PathBuf;

use confidential_swap::zkp::trusted_setup::{CeremonyConfig, TrustedSetupCeremony};
use rand::rngs::OsRng;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let keys_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./zkp_keys"));

    tracing::info!("🔐 Confidential swap trusted setup");
    let mut ceremony = TrustedSetupCeremony::new(keys_dir.clone(), CeremonyConfig::default());
    let transcript = ceremony.run_ceremony(&mut OsRng).await?;

    tracing::info!("📋 Ceremony ID: {}", transcript.ceremony_id);
    for contribution in &transcript.contributions {
        tracing::info!("   • {}: vk {}", contribution.circuit, contribution.vk_hash);
    }

    let verified = ceremony.verify_ceremony().await?;
    tracing::info!("🔍 Ceremony verification: {}", verified);
    tracing::info!("💾 Keys saved to: {:?}", keys_dir);
    Ok(())
}
