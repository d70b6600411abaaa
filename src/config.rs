// Node configuration, loaded from a JSON file
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::crypto::Point;
use crate::primitives::{Address, AssetId, Result, SwapError};
use crate::storage::{MemoryStore, SledStore, StateStore};
use crate::wallet::{DEFAULT_DLOG_BOUND, MAX_DLOG_BOUND};

/// Addresses as `0x` hex strings in the file
mod hex_address {
    use super::Address;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&address.to_hex())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

mod hex_address_list {
    use super::Address;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(addresses: &[Address], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(addresses.iter().map(Address::to_hex))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Address>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| Address::from_hex(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    /// Programmatic spender that settles finalized offers
    #[serde(with = "hex_address")]
    pub swap_address: Address,
    /// Hex `x || y` of the auditor's BabyJubJub key
    pub auditor_public_key: Option<String>,
    #[serde(with = "hex_address_list")]
    pub tracked_assets: Vec<AssetId>,
    pub keys_dir: PathBuf,
    pub data_dir: PathBuf,
    pub storage: StorageBackend,
    /// Upper bound of the discrete-log search wallets run when decrypting
    pub dlog_bound: u64,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            swap_address: Address::from_label("confidential-swap"),
            auditor_public_key: None,
            tracked_assets: Vec::new(),
            keys_dir: PathBuf::from("./zkp_keys"),
            data_dir: PathBuf::from("./data"),
            storage: StorageBackend::Sled,
            dlog_bound: DEFAULT_DLOG_BOUND,
        }
    }
}

impl SwapConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SwapError::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .await
            .map_err(|e| SwapError::Config(format!("Failed to read {:?}: {}", path, e)))?;
        let config = Self::from_json(&json)?;
        info!("⚙️ Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.swap_address.is_zero() {
            return Err(SwapError::Config("swap_address must be non-zero".to_string()));
        }
        if self.tracked_assets.iter().any(Address::is_zero) {
            return Err(SwapError::Config("the zero address cannot be a tracked asset".to_string()));
        }
        if self.dlog_bound == 0 {
            return Err(SwapError::Config("dlog_bound must be positive".to_string()));
        }
        if self.dlog_bound > MAX_DLOG_BOUND {
            return Err(SwapError::Config(format!(
                "dlog_bound {} exceeds the maximum of {}",
                self.dlog_bound, MAX_DLOG_BOUND
            )));
        }
        if self.auditor_public_key.is_some() {
            self.auditor_pk()?;
        }
        Ok(())
    }

    pub fn auditor_pk(&self) -> Result<Point> {
        let hex = self
            .auditor_public_key
            .as_deref()
            .ok_or_else(|| SwapError::Config("auditor_public_key is not set".to_string()))?;
        Point::from_hex(hex).map_err(|e| SwapError::Config(format!("auditor_public_key: {}", e)))
    }

    pub fn open_store(&self) -> Result<Arc<dyn StateStore>> {
        match self.storage {
            StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
            StorageBackend::Sled => Ok(Arc::new(SledStore::new(self.data_dir.join("state"))?)),
        }
    }
}
