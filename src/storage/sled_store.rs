// Sled-backed persistent state store
// All namespaces share one tree so a batch commits atomically.
use std::path::Path;
use std::sync::Arc;

use sled::{Batch, Db, Tree};
use tracing::debug;

use super::{BatchOp, Namespace, StateBatch, StateStore};
use crate::primitives::{Result, SwapError};

const STATE_TREE: &str = "swap_state";

pub struct SledStore {
    db: Arc<Db>,
    state_tree: Tree,
}

impl SledStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)
            .map_err(|e| SwapError::Storage(format!("Failed to create directory: {}", e)))?;

        let db = sled::open(path)
            .map_err(|e| SwapError::Storage(format!("Failed to open Sled database: {}", e)))?;
        let state_tree = db
            .open_tree(STATE_TREE)
            .map_err(|e| SwapError::Storage(format!("Failed to open state tree: {}", e)))?;

        Ok(Self {
            db: Arc::new(db),
            state_tree,
        })
    }

    /// Entry counts per namespace
    pub fn stats(&self) -> Result<DatabaseStats> {
        let count = |namespace: Namespace| self.state_tree.scan_prefix([namespace.prefix()]).count();
        Ok(DatabaseStats {
            balances: count(Namespace::Balances),
            allowances: count(Namespace::Allowances),
            offers: count(Namespace::Offers),
            size_on_disk: self.db.size_on_disk()?,
        })
    }
}

impl StateStore for SledStore {
    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.state_tree.get(namespace.prefixed(key)) {
            Ok(Some(data)) => Ok(Some(data.to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(SwapError::Storage(format!("Failed to get data: {}", e))),
        }
    }

    fn apply(&self, batch: StateBatch) -> Result<()> {
        let mut sled_batch = Batch::default();
        for op in batch.ops() {
            match op {
                BatchOp::Put { namespace, key, value } => {
                    sled_batch.insert(namespace.prefixed(key), value.clone());
                }
                BatchOp::Delete { namespace, key } => {
                    sled_batch.remove(namespace.prefixed(key));
                }
            }
        }
        self.state_tree
            .apply_batch(sled_batch)
            .map_err(|e| SwapError::Storage(format!("Failed to apply batch: {}", e)))?;
        debug!("Applied batch of {} ops", batch.len());
        Ok(())
    }

    fn scan(&self, namespace: Namespace) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.state_tree
            .scan_prefix([namespace.prefix()])
            .map(|entry| {
                let (key, value) =
                    entry.map_err(|e| SwapError::Storage(format!("Failed to scan {}: {}", namespace.name(), e)))?;
                Ok((key[1..].to_vec(), value.to_vec()))
            })
            .collect()
    }

    fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| SwapError::Storage(format!("Failed to sync database: {}", e)))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub balances: usize,
    pub allowances: usize,
    pub offers: usize,
    pub size_on_disk: u64,
}
