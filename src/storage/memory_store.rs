// In-memory state store, one isolated instance per test or demo run
use std::collections::BTreeMap;
use std::sync::RwLock;

use super::{BatchOp, Namespace, StateBatch, StateStore};
use crate::primitives::{Result, SwapError};

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.read().map(|state| state.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StateStore for MemoryStore {
    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let state = self
            .state
            .read()
            .map_err(|e| SwapError::Storage(format!("Lock poisoned: {}", e)))?;
        Ok(state.get(&namespace.prefixed(key)).cloned())
    }

    fn apply(&self, batch: StateBatch) -> Result<()> {
        // A single write lock makes the whole batch visible at once
        let mut state = self
            .state
            .write()
            .map_err(|e| SwapError::Storage(format!("Lock poisoned: {}", e)))?;
        for op in batch.ops() {
            match op {
                BatchOp::Put { namespace, key, value } => {
                    state.insert(namespace.prefixed(key), value.clone());
                }
                BatchOp::Delete { namespace, key } => {
                    state.remove(&namespace.prefixed(key));
                }
            }
        }
        Ok(())
    }

    fn scan(&self, namespace: Namespace) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let state = self
            .state
            .read()
            .map_err(|e| SwapError::Storage(format!("Lock poisoned: {}", e)))?;
        let prefix = namespace.prefix();
        Ok(state
            .range(vec![prefix]..vec![prefix + 1])
            .map(|(key, value)| (key[1..].to_vec(), value.clone()))
            .collect())
    }
}
