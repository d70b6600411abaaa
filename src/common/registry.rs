// Account registry lookup
// Registration itself happens elsewhere; the ledger only reads keys.
use std::collections::HashMap;
use std::sync::RwLock;

use crate::crypto::Point;
use crate::primitives::{Address, Result, SwapError};

pub trait Registry: Send + Sync {
    fn is_registered(&self, account: &Address) -> bool;

    fn public_key(&self, account: &Address) -> Option<Point>;

    /// Registered key or `NotRegistered`
    fn require_key(&self, account: &Address) -> Result<Point> {
        self.public_key(account)
            .ok_or(SwapError::NotRegistered(*account))
    }
}

/// In-process registry for tests and the demo
#[derive(Default)]
pub struct MemoryRegistry {
    keys: RwLock<HashMap<Address, Point>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, account: Address, public_key: Point) -> Result<()> {
        if !public_key.is_valid() || public_key.is_identity() {
            return Err(SwapError::Crypto("registered key must be a non-identity curve point".to_string()));
        }
        let mut keys = self
            .keys
            .write()
            .map_err(|e| SwapError::Storage(format!("Lock poisoned: {}", e)))?;
        keys.insert(account, public_key);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.keys.read().map(|keys| keys.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Registry for MemoryRegistry {
    fn is_registered(&self, account: &Address) -> bool {
        self.public_key(account).is_some()
    }

    fn public_key(&self, account: &Address) -> Option<Point> {
        self.keys.read().ok()?.get(account).copied()
    }
}
