// Key-value state store shared by the ledgers and the offer book
// Every mutating operation stages its writes in a `StateTxn` and commits them
// as one atomic batch.
pub mod memory_store;
pub mod sled_store;

pub use memory_store::MemoryStore;
pub use sled_store::SledStore;

use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Serialize};

use crate::primitives::Result;

/// Logical keyspaces. Each maps to a one-byte key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Namespace {
    Balances,
    Allowances,
    Offers,
    Meta,
}

impl Namespace {
    pub fn prefix(&self) -> u8 {
        match self {
            Namespace::Balances => b'b',
            Namespace::Allowances => b'a',
            Namespace::Offers => b'o',
            Namespace::Meta => b'm',
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Namespace::Balances => "balances",
            Namespace::Allowances => "allowances",
            Namespace::Offers => "offers",
            Namespace::Meta => "meta",
        }
    }

    pub fn prefixed(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(key.len() + 1);
        full.push(self.prefix());
        full.extend_from_slice(key);
        full
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put {
        namespace: Namespace,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        namespace: Namespace,
        key: Vec<u8>,
    },
}

/// Ordered writes applied all-or-nothing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateBatch {
    ops: Vec<BatchOp>,
}

impl StateBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, namespace: Namespace, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put { namespace, key, value });
    }

    pub fn delete(&mut self, namespace: Namespace, key: Vec<u8>) {
        self.ops.push(BatchOp::Delete { namespace, key });
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Persistent state backend
pub trait StateStore: Send + Sync {
    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Apply every op in order, atomically
    fn apply(&self, batch: StateBatch) -> Result<()>;

    /// All entries of a namespace, ordered by key
    fn scan(&self, namespace: Namespace) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Staged writes over a store. Reads see the staged writes first.
pub struct StateTxn<'a> {
    store: &'a dyn StateStore,
    batch: StateBatch,
    overlay: BTreeMap<(Namespace, Vec<u8>), Option<Vec<u8>>>,
}

impl<'a> StateTxn<'a> {
    pub fn new(store: &'a dyn StateStore) -> Self {
        Self {
            store,
            batch: StateBatch::new(),
            overlay: BTreeMap::new(),
        }
    }

    pub fn get_raw(&self, namespace: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(staged) = self.overlay.get(&(namespace, key.to_vec())) {
            return Ok(staged.clone());
        }
        self.store.get(namespace, key)
    }

    pub fn put_raw(&mut self, namespace: Namespace, key: Vec<u8>, value: Vec<u8>) {
        self.overlay.insert((namespace, key.clone()), Some(value.clone()));
        self.batch.put(namespace, key, value);
    }

    pub fn delete(&mut self, namespace: Namespace, key: Vec<u8>) {
        self.overlay.insert((namespace, key.clone()), None);
        self.batch.delete(namespace, key);
    }

    pub fn get<T: DeserializeOwned>(&self, namespace: Namespace, key: &[u8]) -> Result<Option<T>> {
        match self.get_raw(namespace, key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put<T: Serialize>(&mut self, namespace: Namespace, key: Vec<u8>, value: &T) -> Result<()> {
        let bytes = bincode::serialize(value)?;
        self.put_raw(namespace, key, bytes);
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    /// Dropping the txn instead discards every staged write
    pub fn commit(self) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        self.store.apply(self.batch)
    }
}

/// Typed read straight from a store
pub fn read_record<T: DeserializeOwned>(
    store: &dyn StateStore,
    namespace: Namespace,
    key: &[u8],
) -> Result<Option<T>> {
    match store.get(namespace, key)? {
        Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
        None => Ok(None),
    }
}
