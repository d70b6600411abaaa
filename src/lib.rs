// Confidential peer-to-peer token swaps
// Balances and allowances live on the ledger as ElGamal ciphertexts; every
// transition that depends on a hidden amount is gated by a Groth16 proof.

pub mod primitives;
pub mod crypto;
pub mod zkp;
pub mod storage;
pub mod common;
pub mod ledger;
pub mod swap;
pub mod wallet;
pub mod config;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use primitives::{
    primitives::*,
    error::*,
};

pub use common::{Clock, EventBus, FixedClock, MemoryRegistry, Registry, SwapEvent, SystemClock};
pub use config::{StorageBackend, SwapConfig};
pub use crypto::{Egct, KeyPair, Pct, Point, SecretKey};
pub use ledger::{EncryptedAllowance, EncryptedBalance, Ledger, PublicCredit};
pub use storage::{MemoryStore, SledStore, StateStore};
pub use swap::{Offer, OfferState, OfferTerms, SwapEngine, SwapService, TransferInstructions, TransferLeg};
pub use wallet::Wallet;
pub use zkp::{CircuitKind, CircuitProof, Groth16Backend, Prover, VerifierSet};
