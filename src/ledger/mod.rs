// Encrypted balance ledger and allowance ledger
// Every entry point checks preconditions, matches the proof's public inputs
// against stored state, verifies, and only then stages its writes into one
// `Changeset` that commits atomically before any event goes out.
pub mod allowance;
pub mod balance;

pub use allowance::{allowance_key, EncryptedAllowance};
pub use balance::{balance_key, AmountPct, EncryptedBalance, HistoryMarker};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::common::{EventBus, Registry, SwapEvent};
use crate::crypto::keys::scalar_serde;
use crate::crypto::{encrypt, Egct, Pct, Point, ScalarField};
use crate::primitives::{Address, Amount, AssetId, Result, SwapError};
use crate::storage::{Namespace, StateStore, StateTxn};
use crate::zkp::{
    CancelAllowanceInputs, CircuitKind, CircuitProof, ConfidentialApproveInputs,
    ConfidentialTransferFromInputs, PublicApproveInputs, PublicInputs, VerifierSet,
};

const TRACKED_ASSET_PREFIX: &[u8] = b"asset/";

/// Staged writes plus the events they will emit once committed
pub struct Changeset<'a> {
    pub txn: StateTxn<'a>,
    events: Vec<SwapEvent>,
}

impl<'a> Changeset<'a> {
    pub fn new(store: &'a dyn StateStore) -> Self {
        Self {
            txn: StateTxn::new(store),
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: SwapEvent) {
        self.events.push(event);
    }

    pub fn commit(self, bus: &EventBus) -> Result<()> {
        self.txn.commit()?;
        for event in self.events {
            bus.emit(event);
        }
        Ok(())
    }
}

/// Receiver ciphertext for a plaintext-amount credit, with its opening.
/// The amount is already public so revealing the randomness costs nothing,
/// and it lets the ledger check the ciphertext without a proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicCredit {
    pub ciphertext: Egct,
    #[serde(with = "scalar_serde")]
    pub randomness: ScalarField,
    pub pct: Pct,
}

impl PublicCredit {
    pub fn opens_to(&self, receiver_pk: &Point, amount: Amount) -> bool {
        encrypt(receiver_pk, amount, &self.randomness) == self.ciphertext
    }
}

/// Ciphertext of a disclosed amount under any key (zero randomness)
pub fn public_amount_ciphertext(amount: Amount) -> Egct {
    Egct {
        c1: Point::identity(),
        c2: Point::from_amount(amount),
    }
}

fn mismatch(kind: CircuitKind, what: &str) -> SwapError {
    debug!("{} public input mismatch: {}", kind, what);
    warn!("❌ Rejected {} proof", kind);
    SwapError::InvalidProof
}

pub struct Ledger {
    store: Arc<dyn StateStore>,
    registry: Arc<dyn Registry>,
    verifiers: Arc<VerifierSet>,
    auditor_pk: Point,
    events: Arc<EventBus>,
}

impl Ledger {
    pub fn new(
        store: Arc<dyn StateStore>,
        registry: Arc<dyn Registry>,
        verifiers: Arc<VerifierSet>,
        auditor_pk: Point,
    ) -> Self {
        Self {
            store,
            registry,
            verifiers,
            auditor_pk,
            events: Arc::new(EventBus::new()),
        }
    }

    pub fn store(&self) -> Arc<dyn StateStore> {
        Arc::clone(&self.store)
    }

    pub fn registry(&self) -> &dyn Registry {
        self.registry.as_ref()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn auditor_pk(&self) -> Point {
        self.auditor_pk
    }

    pub(crate) fn verify_proof<P: PublicInputs>(&self, proof: &CircuitProof<P>) -> Result<()> {
        self.verifiers.verify(proof).map_err(|e| {
            debug!("{} verification failed: {}", P::KIND, e);
            warn!("❌ Rejected {} proof", P::KIND);
            SwapError::InvalidProof
        })
    }

    fn require_owner(caller: &Address, owner: &Address) -> Result<()> {
        if caller != owner {
            return Err(SwapError::Unauthorized(*caller));
        }
        Ok(())
    }

    // Asset tracking

    pub fn track_asset(&mut self, asset: AssetId) -> Result<()> {
        let mut txn = StateTxn::new(self.store.as_ref());
        txn.put(Namespace::Meta, tracked_asset_key(&asset), &true)?;
        txn.commit()?;
        info!("Tracking asset {}", asset);
        Ok(())
    }

    pub fn is_tracked(&self, asset: &AssetId) -> Result<bool> {
        Ok(self.store.get(Namespace::Meta, &tracked_asset_key(asset))?.is_some())
    }

    pub(crate) fn is_tracked_in(&self, txn: &StateTxn<'_>, asset: &AssetId) -> Result<bool> {
        Ok(txn.get_raw(Namespace::Meta, &tracked_asset_key(asset))?.is_some())
    }

    pub fn tracked_assets(&self) -> Result<Vec<AssetId>> {
        let mut assets = Vec::new();
        for (key, _) in self.store.scan(Namespace::Meta)? {
            if let Some(raw) = key.strip_prefix(TRACKED_ASSET_PREFIX) {
                if let Ok(bytes) = <[u8; 20]>::try_from(raw) {
                    assets.push(Address(bytes));
                }
            }
        }
        Ok(assets)
    }

    fn require_tracked(&self, txn: &StateTxn<'_>, asset: &AssetId) -> Result<()> {
        if !self.is_tracked_in(txn, asset)? {
            return Err(SwapError::UnknownAsset(*asset));
        }
        Ok(())
    }

    // Balances

    pub fn read(&self, account: &Address, asset: &AssetId) -> Result<EncryptedBalance> {
        let txn = StateTxn::new(self.store.as_ref());
        load_balance(&txn, account, asset)
    }

    /// Homomorphic credit. The caller has already validated whatever
    /// authorizes it.
    pub fn credit(&mut self, account: &Address, asset: &AssetId, amount: &Egct, viewer_pct: Pct) -> Result<()> {
        let store = self.store();
        let mut changes = Changeset::new(store.as_ref());
        self.stage_credit(&mut changes, account, asset, amount, viewer_pct)?;
        changes.commit(&self.events)
    }

    /// Homomorphic debit. Sufficiency is the proof's job, never checked here.
    pub fn debit(
        &mut self,
        account: &Address,
        asset: &AssetId,
        amount: &Egct,
        new_balance_pct: Option<Pct>,
    ) -> Result<()> {
        let store = self.store();
        let mut changes = Changeset::new(store.as_ref());
        self.stage_debit(&mut changes, account, asset, amount, new_balance_pct)?;
        changes.commit(&self.events)
    }

    pub(crate) fn stage_credit(
        &self,
        changes: &mut Changeset<'_>,
        account: &Address,
        asset: &AssetId,
        amount: &Egct,
        viewer_pct: Pct,
    ) -> Result<()> {
        let mut balance = load_balance(&changes.txn, account, asset)?;
        balance.credit(amount, viewer_pct);
        changes
            .txn
            .put(Namespace::Balances, balance_key(account, asset), &balance)?;
        changes.emit(SwapEvent::BalanceCredited {
            account: *account,
            asset: *asset,
            transaction_index: balance.transaction_index,
        });
        debug!("Credited {} on {} (index {})", account, asset, balance.transaction_index);
        Ok(())
    }

    pub(crate) fn stage_debit(
        &self,
        changes: &mut Changeset<'_>,
        account: &Address,
        asset: &AssetId,
        amount: &Egct,
        new_balance_pct: Option<Pct>,
    ) -> Result<()> {
        let mut balance = load_balance(&changes.txn, account, asset)?;
        balance.debit(amount, new_balance_pct);
        changes
            .txn
            .put(Namespace::Balances, balance_key(account, asset), &balance)?;
        changes.emit(SwapEvent::BalanceDebited {
            account: *account,
            asset: *asset,
            transaction_index: balance.transaction_index,
            nonce: balance.nonce,
        });
        debug!("Debited {} on {} (nonce {})", account, asset, balance.nonce);
        Ok(())
    }

    // Allowances

    pub fn get_allowance(&self, owner: &Address, spender: &Address, asset: &AssetId) -> Result<EncryptedAllowance> {
        let txn = StateTxn::new(self.store.as_ref());
        load_allowance(&txn, owner, spender, asset)
    }

    /// Confidential approval: the allowance is encrypted for the spender,
    /// with a PCT the spender can open directly.
    pub fn approve_confidential(
        &mut self,
        caller: &Address,
        owner: &Address,
        spender: &Address,
        asset: &AssetId,
        proof: &CircuitProof<ConfidentialApproveInputs>,
    ) -> Result<()> {
        Self::require_owner(caller, owner)?;
        let owner_pk = self.registry.require_key(owner)?;
        let spender_pk = self.registry.require_key(spender)?;

        let store = self.store();
        let mut changes = Changeset::new(store.as_ref());
        self.require_tracked(&changes.txn, asset)?;

        let mut allowance = load_allowance(&changes.txn, owner, spender, asset)?;
        let balance = load_balance(&changes.txn, owner, asset)?;
        let inputs = &proof.inputs;
        let kind = CircuitKind::ConfidentialApprove;
        if inputs.owner_pk != owner_pk || inputs.spender_pk != spender_pk {
            return Err(mismatch(kind, "party keys"));
        }
        if inputs.auditor_pk != self.auditor_pk {
            return Err(mismatch(kind, "auditor key"));
        }
        if !balance.is_known_balance(&inputs.owner_balance) {
            return Err(mismatch(kind, "owner balance"));
        }
        if inputs.allowance_nonce != allowance.nonce || inputs.asset != *asset {
            return Err(mismatch(kind, "nonce or asset"));
        }
        self.verify_proof(proof)?;

        allowance.set_confidential(inputs.allowance, inputs.spender_pct);
        changes.txn.put(
            Namespace::Allowances,
            allowance_key(owner, spender, asset),
            &allowance,
        )?;
        changes.emit(SwapEvent::AllowanceApproved {
            owner: *owner,
            spender: *spender,
            asset: *asset,
            is_public: false,
            nonce: allowance.nonce,
        });
        changes.commit(&self.events)?;

        info!("✅ Confidential allowance {} -> {} on {} (nonce {})", owner, spender, asset, allowance.nonce);
        Ok(())
    }

    /// Public approval for a programmatic spender that holds no key
    pub fn approve_public(
        &mut self,
        caller: &Address,
        owner: &Address,
        spender: &Address,
        asset: &AssetId,
        amount: Amount,
        proof: &CircuitProof<PublicApproveInputs>,
    ) -> Result<()> {
        Self::require_owner(caller, owner)?;
        let owner_pk = self.registry.require_key(owner)?;
        if self.registry.is_registered(spender) {
            return Err(SwapError::SpenderIsRegistered(*spender));
        }

        let store = self.store();
        let mut changes = Changeset::new(store.as_ref());
        self.require_tracked(&changes.txn, asset)?;

        let mut allowance = load_allowance(&changes.txn, owner, spender, asset)?;
        let balance = load_balance(&changes.txn, owner, asset)?;
        let inputs = &proof.inputs;
        let kind = CircuitKind::PublicApprove;
        if inputs.owner_pk != owner_pk {
            return Err(mismatch(kind, "owner key"));
        }
        if !balance.is_known_balance(&inputs.owner_balance) {
            return Err(mismatch(kind, "owner balance"));
        }
        if inputs.amount != amount || inputs.allowance_nonce != allowance.nonce || inputs.asset != *asset {
            return Err(mismatch(kind, "amount, nonce or asset"));
        }
        self.verify_proof(proof)?;

        allowance.set_public(amount);
        changes.txn.put(
            Namespace::Allowances,
            allowance_key(owner, spender, asset),
            &allowance,
        )?;
        changes.emit(SwapEvent::AllowanceApproved {
            owner: *owner,
            spender: *spender,
            asset: *asset,
            is_public: true,
            nonce: allowance.nonce,
        });
        changes.commit(&self.events)?;

        info!("✅ Public allowance {} -> {} on {}: {}", owner, spender, asset, amount);
        Ok(())
    }

    /// Spend from a confidential allowance. The spender re-encrypts the
    /// remainder for itself and the transfer amount for the receiver.
    pub fn spend_confidential(
        &mut self,
        caller: &Address,
        owner: &Address,
        spender: &Address,
        receiver: &Address,
        asset: &AssetId,
        proof: &CircuitProof<ConfidentialTransferFromInputs>,
    ) -> Result<()> {
        if caller != spender {
            return Err(SwapError::Unauthorized(*caller));
        }
        let spender_pk = self.registry.require_key(spender)?;
        let receiver_pk = self.registry.require_key(receiver)?;

        let store = self.store();
        let mut changes = Changeset::new(store.as_ref());
        self.require_tracked(&changes.txn, asset)?;

        let mut allowance = load_allowance(&changes.txn, owner, spender, asset)?;
        if !allowance.exists() {
            return Err(SwapError::AllowanceNotFound);
        }
        if allowance.is_public {
            return Err(SwapError::AllowanceModeMismatch);
        }

        let inputs = &proof.inputs;
        let kind = CircuitKind::ConfidentialTransferFrom;
        if inputs.spender_pk != spender_pk || inputs.receiver_pk != receiver_pk {
            return Err(mismatch(kind, "party keys"));
        }
        if inputs.auditor_pk != self.auditor_pk {
            return Err(mismatch(kind, "auditor key"));
        }
        if inputs.prior_allowance != allowance.encrypted_amount {
            return Err(mismatch(kind, "prior allowance"));
        }
        if inputs.allowance_nonce != allowance.nonce || inputs.asset != *asset {
            return Err(mismatch(kind, "nonce or asset"));
        }
        self.verify_proof(proof)?;

        // The spender's PCT described the old amount
        allowance.set_confidential(inputs.new_allowance, Pct::default());
        changes.txn.put(
            Namespace::Allowances,
            allowance_key(owner, spender, asset),
            &allowance,
        )?;
        self.stage_credit(&mut changes, receiver, asset, &inputs.receiver_amount, inputs.receiver_pct)?;
        changes.emit(SwapEvent::AllowanceSpent {
            owner: *owner,
            spender: *spender,
            receiver: *receiver,
            asset: *asset,
            nonce: allowance.nonce,
        });
        changes.commit(&self.events)?;

        info!("✅ Confidential spend {} -> {} via {} on {}", owner, receiver, spender, asset);
        Ok(())
    }

    /// Spend from a public allowance. No proof: the amount is already public.
    pub fn spend_public(
        &mut self,
        caller: &Address,
        owner: &Address,
        receiver: &Address,
        asset: &AssetId,
        amount: Amount,
        credit: &PublicCredit,
    ) -> Result<()> {
        let store = self.store();
        let mut changes = Changeset::new(store.as_ref());
        self.stage_spend_public(&mut changes, caller, owner, receiver, asset, amount, credit)?;
        changes.commit(&self.events)?;

        info!("✅ Public spend {} -> {} via {} on {}: {}", owner, receiver, caller, asset, amount);
        Ok(())
    }

    /// Public spend staged into an existing changeset. The owner is debited
    /// with the disclosed amount so the transfer conserves supply.
    /// The debit is the trivial ciphertext `(identity, amount*G)` built here,
    /// unlike a confidential spend whose debit ciphertext comes from its proof.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn stage_spend_public(
        &self,
        changes: &mut Changeset<'_>,
        spender: &Address,
        owner: &Address,
        receiver: &Address,
        asset: &AssetId,
        amount: Amount,
        credit: &PublicCredit,
    ) -> Result<()> {
        self.require_tracked(&changes.txn, asset)?;

        let mut allowance = load_allowance(&changes.txn, owner, spender, asset)?;
        if !allowance.exists() {
            return Err(SwapError::AllowanceNotFound);
        }
        if !allowance.is_public {
            return Err(SwapError::AllowanceModeMismatch);
        }
        if amount > allowance.public_amount {
            return Err(SwapError::InsufficientPublicAllowance {
                requested: amount,
                available: allowance.public_amount,
            });
        }

        let receiver_pk = self.registry.require_key(receiver)?;
        if !credit.opens_to(&receiver_pk, amount) {
            return Err(SwapError::InvalidTransferInstructions(
                "receiver ciphertext does not open to the transfer amount".to_string(),
            ));
        }

        allowance.public_amount -= amount;
        allowance.nonce += 1;
        changes.txn.put(
            Namespace::Allowances,
            allowance_key(owner, spender, asset),
            &allowance,
        )?;

        self.stage_debit(changes, owner, asset, &public_amount_ciphertext(amount), None)?;
        self.stage_credit(changes, receiver, asset, &credit.ciphertext, credit.pct)?;
        changes.emit(SwapEvent::AllowanceSpent {
            owner: *owner,
            spender: *spender,
            receiver: *receiver,
            asset: *asset,
            nonce: allowance.nonce,
        });
        Ok(())
    }

    /// Clear whichever mode is live and bump the nonce
    pub fn cancel(
        &mut self,
        caller: &Address,
        owner: &Address,
        spender: &Address,
        asset: &AssetId,
        proof: &CircuitProof<CancelAllowanceInputs>,
    ) -> Result<()> {
        Self::require_owner(caller, owner)?;
        let owner_pk = self.registry.require_key(owner)?;

        let store = self.store();
        let mut changes = Changeset::new(store.as_ref());
        let mut allowance = load_allowance(&changes.txn, owner, spender, asset)?;
        if !allowance.exists() {
            return Err(SwapError::AllowanceNotFound);
        }

        let inputs = &proof.inputs;
        let kind = CircuitKind::CancelAllowance;
        if inputs.owner_pk != owner_pk {
            return Err(mismatch(kind, "owner key"));
        }
        if inputs.allowance != allowance.encrypted_amount {
            return Err(mismatch(kind, "allowance"));
        }
        if inputs.allowance_nonce != allowance.nonce || inputs.spender != *spender {
            return Err(mismatch(kind, "nonce or spender"));
        }
        self.verify_proof(proof)?;

        allowance.clear();
        changes.txn.put(
            Namespace::Allowances,
            allowance_key(owner, spender, asset),
            &allowance,
        )?;
        changes.emit(SwapEvent::AllowanceCancelled {
            owner: *owner,
            spender: *spender,
            asset: *asset,
            nonce: allowance.nonce,
        });
        changes.commit(&self.events)?;

        info!("🗑️ Allowance {} -> {} on {} cancelled", owner, spender, asset);
        Ok(())
    }
}

fn tracked_asset_key(asset: &AssetId) -> Vec<u8> {
    let mut key = TRACKED_ASSET_PREFIX.to_vec();
    key.extend_from_slice(asset.as_bytes());
    key
}

pub(crate) fn load_balance(txn: &StateTxn<'_>, account: &Address, asset: &AssetId) -> Result<EncryptedBalance> {
    Ok(txn
        .get(Namespace::Balances, &balance_key(account, asset))?
        .unwrap_or_default())
}

pub(crate) fn load_allowance(
    txn: &StateTxn<'_>,
    owner: &Address,
    spender: &Address,
    asset: &AssetId,
) -> Result<EncryptedAllowance> {
    Ok(txn
        .get(Namespace::Allowances, &allowance_key(owner, spender, asset))?
        .unwrap_or_default())
}
