use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use keva_store::ProjectionReader;
use keva_types::{LedgerOp, NamespaceId, OpId, Operation};

use crate::config::PoolConfig;
use crate::entry::{PendingEntry, PendingSummary};
use crate::error::{PoolError, PoolResult};
use crate::gate::ChainDepthGate;

/// Node-local pool of unconfirmed operations.
///
/// Entries are kept in acceptance order. Accepts for the same namespace are
/// serialized by a per-namespace chain lock so the depth check and the
/// insert happen as one step; different namespaces proceed in parallel.
pub struct PendingOverlay {
    gate: ChainDepthGate,
    next_seq: AtomicU64,
    inner: RwLock<OverlayState>,
    chain_locks: RwLock<HashMap<NamespaceId, Arc<Mutex<()>>>>,
}

#[derive(Default)]
struct OverlayState {
    entries: BTreeMap<u64, PendingEntry>,
    by_id: HashMap<OpId, u64>,
}

impl OverlayState {
    fn on_namespace<'a>(
        &'a self,
        namespace: &'a NamespaceId,
    ) -> impl Iterator<Item = &'a PendingEntry> + 'a {
        self.entries
            .values()
            .filter(move |entry| entry.namespace() == namespace)
    }

    fn update_count<'a>(&'a self, namespace: &'a NamespaceId) -> usize {
        self.on_namespace(namespace)
            .filter(|entry| entry.op.op.is_update())
            .count()
    }

    fn creation_of<'a>(&'a self, namespace: &'a NamespaceId) -> Option<&'a PendingEntry> {
        self.on_namespace(namespace)
            .find(|entry| !entry.op.op.is_update())
    }

    fn remove(&mut self, seq: u64) -> Option<PendingEntry> {
        let entry = self.entries.remove(&seq)?;
        self.by_id.remove(&entry.op.id);
        Some(entry)
    }
}

impl PendingOverlay {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            gate: ChainDepthGate::new(config),
            next_seq: AtomicU64::new(1),
            inner: RwLock::new(OverlayState::default()),
            chain_locks: RwLock::new(HashMap::new()),
        }
    }

    fn state(&self) -> PoolResult<RwLockReadGuard<'_, OverlayState>> {
        self.inner
            .read()
            .map_err(|_| PoolError::LockPoisoned("overlay read lock poisoned".into()))
    }

    fn state_mut(&self) -> PoolResult<RwLockWriteGuard<'_, OverlayState>> {
        self.inner
            .write()
            .map_err(|_| PoolError::LockPoisoned("overlay write lock poisoned".into()))
    }

    fn chain_lock(&self, namespace: &NamespaceId) -> PoolResult<Arc<Mutex<()>>> {
        if let Some(lock) = self
            .chain_locks
            .read()
            .map_err(|_| PoolError::LockPoisoned("chain lock table poisoned".into()))?
            .get(namespace)
        {
            return Ok(Arc::clone(lock));
        }
        let mut locks = self
            .chain_locks
            .write()
            .map_err(|_| PoolError::LockPoisoned("chain lock table poisoned".into()))?;
        Ok(Arc::clone(locks.entry(*namespace).or_default()))
    }

    /// Drop the chain lock of `namespace` once it has no pending entries and
    /// nobody else holds it. Clones are only taken under the table lock, so
    /// the reference count cannot grow while it is checked here.
    fn release_chain_lock(&self, namespace: &NamespaceId) -> PoolResult<()> {
        let mut locks = self
            .chain_locks
            .write()
            .map_err(|_| PoolError::LockPoisoned("chain lock table poisoned".into()))?;
        let idle = match locks.get(namespace) {
            Some(lock) => Arc::strong_count(lock) == 1,
            None => return Ok(()),
        };
        if idle && self.state()?.on_namespace(namespace).next().is_none() {
            locks.remove(namespace);
        }
        Ok(())
    }

    /// Current unconfirmed chain length of `namespace`: the anchor plus every
    /// pending update on it.
    pub fn check_depth(&self, namespace: &NamespaceId) -> PoolResult<usize> {
        Ok(1 + self.state()?.update_count(namespace))
    }

    /// Accept an operation into the pool.
    ///
    /// Creations must name a namespace that is neither confirmed nor
    /// pending. Updates must target a confirmed or pending-created namespace
    /// and pass the chain-depth gate. A rejected operation leaves the pool
    /// unchanged.
    pub fn accept<R: ProjectionReader + ?Sized>(
        &self,
        op: LedgerOp,
        confirmed: &R,
    ) -> PoolResult<PendingEntry> {
        let namespace = *op.op.namespace();
        if op.op.is_update()
            && confirmed.namespace(&namespace)?.is_none()
            && !self.has_pending_namespace(&namespace)?
        {
            return Err(PoolError::NamespaceNotFound(namespace));
        }
        let accepted = self.accept_chained(op, confirmed);
        self.release_chain_lock(&namespace)?;
        accepted
    }

    fn accept_chained<R: ProjectionReader + ?Sized>(
        &self,
        op: LedgerOp,
        confirmed: &R,
    ) -> PoolResult<PendingEntry> {
        let namespace = *op.op.namespace();
        let lock = self.chain_lock(&namespace)?;
        let _chain = lock
            .lock()
            .map_err(|_| PoolError::LockPoisoned(format!("chain lock for {namespace} poisoned")))?;

        let known_confirmed = confirmed.namespace(&namespace)?.is_some();
        let mut state = self.state_mut()?;
        if state.by_id.contains_key(&op.id) {
            return Err(PoolError::DuplicateOp(op.id));
        }

        let depth = match &op.op {
            Operation::CreateNamespace { .. } => {
                if known_confirmed || state.creation_of(&namespace).is_some() {
                    return Err(PoolError::DuplicateNamespace(namespace));
                }
                1
            }
            Operation::Put { .. } | Operation::Delete { .. } => {
                if !known_confirmed && state.creation_of(&namespace).is_none() {
                    return Err(PoolError::NamespaceNotFound(namespace));
                }
                self.gate
                    .admit(&namespace, 1 + state.update_count(&namespace))?
            }
        };

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let entry = PendingEntry { seq, op, depth };
        state.by_id.insert(entry.op.id, seq);
        state.entries.insert(seq, entry.clone());

        debug!(
            seq,
            namespace = %namespace.short_id(),
            kind = %entry.op.op.kind(),
            depth,
            "operation accepted"
        );
        Ok(entry)
    }

    /// Evict an operation and everything that depends on it: every later
    /// update on the same namespace, or for a creation, every pending
    /// operation on that namespace. Returns the evicted operations in
    /// acceptance order; an unknown id evicts nothing.
    pub fn evict(&self, op_id: &OpId) -> PoolResult<Vec<LedgerOp>> {
        let namespace = {
            let state = self.state()?;
            match state.by_id.get(op_id).and_then(|seq| state.entries.get(seq)) {
                Some(entry) => *entry.namespace(),
                None => return Ok(Vec::new()),
            }
        };
        let evicted = self.evict_chained(op_id, &namespace);
        self.release_chain_lock(&namespace)?;
        evicted
    }

    fn evict_chained(&self, op_id: &OpId, namespace: &NamespaceId) -> PoolResult<Vec<LedgerOp>> {
        let namespace = *namespace;
        let lock = self.chain_lock(&namespace)?;
        let _chain = lock
            .lock()
            .map_err(|_| PoolError::LockPoisoned(format!("chain lock for {namespace} poisoned")))?;
        let mut state = self.state_mut()?;

        let Some(&seq) = state.by_id.get(op_id) else {
            return Ok(Vec::new());
        };
        let is_creation = state
            .entries
            .get(&seq)
            .map(|entry| !entry.op.op.is_update())
            .unwrap_or(false);

        let doomed: Vec<u64> = state
            .on_namespace(&namespace)
            .filter(|entry| is_creation || entry.seq >= seq)
            .map(|entry| entry.seq)
            .collect();
        let evicted: Vec<LedgerOp> = doomed
            .into_iter()
            .filter_map(|s| state.remove(s))
            .map(|entry| entry.op)
            .collect();

        info!(
            op = %op_id.short_hex(),
            namespace = %namespace.short_id(),
            evicted = evicted.len(),
            "evicted pending chain"
        );
        Ok(evicted)
    }

    /// Drop the entries a connected block has confirmed. Returns the dropped
    /// operations.
    pub fn confirmed_now_includes(&self, ops: &[LedgerOp]) -> PoolResult<Vec<LedgerOp>> {
        let mut state = self.state_mut()?;
        let mut included = Vec::new();
        for op in ops {
            let Some(&seq) = state.by_id.get(&op.id) else {
                continue;
            };
            if state.entries.get(&seq).map(|e| &e.op) != Some(op) {
                continue;
            }
            if let Some(entry) = state.remove(seq) {
                included.push(entry.op);
            }
        }
        drop(state);

        if !included.is_empty() {
            debug!(included = included.len(), "pending entries confirmed");
        }
        let mut touched = HashSet::new();
        for op in &included {
            if touched.insert(*op.op.namespace()) {
                self.release_chain_lock(op.op.namespace())?;
            }
        }
        Ok(included)
    }

    /// Evict local pending chains that a connected block has spent out from
    /// under them. `included` are the ids this pool has just seen confirmed;
    /// any other update in the block on a namespace with local pending
    /// updates conflicts with them.
    pub fn evict_conflicts(
        &self,
        ops: &[LedgerOp],
        included: &HashSet<OpId>,
    ) -> PoolResult<Vec<LedgerOp>> {
        let contested: Vec<NamespaceId> = {
            let mut seen = HashSet::new();
            ops.iter()
                .filter(|op| op.op.is_update() && !included.contains(&op.id))
                .map(|op| *op.op.namespace())
                .filter(|ns| seen.insert(*ns))
                .collect()
        };

        let mut evicted = Vec::new();
        for namespace in contested {
            let first_update = {
                let state = self.state()?;
                let id = state
                    .on_namespace(&namespace)
                    .find(|entry| entry.op.op.is_update())
                    .map(|entry| entry.op.id);
                id
            };
            if let Some(op_id) = first_update {
                evicted.extend(self.evict(&op_id)?);
            }
        }
        Ok(evicted)
    }

    /// Evict pending updates whose namespace is no longer known, neither
    /// confirmed nor pending-created. Happens when a disconnect rolls back a
    /// namespace's creation.
    pub fn evict_orphans<R: ProjectionReader + ?Sized>(
        &self,
        confirmed: &R,
    ) -> PoolResult<Vec<LedgerOp>> {
        let candidates: Vec<(NamespaceId, OpId)> = {
            let state = self.state()?;
            let mut seen = HashSet::new();
            state
                .entries
                .values()
                .filter(|entry| entry.op.op.is_update())
                .filter(|entry| seen.insert(*entry.namespace()))
                .filter(|entry| state.creation_of(entry.namespace()).is_none())
                .map(|entry| (*entry.namespace(), entry.op.id))
                .collect()
        };

        let mut evicted = Vec::new();
        for (namespace, first_update) in candidates {
            if confirmed.namespace(&namespace)?.is_none() {
                evicted.extend(self.evict(&first_update)?);
            }
        }
        Ok(evicted)
    }

    /// Latest pending value for `(namespace, key)`, if any pending operation
    /// touches it. A pending delete yields the empty string.
    pub fn pending_value(&self, namespace: &NamespaceId, key: &str) -> PoolResult<Option<String>> {
        let state = self.state()?;
        Ok(state
            .entries
            .values()
            .rev()
            .find(|entry| entry.touches(namespace, key))
            .map(|entry| entry.op.op.value().to_string()))
    }

    /// Pending entries on `namespace`, in acceptance order.
    pub fn entries_for(&self, namespace: &NamespaceId) -> PoolResult<Vec<PendingEntry>> {
        Ok(self.state()?.on_namespace(namespace).cloned().collect())
    }

    /// Pending namespace creations, in acceptance order.
    pub fn pending_namespaces(&self) -> PoolResult<Vec<PendingEntry>> {
        Ok(self
            .state()?
            .entries
            .values()
            .filter(|entry| !entry.op.op.is_update())
            .cloned()
            .collect())
    }

    pub fn has_pending_namespace(&self, namespace: &NamespaceId) -> PoolResult<bool> {
        Ok(self.state()?.creation_of(namespace).is_some())
    }

    /// Pending operations in acceptance order, optionally restricted to one
    /// namespace.
    pub fn list_pending(&self, filter: Option<&NamespaceId>) -> PoolResult<Vec<PendingSummary>> {
        let state = self.state()?;
        Ok(state
            .entries
            .values()
            .filter(|entry| filter.map_or(true, |ns| entry.namespace() == ns))
            .map(PendingSummary::from)
            .collect())
    }

    /// Every pending operation in acceptance order, as a miner would
    /// include them.
    pub fn block_template(&self) -> PoolResult<Vec<LedgerOp>> {
        Ok(self
            .state()?
            .entries
            .values()
            .map(|entry| entry.op.clone())
            .collect())
    }

    pub fn len(&self) -> PoolResult<usize> {
        Ok(self.state()?.entries.len())
    }

    pub fn is_empty(&self) -> PoolResult<bool> {
        Ok(self.state()?.entries.is_empty())
    }
}

impl Default for PendingOverlay {
    fn default() -> Self {
        Self::new(&PoolConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keva_store::{InMemoryProjection, ProjectionWriter};
    use keva_types::{Block, DISPLAY_NAME_KEY};

    fn confirmed_namespace(projection: &InMemoryProjection, name: &str) -> NamespaceId {
        let create = LedgerOp::create_namespace(0, name);
        let namespace = *create.op.namespace();
        let height = projection.tip_height().unwrap() + 1;
        projection.connect(&Block::new(height, vec![create])).unwrap();
        namespace
    }

    // -----------------------------------------------------------------------
    // Admission
    // -----------------------------------------------------------------------

    #[test]
    fn update_on_unknown_namespace_is_rejected() {
        let projection = InMemoryProjection::default();
        let overlay = PendingOverlay::default();
        let ns = NamespaceId::from_raw([9; 32]);

        assert_eq!(
            overlay.accept(LedgerOp::put(0, ns, "k", "v"), &projection),
            Err(PoolError::NamespaceNotFound(ns))
        );
        assert!(overlay.is_empty().unwrap());
    }

    #[test]
    fn update_on_pending_namespace_is_accepted() {
        let projection = InMemoryProjection::default();
        let overlay = PendingOverlay::default();
        let create = LedgerOp::create_namespace(0, "fresh");
        let ns = *create.op.namespace();

        overlay.accept(create, &projection).unwrap();
        let entry = overlay.accept(LedgerOp::put(0, ns, "k", "v"), &projection).unwrap();
        assert_eq!(entry.depth, 2);
        assert_eq!(overlay.check_depth(&ns).unwrap(), 2);
    }

    #[test]
    fn duplicate_creation_and_op_are_rejected() {
        let projection = InMemoryProjection::default();
        let overlay = PendingOverlay::default();
        let ns = confirmed_namespace(&projection, "taken");

        let again = LedgerOp::new(
            keva_types::OpId::from_hash([1; 32]),
            Operation::CreateNamespace {
                namespace: ns,
                display_name: "again".into(),
            },
        );
        assert_eq!(
            overlay.accept(again, &projection),
            Err(PoolError::DuplicateNamespace(ns))
        );

        let put = LedgerOp::put(0, ns, "k", "v");
        overlay.accept(put.clone(), &projection).unwrap();
        assert_eq!(
            overlay.accept(put.clone(), &projection),
            Err(PoolError::DuplicateOp(put.id))
        );
    }

    #[test]
    fn chain_depth_stops_the_twenty_fifth_update() {
        let projection = InMemoryProjection::default();
        let overlay = PendingOverlay::default();
        let ns = confirmed_namespace(&projection, "deep");

        for i in 0..24 {
            overlay
                .accept(LedgerOp::put(0, ns, format!("k{i}"), "v"), &projection)
                .unwrap();
        }
        assert_eq!(overlay.check_depth(&ns).unwrap(), 25);

        let err = overlay
            .accept(LedgerOp::put(0, ns, "k24", "v"), &projection)
            .unwrap_err();
        assert!(matches!(err, PoolError::ChainTooLong { limit: 25, .. }));
        assert_eq!(overlay.len().unwrap(), 24);
    }

    #[test]
    fn chains_are_per_namespace() {
        let projection = InMemoryProjection::default();
        let overlay = PendingOverlay::new(&PoolConfig {
            max_chain_depth: 2,
            ..PoolConfig::default()
        });
        let a = confirmed_namespace(&projection, "a");
        let b = confirmed_namespace(&projection, "b");

        overlay.accept(LedgerOp::put(0, a, "k", "v"), &projection).unwrap();
        assert!(overlay.accept(LedgerOp::put(0, a, "k", "w"), &projection).is_err());
        overlay.accept(LedgerOp::put(0, b, "k", "v"), &projection).unwrap();
    }

    // -----------------------------------------------------------------------
    // Eviction
    // -----------------------------------------------------------------------

    #[test]
    fn evict_cascades_to_later_updates() {
        let projection = InMemoryProjection::default();
        let overlay = PendingOverlay::default();
        let ns = confirmed_namespace(&projection, "chain");
        let other = confirmed_namespace(&projection, "other");

        let first = overlay.accept(LedgerOp::put(0, ns, "a", "1"), &projection).unwrap();
        let second = overlay.accept(LedgerOp::put(0, ns, "b", "2"), &projection).unwrap();
        let third = overlay.accept(LedgerOp::put(0, ns, "c", "3"), &projection).unwrap();
        overlay.accept(LedgerOp::put(0, other, "x", "9"), &projection).unwrap();

        let evicted = overlay.evict(&second.op.id).unwrap();
        assert_eq!(evicted, vec![second.op, third.op]);

        let remaining: Vec<_> = overlay
            .list_pending(None)
            .unwrap()
            .into_iter()
            .map(|s| s.op_id)
            .collect();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0], first.op.id);
    }

    #[test]
    fn evicting_creation_evicts_dependents() {
        let projection = InMemoryProjection::default();
        let overlay = PendingOverlay::default();
        let create = LedgerOp::create_namespace(0, "doomed");
        let ns = *create.op.namespace();

        overlay.accept(create.clone(), &projection).unwrap();
        overlay.accept(LedgerOp::put(0, ns, "k", "v"), &projection).unwrap();

        assert_eq!(overlay.evict(&create.id).unwrap().len(), 2);
        assert!(overlay.is_empty().unwrap());
        assert!(!overlay.has_pending_namespace(&ns).unwrap());
    }

    #[test]
    fn evict_unknown_is_a_no_op() {
        let overlay = PendingOverlay::default();
        assert!(overlay.evict(&OpId::from_hash([3; 32])).unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Block reconciliation
    // -----------------------------------------------------------------------

    #[test]
    fn included_ops_leave_the_pool() {
        let projection = InMemoryProjection::default();
        let overlay = PendingOverlay::default();
        let ns = confirmed_namespace(&projection, "inc");

        let first = overlay.accept(LedgerOp::put(0, ns, "a", "1"), &projection).unwrap();
        let second = overlay.accept(LedgerOp::put(0, ns, "b", "2"), &projection).unwrap();

        let included = overlay.confirmed_now_includes(&[first.op.clone()]).unwrap();
        assert_eq!(included, vec![first.op]);
        assert_eq!(overlay.check_depth(&ns).unwrap(), 2);
        assert_eq!(overlay.list_pending(None).unwrap()[0].op_id, second.op.id);
    }

    #[test]
    fn foreign_update_evicts_local_chain() {
        let projection = InMemoryProjection::default();
        let overlay = PendingOverlay::default();
        let ns = confirmed_namespace(&projection, "contested");

        overlay.accept(LedgerOp::put(0, ns, "a", "1"), &projection).unwrap();
        overlay.accept(LedgerOp::put(0, ns, "b", "2"), &projection).unwrap();

        let foreign = LedgerOp::put(7, ns, "a", "theirs");
        let evicted = overlay
            .evict_conflicts(&[foreign], &HashSet::new())
            .unwrap();
        assert_eq!(evicted.len(), 2);
        assert!(overlay.is_empty().unwrap());
    }

    #[test]
    fn orphaned_updates_are_evicted_after_rollback() {
        let projection = InMemoryProjection::default();
        let overlay = PendingOverlay::default();
        let ns = confirmed_namespace(&projection, "rolled back");
        overlay.accept(LedgerOp::put(0, ns, "k", "v"), &projection).unwrap();

        assert!(overlay.evict_orphans(&projection).unwrap().is_empty());

        projection.disconnect_tip().unwrap();
        assert_eq!(overlay.evict_orphans(&projection).unwrap().len(), 1);
        assert!(overlay.is_empty().unwrap());
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    #[test]
    fn pending_value_prefers_latest() {
        let projection = InMemoryProjection::default();
        let overlay = PendingOverlay::default();
        let create = LedgerOp::create_namespace(0, "lookup");
        let ns = *create.op.namespace();

        overlay.accept(create, &projection).unwrap();
        overlay.accept(LedgerOp::put(0, ns, "k", "v1"), &projection).unwrap();
        assert_eq!(overlay.pending_value(&ns, "k").unwrap().as_deref(), Some("v1"));

        overlay.accept(LedgerOp::delete(0, ns, "k"), &projection).unwrap();
        assert_eq!(overlay.pending_value(&ns, "k").unwrap().as_deref(), Some(""));
        assert_eq!(
            overlay.pending_value(&ns, DISPLAY_NAME_KEY).unwrap().as_deref(),
            Some("lookup")
        );
        assert_eq!(overlay.pending_value(&ns, "other").unwrap(), None);
    }

    #[test]
    fn list_pending_filters_by_namespace() {
        let projection = InMemoryProjection::default();
        let overlay = PendingOverlay::default();
        let a = confirmed_namespace(&projection, "a");
        let b = confirmed_namespace(&projection, "b");

        overlay.accept(LedgerOp::put(0, a, "k", "1"), &projection).unwrap();
        overlay.accept(LedgerOp::put(0, b, "k", "2"), &projection).unwrap();
        overlay.accept(LedgerOp::put(0, a, "j", "3"), &projection).unwrap();

        let only_a = overlay.list_pending(Some(&a)).unwrap();
        assert_eq!(only_a.len(), 2);
        assert!(only_a.iter().all(|s| s.namespace == a));
        assert!(only_a[0].seq < only_a[1].seq);
        assert_eq!(overlay.block_template().unwrap().len(), 3);
    }

    // -----------------------------------------------------------------------
    // Chain locks
    // -----------------------------------------------------------------------

    fn chain_lock_count(overlay: &PendingOverlay) -> usize {
        overlay.chain_locks.read().unwrap().len()
    }

    #[test]
    fn rejected_updates_leave_no_chain_locks() {
        let projection = InMemoryProjection::default();
        let overlay = PendingOverlay::default();

        for seed in 0..200u8 {
            let ns = NamespaceId::from_raw([seed; 32]);
            assert!(overlay
                .accept(LedgerOp::put(0, ns, "k", "v"), &projection)
                .is_err());
        }
        assert!(overlay.is_empty().unwrap());
        assert_eq!(chain_lock_count(&overlay), 0);
    }

    #[test]
    fn chain_lock_is_dropped_once_namespace_drains() {
        let projection = InMemoryProjection::default();
        let overlay = PendingOverlay::default();
        let a = confirmed_namespace(&projection, "drain-a");
        let b = confirmed_namespace(&projection, "drain-b");

        let put_a = overlay.accept(LedgerOp::put(0, a, "k", "v"), &projection).unwrap();
        let put_b = overlay.accept(LedgerOp::put(0, b, "k", "v"), &projection).unwrap();
        assert_eq!(chain_lock_count(&overlay), 2);

        overlay.confirmed_now_includes(&[put_a.op]).unwrap();
        assert_eq!(chain_lock_count(&overlay), 1);

        overlay.evict(&put_b.op.id).unwrap();
        assert_eq!(chain_lock_count(&overlay), 0);
    }

    #[test]
    fn concurrent_accepts_respect_chain_depth() {
        use std::thread;

        let projection = Arc::new(InMemoryProjection::default());
        let overlay = Arc::new(PendingOverlay::default());
        let ns = confirmed_namespace(&projection, "contended");

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let projection = Arc::clone(&projection);
                let overlay = Arc::clone(&overlay);
                thread::spawn(move || {
                    (0..10)
                        .filter(|i| {
                            let op = LedgerOp::put(0, ns, format!("t{t}-{i}"), "v");
                            overlay.accept(op, projection.as_ref()).is_ok()
                        })
                        .count()
                })
            })
            .collect();

        let accepted: usize = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .sum();
        assert_eq!(accepted, 24);
        assert_eq!(overlay.check_depth(&ns).unwrap(), 25);

        let mut depths: Vec<_> = overlay
            .entries_for(&ns)
            .unwrap()
            .into_iter()
            .map(|entry| entry.depth)
            .collect();
        depths.sort_unstable();
        assert_eq!(depths, (2..=25).collect::<Vec<_>>());
    }
}
