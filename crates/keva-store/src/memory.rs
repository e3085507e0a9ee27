use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use keva_types::{Block, NamespaceId};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::projection::ProjectionStore;
use crate::record::{KeyRecord, NamespaceInfo};
use crate::traits::{ProjectionReader, ProjectionWriter};
use crate::undo::UndoLog;

/// Result of connecting one block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedBlock {
    pub height: u64,
    pub ops_applied: usize,
    pub undo_records: usize,
}

/// Result of disconnecting one block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevertedBlock {
    pub height: u64,
    pub records_reverted: usize,
    pub new_tip: u64,
}

/// A point-in-time copy of all confirmed state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionSnapshot {
    pub tip: u64,
    pub namespaces: Vec<NamespaceInfo>,
    pub rows: Vec<(NamespaceId, String, KeyRecord)>,
}

/// In-memory confirmed projection.
///
/// Rows, registry, undo log and tip share one lock, so connecting or
/// disconnecting a block is a single critical section.
pub struct InMemoryProjection {
    inner: RwLock<ProjectionState>,
}

struct ProjectionState {
    store: ProjectionStore,
    undo: UndoLog,
}

impl InMemoryProjection {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            inner: RwLock::new(ProjectionState {
                store: ProjectionStore::new(),
                undo: UndoLog::new(config.undo_retention),
            }),
        }
    }

    fn state(&self) -> StoreResult<RwLockReadGuard<'_, ProjectionState>> {
        self.inner
            .read()
            .map_err(|_| StoreError::LockPoisoned("projection read lock poisoned".into()))
    }

    fn state_mut(&self) -> StoreResult<RwLockWriteGuard<'_, ProjectionState>> {
        self.inner
            .write()
            .map_err(|_| StoreError::LockPoisoned("projection write lock poisoned".into()))
    }

    /// Number of stored rows, tombstones included.
    pub fn row_count(&self) -> StoreResult<usize> {
        Ok(self.state()?.store.row_count())
    }

    /// Heights whose undo data is still retained, as `(oldest, tip)`.
    pub fn undo_window(&self) -> StoreResult<Option<(u64, u64)>> {
        let state = self.state()?;
        Ok(state.undo.oldest().map(|oldest| (oldest, state.undo.tip())))
    }
}

impl Default for InMemoryProjection {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

impl ProjectionWriter for InMemoryProjection {
    fn connect(&self, block: &Block) -> StoreResult<AppliedBlock> {
        let mut state = self.state_mut()?;
        let expected = state.undo.tip() + 1;
        if block.height != expected {
            return Err(StoreError::HeightMismatch {
                expected,
                actual: block.height,
            });
        }

        let undo = state.store.apply(block.height, &block.ops);
        let undo_records = undo.len();
        state.undo.push(undo)?;

        info!(height = block.height, ops = block.ops.len(), "block connected");
        Ok(AppliedBlock {
            height: block.height,
            ops_applied: block.ops.len(),
            undo_records,
        })
    }

    fn disconnect(&self, height: u64) -> StoreResult<RevertedBlock> {
        let mut state = self.state_mut()?;
        state.revert_tip(height)
    }

    fn disconnect_tip(&self) -> StoreResult<RevertedBlock> {
        let mut state = self.state_mut()?;
        let tip = state.undo.tip();
        state.revert_tip(tip)
    }
}

impl ProjectionState {
    fn revert_tip(&mut self, height: u64) -> StoreResult<RevertedBlock> {
        let undo = self.undo.pop(height)?;
        let records_reverted = undo.len();
        self.store.revert(undo);

        let new_tip = self.undo.tip();
        info!(height, new_tip, "block disconnected");
        Ok(RevertedBlock {
            height,
            records_reverted,
            new_tip,
        })
    }
}

impl ProjectionReader for InMemoryProjection {
    fn tip_height(&self) -> StoreResult<u64> {
        Ok(self.state()?.undo.tip())
    }

    fn read(&self, namespace: &NamespaceId, key: &str) -> StoreResult<Option<KeyRecord>> {
        Ok(self.state()?.store.read(namespace, key).cloned())
    }

    fn scan_prefix(
        &self,
        namespace: &NamespaceId,
        prefix: &str,
    ) -> StoreResult<Vec<(String, KeyRecord)>> {
        let rows = self.state()?.store.scan_prefix(namespace, prefix);
        debug!(namespace = %namespace.short_id(), prefix, rows = rows.len(), "prefix scan");
        Ok(rows)
    }

    fn namespace(&self, namespace: &NamespaceId) -> StoreResult<Option<NamespaceInfo>> {
        Ok(self.state()?.store.registry().get(namespace).cloned())
    }

    fn namespaces(&self) -> StoreResult<Vec<NamespaceInfo>> {
        Ok(self.state()?.store.registry().list())
    }

    fn snapshot(&self) -> StoreResult<ProjectionSnapshot> {
        let state = self.state()?;
        Ok(ProjectionSnapshot {
            tip: state.undo.tip(),
            namespaces: state.store.registry().list(),
            rows: state
                .store
                .rows()
                .map(|(ns, key, record)| (*ns, key.to_string(), record.clone()))
                .collect(),
        })
    }
}
