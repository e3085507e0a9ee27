use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use keva_mempool::{PendingOverlay, PendingSummary};
use keva_store::{dump_snapshot, InMemoryProjection, ProjectionReader, SnapshotSummary};
use keva_types::{Block, LedgerOp, NamespaceId, OpId};

use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};
use crate::query::{FilterOptions, FilterStats, KeyValue, NamespaceSummary, QueryEngine};
use crate::sync::{BlockSyncHandler, ConnectReport, DisconnectReport};

/// Result of creating a namespace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Created {
    pub op_id: OpId,
    pub namespace: NamespaceId,
}

/// One Keva node: confirmed state plus this node's own pending pool.
///
/// Writes go through the pool and only become visible to other nodes once
/// a block containing them is connected there too.
pub struct KevaNode {
    config: NodeConfig,
    confirmed: InMemoryProjection,
    pending: PendingOverlay,
}

impl KevaNode {
    pub fn new(config: NodeConfig) -> Self {
        let confirmed = InMemoryProjection::new(&config.store);
        let pending = PendingOverlay::new(&config.pool);
        info!(node_id = config.node_id, "node started");
        Self {
            config,
            confirmed,
            pending,
        }
    }

    fn query(&self) -> QueryEngine<'_, InMemoryProjection> {
        QueryEngine::new(&self.confirmed, &self.pending)
    }

    fn sync(&self) -> BlockSyncHandler<'_, InMemoryProjection> {
        BlockSyncHandler::new(&self.confirmed, &self.pending)
    }

    // ---- Writes ----

    pub fn create_namespace(&self, display_name: &str) -> NodeResult<Created> {
        check_len(display_name, self.config.pool.max_display_name_len, |len, max| {
            NodeError::DisplayNameTooLong { len, max }
        })?;
        let op = LedgerOp::create_namespace(self.config.node_id, display_name);
        let created = Created {
            op_id: op.id,
            namespace: *op.op.namespace(),
        };
        self.pending.accept(op, &self.confirmed)?;
        debug!(namespace = %created.namespace.short_id(), "namespace created");
        Ok(created)
    }

    pub fn put(&self, namespace: &NamespaceId, key: &str, value: &str) -> NodeResult<OpId> {
        self.check_key(key)?;
        check_len(value, self.config.pool.max_value_len, |len, max| {
            NodeError::ValueTooLong { len, max }
        })?;
        let op = LedgerOp::put(self.config.node_id, *namespace, key, value);
        let id = op.id;
        self.pending.accept(op, &self.confirmed)?;
        Ok(id)
    }

    /// Delete a key. Fails if the key currently has no value.
    pub fn delete(&self, namespace: &NamespaceId, key: &str) -> NodeResult<OpId> {
        self.check_key(key)?;
        if self.get(namespace, key)?.is_empty() {
            return Err(NodeError::KeyNotFound {
                namespace: *namespace,
                key: key.to_string(),
            });
        }
        let op = LedgerOp::delete(self.config.node_id, *namespace, key);
        let id = op.id;
        self.pending.accept(op, &self.confirmed)?;
        Ok(id)
    }

    fn check_key(&self, key: &str) -> NodeResult<()> {
        check_len(key, self.config.pool.max_key_len, |len, max| {
            NodeError::KeyTooLong { len, max }
        })
    }

    // ---- Reads ----

    pub fn get(&self, namespace: &NamespaceId, key: &str) -> NodeResult<String> {
        self.query().get(namespace, key)
    }

    pub fn filter(
        &self,
        namespace: &NamespaceId,
        prefix: &str,
        options: &FilterOptions,
    ) -> NodeResult<Vec<KeyValue>> {
        self.query().filter(namespace, prefix, options)
    }

    pub fn filter_stats(
        &self,
        namespace: &NamespaceId,
        prefix: &str,
        options: &FilterOptions,
    ) -> NodeResult<FilterStats> {
        self.query().filter_stats(namespace, prefix, options)
    }

    pub fn list_pending(&self, filter: Option<&NamespaceId>) -> NodeResult<Vec<PendingSummary>> {
        self.query().list_pending(filter)
    }

    pub fn list_namespaces(&self) -> NodeResult<Vec<NamespaceSummary>> {
        self.query().list_namespaces()
    }

    // ---- Chain events ----

    pub fn block_connected(&self, block: &Block) -> NodeResult<ConnectReport> {
        self.sync().connect(block)
    }

    pub fn block_disconnected(&self) -> NodeResult<DisconnectReport> {
        self.sync().disconnect_tip()
    }

    /// Admit an operation relayed from elsewhere into this node's pool.
    pub fn operation_accepted(&self, op: LedgerOp) -> NodeResult<()> {
        self.pending.accept(op, &self.confirmed)?;
        Ok(())
    }

    /// Drop an operation and its dependents from this node's pool.
    pub fn operation_evicted(&self, op_id: &OpId) -> NodeResult<Vec<OpId>> {
        Ok(self
            .pending
            .evict(op_id)?
            .into_iter()
            .map(|op| op.id)
            .collect())
    }

    /// Pending operations in acceptance order, ready to be mined.
    pub fn pending_block_template(&self) -> NodeResult<Vec<LedgerOp>> {
        Ok(self.pending.block_template()?)
    }

    /// Build the next block from this node's pool.
    pub fn next_block(&self) -> NodeResult<Block> {
        let height = self.tip_height()? + 1;
        Ok(Block::new(height, self.pending_block_template()?))
    }

    // ---- Accessors ----

    pub fn tip_height(&self) -> NodeResult<u64> {
        Ok(self.confirmed.tip_height()?)
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn dump_snapshot(&self, path: &Path) -> NodeResult<SnapshotSummary> {
        Ok(dump_snapshot(&self.confirmed, path)?)
    }
}

impl Default for KevaNode {
    fn default() -> Self {
        Self::new(NodeConfig::default())
    }
}

fn check_len(
    text: &str,
    max: usize,
    err: impl FnOnce(usize, usize) -> NodeError,
) -> NodeResult<()> {
    if text.len() > max {
        return Err(err(text.len(), max));
    }
    Ok(())
}
