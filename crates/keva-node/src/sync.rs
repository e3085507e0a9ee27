use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use keva_mempool::PendingOverlay;
use keva_store::{ProjectionReader, ProjectionWriter, RevertedBlock};
use keva_types::{Block, OpId};

use crate::error::NodeResult;

/// What a connect did to confirmed state and to the pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConnectReport {
    pub height: u64,
    pub ops_applied: usize,
    /// Pending operations the block confirmed.
    pub included: Vec<OpId>,
    /// Pending operations dropped because the block spent their chain.
    pub evicted: Vec<OpId>,
}

/// What a disconnect did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DisconnectReport {
    pub height: u64,
    pub new_tip: u64,
    pub records_reverted: usize,
    /// Pending updates dropped because their namespace was rolled back.
    pub evicted: Vec<OpId>,
}

/// Feeds chain events into confirmed state and keeps the pool consistent.
pub struct BlockSyncHandler<'a, S: ?Sized> {
    confirmed: &'a S,
    pending: &'a PendingOverlay,
}

impl<'a, S: ProjectionWriter + ProjectionReader + ?Sized> BlockSyncHandler<'a, S> {
    pub fn new(confirmed: &'a S, pending: &'a PendingOverlay) -> Self {
        Self { confirmed, pending }
    }

    /// Connect a block on top of the tip.
    ///
    /// The whole block is applied under the store's write lock; only then
    /// are included entries dropped from the pool and conflicting chains
    /// evicted.
    pub fn connect(&self, block: &Block) -> NodeResult<ConnectReport> {
        let applied = self.confirmed.connect(block)?;

        let included: Vec<OpId> = self
            .pending
            .confirmed_now_includes(&block.ops)?
            .into_iter()
            .map(|op| op.id)
            .collect();
        let included_set: HashSet<OpId> = included.iter().copied().collect();
        let evicted: Vec<OpId> = self
            .pending
            .evict_conflicts(&block.ops, &included_set)?
            .into_iter()
            .map(|op| op.id)
            .collect();

        if !evicted.is_empty() {
            warn!(
                height = block.height,
                evicted = evicted.len(),
                "block conflicts with pending operations"
            );
        }
        debug!(
            height = block.height,
            included = included.len(),
            "pool reconciled with block"
        );

        Ok(ConnectReport {
            height: applied.height,
            ops_applied: applied.ops_applied,
            included,
            evicted,
        })
    }

    /// Disconnect the tip block. Its operations are not returned to the
    /// pool.
    pub fn disconnect_tip(&self) -> NodeResult<DisconnectReport> {
        let RevertedBlock {
            height,
            records_reverted,
            new_tip,
        } = self.confirmed.disconnect_tip()?;

        let evicted: Vec<OpId> = self
            .pending
            .evict_orphans(self.confirmed)?
            .into_iter()
            .map(|op| op.id)
            .collect();

        info!(height, new_tip, orphaned = evicted.len(), "tip disconnected");
        Ok(DisconnectReport {
            height,
            new_tip,
            records_reverted,
            evicted,
        })
    }
}
