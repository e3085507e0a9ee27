use keva_types::{Block, NamespaceId};

use crate::error::StoreError;
use crate::memory::{AppliedBlock, ProjectionSnapshot, RevertedBlock};
use crate::record::{KeyRecord, NamespaceInfo};

/// Write boundary for confirmed state: blocks are connected and
/// disconnected strictly at the tip.
pub trait ProjectionWriter: Send + Sync {
    fn connect(&self, block: &Block) -> Result<AppliedBlock, StoreError>;

    fn disconnect(&self, height: u64) -> Result<RevertedBlock, StoreError>;

    fn disconnect_tip(&self) -> Result<RevertedBlock, StoreError>;
}

/// Read boundary for confirmed state. Every call observes one consistent
/// state, never a partially applied block.
pub trait ProjectionReader: Send + Sync {
    fn tip_height(&self) -> Result<u64, StoreError>;

    fn read(&self, namespace: &NamespaceId, key: &str) -> Result<Option<KeyRecord>, StoreError>;

    fn scan_prefix(
        &self,
        namespace: &NamespaceId,
        prefix: &str,
    ) -> Result<Vec<(String, KeyRecord)>, StoreError>;

    fn namespace(&self, namespace: &NamespaceId) -> Result<Option<NamespaceInfo>, StoreError>;

    fn namespaces(&self) -> Result<Vec<NamespaceInfo>, StoreError>;

    fn snapshot(&self) -> Result<ProjectionSnapshot, StoreError>;
}
