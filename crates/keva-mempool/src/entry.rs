use serde::{Deserialize, Serialize};

use keva_types::{LedgerOp, NamespaceId, OpId, OpKind, OpRef};

/// An operation waiting in this node's pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    /// Acceptance sequence; strictly increasing per node.
    pub seq: u64,
    pub op: LedgerOp,
    /// Length of the namespace's unconfirmed chain once this entry was added.
    pub depth: usize,
}

impl PendingEntry {
    pub fn namespace(&self) -> &NamespaceId {
        self.op.op.namespace()
    }

    pub fn op_ref(&self) -> OpRef {
        OpRef::Pending { seq: self.seq }
    }

    pub fn touches(&self, namespace: &NamespaceId, key: &str) -> bool {
        self.namespace() == namespace && self.op.op.key() == key
    }
}

/// Caller-facing description of a pending operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSummary {
    pub op_id: OpId,
    pub kind: OpKind,
    pub namespace: NamespaceId,
    pub key: String,
    pub value: String,
    pub seq: u64,
    pub depth: usize,
}

impl From<&PendingEntry> for PendingSummary {
    fn from(entry: &PendingEntry) -> Self {
        let op = &entry.op.op;
        Self {
            op_id: entry.op.id,
            kind: op.kind(),
            namespace: *op.namespace(),
            key: op.key().to_string(),
            value: op.value().to_string(),
            seq: entry.seq,
            depth: entry.depth,
        }
    }
}
