use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;
use crate::namespace::{NamespaceId, DISPLAY_NAME_KEY};

/// Identity of the ledger transaction carrying an operation.
///
/// Confirmed operations take their id from the transaction that embeds them.
/// Locally created operations derive one from the node id, a UUID v7 nonce,
/// and the operation payload, so no two local operations share an id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OpId([u8; 32]);

impl OpId {
    /// Derive an id from its parts. Deterministic for identical inputs.
    pub fn from_parts(node_id: u16, nonce: Uuid, payload: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"keva-op-v1:");
        hasher.update(&node_id.to_le_bytes());
        hasher.update(nonce.as_bytes());
        hasher.update(payload);
        Self(*hasher.finalize().as_bytes())
    }

    /// Generate a fresh id for an operation created on `node_id`.
    pub fn generate(node_id: u16, payload: &[u8]) -> Self {
        Self::from_parts(node_id, Uuid::now_v7(), payload)
    }

    /// Create an `OpId` from a pre-computed hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpId({})", self.short_hex())
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Discriminant of an [`Operation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    CreateNamespace,
    Put,
    Delete,
}

impl OpKind {
    /// Label used when summarizing operations for callers.
    pub fn label(&self) -> &'static str {
        match self {
            OpKind::CreateNamespace => "keva_namespace",
            OpKind::Put => "keva_put",
            OpKind::Delete => "keva_delete",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A key-value operation extracted from a ledger transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    CreateNamespace {
        namespace: NamespaceId,
        display_name: String,
    },
    Put {
        namespace: NamespaceId,
        key: String,
        value: String,
    },
    Delete {
        namespace: NamespaceId,
        key: String,
    },
}

impl Operation {
    pub fn kind(&self) -> OpKind {
        match self {
            Operation::CreateNamespace { .. } => OpKind::CreateNamespace,
            Operation::Put { .. } => OpKind::Put,
            Operation::Delete { .. } => OpKind::Delete,
        }
    }

    /// The namespace this operation targets.
    pub fn namespace(&self) -> &NamespaceId {
        match self {
            Operation::CreateNamespace { namespace, .. }
            | Operation::Put { namespace, .. }
            | Operation::Delete { namespace, .. } => namespace,
        }
    }

    /// The key written by this operation. Namespace creation writes the
    /// reserved display-name key.
    pub fn key(&self) -> &str {
        match self {
            Operation::CreateNamespace { .. } => DISPLAY_NAME_KEY,
            Operation::Put { key, .. } | Operation::Delete { key, .. } => key,
        }
    }

    /// The value written by this operation. Deletes write the empty tombstone.
    pub fn value(&self) -> &str {
        match self {
            Operation::CreateNamespace { display_name, .. } => display_name,
            Operation::Put { value, .. } => value,
            Operation::Delete { .. } => "",
        }
    }

    /// Whether this operation spends the namespace's current output, i.e.
    /// extends the namespace's unconfirmed chain.
    pub fn is_update(&self) -> bool {
        !matches!(self, Operation::CreateNamespace { .. })
    }
}

/// An operation together with the identity of its carrying transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerOp {
    pub id: OpId,
    pub op: Operation,
}

impl LedgerOp {
    pub fn new(id: OpId, op: Operation) -> Self {
        Self { id, op }
    }

    /// Build a namespace creation whose identity is derived from a fresh op id.
    pub fn create_namespace(node_id: u16, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        let id = OpId::generate(node_id, display_name.as_bytes());
        let namespace = NamespaceId::derive(&id);
        Self {
            id,
            op: Operation::CreateNamespace {
                namespace,
                display_name,
            },
        }
    }

    pub fn put(
        node_id: u16,
        namespace: NamespaceId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let op = Operation::Put {
            namespace,
            key: key.into(),
            value: value.into(),
        };
        Self {
            id: OpId::generate(node_id, &payload(&op)),
            op,
        }
    }

    pub fn delete(node_id: u16, namespace: NamespaceId, key: impl Into<String>) -> Self {
        let op = Operation::Delete {
            namespace,
            key: key.into(),
        };
        Self {
            id: OpId::generate(node_id, &payload(&op)),
            op,
        }
    }
}

fn payload(op: &Operation) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 + op.key().len() + op.value().len() + 2);
    out.extend_from_slice(op.namespace().as_bytes());
    out.extend_from_slice(op.key().as_bytes());
    out.push(0);
    out.extend_from_slice(op.value().as_bytes());
    out
}

/// Where the last modification of a record came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OpRef {
    /// Confirmed in the block at `height`, at `position` within the block.
    Confirmed { height: u64, position: u32 },
    /// Pending in the local pool with insertion sequence `seq`.
    Pending { seq: u64 },
}

impl OpRef {
    /// Block height for confirmed references.
    pub fn height(&self) -> Option<u64> {
        match self {
            OpRef::Confirmed { height, .. } => Some(*height),
            OpRef::Pending { .. } => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, OpRef::Pending { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns() -> NamespaceId {
        NamespaceId::from_raw([5; 32])
    }

    #[test]
    fn from_parts_is_deterministic() {
        let nonce = Uuid::from_u128(7);
        let a = OpId::from_parts(1, nonce, b"payload");
        let b = OpId::from_parts(1, nonce, b"payload");
        assert_eq!(a, b);
    }

    #[test]
    fn node_id_separates_ids() {
        let nonce = Uuid::from_u128(7);
        assert_ne!(
            OpId::from_parts(1, nonce, b"payload"),
            OpId::from_parts(2, nonce, b"payload")
        );
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(OpId::generate(0, b"same"), OpId::generate(0, b"same"));
    }

    #[test]
    fn hex_roundtrip() {
        let id = OpId::from_hash([9; 32]);
        assert_eq!(OpId::from_hex(&id.to_hex()).unwrap(), id);
        assert_eq!(id.short_hex().len(), 8);
    }

    #[test]
    fn same_display_name_yields_distinct_namespaces() {
        let first = LedgerOp::create_namespace(0, "shared");
        let second = LedgerOp::create_namespace(0, "shared");
        assert_ne!(first.op.namespace(), second.op.namespace());
    }

    #[test]
    fn create_namespace_writes_display_key() {
        let op = LedgerOp::create_namespace(3, "my namespace");
        assert_eq!(op.op.key(), DISPLAY_NAME_KEY);
        assert_eq!(op.op.value(), "my namespace");
        assert_eq!(*op.op.namespace(), NamespaceId::derive(&op.id));
        assert!(!op.op.is_update());
    }

    #[test]
    fn delete_writes_tombstone() {
        let op = LedgerOp::delete(0, ns(), "k");
        assert_eq!(op.op.kind(), OpKind::Delete);
        assert_eq!(op.op.value(), "");
        assert!(op.op.is_update());
    }

    #[test]
    fn kind_labels() {
        assert_eq!(OpKind::CreateNamespace.label(), "keva_namespace");
        assert_eq!(OpKind::Put.to_string(), "keva_put");
        assert_eq!(OpKind::Delete.label(), "keva_delete");
    }

    #[test]
    fn operation_serializes_with_tag() {
        let op = Operation::Put {
            namespace: ns(),
            key: "k".into(),
            value: "v".into(),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "put");
        let back: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn op_ref_ordering_and_height() {
        let a = OpRef::Confirmed {
            height: 1,
            position: 3,
        };
        let b = OpRef::Confirmed {
            height: 2,
            position: 0,
        };
        assert!(a < b);
        assert_eq!(b.height(), Some(2));
        assert_eq!(OpRef::Pending { seq: 4 }.height(), None);
        assert!(OpRef::Pending { seq: 4 }.is_pending());
    }
}
