use serde::{Deserialize, Serialize};

use keva_types::{NamespaceId, OpId, OpRef};

/// The confirmed value of one `(namespace, key)` pair.
///
/// An empty `value` is a tombstone: it reads the same as an absent record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub value: String,
    pub last_modified: OpRef,
}

impl KeyRecord {
    pub fn new(value: impl Into<String>, last_modified: OpRef) -> Self {
        Self {
            value: value.into(),
            last_modified,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_empty()
    }
}

/// A namespace known to confirmed state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceInfo {
    pub namespace: NamespaceId,
    pub display_name: String,
    /// Block height and in-block position of the creating operation.
    pub created_at: OpRef,
    pub creating_op: OpId,
}
