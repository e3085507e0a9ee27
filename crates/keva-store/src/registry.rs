use std::collections::{BTreeMap, HashMap};

use keva_types::{NamespaceId, OpRef};

use crate::record::NamespaceInfo;

/// Confirmed namespaces, listed in creation order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamespaceRegistry {
    by_id: HashMap<NamespaceId, NamespaceInfo>,
    order: BTreeMap<OpRef, NamespaceId>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a namespace, returning whatever was registered under the same
    /// id before.
    pub fn register(&mut self, info: NamespaceInfo) -> Option<NamespaceInfo> {
        let prior = self.unregister(&info.namespace);
        self.order.insert(info.created_at, info.namespace);
        self.by_id.insert(info.namespace, info);
        prior
    }

    pub fn unregister(&mut self, namespace: &NamespaceId) -> Option<NamespaceInfo> {
        let info = self.by_id.remove(namespace)?;
        if self.order.get(&info.created_at) == Some(namespace) {
            self.order.remove(&info.created_at);
        }
        Some(info)
    }

    pub fn get(&self, namespace: &NamespaceId) -> Option<&NamespaceInfo> {
        self.by_id.get(namespace)
    }

    pub fn contains(&self, namespace: &NamespaceId) -> bool {
        self.by_id.contains_key(namespace)
    }

    /// All namespaces ordered by (height, position) of their creation.
    pub fn list(&self) -> Vec<NamespaceInfo> {
        self.order
            .values()
            .filter_map(|id| self.by_id.get(id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
