use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use keva_mempool::{PendingOverlay, PendingSummary};
use keva_store::ProjectionReader;
use keva_types::{NamespaceId, OpRef, Operation};

use crate::error::NodeResult;

/// One key and its current value as seen by this node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
    pub modified: OpRef,
}

/// Paging and age restrictions for [`QueryEngine::filter`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    /// Skip confirmed records at least this many blocks old. 0 = no limit.
    pub max_age: u64,
    /// Number of matching entries to skip.
    pub from: usize,
    /// Maximum number of entries to return. 0 = all.
    pub limit: usize,
}

/// Result of [`QueryEngine::filter_stats`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStats {
    pub height: u64,
    pub count: usize,
}

/// A namespace visible to this node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSummary {
    pub namespace: NamespaceId,
    pub display_name: String,
    pub created_at: OpRef,
    pub pending: bool,
}

/// Read-side view merging confirmed state with one node's pending pool.
///
/// Each query reads the pool before confirmed state. A connect applies the
/// block before dropping the entries it includes, so a value moving from
/// pending to confirmed is always seen in at least one of the two.
pub struct QueryEngine<'a, R: ?Sized> {
    confirmed: &'a R,
    pending: &'a PendingOverlay,
}

impl<'a, R: ProjectionReader + ?Sized> QueryEngine<'a, R> {
    pub fn new(confirmed: &'a R, pending: &'a PendingOverlay) -> Self {
        Self { confirmed, pending }
    }

    /// Current value of a key. Missing keys, unknown namespaces and deleted
    /// keys all read as the empty string.
    pub fn get(&self, namespace: &NamespaceId, key: &str) -> NodeResult<String> {
        if let Some(value) = self.pending.pending_value(namespace, key)? {
            return Ok(value);
        }
        Ok(self
            .confirmed
            .read(namespace, key)?
            .map(|record| record.value)
            .unwrap_or_default())
    }

    /// Entries of `namespace` whose key starts with `prefix`, sorted by key.
    /// Pending operations override confirmed values; deleted keys are left
    /// out.
    pub fn filter(
        &self,
        namespace: &NamespaceId,
        prefix: &str,
        options: &FilterOptions,
    ) -> NodeResult<Vec<KeyValue>> {
        let results = self.paged(namespace, prefix, options)?;
        debug!(
            namespace = %namespace.short_id(),
            prefix,
            results = results.len(),
            "filter"
        );
        Ok(results)
    }

    /// Tip height and the number of entries [`Self::filter`] would return
    /// with the same options, paging included.
    pub fn filter_stats(
        &self,
        namespace: &NamespaceId,
        prefix: &str,
        options: &FilterOptions,
    ) -> NodeResult<FilterStats> {
        let count = self.paged(namespace, prefix, options)?.len();
        Ok(FilterStats {
            height: self.confirmed.tip_height()?,
            count,
        })
    }

    fn paged(
        &self,
        namespace: &NamespaceId,
        prefix: &str,
        options: &FilterOptions,
    ) -> NodeResult<Vec<KeyValue>> {
        let take = if options.limit == 0 {
            usize::MAX
        } else {
            options.limit
        };
        Ok(self
            .merged(namespace, prefix, options.max_age)?
            .into_iter()
            .skip(options.from)
            .take(take)
            .collect())
    }

    fn merged(
        &self,
        namespace: &NamespaceId,
        prefix: &str,
        max_age: u64,
    ) -> NodeResult<Vec<KeyValue>> {
        let pending = self.pending.entries_for(namespace)?;
        let tip = self.confirmed.tip_height()?;

        let mut view: BTreeMap<String, (String, OpRef)> = BTreeMap::new();
        for (key, record) in self.confirmed.scan_prefix(namespace, prefix)? {
            let too_old = match record.last_modified.height() {
                Some(height) => max_age > 0 && tip.saturating_sub(height) >= max_age,
                None => false,
            };
            if !too_old {
                view.insert(key, (record.value, record.last_modified));
            }
        }
        for entry in pending {
            let op = &entry.op.op;
            if op.key().starts_with(prefix) {
                view.insert(
                    op.key().to_string(),
                    (op.value().to_string(), entry.op_ref()),
                );
            }
        }

        Ok(view
            .into_iter()
            .filter(|(_, (value, _))| !value.is_empty())
            .map(|(key, (value, modified))| KeyValue {
                key,
                value,
                modified,
            })
            .collect())
    }

    /// Confirmed namespaces in creation order, then namespaces this node has
    /// created but not yet seen confirmed, in acceptance order.
    pub fn list_namespaces(&self) -> NodeResult<Vec<NamespaceSummary>> {
        let pending = self.pending.pending_namespaces()?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for info in self.confirmed.namespaces()? {
            if seen.insert(info.namespace) {
                out.push(NamespaceSummary {
                    namespace: info.namespace,
                    display_name: info.display_name,
                    created_at: info.created_at,
                    pending: false,
                });
            }
        }
        for entry in pending {
            if let Operation::CreateNamespace {
                namespace,
                display_name,
            } = &entry.op.op
            {
                if seen.insert(*namespace) {
                    out.push(NamespaceSummary {
                        namespace: *namespace,
                        display_name: display_name.clone(),
                        created_at: entry.op_ref(),
                        pending: true,
                    });
                }
            }
        }
        Ok(out)
    }

    pub fn list_pending(&self, filter: Option<&NamespaceId>) -> NodeResult<Vec<PendingSummary>> {
        Ok(self.pending.list_pending(filter)?)
    }
}
