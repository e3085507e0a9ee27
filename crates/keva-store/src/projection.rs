use std::collections::BTreeMap;

use tracing::trace;

use keva_types::{LedgerOp, NamespaceId, OpRef, Operation};

use crate::record::{KeyRecord, NamespaceInfo};
use crate::registry::NamespaceRegistry;
use crate::undo::{UndoEntry, UndoRecord};

/// Confirmed key-value rows plus the namespace registry.
///
/// Rows are keyed by `(namespace, key)` so a prefix scan within one
/// namespace is a contiguous range. Forward application never removes a
/// row; deletes leave an empty tombstone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProjectionStore {
    rows: BTreeMap<(NamespaceId, String), KeyRecord>,
    registry: NamespaceRegistry,
}

impl ProjectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a block's operations in order and return what is needed to
    /// undo them.
    pub fn apply(&mut self, height: u64, ops: &[LedgerOp]) -> UndoEntry {
        let mut undo = UndoEntry::new(height);
        for (position, ledger_op) in ops.iter().enumerate() {
            let at = OpRef::Confirmed {
                height,
                position: position as u32,
            };
            let op = &ledger_op.op;
            if let Operation::CreateNamespace {
                namespace,
                display_name,
            } = op
            {
                let prior = self.registry.register(NamespaceInfo {
                    namespace: *namespace,
                    display_name: display_name.clone(),
                    created_at: at,
                    creating_op: ledger_op.id,
                });
                undo.records.push(UndoRecord::Namespace {
                    namespace: *namespace,
                    prior,
                });
            }

            let prior = self.rows.insert(
                (*op.namespace(), op.key().to_string()),
                KeyRecord::new(op.value(), at),
            );
            trace!(height, position, kind = %op.kind(), "applied operation");
            undo.records.push(UndoRecord::Key {
                namespace: *op.namespace(),
                key: op.key().to_string(),
                prior,
            });
        }
        undo
    }

    /// Undo a previously applied block, replaying its records in reverse.
    pub fn revert(&mut self, undo: UndoEntry) {
        for record in undo.records.into_iter().rev() {
            match record {
                UndoRecord::Key {
                    namespace,
                    key,
                    prior,
                } => match prior {
                    Some(row) => {
                        self.rows.insert((namespace, key), row);
                    }
                    None => {
                        self.rows.remove(&(namespace, key));
                    }
                },
                UndoRecord::Namespace { namespace, prior } => match prior {
                    Some(info) => {
                        self.registry.register(info);
                    }
                    None => {
                        self.registry.unregister(&namespace);
                    }
                },
            }
        }
    }

    pub fn read(&self, namespace: &NamespaceId, key: &str) -> Option<&KeyRecord> {
        self.rows.get(&(*namespace, key.to_string()))
    }

    /// The confirmed value of a key; absent keys read as the empty string.
    pub fn value(&self, namespace: &NamespaceId, key: &str) -> &str {
        self.read(namespace, key)
            .map(|r| r.value.as_str())
            .unwrap_or("")
    }

    /// Rows of `namespace` whose key starts with `prefix`, ordered by key.
    /// Tombstones are included.
    pub fn scan_prefix(&self, namespace: &NamespaceId, prefix: &str) -> Vec<(String, KeyRecord)> {
        self.rows
            .range((*namespace, prefix.to_string())..)
            .take_while(|((ns, key), _)| ns == namespace && key.starts_with(prefix))
            .map(|((_, key), record)| (key.clone(), record.clone()))
            .collect()
    }

    pub fn registry(&self) -> &NamespaceRegistry {
        &self.registry
    }

    /// Every row, ordered by namespace then key.
    pub fn rows(&self) -> impl Iterator<Item = (&NamespaceId, &str, &KeyRecord)> {
        self.rows
            .iter()
            .map(|((ns, key), record)| (ns, key.as_str(), record))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keva_types::{OpId, DISPLAY_NAME_KEY};
    use proptest::prelude::*;

    fn ns(seed: u8) -> NamespaceId {
        NamespaceId::from_raw([seed; 32])
    }

    fn put(seed: u8, key: &str, value: &str) -> LedgerOp {
        LedgerOp::new(
            OpId::from_hash([seed.wrapping_add(100); 32]),
            Operation::Put {
                namespace: ns(seed),
                key: key.into(),
                value: value.into(),
            },
        )
    }

    fn delete(seed: u8, key: &str) -> LedgerOp {
        LedgerOp::new(
            OpId::from_hash([seed.wrapping_add(200); 32]),
            Operation::Delete {
                namespace: ns(seed),
                key: key.into(),
            },
        )
    }

    #[test]
    fn create_namespace_registers_and_writes_display_name() {
        let mut store = ProjectionStore::new();
        let create = LedgerOp::create_namespace(0, "hello");
        let namespace = *create.op.namespace();

        store.apply(1, &[create.clone()]);

        let info = store.registry().get(&namespace).unwrap();
        assert_eq!(info.display_name, "hello");
        assert_eq!(info.creating_op, create.id);
        assert_eq!(store.value(&namespace, DISPLAY_NAME_KEY), "hello");
    }

    #[test]
    fn ops_apply_in_block_order() {
        let mut store = ProjectionStore::new();
        store.apply(1, &[put(1, "k", "a"), delete(1, "k"), put(1, "k", "b")]);

        let record = store.read(&ns(1), "k").unwrap();
        assert_eq!(record.value, "b");
        assert_eq!(
            record.last_modified,
            OpRef::Confirmed {
                height: 1,
                position: 2
            }
        );
    }

    #[test]
    fn delete_leaves_tombstone() {
        let mut store = ProjectionStore::new();
        store.apply(1, &[put(1, "k", "v")]);
        store.apply(2, &[delete(1, "k")]);

        assert!(store.read(&ns(1), "k").unwrap().is_tombstone());
        assert_eq!(store.value(&ns(1), "k"), "");
        assert_eq!(store.value(&ns(1), "missing"), "");
    }

    #[test]
    fn revert_restores_tombstone_over_undelete() {
        let mut store = ProjectionStore::new();
        store.apply(1, &[put(1, "k", "v1")]);
        store.apply(2, &[delete(1, "k")]);
        let before = store.clone();

        let undo = store.apply(3, &[put(1, "k", "v2")]);
        assert_eq!(store.value(&ns(1), "k"), "v2");

        store.revert(undo);
        assert_eq!(store, before);
        assert_eq!(store.value(&ns(1), "k"), "");
    }

    #[test]
    fn revert_of_creation_unregisters_and_removes_rows() {
        let mut store = ProjectionStore::new();
        let create = LedgerOp::create_namespace(0, "tmp");
        let namespace = *create.op.namespace();
        let write = LedgerOp::put(0, namespace, "k", "v");

        let undo = store.apply(1, &[create, write]);
        store.revert(undo);

        assert!(store.registry().is_empty());
        assert_eq!(store.row_count(), 0);
    }

    #[test]
    fn scan_prefix_is_ordered_and_scoped() {
        let mut store = ProjectionStore::new();
        store.apply(
            1,
            &[
                put(1, "b|2", "x"),
                put(1, "a|1", "y"),
                put(1, "b|1", "z"),
                put(2, "b|0", "other namespace"),
                put(1, "c", "w"),
            ],
        );

        let keys: Vec<_> = store
            .scan_prefix(&ns(1), "b|")
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["b|1", "b|2"]);
        assert_eq!(store.scan_prefix(&ns(1), "").len(), 4);
    }

    /// Creations reuse one id per seed, so later ones re-register it.
    fn create(seed: u8, display_name: &str) -> LedgerOp {
        LedgerOp::new(
            OpId::from_hash([seed.wrapping_add(50); 32]),
            Operation::CreateNamespace {
                namespace: ns(seed),
                display_name: display_name.into(),
            },
        )
    }

    fn arb_op() -> impl Strategy<Value = LedgerOp> {
        (0u8..3, "[a-c]{1,2}", "[xyz]{0,2}", 0u8..5).prop_map(|(seed, key, value, kind)| match kind {
            0 => create(seed, &value),
            1 => delete(seed, &key),
            _ => put(seed, &key, &value),
        })
    }

    proptest! {
        #[test]
        fn revert_after_apply_restores_prior_state(
            history in proptest::collection::vec(proptest::collection::vec(arb_op(), 0..6), 0..4),
            block in proptest::collection::vec(arb_op(), 0..8),
        ) {
            let mut store = ProjectionStore::new();
            for (i, ops) in history.iter().enumerate() {
                store.apply(i as u64 + 1, ops);
            }
            let before = store.clone();

            let undo = store.apply(history.len() as u64 + 1, &block);
            store.revert(undo);

            prop_assert_eq!(store.registry().list(), before.registry().list());
            prop_assert_eq!(store, before);
        }
    }
}
