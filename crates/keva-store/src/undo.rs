use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use keva_types::NamespaceId;

use crate::error::{StoreError, StoreResult};
use crate::record::{KeyRecord, NamespaceInfo};

/// One reversible change made while applying a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UndoRecord {
    /// A row was written; `prior` is what it held before (`None` = absent).
    Key {
        namespace: NamespaceId,
        key: String,
        prior: Option<KeyRecord>,
    },
    /// A namespace was registered; `prior` is the registration it replaced.
    Namespace {
        namespace: NamespaceId,
        prior: Option<NamespaceInfo>,
    },
}

/// The changes made by one block, in application order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoEntry {
    pub height: u64,
    pub records: Vec<UndoRecord>,
}

impl UndoEntry {
    pub fn new(height: u64) -> Self {
        Self {
            height,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Stack of undo entries, one per connected block, strictly LIFO.
///
/// The log also owns the tip height: a block can only be pushed at
/// `tip + 1` and only the tip can be popped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UndoLog {
    entries: VecDeque<UndoEntry>,
    tip: u64,
    retention: Option<u64>,
}

impl UndoLog {
    pub fn new(retention: Option<u64>) -> Self {
        Self {
            entries: VecDeque::new(),
            tip: 0,
            retention,
        }
    }

    /// Height of the most recently connected block, 0 before any block.
    pub fn tip(&self) -> u64 {
        self.tip
    }

    /// Number of entries still held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lowest height that can still be disconnected, if any.
    pub fn oldest(&self) -> Option<u64> {
        self.entries.front().map(|e| e.height)
    }

    /// Record the undo entry of the block connected at `entry.height`.
    pub fn push(&mut self, entry: UndoEntry) -> StoreResult<()> {
        let expected = self.tip + 1;
        if entry.height != expected {
            return Err(StoreError::HeightMismatch {
                expected,
                actual: entry.height,
            });
        }
        self.tip = entry.height;
        self.entries.push_back(entry);

        if let Some(keep) = self.retention {
            while self.entries.len() as u64 > keep {
                if let Some(pruned) = self.entries.pop_front() {
                    debug!(height = pruned.height, "pruned undo entry");
                }
            }
        }
        Ok(())
    }

    /// Check that `height` can be popped without popping it.
    pub fn check_pop(&self, height: u64) -> StoreResult<()> {
        if height == 0 || height != self.tip {
            error!(requested = height, tip = self.tip, "undo requested out of order");
            return Err(StoreError::UndoLogMismatch {
                requested: height,
                tip: self.tip,
            });
        }
        match self.entries.back() {
            Some(entry) if entry.height == height => Ok(()),
            _ => Err(StoreError::UndoUnavailable { height }),
        }
    }

    /// Remove and return the entry for the tip block. Any other height is a
    /// contract violation and leaves the log unchanged.
    pub fn pop(&mut self, height: u64) -> StoreResult<UndoEntry> {
        self.check_pop(height)?;
        let entry = self
            .entries
            .pop_back()
            .ok_or(StoreError::UndoUnavailable { height })?;
        self.tip = height - 1;
        Ok(entry)
    }
}
