use serde::{Deserialize, Serialize};

/// Configuration for the confirmed projection store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How many recent blocks keep undo data. `None` keeps every block, so
    /// any connected block can be disconnected again.
    pub undo_retention: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            undo_retention: None,
        }
    }
}

impl StoreConfig {
    /// Keep undo data only for the most recent `blocks` blocks.
    pub fn with_undo_retention(blocks: u64) -> Self {
        Self {
            undo_retention: Some(blocks),
        }
    }
}
