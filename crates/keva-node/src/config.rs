use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use keva_mempool::PoolConfig;
use keva_store::StoreConfig;

use crate::error::{NodeError, NodeResult};

/// Configuration for one node.
///
/// ```toml
/// node_id = 1
///
/// [store]
/// undo_retention = 100
///
/// [pool]
/// max_chain_depth = 25
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Mixed into the ids of operations this node creates.
    pub node_id: u16,
    pub store: StoreConfig,
    pub pool: PoolConfig,
}

impl NodeConfig {
    pub fn from_toml_str(text: &str) -> NodeResult<Self> {
        toml::from_str(text).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> NodeResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> NodeResult<String> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }
}
