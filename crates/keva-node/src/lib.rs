//! Keva node API.
//!
//! Ties confirmed state ([`keva_store`]) and the node-local pending pool
//! ([`keva_mempool`]) together behind [`KevaNode`]: writes, merged reads,
//! and chain events. This is the main entry point for applications
//! embedding Keva.

pub mod config;
pub mod error;
pub mod node;
pub mod query;
pub mod sync;

pub use config::NodeConfig;
pub use error::{NodeError, NodeResult};
pub use node::{Created, KevaNode};
pub use query::{FilterOptions, FilterStats, KeyValue, NamespaceSummary, QueryEngine};
pub use sync::{BlockSyncHandler, ConnectReport, DisconnectReport};

// Re-export key types
pub use keva_mempool::{PendingSummary, PoolConfig, PoolError};
pub use keva_store::{SnapshotSummary, StoreConfig, StoreError};
pub use keva_types::{Block, LedgerOp, NamespaceId, OpId, OpKind, Operation, DISPLAY_NAME_KEY};
