//! Confirmed key-value projection for Keva.
//!
//! This crate holds the state derived from connected blocks. It provides:
//! - `ProjectionStore`: rows keyed by `(namespace, key)` plus the namespace
//!   registry, with block-level apply and revert
//! - `UndoLog`: per-block reverse deltas, strictly LIFO, with retention
//! - `ProjectionWriter` / `ProjectionReader` trait boundaries
//! - `InMemoryProjection`: the lock-guarded implementation used by nodes
//! - Snapshot export of the full confirmed state

pub mod config;
pub mod error;
pub mod memory;
pub mod projection;
pub mod record;
pub mod registry;
pub mod snapshot;
pub mod traits;
pub mod undo;

pub use config::StoreConfig;
pub use error::{SnapshotError, StoreError, StoreResult};
pub use memory::{AppliedBlock, InMemoryProjection, ProjectionSnapshot, RevertedBlock};
pub use projection::ProjectionStore;
pub use record::{KeyRecord, NamespaceInfo};
pub use registry::NamespaceRegistry;
pub use snapshot::{dump_snapshot, read_snapshot, SnapshotSummary};
pub use traits::{ProjectionReader, ProjectionWriter};
pub use undo::{UndoEntry, UndoLog, UndoRecord};
