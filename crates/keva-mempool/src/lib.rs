//! Pending operation pool for Keva.
//!
//! Operations a node has created or received but that no connected block
//! contains yet live here. They are visible only to the node holding them.
//! Updates on a namespace form an unconfirmed chain whose length is bounded
//! by the [`ChainDepthGate`].
//!
//! # Quick Start
//!
//! ```rust
//! use keva_mempool::{PendingOverlay, PoolConfig};
//! use keva_store::InMemoryProjection;
//! use keva_types::LedgerOp;
//!
//! let confirmed = InMemoryProjection::default();
//! let pool = PendingOverlay::new(&PoolConfig::default());
//! let create = LedgerOp::create_namespace(0, "notes");
//! let namespace = *create.op.namespace();
//! pool.accept(create, &confirmed).unwrap();
//! pool.accept(LedgerOp::put(0, namespace, "greeting", "hello"), &confirmed).unwrap();
//! assert_eq!(pool.check_depth(&namespace).unwrap(), 2);
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod gate;
pub mod overlay;

pub use config::PoolConfig;
pub use entry::{PendingEntry, PendingSummary};
pub use error::{PoolError, PoolResult};
pub use gate::ChainDepthGate;
pub use overlay::PendingOverlay;
