use keva_store::StoreError;
use keva_types::{NamespaceId, OpId};

/// Errors produced by the pending operation pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// Accepting the operation would make the namespace's unconfirmed
    /// chain longer than allowed.
    #[error("unconfirmed chain for {} too long: {depth} exceeds limit {limit}", .namespace.short_id())]
    ChainTooLong {
        namespace: NamespaceId,
        depth: usize,
        limit: usize,
    },

    /// The namespace is neither confirmed nor pending on this node.
    #[error("namespace not found: {0}")]
    NamespaceNotFound(NamespaceId),

    /// A creation for this namespace is already confirmed or pending.
    #[error("namespace already exists: {0}")]
    DuplicateNamespace(NamespaceId),

    /// An operation with this id is already pending.
    #[error("operation already pending: {0}")]
    DuplicateOp(OpId),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// Reading confirmed state failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience alias used throughout the pool crate.
pub type PoolResult<T> = Result<T, PoolError>;
