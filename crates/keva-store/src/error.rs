use std::path::PathBuf;

/// Errors produced by the confirmed projection store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("undo requested for height {requested} but the tip is {tip}")]
    UndoLogMismatch { requested: u64, tip: u64 },

    #[error("undo data for height {height} has been pruned")]
    UndoUnavailable { height: u64 },

    #[error("block does not extend the tip: expected height {expected}, got {actual}")]
    HeightMismatch { expected: u64, actual: u64 },

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Errors produced while exporting or reading a projection snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot destination already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("cannot write snapshot to {}: {reason}", .path.display())]
    Unwritable { path: PathBuf, reason: String },

    #[error("cannot read snapshot {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("corrupt snapshot record at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the store crate.
pub type StoreResult<T> = Result<T, StoreError>;
