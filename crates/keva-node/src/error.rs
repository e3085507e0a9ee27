use thiserror::Error;

use keva_mempool::PoolError;
use keva_store::StoreError;
use keva_types::NamespaceId;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("key not found in {namespace}: {key}")]
    KeyNotFound { namespace: NamespaceId, key: String },

    #[error("display name is {len} bytes, limit is {max}")]
    DisplayNameTooLong { len: usize, max: usize },

    #[error("key is {len} bytes, limit is {max}")]
    KeyTooLong { len: usize, max: usize },

    #[error("value is {len} bytes, limit is {max}")]
    ValueTooLong { len: usize, max: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("pool error: {0}")]
    Pool(#[from] PoolError),
}

pub type NodeResult<T> = Result<T, NodeError>;
