use tracing::debug;

use keva_types::NamespaceId;

use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};

// ---------------------------------------------------------------------------
// ChainDepthGate
// ---------------------------------------------------------------------------

/// Admission check for namespace updates.
///
/// Every Put or Delete spends the namespace's current output, so pending
/// updates form a chain hanging off the namespace's anchor (its confirmed
/// output or its pending creation). The gate bounds the length of that
/// chain, anchor included.
#[derive(Clone, Debug)]
pub struct ChainDepthGate {
    max_chain_depth: usize,
}

impl ChainDepthGate {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            max_chain_depth: config.max_chain_depth,
        }
    }

    /// The configured limit.
    pub fn limit(&self) -> usize {
        self.max_chain_depth
    }

    /// Admit one more update on top of a chain of `current` links.
    /// Returns the resulting chain length.
    pub fn admit(&self, namespace: &NamespaceId, current: usize) -> PoolResult<usize> {
        let depth = current + 1;
        if depth > self.max_chain_depth {
            debug!(
                namespace = %namespace.short_id(),
                depth,
                limit = self.max_chain_depth,
                "chain depth exceeded"
            );
            return Err(PoolError::ChainTooLong {
                namespace: *namespace,
                depth,
                limit: self.max_chain_depth,
            });
        }
        Ok(depth)
    }
}
