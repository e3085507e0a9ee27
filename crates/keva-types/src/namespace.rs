use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::op::OpId;

/// Reserved key holding a namespace's display name inside its own key space.
pub const DISPLAY_NAME_KEY: &str = "_NS_DISPLAY_";

/// Globally unique identifier of a namespace.
///
/// A `NamespaceId` is derived once from the [`OpId`] of the operation that
/// created it and never changes afterwards. Because every locally created
/// operation carries a fresh nonce, two namespaces with the same display
/// name still receive distinct identifiers, even when one of them was rolled
/// back before confirmation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespaceId {
    hash: [u8; 32],
}

impl NamespaceId {
    /// Derive the namespace identity from its creating operation.
    pub fn derive(creating_op: &OpId) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"keva-namespace-v1:");
        hasher.update(creating_op.as_bytes());
        Self {
            hash: *hasher.finalize().as_bytes(),
        }
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Full hex-encoded string, without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Short identifier (first 8 hex characters).
    pub fn short_id(&self) -> String {
        format!("ns:{}", hex::encode(&self.hash[..4]))
    }

    /// Parse from a hex string (64 hex characters, optional `ns:` prefix).
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix("ns:").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self { hash: arr })
    }

    /// Wrap raw bytes, e.g. a namespace argument decoded from a script.
    pub fn from_raw(hash: [u8; 32]) -> Self {
        Self { hash }
    }
}

impl fmt::Debug for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NamespaceId({})", self.short_id())
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns:{}", self.to_hex())
    }
}

impl FromStr for NamespaceId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}
