use serde::{Deserialize, Serialize};

/// Configuration for the pending operation pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Longest unconfirmed chain allowed per namespace, counting the
    /// namespace's anchor output.
    pub max_chain_depth: usize,
    /// Maximum display name length in bytes.
    pub max_display_name_len: usize,
    /// Maximum key length in bytes.
    pub max_key_len: usize,
    /// Maximum value length in bytes.
    pub max_value_len: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: 25,
            max_display_name_len: 255,
            max_key_len: 255,
            max_value_len: 3072,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: PoolConfig = serde_json::from_str(r#"{ "max_chain_depth": 5 }"#).unwrap();
        assert_eq!(config.max_chain_depth, 5);
        assert_eq!(config.max_value_len, 3072);
    }
}
