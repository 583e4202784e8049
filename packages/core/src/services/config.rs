//! Hierarchy configuration
use serde::{Deserialize, Serialize};

use crate::services::error::{HierarchyError, Result};

/// Default bound on parent-link walks
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// What happens to memoized descendant lists when a relation changes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Drop the cache of the mutated document and of every ancestor
    #[default]
    Invalidate,

    /// Keep cached lists until the document is dropped. Callers re-read the
    /// hierarchy once per persistence cycle and accept stale results in
    /// between.
    Retain,
}

/// Configuration for an [`Aggregate`](crate::services::Aggregate)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyConfig {
    /// Descendant cache behaviour on relation mutation
    #[serde(default)]
    pub cache_policy: CachePolicy,

    /// Maximum number of parent links followed before a walk is treated as
    /// a cycle
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            cache_policy: CachePolicy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl HierarchyConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(HierarchyError::invalid_config(
                "max_depth must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config_is_valid() {
        let config = HierarchyConfig::default();

        assert_eq!(config.cache_policy, CachePolicy::Invalidate);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_max_depth_is_rejected() {
        let config = HierarchyConfig {
            max_depth: 0,
            ..Default::default()
        };

        assert!(matches!(
            config.validate(),
            Err(HierarchyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_deserialization_fills_defaults() {
        let config: HierarchyConfig =
            serde_json::from_value(json!({ "cachePolicy": "retain" })).unwrap();

        assert_eq!(config.cache_policy, CachePolicy::Retain);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }
}
