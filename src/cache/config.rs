//! Bucket store configuration.
//!
//! Controls entry lifetime and in-memory capacity via
//! `bucket-pagination.toml`.

use std::num::NonZeroUsize;

use serde::Deserialize;

use crate::application::store::Lifetime;

/// One week, the default bucket lifetime.
pub const DEFAULT_LIFETIME_SECS: u64 = 7 * 24 * 60 * 60;
/// Buckets kept per namespace by the in-memory store.
pub const DEFAULT_MEMORY_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BucketStoreConfig {
    /// Lifetime applied when a bucket is written without an explicit one.
    /// Zero keeps buckets forever.
    pub default_lifetime_secs: u64,
    /// Maximum buckets per namespace in the in-memory store.
    pub memory_capacity: usize,
}

impl Default for BucketStoreConfig {
    fn default() -> Self {
        Self {
            default_lifetime_secs: DEFAULT_LIFETIME_SECS,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }
}

impl From<&crate::config::BucketSettings> for BucketStoreConfig {
    fn from(settings: &crate::config::BucketSettings) -> Self {
        Self {
            default_lifetime_secs: settings.default_lifetime_secs,
            memory_capacity: settings.memory_capacity,
        }
    }
}

impl BucketStoreConfig {
    pub fn default_lifetime(&self) -> Lifetime {
        Lifetime::from_secs(self.default_lifetime_secs)
    }

    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn default_values() {
        let config = BucketStoreConfig::default();
        assert_eq!(config.default_lifetime_secs, 604_800);
        assert_eq!(config.memory_capacity, 1024);
        assert_eq!(
            config.default_lifetime(),
            Lifetime::Finite(Duration::from_secs(604_800))
        );
    }

    #[test]
    fn zero_lifetime_is_unlimited() {
        let config = BucketStoreConfig {
            default_lifetime_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.default_lifetime(), Lifetime::Unlimited);
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = BucketStoreConfig {
            memory_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.memory_capacity_non_zero().get(), 1);
    }
}
