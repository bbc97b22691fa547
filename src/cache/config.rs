//! Cache configuration.
//!
//! Controls which recipe cache backend is built at startup and how long entries live.

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::config::{CacheBackendKind, CacheSettings};

const DEFAULT_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 500;
const DEFAULT_MEMORY_CAPACITY: usize = 1024;
const DEFAULT_KEY_PREFIX: &str = "larder";

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    /// Connection URL for the Redis backend.
    pub redis_url: Option<String>,
    /// Namespace prepended to every Redis key.
    pub key_prefix: String,
    /// Time-to-live applied to every stored recipe list.
    pub ttl: Duration,
    /// Upper bound for a single cache read or write.
    pub operation_timeout: Duration,
    /// Maximum recipe lists held by the in-memory backend.
    pub memory_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Memory,
            redis_url: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            backend: settings.backend,
            redis_url: settings.redis_url.clone(),
            key_prefix: settings.key_prefix.clone(),
            ttl: settings.ttl,
            operation_timeout: settings.operation_timeout,
            memory_capacity: settings.memory_capacity,
        }
    }
}

impl CacheConfig {
    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(matches!(config.backend, CacheBackendKind::Memory));
        assert_eq!(config.ttl, Duration::from_secs(86_400));
        assert_eq!(config.operation_timeout, Duration::from_millis(500));
        assert_eq!(config.memory_capacity, 1024);
        assert_eq!(config.key_prefix, "larder");
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            memory_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.memory_capacity_non_zero().get(), 1);
    }
}
