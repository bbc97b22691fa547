//! Larder recipe cache.
//!
//! Generated recipe lists are stored under a [`CacheKey`] with a fixed time-to-live so
//! repeated requests for the same fridge contents do not spend upstream quota.
//!
//! - **Redis**: shared store, one long-lived multiplexed connection per process
//! - **Memory**: process-local LRU with per-entry expiry
//! - **Disabled**: always misses
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! backend = "redis"
//! redis_url = "redis://127.0.0.1:6379"
//! ttl_seconds = 86400
//! operation_timeout_ms = 500
//! ```
//!
//! Every backend stores the same JSON payload, so entries written by one process can be
//! read by any other sharing the store.

mod config;
mod keys;
mod lock;
mod memory;
mod redis;

pub use config::CacheConfig;
pub use keys::CacheKey;
pub use memory::MemoryRecipeCache;
pub use redis::RedisRecipeCache;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::CacheBackendKind;
use crate::domain::recipes::RecipeResult;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend: {0}")]
    Backend(String),
    #[error("cache payload: {0}")]
    Serialization(String),
    #[error("cache {op} timed out after {timeout_ms}ms")]
    Timeout { op: &'static str, timeout_ms: u128 },
}

/// Key-value store for normalized recipe lists.
///
/// Implementations must be safe to share across requests. Callers treat every error as
/// a miss (on read) or a skipped write; errors never reach the HTTP caller.
#[async_trait]
pub trait RecipeCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<RecipeResult>>, CacheError>;

    async fn put(
        &self,
        key: &CacheKey,
        recipes: &[RecipeResult],
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Short backend label used in logs.
    fn backend_name(&self) -> &'static str;
}

/// Cache used when caching is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecipeCache;

#[async_trait]
impl RecipeCache for NoopRecipeCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<Vec<RecipeResult>>, CacheError> {
        Ok(None)
    }

    async fn put(
        &self,
        _key: &CacheKey,
        _recipes: &[RecipeResult],
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "disabled"
    }
}

/// Build the configured backend. The Redis connection itself is opened lazily.
pub fn build_recipe_cache(config: &CacheConfig) -> Result<Arc<dyn RecipeCache>, CacheError> {
    let cache: Arc<dyn RecipeCache> = match config.backend {
        CacheBackendKind::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| CacheError::Backend("redis backend requires a url".into()))?;
            Arc::new(RedisRecipeCache::new(
                url,
                config.key_prefix.clone(),
                config.operation_timeout,
            )?)
        }
        CacheBackendKind::Memory => Arc::new(MemoryRecipeCache::new(config)),
        CacheBackendKind::Disabled => Arc::new(NoopRecipeCache),
    };
    Ok(cache)
}

pub(crate) fn encode_entry(recipes: &[RecipeResult]) -> Result<String, CacheError> {
    serde_json::to_string(recipes).map_err(|err| CacheError::Serialization(err.to_string()))
}

pub(crate) fn decode_entry(payload: &str) -> Result<Vec<RecipeResult>, CacheError> {
    serde_json::from_str(payload).map_err(|err| CacheError::Serialization(err.to_string()))
}
