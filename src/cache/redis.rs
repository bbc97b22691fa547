//! Redis-backed recipe cache.
//!
//! One [`ConnectionManager`] per process, opened on first use and reconnected by the
//! manager itself. Keys are namespaced and hashed so arbitrarily long ingredient lists
//! never produce oversized Redis keys.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::domain::recipes::RecipeResult;

use super::keys::CacheKey;
use super::{CacheError, RecipeCache, decode_entry, encode_entry};

pub struct RedisRecipeCache {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    key_prefix: String,
    operation_timeout: Duration,
}

impl RedisRecipeCache {
    pub fn new(
        url: &str,
        key_prefix: String,
        operation_timeout: Duration,
    ) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(backend_error)?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            key_prefix,
            operation_timeout,
        })
    }

    /// Storage key for a recipe cache key: `<prefix>:<sha256 of canonical key>`.
    pub fn storage_key(&self, key: &CacheKey) -> String {
        format!("{}:{}", self.key_prefix, key.digest())
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                debug!(
                    target = "larder::cache::redis",
                    "opening redis connection manager"
                );
                self.client
                    .get_connection_manager()
                    .await
                    .map_err(backend_error)
            })
            .await?;
        Ok(manager.clone())
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout {
                op,
                timeout_ms: self.operation_timeout.as_millis(),
            }),
        }
    }
}

#[async_trait]
impl RecipeCache for RedisRecipeCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<RecipeResult>>, CacheError> {
        let storage_key = self.storage_key(key);
        let payload: Option<String> = self
            .bounded("get", async {
                let mut conn = self.connection().await?;
                conn.get::<_, Option<String>>(&storage_key)
                    .await
                    .map_err(backend_error)
            })
            .await?;

        payload.as_deref().map(decode_entry).transpose()
    }

    async fn put(
        &self,
        key: &CacheKey,
        recipes: &[RecipeResult],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let storage_key = self.storage_key(key);
        let payload = encode_entry(recipes)?;
        let ttl_secs = ttl.as_secs().max(1);

        self.bounded("put", async {
            let mut conn = self.connection().await?;
            conn.set_ex::<_, _, ()>(&storage_key, payload, ttl_secs)
                .await
                .map_err(backend_error)
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

fn backend_error(err: redis::RedisError) -> CacheError {
    CacheError::Backend(err.to_string())
}
