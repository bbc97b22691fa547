//! In-process recipe cache.
//!
//! LRU-bounded like the rest of the process-local caches, with an expiry instant stored
//! next to each payload. Expired entries are dropped lazily on read.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;

use crate::domain::recipes::RecipeResult;

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::lock::mutex_lock;
use super::{CacheError, RecipeCache, decode_entry, encode_entry};

const SOURCE: &str = "cache::memory";
/// Ceiling for expiry instants that would overflow `Instant`.
const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

struct Entry {
    payload: String,
    expires_at: Instant,
}

pub struct MemoryRecipeCache {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryRecipeCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.memory_capacity_non_zero())),
        }
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self, key: &str, now: Instant) -> Option<String> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > now => return Some(entry.payload.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    fn write(&self, key: String, payload: String, expires_at: Instant) {
        mutex_lock(&self.entries, SOURCE, "put").put(
            key,
            Entry {
                payload,
                expires_at,
            },
        );
    }
}

#[async_trait]
impl RecipeCache for MemoryRecipeCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<RecipeResult>>, CacheError> {
        self.read(key.as_str(), Instant::now())
            .map(|payload| decode_entry(&payload))
            .transpose()
    }

    async fn put(
        &self,
        key: &CacheKey,
        recipes: &[RecipeResult],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let payload = encode_entry(recipes)?;
        let now = Instant::now();
        let expires_at = now.checked_add(ttl).unwrap_or(now + MAX_TTL);
        self.write(key.as_str().to_string(), payload, expires_at);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recipes::RecipeRequestDraft;

    fn key(ingredient: &str) -> CacheKey {
        CacheKey::derive(
            &RecipeRequestDraft {
                ingredients: Some(vec![ingredient.to_string()]),
                cuisines: Some(vec!["Indian".into()]),
                meal_types: Some(vec!["Dinner".into()]),
                ..Default::default()
            }
            .validate()
            .expect("valid request"),
        )
    }

    fn recipes(name: &str) -> Vec<RecipeResult> {
        vec![RecipeResult {
            name: name.to_string(),
            recipe: vec!["Chop".into(), "Simmer".into()],
            calories: "420".into(),
        }]
    }

    #[tokio::test]
    async fn stored_list_reads_back_equal() {
        let cache = MemoryRecipeCache::new(&CacheConfig::default());
        let key = key("lentils");

        assert_eq!(cache.get(&key).await.expect("read"), None);
        cache
            .put(&key, &recipes("Dal"), Duration::from_secs(60))
            .await
            .expect("write");

        assert_eq!(cache.get(&key).await.expect("read"), Some(recipes("Dal")));
    }

    #[tokio::test]
    async fn put_overwrites_wholesale() {
        let cache = MemoryRecipeCache::new(&CacheConfig::default());
        let key = key("paneer");

        cache
            .put(&key, &recipes("First"), Duration::from_secs(60))
            .await
            .expect("write");
        cache
            .put(&key, &recipes("Second"), Duration::from_secs(60))
            .await
            .expect("write");

        assert_eq!(cache.get(&key).await.expect("read"), Some(recipes("Second")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn expired_entries_are_dropped_on_read() {
        let cache = MemoryRecipeCache::new(&CacheConfig::default());
        let now = Instant::now();
        cache.write("k".into(), "[]".into(), now + Duration::from_secs(5));

        assert!(cache.read("k", now).is_some());
        assert!(cache.read("k", now + Duration::from_secs(5)).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn lru_eviction_respects_capacity() {
        let config = CacheConfig {
            memory_capacity: 1,
            ..Default::default()
        };
        let cache = MemoryRecipeCache::new(&config);
        let first = key("okra");
        let second = key("tofu");

        cache
            .put(&first, &recipes("Bhindi"), Duration::from_secs(60))
            .await
            .expect("write");
        cache
            .put(&second, &recipes("Mapo"), Duration::from_secs(60))
            .await
            .expect("write");

        assert_eq!(cache.get(&first).await.expect("read"), None);
        assert!(cache.get(&second).await.expect("read").is_some());
    }
}
