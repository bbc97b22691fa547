//! Per-key single-flight for cache misses.
//!
//! The first request to miss on a key takes the key's lock and calls upstream. Identical
//! requests arriving meanwhile wait on the same lock and re-read the cache once they get
//! it. A leader that fails leaves its error in the slot so the requests queued behind it
//! fail the same way instead of retrying upstream one by one. The map entry is removed by
//! the last request to leave, whether it held the lock or gave up waiting.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::GenerateError;

type Slot = Arc<Mutex<Option<LeaderFailure>>>;
type Slots = DashMap<String, Slot>;

#[derive(Debug)]
struct LeaderFailure {
    at: Instant,
    error: GenerateError,
}

#[derive(Debug, Clone, Default)]
pub struct InFlightGenerations {
    keys: Arc<Slots>,
}

impl InFlightGenerations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive ownership of `key`. `waited` reports whether another request
    /// held it first.
    pub async fn acquire(&self, key: &str) -> InFlightGuard {
        let started_at = Instant::now();
        // Declared before `lock` so it runs after our reference is gone, including when
        // this future is dropped while queued.
        let _cleanup = RemoveIfUnused {
            key,
            keys: &self.keys,
        };
        let lock = Arc::clone(self.keys.entry(key.to_string()).or_default().value());

        let (guard, waited) = match Arc::clone(&lock).try_lock_owned() {
            Ok(guard) => (guard, false),
            Err(_) => (Arc::clone(&lock).lock_owned().await, true),
        };

        InFlightGuard {
            key: key.to_string(),
            keys: Arc::clone(&self.keys),
            started_at,
            waited,
            slot: guard,
        }
    }

    /// Keys with at least one request holding or waiting.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

struct RemoveIfUnused<'a> {
    key: &'a str,
    keys: &'a Slots,
}

impl Drop for RemoveIfUnused<'_> {
    fn drop(&mut self) {
        self.keys
            .remove_if(self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub struct InFlightGuard {
    key: String,
    keys: Arc<Slots>,
    started_at: Instant,
    waited: bool,
    slot: OwnedMutexGuard<Option<LeaderFailure>>,
}

impl InFlightGuard {
    pub fn waited(&self) -> bool {
        self.waited
    }

    /// The error of a leader that failed while this request was queued.
    pub fn leader_failure(&self) -> Option<GenerateError> {
        self.slot
            .as_ref()
            .filter(|failure| self.waited && failure.at >= self.started_at)
            .map(|failure| failure.error.clone())
    }

    pub fn record_failure(&mut self, error: &GenerateError) {
        *self.slot = Some(LeaderFailure {
            at: Instant::now(),
            error: error.clone(),
        });
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        // Two references remain when nobody else is queued: the map's and our guard's.
        self.keys
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) <= 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn uncontended_acquire_does_not_wait_and_cleans_up() {
        let inflight = InFlightGenerations::new();
        {
            let guard = inflight.acquire("k").await;
            assert!(!guard.waited());
            assert_eq!(inflight.len(), 1);
        }
        assert!(inflight.is_empty());
    }

    #[tokio::test]
    async fn second_caller_waits_for_first() {
        let inflight = InFlightGenerations::new();
        let first = inflight.acquire("k").await;

        let contender = {
            let inflight = inflight.clone();
            tokio::spawn(async move { inflight.acquire("k").await.waited() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        drop(first);

        assert!(contender.await.expect("task"));
        assert!(inflight.is_empty());
    }

    #[tokio::test]
    async fn distinct_keys_do_not_block_each_other() {
        let inflight = InFlightGenerations::new();
        let _a = inflight.acquire("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), inflight.acquire("b"))
            .await
            .expect("distinct key acquires immediately");
        assert!(!b.waited());
        assert_eq!(inflight.len(), 2);
    }

    #[tokio::test]
    async fn waiter_cancelled_after_release_leaves_no_entry() {
        let inflight = InFlightGenerations::new();
        let first = inflight.acquire("k").await;

        let contender = {
            let inflight = inflight.clone();
            tokio::spawn(async move { inflight.acquire("k").await.waited() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The holder leaves while the contender is still queued, then the contender is
        // cancelled before it runs again.
        drop(first);
        contender.abort();
        let _ = contender.await;

        assert!(inflight.is_empty());
    }

    #[tokio::test]
    async fn queued_caller_sees_leader_failure() {
        let inflight = InFlightGenerations::new();
        let mut leader = inflight.acquire("k").await;
        assert!(leader.leader_failure().is_none());

        let follower = {
            let inflight = inflight.clone();
            tokio::spawn(async move {
                let guard = inflight.acquire("k").await;
                guard.leader_failure()
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        leader.record_failure(&GenerateError::RateLimited {
            retry_after_secs: Some(9),
        });
        drop(leader);

        assert!(matches!(
            follower.await.expect("task"),
            Some(GenerateError::RateLimited {
                retry_after_secs: Some(9)
            })
        ));
    }

    #[tokio::test]
    async fn later_caller_ignores_stale_failure() {
        let inflight = InFlightGenerations::new();
        let mut leader = inflight.acquire("k").await;
        leader.record_failure(&GenerateError::RateLimited {
            retry_after_secs: None,
        });

        let follower = {
            let inflight = inflight.clone();
            tokio::spawn(async move {
                let guard = inflight.acquire("k").await;
                (guard.waited(), guard.leader_failure().is_none())
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(leader);

        assert_eq!(follower.await.expect("task"), (true, true));
    }
}
