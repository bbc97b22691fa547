//! Local budget for upstream calls.
//!
//! Free-tier generation keys allow a handful of requests per minute. Tracking the budget
//! here lets the gateway answer 429 without spending a request that would be refused.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone)]
pub struct UpstreamQuota {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
}

impl UpstreamQuota {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
        }
    }

    /// Take one slot for `model`, or return the seconds until the oldest slot frees up.
    pub fn try_acquire(&self, model: &str) -> Result<(), u64> {
        self.try_acquire_at(model, Instant::now())
    }

    fn try_acquire_at(&self, model: &str, now: Instant) -> Result<(), u64> {
        let window = self.window;
        let mut entry = self.buckets.entry(model.to_string()).or_default();
        entry.retain(|instant| now.duration_since(*instant) < window);

        if entry.len() >= self.max_requests as usize {
            let oldest = entry.iter().min().copied().unwrap_or(now);
            let wait = window.saturating_sub(now.duration_since(oldest));
            return Err(wait.as_secs_f64().ceil().max(1.0) as u64);
        }

        entry.push(now);
        Ok(())
    }

    pub fn limit(&self) -> u32 {
        self.max_requests
    }
}
