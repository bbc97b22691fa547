//! Recipe generation gateway.
//!
//! Validates a request, serves it from the recipe cache when possible, and otherwise asks
//! the upstream model, normalizes the answer and stores it with a time-to-live.
//!
//! Cache trouble never fails a request: read errors count as misses and write errors are
//! logged and dropped. The cache write happens inside the caller's future after the
//! upstream call returns, so a dropped request never writes.

mod inflight;
mod normalize;
mod prompt;
mod quota;


pub use inflight::{InFlightGenerations, InFlightGuard};
pub use normalize::{NormalizeError, UNKNOWN_CALORIES, UNTITLED_RECIPE, normalize_response};
pub use prompt::build_prompt;
pub use quota::UpstreamQuota;

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheKey, RecipeCache};
use crate::domain::error::ValidationError;
use crate::domain::recipes::{RecipeRequest, RecipeRequestDraft, RecipeResult};
use crate::infra::upstream::{GenerationClient, GenerationPrompt, UpstreamError};

const METRIC_CACHE_HIT: &str = "larder_recipe_cache_hit_total";
const METRIC_CACHE_MISS: &str = "larder_recipe_cache_miss_total";
const METRIC_CACHE_ERROR: &str = "larder_recipe_cache_error_total";
const METRIC_UPSTREAM_REQUEST: &str = "larder_upstream_request_total";
const METRIC_UPSTREAM_RATE_LIMITED: &str = "larder_upstream_rate_limited_total";
const METRIC_UPSTREAM_FAILURE: &str = "larder_upstream_failure_total";
const METRIC_UPSTREAM_LATENCY_MS: &str = "larder_upstream_latency_ms";
const METRIC_SINGLE_FLIGHT_WAIT: &str = "larder_single_flight_wait_total";

pub const DEFAULT_RECIPE_COUNT: u8 = 3;

#[derive(Debug, Clone, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("rate limit reached")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("recipe generation failed")]
    Upstream(#[source] UpstreamError),
    #[error("upstream response could not be used")]
    UpstreamFormat(#[source] NormalizeError),
}

impl From<UpstreamError> for GenerateError {
    fn from(error: UpstreamError) -> Self {
        match error {
            UpstreamError::RateLimited { retry_after_secs } => {
                Self::RateLimited { retry_after_secs }
            }
            other => Self::Upstream(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Recipes requested per prompt.
    pub recipe_count: u8,
    pub cache_ttl: Duration,
    /// Collapse concurrent identical misses into one upstream call.
    pub single_flight: bool,
    pub quota: Option<UpstreamQuota>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            recipe_count: DEFAULT_RECIPE_COUNT,
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            single_flight: true,
            quota: None,
        }
    }
}

#[derive(Clone)]
pub struct RecipeGateway {
    cache: Arc<dyn RecipeCache>,
    client: Arc<dyn GenerationClient>,
    inflight: InFlightGenerations,
    config: GatewayConfig,
}

impl RecipeGateway {
    pub fn new(
        cache: Arc<dyn RecipeCache>,
        client: Arc<dyn GenerationClient>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            cache,
            client,
            inflight: InFlightGenerations::new(),
            config,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Generate recipes for a request, cache first.
    #[instrument(skip_all, fields(cache = self.cache.backend_name()))]
    pub async fn generate_recipes(
        &self,
        draft: RecipeRequestDraft,
    ) -> Result<Vec<RecipeResult>, GenerateError> {
        let request = draft.validate()?;
        let key = CacheKey::derive(&request);

        if let Some(recipes) = self.lookup(&key).await {
            return Ok(recipes);
        }

        let mut flight = None;
        if self.config.single_flight {
            let guard = self.inflight.acquire(key.as_str()).await;
            if guard.waited() {
                counter!(METRIC_SINGLE_FLIGHT_WAIT).increment(1);
            }
            if let Some(recipes) = self.lookup(&key).await {
                return Ok(recipes);
            }
            if let Some(error) = guard.leader_failure() {
                debug!(
                    target = "larder::recipes::gateway",
                    error = %error,
                    "identical in-flight generation failed, sharing its error"
                );
                return Err(error);
            }
            flight = Some(guard);
        }

        let outcome = self.generate_uncached(&request, &key).await;
        if let (Err(error), Some(guard)) = (&outcome, flight.as_mut()) {
            guard.record_failure(error);
        }
        outcome
    }

    async fn generate_uncached(
        &self,
        request: &RecipeRequest,
        key: &CacheKey,
    ) -> Result<Vec<RecipeResult>, GenerateError> {
        counter!(METRIC_CACHE_MISS).increment(1);

        if let Some(quota) = &self.config.quota
            && let Err(retry_after) = quota.try_acquire(self.client.model_name())
        {
            counter!(METRIC_UPSTREAM_RATE_LIMITED, "source" => "local").increment(1);
            warn!(
                target = "larder::recipes::gateway",
                retry_after,
                limit = quota.limit(),
                "local upstream budget exhausted"
            );
            return Err(GenerateError::RateLimited {
                retry_after_secs: Some(retry_after),
            });
        }

        let prompt = build_prompt(request, self.config.recipe_count);
        let raw = self.call_upstream(&prompt).await?;

        let recipes = normalize_response(&raw).map_err(|err| {
            counter!(METRIC_UPSTREAM_FAILURE, "kind" => "format").increment(1);
            warn!(
                target = "larder::recipes::gateway",
                error = %err,
                "upstream response could not be normalized"
            );
            GenerateError::UpstreamFormat(err)
        })?;

        if recipes.is_empty() {
            debug!(
                target = "larder::recipes::gateway",
                "upstream returned no recipes, skipping cache write"
            );
        } else {
            self.store(key, &recipes).await;
        }

        info!(
            target = "larder::recipes::gateway",
            recipes = recipes.len(),
            "recipes generated"
        );
        Ok(recipes)
    }

    async fn call_upstream(
        &self,
        prompt: &GenerationPrompt,
    ) -> Result<String, GenerateError> {
        let provider = self.client.provider_name();
        counter!(METRIC_UPSTREAM_REQUEST, "provider" => provider).increment(1);
        let started_at = Instant::now();

        let result = self.client.generate(prompt).await;

        histogram!(METRIC_UPSTREAM_LATENCY_MS, "provider" => provider)
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        result.map_err(|err| {
            if err.is_rate_limited() {
                counter!(METRIC_UPSTREAM_RATE_LIMITED, "source" => "upstream").increment(1);
                warn!(
                    target = "larder::recipes::gateway",
                    provider,
                    model = self.client.model_name(),
                    "upstream rate limit reached"
                );
            } else {
                counter!(METRIC_UPSTREAM_FAILURE, "kind" => "request").increment(1);
                warn!(
                    target = "larder::recipes::gateway",
                    provider,
                    error = %err,
                    "upstream call failed"
                );
            }
            GenerateError::from(err)
        })
    }

    async fn lookup(&self, key: &CacheKey) -> Option<Vec<RecipeResult>> {
        match self.cache.get(key).await {
            Ok(Some(recipes)) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                debug!(
                    target = "larder::recipes::gateway",
                    recipes = recipes.len(),
                    "recipe cache hit"
                );
                Some(recipes)
            }
            Ok(None) => None,
            Err(err) => {
                counter!(METRIC_CACHE_ERROR, "op" => "get").increment(1);
                warn!(
                    target = "larder::recipes::gateway",
                    backend = self.cache.backend_name(),
                    error = %err,
                    "recipe cache read failed, treating as miss"
                );
                None
            }
        }
    }

    async fn store(&self, key: &CacheKey, recipes: &[RecipeResult]) {
        if let Err(err) = self.cache.put(key, recipes, self.config.cache_ttl).await {
            counter!(METRIC_CACHE_ERROR, "op" => "put").increment(1);
            warn!(
                target = "larder::recipes::gateway",
                backend = self.cache.backend_name(),
                error = %err,
                "recipe cache write failed"
            );
        }
    }
}
