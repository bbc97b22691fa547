use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use larder::application::recipes::{GatewayConfig, RecipeGateway, UpstreamQuota};
use larder::cache::{CacheConfig, CacheError, CacheKey, MemoryRecipeCache, RecipeCache};
use larder::domain::recipes::{RecipeRequestDraft, RecipeResult};
use larder::infra::upstream::{FakeGenerationClient, UpstreamError};
use metrics_util::debugging::DebuggingRecorder;

const UPSTREAM_TEXT: &str = r#"[{"name":"Tofu Stir Fry","recipe":["Press tofu","Fry"],"calories":300}]"#;

struct UnavailableCache;

#[async_trait]
impl RecipeCache for UnavailableCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<Vec<RecipeResult>>, CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }

    async fn put(
        &self,
        _key: &CacheKey,
        _recipes: &[RecipeResult],
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }

    fn backend_name(&self) -> &'static str {
        "unavailable"
    }
}

fn draft(ingredient: &str) -> RecipeRequestDraft {
    RecipeRequestDraft {
        ingredients: Some(vec![ingredient.to_string()]),
        cuisines: Some(vec!["Chinese".into()]),
        meal_types: Some(vec!["Dinner".into()]),
        ..Default::default()
    }
}

#[tokio::test]
async fn gateway_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // Miss, upstream call and latency, then a hit.
    let client = Arc::new(FakeGenerationClient::new(UPSTREAM_TEXT));
    let gateway = RecipeGateway::new(
        Arc::new(MemoryRecipeCache::new(&CacheConfig::default())),
        client.clone(),
        GatewayConfig::default(),
    );
    gateway.generate_recipes(draft("tofu")).await.expect("miss");
    gateway.generate_recipes(draft("tofu")).await.expect("hit");

    // Upstream 429 and a failed call.
    client.push_reply(Err(UpstreamError::RateLimited {
        retry_after_secs: None,
    }));
    client.push_reply(Err(UpstreamError::request("connection reset")));
    assert!(gateway.generate_recipes(draft("leek")).await.is_err());
    assert!(gateway.generate_recipes(draft("leek")).await.is_err());

    // Cache outage degrades to a miss.
    let degraded = RecipeGateway::new(
        Arc::new(UnavailableCache),
        Arc::new(FakeGenerationClient::new(UPSTREAM_TEXT)),
        GatewayConfig {
            quota: Some(UpstreamQuota::new(Duration::from_secs(60), 1)),
            ..Default::default()
        },
    );
    degraded
        .generate_recipes(draft("kale"))
        .await
        .expect("served without cache");
    assert!(degraded.generate_recipes(draft("kale")).await.is_err());

    // Concurrent identical misses wait on one flight.
    let gated = Arc::new(FakeGenerationClient::new(UPSTREAM_TEXT).gated());
    let shared = RecipeGateway::new(
        Arc::new(MemoryRecipeCache::new(&CacheConfig::default())),
        gated.clone(),
        GatewayConfig::default(),
    );
    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let shared = shared.clone();
            tokio::spawn(async move { shared.generate_recipes(draft("okra")).await })
        })
        .collect();
    while gated.calls() == 0 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    gated.release();
    for task in tasks {
        task.await.expect("task").expect("recipes");
    }

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "larder_recipe_cache_hit_total",
        "larder_recipe_cache_miss_total",
        "larder_recipe_cache_error_total",
        "larder_upstream_request_total",
        "larder_upstream_rate_limited_total",
        "larder_upstream_failure_total",
        "larder_upstream_latency_ms",
        "larder_single_flight_wait_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
