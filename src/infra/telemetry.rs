use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every metric the gateway emits. Safe to call repeatedly.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "larder_recipe_cache_hit_total",
            Unit::Count,
            "Total number of recipe requests served from cache."
        );
        describe_counter!(
            "larder_recipe_cache_miss_total",
            Unit::Count,
            "Total number of recipe requests that had to go upstream."
        );
        describe_counter!(
            "larder_recipe_cache_error_total",
            Unit::Count,
            "Total number of failed cache reads and writes."
        );
        describe_counter!(
            "larder_upstream_request_total",
            Unit::Count,
            "Total number of upstream generation calls."
        );
        describe_counter!(
            "larder_upstream_rate_limited_total",
            Unit::Count,
            "Total number of requests refused for rate limiting, locally or upstream."
        );
        describe_counter!(
            "larder_upstream_failure_total",
            Unit::Count,
            "Total number of failed or unusable upstream responses."
        );
        describe_histogram!(
            "larder_upstream_latency_ms",
            Unit::Milliseconds,
            "Upstream generation latency in milliseconds."
        );
        describe_counter!(
            "larder_single_flight_wait_total",
            Unit::Count,
            "Total number of requests that waited on an identical in-flight generation."
        );
    });
}
