use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the Larder binary.
#[derive(Debug, Parser)]
#[command(name = "larder", version, about = "Larder recipe generation gateway")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "LARDER_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP gateway.
    Serve(Box<ServeArgs>),
    /// Generate recipes once and print them as JSON.
    Generate(Box<GenerateArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub gateway: GatewayOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the maximum request body size in bytes.
    #[arg(long = "server-body-limit-bytes", value_name = "BYTES")]
    pub server_body_limit_bytes: Option<u64>,

    /// Override the deployment environment (development|production).
    #[arg(long = "server-environment", value_name = "ENV")]
    pub server_environment: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

/// Overrides shared by every command that builds a gateway.
#[derive(Debug, Args, Default, Clone)]
pub struct GatewayOverrides {
    /// Override the cache backend (memory|redis|disabled).
    #[arg(long = "cache-backend", value_name = "BACKEND")]
    pub cache_backend: Option<String>,

    /// Override the Redis connection URL.
    #[arg(long = "cache-redis-url", value_name = "URL")]
    pub cache_redis_url: Option<String>,

    /// Override the cache entry time-to-live.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Override the upstream provider (gemini|fake).
    #[arg(long = "upstream-provider", value_name = "PROVIDER")]
    pub upstream_provider: Option<String>,

    /// Override the upstream model identifier.
    #[arg(long = "upstream-model", value_name = "MODEL")]
    pub upstream_model: Option<String>,

    /// Override the upstream API base URL.
    #[arg(long = "upstream-base-url", value_name = "URL")]
    pub upstream_base_url: Option<String>,

    /// Override the upstream request timeout.
    #[arg(long = "upstream-timeout-seconds", value_name = "SECONDS")]
    pub upstream_timeout_seconds: Option<u64>,

    /// Override the number of recipes requested per prompt.
    #[arg(long = "generation-recipe-count", value_name = "COUNT")]
    pub generation_recipe_count: Option<u64>,

    /// Toggle collapsing of concurrent identical cache misses.
    #[arg(
        long = "generation-single-flight",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub generation_single_flight: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub overrides: GatewayOverrides,

    /// Ingredient available in the fridge; repeat for more.
    #[arg(long = "ingredient", short = 'i', value_name = "NAME", required = true)]
    pub ingredients: Vec<String>,

    /// Allergen to exclude; repeat for more.
    #[arg(long = "allergy", short = 'a', value_name = "NAME")]
    pub allergies: Vec<String>,

    /// Cuisine preference; repeat for more.
    #[arg(long = "cuisine", short = 'c', value_name = "NAME", required = true)]
    pub cuisines: Vec<String>,

    /// Meal type; repeat for more.
    #[arg(long = "meal-type", short = 'm', value_name = "NAME", required = true)]
    pub meal_types: Vec<String>,

    /// Diet preference (defaults to Any).
    #[arg(long = "diet", short = 'd', value_name = "DIET")]
    pub diet: Option<String>,
}
