use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use larder::{
    application::{
        error::AppError,
        recipes::{GatewayConfig, RecipeGateway, UpstreamQuota},
    },
    cache::{CacheConfig, build_recipe_cache},
    config::{self, GenerateArgs, Settings, UpstreamProvider},
    domain::recipes::RecipeRequestDraft,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        upstream::{FakeGenerationClient, GeminiClient, GeminiConfig, GenerationClient},
    },
};
use larder_api_types::GenerateResponse;
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

/// Reply served by the `fake` provider.
const FAKE_REPLY: &str = r#"[
  {"name": "Pantry Fried Rice", "recipe": ["Heat oil in a pan.", "Add the ingredients and stir-fry for 5 minutes.", "Season and serve."], "calories": 420},
  {"name": "Quick Skillet Hash", "recipe": ["Dice everything.", "Cook in a skillet until golden."], "calories": 380}
]"#;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Generate(args) => run_generate(settings, *args).await,
    }
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let gateway = build_gateway(&settings)?;
    let state = HttpState {
        gateway: Arc::new(gateway),
        environment: settings.server.environment,
    };
    serve_http(&settings, state).await
}

async fn run_generate(settings: Settings, args: GenerateArgs) -> Result<(), AppError> {
    let gateway = build_gateway(&settings)?;
    let draft = RecipeRequestDraft {
        ingredients: Some(args.ingredients),
        allergies: Some(args.allergies),
        cuisines: Some(args.cuisines),
        meal_types: Some(args.meal_types),
        diet: args.diet,
    };

    let items = gateway.generate_recipes(draft).await?;
    let rendered = serde_json::to_string_pretty(&GenerateResponse { items })
        .map_err(|err| AppError::unexpected(format!("failed to render recipes: {err}")))?;
    println!("{rendered}");
    Ok(())
}

fn build_gateway(settings: &Settings) -> Result<RecipeGateway, AppError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let cache = build_recipe_cache(&cache_config)
        .map_err(|err| AppError::from(InfraError::cache(err.to_string())))?;
    let client = build_generation_client(settings)?;

    let quota = settings
        .upstream
        .quota
        .as_ref()
        .map(|quota| UpstreamQuota::new(quota.window, quota.max_requests.get()));

    let config = GatewayConfig {
        recipe_count: settings.generation.recipe_count,
        cache_ttl: cache_config.ttl,
        single_flight: settings.generation.single_flight,
        quota,
    };

    info!(
        target = "larder::bootstrap",
        cache = cache.backend_name(),
        provider = client.provider_name(),
        model = client.model_name(),
        recipe_count = config.recipe_count,
        single_flight = config.single_flight,
        "recipe gateway ready"
    );

    Ok(RecipeGateway::new(cache, client, config))
}

fn build_generation_client(settings: &Settings) -> Result<Arc<dyn GenerationClient>, AppError> {
    let upstream = &settings.upstream;
    match upstream.provider {
        UpstreamProvider::Gemini => {
            let api_key = upstream.api_key.clone().ok_or_else(|| {
                InfraError::configuration(
                    "upstream.api_key (or GEMINI_API_KEY) is required for the gemini provider",
                )
            })?;
            let client = GeminiClient::new(GeminiConfig {
                api_key,
                model: upstream.model.clone(),
                base_url: upstream.base_url.clone(),
                timeout: upstream.timeout,
            })
            .map_err(|err| InfraError::upstream(err.to_string()))?;
            Ok(Arc::new(client))
        }
        UpstreamProvider::Fake => {
            warn!(
                target = "larder::bootstrap",
                "serving canned recipes from the fake upstream provider"
            );
            Ok(Arc::new(FakeGenerationClient::new(FAKE_REPLY)))
        }
    }
}

async fn serve_http(settings: &Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state, settings.server.body_limit_bytes);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "larder::bootstrap",
        addr = %settings.server.addr,
        "listening"
    );

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move { shutdown.notified().await }
    });
    let mut server = tokio::spawn(server.into_future());

    tokio::select! {
        result = &mut server => return flatten_server_result(result),
        () = shutdown_signal() => {}
    }

    info!(target = "larder::bootstrap", "shutting down");
    shutdown.notify_one();
    drain(server, settings.server.graceful_shutdown).await
}

async fn drain(
    mut server: tokio::task::JoinHandle<std::io::Result<()>>,
    grace: Duration,
) -> Result<(), AppError> {
    match tokio::time::timeout(grace, &mut server).await {
        Ok(result) => flatten_server_result(result),
        Err(_) => {
            warn!(
                target = "larder::bootstrap",
                grace_secs = grace.as_secs(),
                "in-flight requests did not finish in time"
            );
            server.abort();
            Ok(())
        }
    }
}

fn flatten_server_result(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "larder::bootstrap", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = "larder::bootstrap", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
