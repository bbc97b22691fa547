use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State, rejection::BytesRejection},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use larder_api_types::{
    EndpointInfo, GenerateRequest, GenerateResponse, HealthResponse, ServiceInfo,
};
use tracing::debug;

use crate::{
    application::{error::HttpError, recipes::RecipeGateway},
    config::DeployEnvironment,
    domain::recipes::RecipeRequestDraft,
};

use super::{
    error::generate_error_to_response,
    middleware::{log_responses, set_request_context},
};

const SERVICE_NAME: &str = "larder";
const SOURCE: &str = "infra::http::public";

#[derive(Clone)]
pub struct HttpState {
    pub gateway: Arc<RecipeGateway>,
    pub environment: DeployEnvironment,
}

pub fn build_router(state: HttpState, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/generate", post(generate))
        .fallback(not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn service_info() -> Json<ServiceInfo> {
    let endpoints = [("GET", "/"), ("GET", "/health"), ("POST", "/generate")]
        .into_iter()
        .map(|(method, path)| EndpointInfo {
            method: method.to_string(),
            path: path.to_string(),
        })
        .collect();

    Json(ServiceInfo {
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints,
    })
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
    })
}

async fn generate(
    State(state): State<HttpState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return HttpError::from_error(
                SOURCE,
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large",
                &rejection,
            )
            .into_response();
        }
        Err(rejection) => {
            return HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Invalid JSON body",
                &rejection,
            )
            .into_response();
        }
    };

    let request: GenerateRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            debug!(target = "larder::http::generate", error = %err, "rejected request body");
            return HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Invalid JSON body",
                &err,
            )
            .into_response();
        }
    };

    match state
        .gateway
        .generate_recipes(RecipeRequestDraft::from(request))
        .await
    {
        Ok(items) => Json(GenerateResponse { items }).into_response(),
        Err(err) => generate_error_to_response(err, state.environment),
    }
}

async fn not_found() -> Response {
    HttpError::new(
        SOURCE,
        StatusCode::NOT_FOUND,
        "Not found",
        "no route matched the request",
    )
    .into_response()
}
