use axum::http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use axum::response::{IntoResponse, Response};

use crate::application::error::HttpError;
use crate::application::recipes::GenerateError;
use crate::config::DeployEnvironment;

const SOURCE: &str = "infra::http::generate_error_to_response";

pub const RATE_LIMITED_MESSAGE: &str = "Rate limit reached";
pub const GENERATION_FAILED_MESSAGE: &str = "Failed to generate recipes";

/// Map a gateway failure onto its status and JSON body.
///
/// Upstream failures carry their cause chain as `details` outside production.
pub fn generate_error_to_response(
    error: GenerateError,
    environment: DeployEnvironment,
) -> Response {
    match &error {
        GenerateError::Validation(validation) => HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            validation.to_string(),
            validation.to_string(),
        )
        .into_response(),
        GenerateError::RateLimited { retry_after_secs } => {
            let mut response = HttpError::from_error(
                SOURCE,
                StatusCode::TOO_MANY_REQUESTS,
                RATE_LIMITED_MESSAGE,
                &error,
            )
            .into_response();
            if let Some(seconds) = retry_after_secs
                && let Ok(value) = HeaderValue::from_str(&seconds.to_string())
            {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
            response
        }
        GenerateError::Upstream(_) | GenerateError::UpstreamFormat(_) => {
            let http = HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                GENERATION_FAILED_MESSAGE,
                &error,
            );
            if environment.is_production() {
                http.into_response()
            } else {
                http.with_details().into_response()
            }
        }
    }
}
