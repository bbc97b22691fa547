use larder_api_types::{
    ErrorBody, GenerateRequest, GenerateResponse, HealthResponse, ServiceInfo,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Error)]
pub enum CliError {
    #[error("MissingServer: pass --server or set LARDER_SERVER")]
    MissingServer,
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error ({status}): {message}")]
    Api {
        status: StatusCode,
        message: String,
        retry_after: Option<u64>,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct Gateway {
    base: Url,
    http: Client,
    request_id: String,
}

impl Gateway {
    pub fn new(server: Option<String>, request_id: Option<String>) -> Result<Self, CliError> {
        let server = server
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(CliError::MissingServer)?;
        let mut base = Url::parse(&server)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = Client::builder()
            .user_agent(concat!("larder-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base,
            http,
            request_id: request_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        })
    }

    pub async fn health(&self) -> Result<HealthResponse, CliError> {
        self.send(self.request(Method::GET, "health")?).await
    }

    pub async fn info(&self) -> Result<ServiceInfo, CliError> {
        self.send(self.request(Method::GET, "")?).await
    }

    pub async fn generate(&self, body: &GenerateRequest) -> Result<GenerateResponse, CliError> {
        self.send(self.request(Method::POST, "generate")?.json(body))
            .await
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, CliError> {
        let url = self.base.join(path)?;
        Ok(self
            .http
            .request(method, url)
            .header(REQUEST_ID_HEADER, &self.request_id))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, CliError> {
        let response = builder.send().await?;
        if response.status().is_success() {
            return Ok(response.json::<T>().await?);
        }
        Err(api_error(response).await)
    }
}

async fn api_error(response: Response) -> CliError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok());
    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(ErrorBody {
            error,
            details: Some(details),
        }) => format!("{error} ({details})"),
        Ok(ErrorBody { error, .. }) => error,
        Err(_) if text.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        Err(_) => text,
    };
    CliError::Api {
        status,
        message,
        retry_after,
    }
}
