//! Google Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GenerationClient, GenerationPrompt, UpstreamError};

const API_KEY_HEADER: &str = "x-goog-api-key";
const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    /// Scheme and host, e.g. `https://generativelanguage.googleapis.com`.
    pub base_url: String,
    pub timeout: Duration,
}

pub struct GeminiClient {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .user_agent(concat!("larder/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|err| UpstreamError::request(err.to_string()))?;
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );

        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key,
            model: config.model,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String, UpstreamError> {
        let body = GenerateContentRequest::from_prompt(prompt);

        debug!(
            target = "larder::upstream::gemini",
            model = %self.model,
            prompt_chars = prompt.text.len(),
            "sending generateContent request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|err| UpstreamError::request(err.to_string()))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());
        let bytes = response
            .bytes()
            .await
            .map_err(|err| UpstreamError::request(err.to_string()))?;

        if !status.is_success() {
            return Err(classify_failure(status, retry_after, &bytes));
        }

        let parsed: GenerateContentResponse =
            serde_json::from_slice(&bytes).map_err(|err| UpstreamError::parse(err.to_string()))?;
        parsed
            .into_text()
            .ok_or_else(|| UpstreamError::parse("response carried no candidate text"))
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn classify_failure(status: StatusCode, retry_after: Option<u64>, body: &[u8]) -> UpstreamError {
    let envelope = serde_json::from_slice::<ErrorEnvelope>(body).ok();
    let exhausted = envelope
        .as_ref()
        .and_then(|env| env.error.status.as_deref())
        .is_some_and(|s| s == RESOURCE_EXHAUSTED);

    if status == StatusCode::TOO_MANY_REQUESTS || exhausted {
        let hinted = envelope.as_ref().and_then(ErrorEnvelope::retry_delay_secs);
        return UpstreamError::RateLimited {
            retry_after_secs: retry_after.or(hinted),
        };
    }

    let message = envelope
        .and_then(|env| env.error.message)
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());
    UpstreamError::Api {
        status: status.as_u16(),
        message,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl<'a> GenerateContentRequest<'a> {
    fn from_prompt(prompt: &'a GenerationPrompt) -> Self {
        Self {
            contents: [Content {
                parts: [Part { text: &prompt.text }],
            }],
            generation_config: prompt.json_output.then(|| GenerationConfig {
                response_mime_type: "application/json",
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate's parts.
    fn into_text(self) -> Option<String> {
        let candidate = self.candidates.into_iter().next()?;
        let text: String = candidate
            .content?
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        Some(text)
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
    status: Option<String>,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

impl ErrorEnvelope {
    /// `RetryInfo.retryDelay` such as `"17s"`, when the provider includes one.
    fn retry_delay_secs(&self) -> Option<u64> {
        self.error.details.iter().find_map(|detail| {
            let delay = detail.get("retryDelay")?.as_str()?;
            let secs = delay.trim().trim_end_matches('s');
            secs.parse::<f64>().ok().map(|value| value.ceil() as u64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;

    fn client(server: &MockServer) -> GeminiClient {
        GeminiClient::new(GeminiConfig {
            api_key: "test-key".into(),
            model: "gemini-2.5-flash".into(),
            base_url: server.base_url(),
            timeout: Duration::from_secs(5),
        })
        .expect("client")
    }

    fn prompt() -> GenerationPrompt {
        GenerationPrompt {
            text: "Generate 3 recipes".into(),
            json_output: true,
        }
    }

    const PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

    #[test]
    fn endpoint_joins_base_and_model() {
        let client = GeminiClient::new(GeminiConfig {
            api_key: "k".into(),
            model: "gemini-2.5-flash".into(),
            base_url: "https://generativelanguage.googleapis.com/".into(),
            timeout: Duration::from_secs(1),
        })
        .expect("client");
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn returns_candidate_text() -> Result<(), UpstreamError> {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("POST")
                .path(PATH)
                .header(API_KEY_HEADER, "test-key")
                .json_body_includes(
                    r#"{"contents":[{"parts":[{"text":"Generate 3 recipes"}]}],"generationConfig":{"responseMimeType":"application/json"}}"#,
                );
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"candidates":[{"content":{"parts":[{"text":"[{\"name\":"},{"text":"\"Dal\"}]"}]}}]}"#);
        });

        let text = client(&server).generate(&prompt()).await?;
        mock.assert();
        assert_eq!(text, r#"[{"name":"Dal"}]"#);
        Ok(())
    }

    #[tokio::test]
    async fn status_429_is_rate_limited_with_retry_after() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("POST").path(PATH);
            then.status(429)
                .header("retry-after", "7")
                .body(r#"{"error":{"code":429,"message":"quota","status":"RESOURCE_EXHAUSTED"}}"#);
        });

        let err = client(&server).generate(&prompt()).await.unwrap_err();
        assert!(matches!(
            err,
            UpstreamError::RateLimited {
                retry_after_secs: Some(7)
            }
        ));
    }

    #[tokio::test]
    async fn resource_exhausted_body_uses_retry_delay_hint() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("POST").path(PATH);
            then.status(503).body(
                r#"{"error":{"code":503,"message":"quota","status":"RESOURCE_EXHAUSTED","details":[{"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay":"16.2s"}]}}"#,
            );
        });

        let err = client(&server).generate(&prompt()).await.unwrap_err();
        assert!(matches!(
            err,
            UpstreamError::RateLimited {
                retry_after_secs: Some(17)
            }
        ));
    }

    #[tokio::test]
    async fn other_failures_carry_status_and_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("POST").path(PATH);
            then.status(400)
                .body(r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#);
        });

        match client(&server).generate(&prompt()).await {
            Err(UpstreamError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_candidates_is_a_parse_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("POST").path(PATH);
            then.status(200).body(r#"{"candidates":[]}"#);
        });

        let err = client(&server).generate(&prompt()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Parse(_)));
    }

    #[test]
    fn plain_text_mode_omits_generation_config() {
        let prompt = GenerationPrompt {
            text: "hi".into(),
            json_output: false,
        };
        let body = serde_json::to_value(GenerateContentRequest::from_prompt(&prompt))
            .expect("serializes");
        assert_eq!(
            body,
            serde_json::json!({"contents": [{"parts": [{"text": "hi"}]}]})
        );
    }
}
