//! Upstream text-generation service.
//!
//! The gateway only needs "prompt in, raw text out". Providers translate that into their
//! own wire format and classify failures into [`UpstreamError`].

mod fake;
mod gemini;

pub use fake::FakeGenerationClient;
pub use gemini::{GeminiClient, GeminiConfig};

use async_trait::async_trait;
use thiserror::Error;

/// Prompt text plus the structured-output switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPrompt {
    pub text: String,
    /// Ask the provider to emit JSON only.
    pub json_output: bool,
}

#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Request(String),
    #[error("upstream returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("upstream rate limit reached")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("unreadable upstream response: {0}")]
    Parse(String),
}

impl UpstreamError {
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Send one prompt and return the model's raw text.
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String, UpstreamError>;

    fn provider_name(&self) -> &'static str;

    fn model_name(&self) -> &str;
}
