//! Scripted generation client for tests and local runs without an API key.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::{GenerationClient, GenerationPrompt, UpstreamError};

/// Replies with queued results in order, then with the fallback text.
pub struct FakeGenerationClient {
    replies: Mutex<VecDeque<Result<String, UpstreamError>>>,
    prompts: Mutex<Vec<GenerationPrompt>>,
    fallback: String,
    calls: AtomicUsize,
    gate: Option<Semaphore>,
}

impl FakeGenerationClient {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            fallback: fallback.into(),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Hold every call until [`FakeGenerationClient::release`] is called.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn push_reply(&self, reply: Result<String, UpstreamError>) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }

    /// Open the gate for waiting and future calls.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.close();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<GenerationPrompt> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl GenerationClient for FakeGenerationClient {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.clone());

        if let Some(gate) = &self.gate {
            // A closed semaphore is an open gate.
            let _ = gate.acquire().await;
        }

        let queued = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        queued.unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }
}
