//! Deterministic mock provider for tests — never makes a network call.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use analysis_core::{AnalysisError, Result};

use crate::provider::{GenerateRequest, GenerateResponse, LiveMessage, LlmProvider};

/// A pre-configured response, FIFO-queued (mirrors the teacher's
/// `MockProvider` in `claw-llm::mock`).
#[derive(Clone)]
pub struct MockResponse {
    pub text: String,
    pub error: Option<String>,
}

impl MockResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            error: Some(msg.into()),
        }
    }
}

pub struct MockProvider {
    responses: Mutex<Vec<MockResponse>>,
    pub requests: Mutex<Vec<GenerateRequest>>,
    models: Vec<String>,
    /// If true, `live_connect` returns a receiver that streams `text`
    /// word-by-word instead of `None` — used to exercise the native
    /// streaming path of `json_stream`/`transcribe_stream`.
    pub supports_live: bool,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            models: vec!["mock-model".to_string()],
            supports_live: false,
        }
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    pub fn with_live_streaming(mut self) -> Self {
        self.supports_live = true;
        self
    }

    pub fn queue(self, response: MockResponse) -> Self {
        self.responses.lock().unwrap().push(response);
        self
    }

    fn next_response(&self) -> MockResponse {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            MockResponse::text("{}")
        } else {
            responses.remove(0)
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(self.models.clone())
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let mock = self.next_response();
        if let Some(err) = mock.error {
            return Err(AnalysisError::LlmProviderError(err));
        }
        Ok(GenerateResponse { text: mock.text })
    }

    async fn live_connect(
        &self,
        request: &GenerateRequest,
    ) -> Result<Option<mpsc::Receiver<LiveMessage>>> {
        if !self.supports_live {
            return Ok(None);
        }
        self.requests.lock().unwrap().push(request.clone());
        let mock = self.next_response();
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            if let Some(err) = mock.error {
                let _ = tx.send(LiveMessage::Error(err)).await;
                return;
            }
            for word in mock.text.split_whitespace() {
                let _ = tx.send(LiveMessage::TextDelta(format!("{word} "))).await;
            }
            let _ = tx.send(LiveMessage::Done).await;
        });
        Ok(Some(rx))
    }

    async fn transcribe(&self, _audio: &[u8], _mime_type: &str, _model: &str) -> Result<String> {
        let mock = self.next_response();
        if let Some(err) = mock.error {
            return Err(AnalysisError::LlmProviderError(err));
        }
        Ok(mock.text)
    }
}
