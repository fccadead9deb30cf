use async_trait::async_trait;
use serde_json::Value;

use analysis_core::Result;

/// A single content part sent to the provider: text or inline audio.
#[derive(Debug, Clone)]
pub enum ContentPart {
    Text(String),
    Audio { data: Vec<u8>, mime_type: String },
}

/// A request to generate content, modeled on the provider contract in
/// spec §6 (`generate_content(model, contents, generation_config?)`).
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub contents: Vec<ContentPart>,
    /// When set, ask the provider for `response_mime_type = "application/json"`
    /// constrained by this JSON Schema (provider-native structured output).
    pub response_schema: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct GenerateResponse {
    pub text: String,
}

/// One message from a provider's native bidirectional live-streaming
/// surface (spec §6: `live.chat.connect(model, config)`), when the
/// provider offers one.
#[derive(Debug, Clone)]
pub enum LiveMessage {
    TextDelta(String),
    Done,
    Error(String),
}

/// Trait implemented by each concrete LLM provider adapter.
///
/// Absence of the live-streaming surface must be transparent to callers of
/// [`crate::LlmClient::json_stream`] and
/// [`crate::LlmClient::transcribe_stream`] (spec §6) — a provider that
/// returns `None` from `live_connect` simply causes the client to fall
/// back to its simulated chunking path.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// List models this provider currently has available. May involve a
    /// network round-trip on first call; the client caches the result
    /// (spec §4.1 model selection: "discovers available models once per
    /// process").
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Non-streaming generation. Used by `query_json[_schema]` and as the
    /// batch source `json_stream` slices when no live surface exists.
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse>;

    /// Provider-native bidirectional live stream, if available. Returning
    /// `Ok(None)` (not an error) means "this provider has no live surface";
    /// the client transparently falls back to simulation.
    async fn live_connect(
        &self,
        request: &GenerateRequest,
    ) -> Result<Option<tokio::sync::mpsc::Receiver<LiveMessage>>>;

    /// Transcribe audio to text (non-streaming).
    async fn transcribe(&self, audio: &[u8], mime_type: &str, model: &str) -> Result<String>;
}
