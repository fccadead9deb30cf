use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde_json::{Map, Value};
use tokio::sync::{OnceCell, mpsc};
use tracing::warn;

use analysis_config::LlmConfig;
use analysis_core::{AnalysisError, Result};

use crate::provider::{ContentPart, GenerateRequest, LiveMessage, LlmProvider};

/// One chunk of a transcription stream (spec §4.1 `transcribe_stream`).
#[derive(Debug, Clone)]
pub enum TranscribeChunk {
    Partial(String),
    Final(String),
}

/// One chunk of a `json_stream` (spec §4.1).
#[derive(Debug, Clone)]
pub struct JsonStreamChunk {
    pub data: Map<String, Value>,
    pub chunk_index: u32,
    pub done: bool,
}

/// Async adapter exposing the uniform LLM surface every `AnalysisService`
/// consumes: `transcribe`, `transcribe_stream`, `query_json`,
/// `query_json_schema`, `json_stream` (spec §4.1, component C1).
pub struct LlmClient {
    provider: Arc<dyn LlmProvider>,
    config: LlmConfig,
    models: OnceCell<Vec<String>>,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn LlmProvider>, config: LlmConfig) -> Self {
        Self {
            provider,
            config,
            models: OnceCell::new(),
        }
    }

    /// Resolve which model to use: the hint if available, else the first
    /// hit in `fallback_models`, else the first model the provider reports
    /// (spec §4.1 model selection).
    async fn resolve_model(&self, hint: Option<&str>, default: &str) -> String {
        let available = self
            .models
            .get_or_init(|| async {
                self.provider.list_models().await.unwrap_or_else(|e| {
                    warn!(error = %e, "model discovery failed, proceeding without a catalogue");
                    Vec::new()
                })
            })
            .await;

        if let Some(hint) = hint {
            if available.is_empty() || available.iter().any(|m| m == hint) {
                return hint.to_string();
            }
        }
        for fallback in &self.config.fallback_models {
            if available.is_empty() || available.iter().any(|m| m == fallback) {
                return fallback.clone();
            }
        }
        available.first().cloned().unwrap_or_else(|| default.to_string())
    }

    /// Retry a fallible provider call with exponential backoff + jitter,
    /// bounded by `max_retries`, each attempt bounded by `timeout` (spec
    /// §4.1 failure semantics).
    async fn with_retry<T, F, Fut>(&self, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_err = None;
        for attempt_no in 0..=self.config.max_retries {
            let call = tokio::time::timeout(self.config.timeout, attempt());
            match call.await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if attempt_no < self.config.max_retries => {
                    let delay = backoff_delay(self.config.backoff_base, attempt_no);
                    warn!(
                        attempt = attempt_no + 1,
                        max = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying llm call after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    last_err = Some(e);
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    let err = AnalysisError::LlmTimeout(self.config.timeout);
                    if attempt_no < self.config.max_retries {
                        let delay = backoff_delay(self.config.backoff_base, attempt_no);
                        warn!(attempt = attempt_no + 1, "llm call timed out, retrying");
                        tokio::time::sleep(delay).await;
                        last_err = Some(err);
                    } else {
                        return Err(err);
                    }
                }
            }
        }
        Err(last_err.unwrap_or(AnalysisError::InternalError(
            "retry loop exited without a result".to_string(),
        )))
    }

    /// Non-streaming final transcript.
    pub async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String> {
        let model = self
            .resolve_model(None, &self.config.model_transcribe)
            .await;
        self.with_retry(|| async { self.provider.transcribe(audio, mime_type, &model).await })
            .await
    }

    /// Streaming transcription. Emits interim partials (native if the
    /// provider supports live streaming, otherwise a single-shot batch
    /// call reported as the terminal chunk); the terminal event always has
    /// `partial = false` (modeled here as [`TranscribeChunk::Final`]).
    pub async fn transcribe_stream(
        &self,
        audio: Vec<u8>,
        mime_type: String,
        context_prompt: Option<String>,
    ) -> mpsc::Receiver<TranscribeChunk> {
        let (tx, rx) = mpsc::channel(32);
        let model = self
            .resolve_model(None, &self.config.model_transcribe)
            .await;
        let provider = Arc::clone(&self.provider);
        let config = self.config.clone();

        tokio::spawn(async move {
            let mut contents = vec![ContentPart::Text(
                context_prompt.unwrap_or_else(|| "Transcribe this audio verbatim.".to_string()),
            )];
            contents.push(ContentPart::Audio {
                data: audio.clone(),
                mime_type: mime_type.clone(),
            });
            let request = GenerateRequest {
                model: model.clone(),
                contents,
                response_schema: None,
            };

            match provider.live_connect(&request).await {
                Ok(Some(mut live_rx)) => {
                    let mut buffer = String::new();
                    while let Some(msg) = live_rx.recv().await {
                        match msg {
                            LiveMessage::TextDelta(delta) => {
                                buffer.push_str(&delta);
                                let _ = tx.send(TranscribeChunk::Partial(buffer.clone())).await;
                            }
                            LiveMessage::Done => {
                                let _ = tx.send(TranscribeChunk::Final(buffer.trim().to_string())).await;
                                return;
                            }
                            LiveMessage::Error(e) => {
                                warn!(error = %e, "live transcription stream error");
                                return;
                            }
                        }
                    }
                }
                Ok(None) => {
                    // No live surface: fall back to a single batch call,
                    // reported directly as the terminal chunk.
                    match provider.transcribe(&audio, &mime_type, &model).await {
                        Ok(text) => {
                            let _ = tx.send(TranscribeChunk::Final(text)).await;
                        }
                        Err(e) => warn!(error = %e, "batch transcription failed"),
                    }
                }
                Err(e) => warn!(error = %e, config = ?config.worker_threads, "live_connect failed"),
            }
        });

        rx
    }

    /// Best-effort JSON parse of the model's free-form output.
    pub async fn query_json(&self, prompt: &str, model_hint: Option<&str>) -> Map<String, Value> {
        let model = self
            .resolve_model(model_hint, &self.config.model_analysis)
            .await;
        let request = GenerateRequest {
            model,
            contents: vec![ContentPart::Text(prompt.to_string())],
            response_schema: None,
        };

        let result = self
            .with_retry(|| async { self.provider.generate(&request).await })
            .await;

        match result {
            Ok(response) => parse_json_object(&response.text).unwrap_or_else(|| {
                let mut fallback = Map::new();
                fallback.insert(
                    "error".to_string(),
                    Value::String("model output was not valid JSON".to_string()),
                );
                fallback
            }),
            Err(e) => error_fallback(&e),
        }
    }

    /// Provider-native structured output constrained by `schema`.
    pub async fn query_json_schema(
        &self,
        prompt: &str,
        schema: &Value,
        model_hint: Option<&str>,
    ) -> Map<String, Value> {
        let model = self
            .resolve_model(model_hint, &self.config.model_structured)
            .await;
        let request = GenerateRequest {
            model,
            contents: vec![ContentPart::Text(prompt.to_string())],
            response_schema: Some(schema.clone()),
        };

        let result = self
            .with_retry(|| async { self.provider.generate(&request).await })
            .await;

        match result {
            Ok(response) => parse_json_object(&response.text).unwrap_or_else(|| {
                let mut fallback = Map::new();
                fallback.insert(
                    "error".to_string(),
                    Value::String("schema-constrained output was not valid JSON".to_string()),
                );
                fallback
            }),
            Err(e) => error_fallback(&e),
        }
    }

    /// Turn a batch or native-streaming structured-JSON call into
    /// incremental chunks (spec §4.1 `json_stream`). Each chunk's `data` is
    /// a strict key-subset of the final chunk's `data` (spec testable
    /// property B6 / scenario 6), and chunks arrive in increasing
    /// `chunk_index` order, terminated by one chunk with `done = true`.
    pub async fn json_stream(
        &self,
        prompt: String,
        schema: Option<Value>,
        audio: Option<Vec<u8>>,
    ) -> mpsc::Receiver<JsonStreamChunk> {
        let (tx, rx) = mpsc::channel(32);
        let model = self
            .resolve_model(None, &self.config.model_structured)
            .await;
        let provider = Arc::clone(&self.provider);
        let config = self.config.clone();

        tokio::spawn(async move {
            let mut contents = vec![ContentPart::Text(prompt)];
            if let Some(audio) = audio {
                contents.push(ContentPart::Audio {
                    data: audio,
                    mime_type: "audio/wav".to_string(),
                });
            }
            let request = GenerateRequest {
                model,
                contents,
                response_schema: schema,
            };

            match provider.live_connect(&request).await {
                Ok(Some(mut live_rx)) => {
                    let mut buffer = String::new();
                    let mut index = 0u32;
                    while let Some(msg) = live_rx.recv().await {
                        match msg {
                            LiveMessage::TextDelta(delta) => {
                                buffer.push_str(&delta);
                                if let Some(data) = parse_json_object(&buffer) {
                                    let _ = tx
                                        .send(JsonStreamChunk {
                                            data,
                                            chunk_index: index,
                                            done: false,
                                        })
                                        .await;
                                    index += 1;
                                }
                            }
                            LiveMessage::Done => {
                                let data = parse_json_object(&buffer).unwrap_or_default();
                                let _ = tx
                                    .send(JsonStreamChunk {
                                        data,
                                        chunk_index: index,
                                        done: true,
                                    })
                                    .await;
                                return;
                            }
                            LiveMessage::Error(e) => {
                                warn!(error = %e, "live json_stream error, ending stream early");
                                return;
                            }
                        }
                    }
                }
                Ok(None) => {
                    // Simulate: slice the batch response into N≈3-5
                    // monotonically-growing chunks, preserving key order
                    // so each prior chunk's `data` is a subset of the final.
                    match provider.generate(&request).await {
                        Ok(response) => {
                            let full = parse_json_object(&response.text).unwrap_or_default();
                            emit_simulated_chunks(&tx, full, config.backoff_base).await;
                        }
                        Err(e) => warn!(error = %e, "json_stream batch call failed"),
                    }
                }
                Err(e) => warn!(error = %e, "live_connect failed for json_stream"),
            }
        });

        rx
    }
}

/// Split `full` into 3-5 growing prefixes (by insertion order of its
/// keys), each a strict subset of `full`, followed by a terminal chunk
/// containing the entire map with `done = true`.
async fn emit_simulated_chunks(
    tx: &mpsc::Sender<JsonStreamChunk>,
    full: Map<String, Value>,
    inter_chunk_delay: Duration,
) {
    if full.is_empty() {
        let _ = tx
            .send(JsonStreamChunk {
                data: full,
                chunk_index: 0,
                done: true,
            })
            .await;
        return;
    }

    let keys: Vec<String> = full.keys().cloned().collect();
    let n_partials = keys.len().min(4).max(1);
    let chunk_size = keys.len().div_ceil(n_partials).max(1);

    let mut index = 0u32;
    let mut accumulated = Map::new();
    for (i, key) in keys.iter().enumerate() {
        accumulated.insert(key.clone(), full[key].clone());
        let at_boundary = (i + 1) % chunk_size == 0;
        let is_last_key = i + 1 == keys.len();
        if at_boundary && !is_last_key {
            let _ = tx
                .send(JsonStreamChunk {
                    data: accumulated.clone(),
                    chunk_index: index,
                    done: false,
                })
                .await;
            index += 1;
            tokio::time::sleep(inter_chunk_delay / 4).await;
        }
    }

    let _ = tx
        .send(JsonStreamChunk {
            data: full,
            chunk_index: index,
            done: true,
        })
        .await;
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(2u32.saturating_pow(attempt));
    let jitter_frac: f64 = rand::thread_rng().gen_range(0.0..0.25);
    exp + Duration::from_secs_f64(exp.as_secs_f64() * jitter_frac)
}

fn parse_json_object(text: &str) -> Option<Map<String, Value>> {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed).trim();

    serde_json::from_str::<Value>(trimmed)
        .ok()
        .and_then(|v| v.as_object().cloned())
}

/// Final-failure fallback map (spec §4.1: "final failure returns a
/// `{error: ...}` fallback map — never raises across the streaming
/// boundary").
fn error_fallback(err: &AnalysisError) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("error".to_string(), Value::String(err.to_string()));
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockProvider, MockResponse};

    fn client_with(provider: MockProvider) -> LlmClient {
        LlmClient::new(Arc::new(provider), LlmConfig::default())
    }

    #[tokio::test]
    async fn query_json_parses_clean_object() {
        let client = client_with(MockProvider::new().queue(MockResponse::text(r#"{"a":1}"#)));
        let result = client.query_json("prompt", None).await;
        assert_eq!(result["a"], serde_json::json!(1));
    }

    #[tokio::test]
    async fn query_json_strips_markdown_fence() {
        let client =
            client_with(MockProvider::new().queue(MockResponse::text("```json\n{\"a\":1}\n```")));
        let result = client.query_json("prompt", None).await;
        assert_eq!(result["a"], serde_json::json!(1));
    }

    #[tokio::test]
    async fn query_json_never_raises_on_failure() {
        let client = client_with(
            MockProvider::new()
                .queue(MockResponse::error("boom"))
                .queue(MockResponse::error("boom"))
                .queue(MockResponse::error("boom"))
                .queue(MockResponse::error("boom")),
        );
        let result = client.query_json("prompt", None).await;
        assert!(result.contains_key("error"));
    }

    #[tokio::test]
    async fn json_stream_chunks_are_subsets_of_final() {
        let client = client_with(
            MockProvider::new().queue(MockResponse::text(
                r#"{"a":1,"b":2,"c":3,"d":4,"e":5}"#,
            )),
        );
        let mut rx = client
            .json_stream("prompt".to_string(), None, None)
            .await;

        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk);
        }

        assert!(chunks.len() <= 5);
        let last = chunks.last().unwrap();
        assert!(last.done);
        let full = &last.data;
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(!chunk.done);
            for (k, v) in &chunk.data {
                assert_eq!(full.get(k), Some(v));
            }
        }
    }

    #[tokio::test]
    async fn json_stream_indices_are_monotonic() {
        let client = client_with(
            MockProvider::new().queue(MockResponse::text(r#"{"a":1,"b":2,"c":3,"d":4}"#)),
        );
        let mut rx = client
            .json_stream("prompt".to_string(), None, None)
            .await;
        let mut last_index: Option<u32> = None;
        while let Some(chunk) = rx.recv().await {
            if let Some(prev) = last_index {
                assert!(chunk.chunk_index > prev);
            }
            last_index = Some(chunk.chunk_index);
        }
    }

    #[tokio::test]
    async fn transcribe_stream_falls_back_to_batch_without_live_support() {
        let client = client_with(MockProvider::new().queue(MockResponse::text("hello world")));
        let mut rx = client
            .transcribe_stream(vec![0u8; 10], "audio/wav".to_string(), None)
            .await;
        let mut finals = 0;
        while let Some(chunk) = rx.recv().await {
            if let TranscribeChunk::Final(text) = chunk {
                assert_eq!(text, "hello world");
                finals += 1;
            }
        }
        assert_eq!(finals, 1);
    }

    #[tokio::test]
    async fn transcribe_stream_emits_partials_with_native_live_support() {
        let client = client_with(
            MockProvider::new()
                .with_live_streaming()
                .queue(MockResponse::text("this is a test")),
        );
        let mut rx = client
            .transcribe_stream(vec![0u8; 10], "audio/wav".to_string(), None)
            .await;
        let mut saw_partial = false;
        let mut final_text = None;
        while let Some(chunk) = rx.recv().await {
            match chunk {
                TranscribeChunk::Partial(_) => saw_partial = true,
                TranscribeChunk::Final(text) => final_text = Some(text),
            }
        }
        assert!(saw_partial);
        assert_eq!(final_text.unwrap(), "this is a test");
    }
}
