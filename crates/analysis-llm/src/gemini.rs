use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use analysis_core::{AnalysisError, Result};

use crate::provider::{ContentPart, GenerateRequest, GenerateResponse, LiveMessage, LlmProvider};

/// Adapter for a Gemini-shaped `generateContent` REST API (the concrete
/// provider SDK is an external collaborator per spec §1 — this adapter
/// only needs to satisfy the `generate_content`/`live.chat.connect`
/// contract of spec §6).
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    fn build_body(&self, request: &GenerateRequest) -> serde_json::Value {
        let parts: Vec<serde_json::Value> = request
            .contents
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => serde_json::json!({ "text": text }),
                ContentPart::Audio { data, mime_type } => serde_json::json!({
                    "inline_data": {
                        "mime_type": mime_type,
                        "data": base64::Engine::encode(&base64::engine::general_purpose::STANDARD, data),
                    }
                }),
            })
            .collect();

        let mut body = serde_json::json!({
            "contents": [{ "role": "user", "parts": parts }],
        });

        if let Some(schema) = &request.response_schema {
            body["generationConfig"] = serde_json::json!({
                "response_mime_type": "application/json",
                "response_schema": schema,
            });
        }

        body
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models?key={}", self.base_url, self.api_key);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AnalysisError::LlmProviderError(format!("list_models: {e}")))?;

        if !resp.status().is_success() {
            return Err(AnalysisError::LlmProviderError(format!(
                "HTTP {} listing models",
                resp.status()
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AnalysisError::LlmProviderError(format!("parsing model list: {e}")))?;

        let models = body["models"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| m["name"].as_str().map(|s| s.trim_start_matches("models/").to_string()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, request.model, self.api_key
        );
        let body = self.build_body(request);

        debug!(model = %request.model, "calling gemini generateContent");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::LlmProviderError(format!("generate: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AnalysisError::LlmProviderError(format!(
                "HTTP {status}: {text}"
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AnalysisError::LlmProviderError(format!("parsing response: {e}")))?;

        let text = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(GenerateResponse { text })
    }

    async fn live_connect(
        &self,
        _request: &GenerateRequest,
    ) -> Result<Option<tokio::sync::mpsc::Receiver<LiveMessage>>> {
        // This adapter targets the plain REST `generateContent` surface;
        // it has no live bidirectional connection. Returning `None` (not
        // an error) tells the client to fall back to simulated chunking —
        // spec §6: "absence of the live surface must be transparent".
        Ok(None)
    }

    async fn transcribe(&self, audio: &[u8], mime_type: &str, model: &str) -> Result<String> {
        let request = GenerateRequest {
            model: model.to_string(),
            contents: vec![
                ContentPart::Text("Transcribe this audio verbatim.".to_string()),
                ContentPart::Audio {
                    data: audio.to_vec(),
                    mime_type: mime_type.to_string(),
                },
            ],
            response_schema: None,
        };
        let response = self.generate(&request).await?;
        Ok(response.text)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn provider_for(server: &MockServer) -> GeminiProvider {
        GeminiProvider::new("test-key".to_string()).with_base_url(server.uri())
    }

    #[tokio::test]
    async fn generate_parses_candidate_text_from_response_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "the witness sounded confident" }] }
                }]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let request = GenerateRequest {
            model: "gemini-test".to_string(),
            contents: vec![ContentPart::Text("describe the tone".to_string())],
            response_schema: None,
        };

        let response = provider.generate(&request).await.unwrap();
        assert_eq!(response.text, "the witness sounded confident");
    }

    #[tokio::test]
    async fn generate_surfaces_non_success_status_as_llm_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let request = GenerateRequest {
            model: "gemini-test".to_string(),
            contents: vec![ContentPart::Text("hello".to_string())],
            response_schema: None,
        };

        let err = provider.generate(&request).await.unwrap_err();
        match err {
            AnalysisError::LlmProviderError(msg) => {
                assert!(msg.contains("429"), "message was: {msg}");
            }
            other => panic!("expected LlmProviderError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn list_models_strips_the_models_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [
                    { "name": "models/gemini-test" },
                    { "name": "models/gemini-other" },
                ]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let models = provider.list_models().await.unwrap();
        assert_eq!(models, vec!["gemini-test".to_string(), "gemini-other".to_string()]);
    }

    #[tokio::test]
    async fn live_connect_returns_none_falling_back_to_simulated_chunking() {
        let server = MockServer::start().await;
        let provider = provider_for(&server).await;
        let request = GenerateRequest {
            model: "gemini-test".to_string(),
            contents: vec![ContentPart::Text("hello".to_string())],
            response_schema: None,
        };

        assert!(provider.live_connect(&request).await.unwrap().is_none());
    }
}
