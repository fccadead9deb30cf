//! # analysis-llm
//!
//! The uniform async LLM surface every `AnalysisService` calls through:
//! transcription, structured JSON queries, and the `json_stream` streaming
//! primitive, with model fallback selection and retry/backoff (spec §4.1,
//! component C1).

mod client;
mod gemini;
pub mod mock;
mod provider;

pub use client::{JsonStreamChunk, LlmClient, TranscribeChunk};
pub use gemini::GeminiProvider;
pub use mock::{MockProvider, MockResponse};
pub use provider::{ContentPart, GenerateRequest, GenerateResponse, LiveMessage, LlmProvider};
