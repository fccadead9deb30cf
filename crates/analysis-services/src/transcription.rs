use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use analysis_core::{AnalysisContext, ErrorDetail, ResultChunk};
use analysis_llm::{LlmClient, TranscribeChunk};

use crate::service::{AnalysisService, insufficient_data};

const NAME: &str = "transcription";
const VERSION: &str = "1.0.0";

/// spec §4.2.1. Streams partials as the provider emits them; sets
/// `ctx.transcript_final` exactly once before its terminal chunk.
pub struct TranscriptionService {
    llm: Arc<LlmClient>,
}

impl TranscriptionService {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl AnalysisService for TranscriptionService {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn stream_analyze(
        &self,
        ctx: Arc<AnalysisContext>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<ResultChunk> {
        let (tx, rx) = mpsc::channel(16);

        let Some(audio) = ctx.audio_bytes() else {
            let _ = tx
                .try_send(insufficient_data(NAME, VERSION, "no audio bytes provided"));
            return rx;
        };

        // Open-question decision (a): if a final transcript is already
        // present (e.g. supplied directly in the request) skip re-running
        // transcription rather than re-spending LLM calls on the same audio.
        if let Some(existing) = ctx.transcript_final() {
            ctx.write_service_result(NAME, json_local(&existing));
            let _ = tx.try_send(
                ResultChunk::terminal(NAME, VERSION).with_local(json_local(&existing)),
            );
            return rx;
        }

        let llm = Arc::clone(&self.llm);
        tokio::spawn(async move {
            let mut stream = llm
                .transcribe_stream((*audio).clone(), "audio/wav".to_string(), None)
                .await;

            let mut chunk_index = 0u32;
            let mut finished = false;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        warn!(service = NAME, "cancelled mid-stream");
                        return;
                    }
                    maybe = stream.recv() => {
                        match maybe {
                            Some(TranscribeChunk::Partial(text)) => {
                                ctx.update_transcript_partial(text.clone());
                                let chunk = ResultChunk::coarse(NAME, VERSION)
                                    .with_local(json_local(&text))
                                    .with_chunk_index(chunk_index);
                                chunk_index += 1;
                                if tx.send(chunk).await.is_err() {
                                    return;
                                }
                            }
                            Some(TranscribeChunk::Final(text)) => {
                                ctx.set_transcript_final(text.clone());
                                ctx.write_service_result(NAME, json_local(&text));
                                let chunk = ResultChunk::terminal(NAME, VERSION)
                                    .with_local(json_local(&text))
                                    .with_chunk_index(chunk_index);
                                let _ = tx.send(chunk).await;
                                finished = true;
                                return;
                            }
                            None => break,
                        }
                    }
                }
            }

            if !finished {
                warn!(service = NAME, "provider stream ended without a final transcript");
                let error = ErrorDetail {
                    code: "TranscriptionFailed".to_string(),
                    message: "provider stream closed before emitting a final transcript"
                        .to_string(),
                    details: None,
                };
                let _ = tx
                    .send(ResultChunk::terminal_error(NAME, VERSION, error))
                    .await;
            }
        });

        rx
    }
}

fn json_local(text: &str) -> Map<String, serde_json::Value> {
    let mut map = Map::new();
    map.insert("text".to_string(), json!(text));
    map
}
