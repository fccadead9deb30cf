use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use analysis_core::{AnalysisContext, Phase, ResultChunk};
use analysis_llm::LlmClient;

use crate::service::{AnalysisService, insufficient_data};

type PromptBuilderFn = fn(&AnalysisContext, Phase) -> (String, Value);

/// Generic driver for the eight LLM-driven services of spec §4.2.6
/// (Manipulation, Argument, Psychological, SpeakerAttitude,
/// ConversationFlow, EnhancedUnderstanding, Linguistic, SessionInsights).
/// They share one protocol end to end — gate on transcript length, stream
/// `json_stream` for the coarse phase, re-run for the final phase once
/// `ctx.transcript_final` is set — so one driver parameterized by each
/// service's [`analysis_prompts`] builder avoids eight near-identical
/// structs.
pub struct LlmDrivenService {
    name: &'static str,
    version: &'static str,
    min_words: usize,
    prompt_builder: PromptBuilderFn,
    llm: Arc<LlmClient>,
}

impl LlmDrivenService {
    pub fn new(
        name: &'static str,
        min_words: usize,
        prompt_builder: PromptBuilderFn,
        llm: Arc<LlmClient>,
    ) -> Self {
        Self {
            name,
            version: "1.0.0",
            min_words,
            prompt_builder,
            llm,
        }
    }
}

#[async_trait]
impl AnalysisService for LlmDrivenService {
    fn name(&self) -> &'static str {
        self.name
    }

    fn version(&self) -> &'static str {
        self.version
    }

    async fn stream_analyze(
        &self,
        ctx: Arc<AnalysisContext>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<ResultChunk> {
        let (tx, rx) = mpsc::channel(16);

        if ctx.word_count() < self.min_words {
            let _ = tx.try_send(insufficient_data(
                self.name,
                self.version,
                format!(
                    "transcript has {} words, below the {}-word minimum for this service",
                    ctx.word_count(),
                    self.min_words
                ),
            ));
            return rx;
        }

        let name = self.name;
        let version = self.version;
        let builder = self.prompt_builder;
        let llm = Arc::clone(&self.llm);

        tokio::spawn(async move {
            let mut phase = if ctx.transcript_final().is_some() {
                Phase::Final
            } else {
                Phase::Coarse
            };
            let mut chunk_index = 0u32;
            let mut last_data: Option<Map<String, Value>> = None;

            loop {
                let (prompt, schema) = builder(&ctx, phase);
                let audio = ctx.audio_bytes().map(|a| (*a).clone());

                let mut stream = llm.json_stream(prompt, Some(schema), audio).await;
                let mut saw_done = false;

                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            warn!(service = name, "cancelled mid-stream");
                            return;
                        }
                        maybe = stream.recv() => {
                            let Some(chunk) = maybe else { break };
                            last_data = Some(chunk.data.clone());
                            let is_terminal = phase == Phase::Final && chunk.done;
                            let out = ResultChunk {
                                service_name: name.to_string(),
                                service_version: version.to_string(),
                                local: Map::new(),
                                llm: Some(chunk.data),
                                errors: Vec::new(),
                                partial: !is_terminal,
                                phase,
                                chunk_index: Some(chunk_index),
                            };
                            chunk_index += 1;
                            if chunk.done {
                                saw_done = true;
                            }
                            if tx.send(out).await.is_err() {
                                return;
                            }
                            if is_terminal {
                                if let Some(data) = last_data.clone() {
                                    ctx.write_service_result(name, data);
                                }
                                return;
                            }
                        }
                    }
                }

                if !saw_done {
                    warn!(service = name, phase = ?phase, "json_stream ended without a done chunk");
                }

                if phase == Phase::Final {
                    break;
                }
                if ctx.transcript_final().is_some() {
                    phase = Phase::Final;
                    continue;
                }
                break;
            }

            // Coarse-only completion: the final transcript never arrived,
            // but the contract still requires a terminal chunk.
            let data = last_data.unwrap_or_default();
            ctx.write_service_result(name, data.clone());
            let out = ResultChunk {
                service_name: name.to_string(),
                service_version: version.to_string(),
                local: Map::new(),
                llm: Some(data),
                errors: Vec::new(),
                partial: false,
                phase: Phase::Final,
                chunk_index: Some(chunk_index),
            };
            let _ = tx.send(out).await;
        });

        rx
    }
}
