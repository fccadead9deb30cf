use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use analysis_config::RunnerConfig;
use analysis_core::{
    AnalysisContext, AnalysisDoneMeta, AnalysisDonePayload, AnalysisEvent, AnalysisRequest,
    ErrorDetail,
};
use analysis_llm::LlmClient;
use analysis_services::{AnalysisService, ServiceRegistry, insufficient_data};

/// Every service name the registry can produce, known up front so the
/// Runner can report "did not complete" for whichever of them never reach
/// a terminal chunk (deadline expiry, a dropped consumer) without having
/// to thread that bookkeeping back out of a cancelled future (spec §5,
/// §4.5 deadline handling).
const ALL_SERVICE_NAMES: [&str; 14] = [
    "transcription",
    "audio_quality",
    "quantitative_metrics",
    "enhanced_acoustic",
    "linguistic_enhancement",
    "manipulation",
    "argument",
    "psychological",
    "speaker_attitude",
    "conversation_flow",
    "enhanced_understanding",
    "linguistic",
    "session_insights",
    "credibility",
];

type Pending = Arc<Mutex<HashSet<&'static str>>>;

/// Drives one request through `INIT → PHASE_A_INPUT → PHASE_B_FOUNDATION →
/// PHASE_C_METRICS → PHASE_D_LLM_ANALYSIS → PHASE_E_CREDIBILITY → DONE`
/// (spec §4.5), fanning each phase's services out with `JoinSet` and
/// multiplexing every per-service channel into one output stream — the
/// same spawn-and-drain shape the teacher's `sub_agent` module uses for
/// concurrent sub-agents, generalized here from one task to N.
pub struct Runner {
    llm: Arc<LlmClient>,
    config: RunnerConfig,
}

impl Runner {
    pub fn new(llm: Arc<LlmClient>, config: RunnerConfig) -> Self {
        Self { llm, config }
    }

    /// Start the pipeline. Returns immediately with the output receiver;
    /// the pipeline itself runs on a spawned task. Dropping `cancel`'s
    /// underlying token has no special effect — call `cancel.cancel()` to
    /// stop the request early, or drop the returned receiver to have the
    /// Runner observe a closed channel and wind down on its own.
    pub fn run(&self, request: AnalysisRequest, cancel: CancellationToken) -> mpsc::Receiver<AnalysisEvent> {
        let (tx, rx) = mpsc::channel(256);
        let llm = Arc::clone(&self.llm);
        let config = self.config;
        tokio::spawn(async move {
            drive(llm, config, request, cancel, tx).await;
        });
        rx
    }
}

async fn drive(
    llm: Arc<LlmClient>,
    config: RunnerConfig,
    request: AnalysisRequest,
    cancel: CancellationToken,
    tx: mpsc::Sender<AnalysisEvent>,
) {
    info!(phase = "PHASE_A_INPUT");
    if let Err(message) = request.validate() {
        warn!(%message, "rejecting request at PHASE_A_INPUT");
        let _ = tx
            .send(AnalysisEvent::Done {
                payload: AnalysisDonePayload {
                    results: None,
                    meta: None,
                    errors: vec![ErrorDetail {
                        code: "InvalidInput".to_string(),
                        message,
                        details: None,
                    }],
                },
            })
            .await;
        return;
    }

    let AnalysisRequest {
        transcript,
        audio_bytes,
        mime_type: _,
        meta,
    } = request;
    let ctx = Arc::new(AnalysisContext::new(transcript, audio_bytes, meta));
    let registry = ServiceRegistry::new(llm);
    let pending: Pending = Arc::new(Mutex::new(ALL_SERVICE_NAMES.iter().copied().collect()));

    let work = run_phases(&registry, Arc::clone(&ctx), cancel.clone(), tx.clone(), Arc::clone(&pending));

    match config.request_deadline {
        Some(deadline) => {
            if tokio::time::timeout(deadline, work).await.is_err() {
                warn!(?deadline, "request deadline expired, cancelling outstanding work");
                cancel.cancel();
            }
        }
        None => work.await,
    }

    let errors = pending
        .lock()
        .iter()
        .map(|name| ErrorDetail {
            code: "Cancelled".to_string(),
            message: format!("{name} did not complete before the request ended"),
            details: None,
        })
        .collect();

    let payload = AnalysisDonePayload {
        results: Some(ctx.service_results_snapshot()),
        meta: Some(AnalysisDoneMeta {
            transcript_final: ctx.transcript_final(),
            speaker_segments: ctx.speaker_segments(),
            audio_summary: ctx.audio_summary(),
            quantitative_metrics: ctx.quantitative_metrics(),
        }),
        errors,
    };
    let result_count = payload.results.as_ref().map(|r| r.len()).unwrap_or(0);
    info!(phase = "DONE", results = result_count);
    let _ = tx.send(AnalysisEvent::Done { payload }).await;
}

async fn run_phases(
    registry: &ServiceRegistry,
    ctx: Arc<AnalysisContext>,
    cancel: CancellationToken,
    tx: mpsc::Sender<AnalysisEvent>,
    pending: Pending,
) {
    info!(phase = "PHASE_B_FOUNDATION");
    fan_out(
        registry.foundation_services(),
        Arc::clone(&ctx),
        cancel.clone(),
        tx.clone(),
        Arc::clone(&pending),
    )
    .await;
    if cancel.is_cancelled() {
        return;
    }

    let gate_c = transcript_gate(&ctx, 20);
    info!(phase = "PHASE_C_METRICS", gate_open = gate_c);
    if gate_c {
        fan_out(
            registry.metrics_services(),
            Arc::clone(&ctx),
            cancel.clone(),
            tx.clone(),
            Arc::clone(&pending),
        )
        .await;
    } else {
        gated_out_batch(
            registry.metrics_services(),
            &tx,
            &pending,
            "transcript unavailable or too short: PHASE_C_METRICS gate never opened",
        )
        .await;
    }
    if cancel.is_cancelled() {
        return;
    }

    let gate_d = transcript_gate(&ctx, 30);
    info!(phase = "PHASE_D_LLM_ANALYSIS", gate_open = gate_d);
    info!(phase = "PHASE_E_CREDIBILITY");

    // Credibility runs concurrently with Phase D rather than gated on its
    // completion (decision recorded in DESIGN.md): it has its own gate
    // over Phase C's metrics and does not need Phase D's LLM judgments.
    let llm_phase = async {
        if gate_d {
            fan_out(
                registry.llm_analysis_services(),
                Arc::clone(&ctx),
                cancel.clone(),
                tx.clone(),
                Arc::clone(&pending),
            )
            .await;
        } else {
            gated_out_batch(
                registry.llm_analysis_services(),
                &tx,
                &pending,
                "transcript unavailable or too short: PHASE_D_LLM_ANALYSIS gate never opened",
            )
            .await;
        }
    };
    let credibility_phase = fan_out(
        vec![registry.credibility_service()],
        Arc::clone(&ctx),
        cancel.clone(),
        tx.clone(),
        Arc::clone(&pending),
    );

    tokio::join!(llm_phase, credibility_phase);
}

/// spec §4.5 gate rule, applied uniformly with whatever threshold the
/// calling phase needs: open once the final transcript is known, or once
/// the best transcript available so far clears `min_words`.
fn transcript_gate(ctx: &AnalysisContext, min_words: usize) -> bool {
    ctx.transcript_final().is_some() || ctx.word_count() >= min_words
}

/// Spawn every service in `services` concurrently, forwarding each chunk
/// as an `analysis.update` event and clearing its name from `pending` the
/// moment its terminal chunk is observed. Returns once every spawned task
/// has finished (including tasks that ended early because `cancel` fired).
async fn fan_out(
    services: Vec<Box<dyn AnalysisService>>,
    ctx: Arc<AnalysisContext>,
    cancel: CancellationToken,
    tx: mpsc::Sender<AnalysisEvent>,
    pending: Pending,
) {
    let mut join_set = JoinSet::new();
    for service in services {
        let ctx = Arc::clone(&ctx);
        let cancel = cancel.clone();
        let tx = tx.clone();
        let pending = Arc::clone(&pending);
        join_set.spawn(async move {
            let mut rx = service.stream_analyze(ctx, cancel).await;
            while let Some(chunk) = rx.recv().await {
                let is_terminal = chunk.is_terminal();
                let service_name = chunk.service_name.clone();
                if is_terminal {
                    pending.lock().remove(service_name.as_str());
                }
                let event = AnalysisEvent::Update {
                    service: service_name,
                    payload: chunk,
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
    }
    while let Some(result) = join_set.join_next().await {
        if let Err(error) = result {
            warn!(%error, "service task panicked");
        }
    }
}

/// Emit a single `InsufficientData` terminal chunk for each service in a
/// phase whose gate never opened, without invoking the service at all
/// (spec §4.2 rule: "a service must emit a single final chunk containing
/// an `errors` entry and otherwise-empty payload").
async fn gated_out_batch(
    services: Vec<Box<dyn AnalysisService>>,
    tx: &mpsc::Sender<AnalysisEvent>,
    pending: &Pending,
    reason: &str,
) {
    for service in services {
        let name = service.name();
        let chunk = insufficient_data(name, service.version(), reason.to_string());
        pending.lock().remove(name);
        let event = AnalysisEvent::Update {
            service: name.to_string(),
            payload: chunk,
        };
        if tx.send(event).await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_config::LlmConfig;
    use analysis_core::RequestMeta;
    use analysis_llm::MockProvider;

    fn runner() -> Runner {
        let provider = Arc::new(MockProvider::new());
        let llm = Arc::new(LlmClient::new(provider, LlmConfig::default()));
        Runner::new(llm, RunnerConfig::default())
    }

    async fn drain(mut rx: mpsc::Receiver<AnalysisEvent>) -> Vec<AnalysisEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn rejects_empty_request_with_invalid_input() {
        let runner = runner();
        let events = drain(runner.run(AnalysisRequest::default(), CancellationToken::new())).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            AnalysisEvent::Done { payload } => {
                assert!(payload.results.is_none());
                assert_eq!(payload.errors[0].code, "InvalidInput");
            }
            _ => panic!("expected a single analysis.done event"),
        }
    }

    #[tokio::test]
    async fn done_is_always_last_and_unique() {
        let runner = runner();
        let request = AnalysisRequest {
            transcript: Some("the quick brown fox jumps over the lazy dog again and again".to_string()),
            meta: RequestMeta::default(),
            ..Default::default()
        };
        let events = drain(runner.run(request, CancellationToken::new())).await;
        let done_count = events
            .iter()
            .filter(|e| matches!(e, AnalysisEvent::Done { .. }))
            .count();
        assert_eq!(done_count, 1);
        assert!(matches!(events.last(), Some(AnalysisEvent::Done { .. })));
    }

    #[tokio::test]
    async fn short_transcript_gates_out_llm_services() {
        let runner = runner();
        let request = AnalysisRequest {
            transcript: Some("too short".to_string()),
            meta: RequestMeta::default(),
            ..Default::default()
        };
        let events = drain(runner.run(request, CancellationToken::new())).await;
        let manipulation_error = events.iter().find_map(|e| match e {
            AnalysisEvent::Update { service, payload } if service == "manipulation" => {
                Some(payload.errors.first().cloned())
            }
            _ => None,
        });
        assert_eq!(
            manipulation_error.flatten().map(|e| e.code),
            Some("InsufficientData".to_string())
        );
    }

    #[tokio::test]
    async fn cancelling_immediately_still_emits_a_single_done() {
        let runner = runner();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let request = AnalysisRequest {
            transcript: Some("hello there, this is a perfectly normal transcript".to_string()),
            meta: RequestMeta::default(),
            ..Default::default()
        };
        let events = drain(runner.run(request, cancel)).await;
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, AnalysisEvent::Done { .. }))
                .count(),
            1
        );
    }
}
