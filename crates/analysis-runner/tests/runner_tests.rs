use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use analysis_config::{LlmConfig, RunnerConfig};
use analysis_core::{AnalysisEvent, AnalysisRequest, RequestMeta};
use analysis_llm::{LlmClient, MockProvider, MockResponse};
use analysis_runner::Runner;

fn mock_runner(provider: MockProvider) -> Runner {
    let llm = Arc::new(LlmClient::new(Arc::new(provider), LlmConfig::default()));
    Runner::new(llm, RunnerConfig::default())
}

async fn drain(mut rx: tokio::sync::mpsc::Receiver<AnalysisEvent>) -> Vec<AnalysisEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn service_chunks<'a>(events: &'a [AnalysisEvent], service: &str) -> Vec<&'a analysis_core::ResultChunk> {
    events
        .iter()
        .filter_map(|e| match e {
            AnalysisEvent::Update { service: s, payload } if s == service => Some(payload),
            _ => None,
        })
        .collect()
}

/// B1: empty transcript + no audio -> a single `analysis.done` with
/// `InvalidInput` and no `results`.
#[tokio::test]
async fn boundary_invalid_input_yields_single_done() {
    let runner = mock_runner(MockProvider::new());
    let events = drain(runner.run(AnalysisRequest::default(), CancellationToken::new())).await;
    assert_eq!(events.len(), 1);
    let AnalysisEvent::Done { payload } = &events[0] else {
        panic!("expected analysis.done");
    };
    assert!(payload.results.is_none());
    assert_eq!(payload.errors.len(), 1);
    assert_eq!(payload.errors[0].code, "InvalidInput");
}

/// B2: a transcript under the 10-word floor still runs, but every
/// LLM-driven service gates out with `InsufficientData` rather than
/// silently vanishing.
#[tokio::test]
async fn boundary_short_transcript_gates_out_every_llm_service() {
    let runner = mock_runner(MockProvider::new());
    let request = AnalysisRequest {
        transcript: Some("just a few words".to_string()),
        meta: RequestMeta::default(),
        ..Default::default()
    };
    let events = drain(runner.run(request, CancellationToken::new())).await;

    for service in [
        "manipulation",
        "argument",
        "psychological",
        "speaker_attitude",
        "conversation_flow",
        "enhanced_understanding",
        "linguistic",
        "session_insights",
    ] {
        let chunks = service_chunks(&events, service);
        assert_eq!(chunks.len(), 1, "{service} should emit exactly one gated-out chunk");
        assert_eq!(chunks[0].errors[0].code, "InsufficientData");
    }
}

/// I1 + scenario "happy path": exactly one `analysis.done`, always last,
/// with a populated `results` map once a long-enough transcript is given.
#[tokio::test]
async fn happy_path_text_only_produces_one_trailing_done_with_results() {
    let runner = mock_runner(MockProvider::new().queue(MockResponse::text(
        r#"{"summary": "plausible", "confidence": 0.6}"#,
    )));
    let request = AnalysisRequest {
        transcript: Some(
            "the witness described the events calmly and consistently across every question asked"
                .to_string(),
        ),
        meta: RequestMeta::default(),
        ..Default::default()
    };
    let events = drain(runner.run(request, CancellationToken::new())).await;

    let done_events: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, AnalysisEvent::Done { .. }))
        .collect();
    assert_eq!(done_events.len(), 1);
    assert!(matches!(events.last(), Some(AnalysisEvent::Done { .. })));

    let AnalysisEvent::Done { payload } = events.last().unwrap() else {
        unreachable!()
    };
    let results = payload.results.as_ref().expect("results present");
    assert!(results.contains_key("quantitative_metrics"));
    assert!(results.contains_key("credibility"));
}

/// I2/I3: per service, at most one terminal chunk, and `chunk_index` is
/// strictly increasing within that service's own emitted sequence.
#[tokio::test]
async fn per_service_terminal_chunk_is_unique_and_indices_are_monotonic() {
    let runner = mock_runner(MockProvider::new());
    let request = AnalysisRequest {
        transcript: Some("short but present".to_string()),
        meta: RequestMeta::default(),
        ..Default::default()
    };
    let events = drain(runner.run(request, CancellationToken::new())).await;

    for service in ["transcription", "audio_quality", "quantitative_metrics"] {
        let chunks = service_chunks(&events, service);
        let terminal_count = chunks.iter().filter(|c| c.is_terminal()).count();
        assert!(terminal_count <= 1, "{service} emitted more than one terminal chunk");
        let indices: Vec<u32> = chunks.iter().filter_map(|c| c.chunk_index).collect();
        for pair in indices.windows(2) {
            assert!(pair[0] < pair[1], "{service} chunk_index did not strictly increase");
        }
    }
}

/// A request cancelled before any work starts still winds down cleanly
/// with exactly one `analysis.done` (no hang, no panic).
#[tokio::test]
async fn pre_cancelled_request_still_completes() {
    let runner = mock_runner(MockProvider::new());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let request = AnalysisRequest {
        transcript: Some("a transcript that would otherwise run the full pipeline end to end".to_string()),
        meta: RequestMeta::default(),
        ..Default::default()
    };
    let events = drain(runner.run(request, cancel)).await;
    assert_eq!(
        events.iter().filter(|e| matches!(e, AnalysisEvent::Done { .. })).count(),
        1
    );
}

/// Scenario 5 (LLM provider down): every LLM call fails, but local-only
/// services still produce results from the transcript supplied directly
/// in the request (no audio, so transcript_final is already set at
/// construction and Transcription itself never needs to run).
#[tokio::test]
async fn llm_provider_down_still_yields_local_results() {
    let runner = mock_runner(MockProvider::new().queue(MockResponse::error("provider unavailable")));
    let request = AnalysisRequest {
        transcript: Some(
            "the transcript was supplied directly so transcription never needed to run at all"
                .to_string(),
        ),
        meta: RequestMeta::default(),
        ..Default::default()
    };
    let events = drain(runner.run(request, CancellationToken::new())).await;
    let AnalysisEvent::Done { payload } = events.last().unwrap() else {
        panic!("expected analysis.done last");
    };
    let results = payload.results.as_ref().expect("results present");
    assert!(results.contains_key("quantitative_metrics"));
}
