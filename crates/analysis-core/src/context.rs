use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::request::RequestMeta;
use crate::scoring::BaselineProfile;

/// One speaker-attributed span of the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerSegment {
    pub speaker: String,
    pub start_s: f64,
    pub end_s: f64,
    pub text: String,
}

/// Per-request mutable state shared across services (spec §3).
///
/// Exclusively owned by the [Runner](../analysis_runner/index.html), passed
/// by reference (an `Arc<AnalysisContext>`) to every service. Each field
/// follows the single-writer-per-field discipline described in spec §5:
/// the Runner is the sole writer of `transcript_final`, `transcript_partial`,
/// `audio_bytes`, `audio_summary`, `speaker_segments`; each service is the
/// sole writer of its own `service_results[name]` entry. Interior
/// mutability is `parking_lot::RwLock` rather than a bare `Mutex` because
/// reads (services consulting `ctx.audio_summary`, `ctx.quantitative_metrics`,
/// etc.) vastly outnumber writes and never block for long.
pub struct AnalysisContext {
    transcript_partial: RwLock<String>,
    transcript_final: RwLock<Option<String>>,
    audio_bytes: RwLock<Option<Arc<Vec<u8>>>>,
    audio_summary: RwLock<Map<String, Value>>,
    quantitative_metrics: RwLock<Map<String, Value>>,
    enhanced_acoustic_metrics: RwLock<Option<Map<String, Value>>>,
    enhanced_linguistic_metrics: RwLock<Option<Map<String, Value>>>,
    baseline_profile: RwLock<Option<BaselineProfile>>,
    service_results: RwLock<HashMap<String, Map<String, Value>>>,
    speaker_segments: RwLock<Vec<SpeakerSegment>>,
    session_summary: RwLock<Option<Map<String, Value>>>,
    config: Map<String, Value>,
    meta: RequestMeta,
}

impl AnalysisContext {
    pub fn new(
        transcript: Option<String>,
        audio_bytes: Option<Vec<u8>>,
        meta: RequestMeta,
    ) -> Self {
        let baseline_profile = meta.baseline_profile.clone();
        let session_summary = meta.session_summary.clone();
        let config = meta.config.clone();
        Self {
            transcript_partial: RwLock::new(transcript.clone().unwrap_or_default()),
            transcript_final: RwLock::new(transcript),
            audio_bytes: RwLock::new(audio_bytes.map(Arc::new)),
            audio_summary: RwLock::new(Map::new()),
            quantitative_metrics: RwLock::new(Map::new()),
            enhanced_acoustic_metrics: RwLock::new(None),
            enhanced_linguistic_metrics: RwLock::new(None),
            baseline_profile: RwLock::new(baseline_profile),
            service_results: RwLock::new(HashMap::new()),
            speaker_segments: RwLock::new(Vec::new()),
            session_summary: RwLock::new(session_summary),
            config,
            meta,
        }
    }

    // ── transcript ──────────────────────────────────────────────

    /// Update the running partial transcript. Per invariant I6 the length
    /// never decreases; a shorter candidate is dropped with a warning
    /// rather than silently overwriting progress.
    pub fn update_transcript_partial(&self, candidate: impl Into<String>) {
        let candidate = candidate.into();
        let mut guard = self.transcript_partial.write();
        if candidate.len() >= guard.len() {
            *guard = candidate;
        } else {
            warn!(
                current_len = guard.len(),
                candidate_len = candidate.len(),
                "dropped shorter transcript_partial candidate"
            );
        }
    }

    pub fn transcript_partial(&self) -> String {
        self.transcript_partial.read().clone()
    }

    /// Set the final transcript. Idempotent-safe: a second call is a no-op
    /// (logged) since `transcript_final`, once set, is immutable (spec §3).
    pub fn set_transcript_final(&self, text: impl Into<String>) {
        let mut guard = self.transcript_final.write();
        if guard.is_some() {
            warn!("transcript_final already set — ignoring second write");
            return;
        }
        let text = text.into();
        drop(guard);
        self.update_transcript_partial(text.clone());
        *self.transcript_final.write() = Some(text);
    }

    pub fn transcript_final(&self) -> Option<String> {
        self.transcript_final.read().clone()
    }

    /// The best transcript currently available: final if set, else partial.
    pub fn best_transcript(&self) -> String {
        self.transcript_final()
            .unwrap_or_else(|| self.transcript_partial())
    }

    // ── audio ───────────────────────────────────────────────────

    pub fn audio_bytes(&self) -> Option<Arc<Vec<u8>>> {
        self.audio_bytes.read().clone()
    }

    pub fn has_audio(&self) -> bool {
        self.audio_bytes.read().is_some()
    }

    pub fn merge_audio_summary(&self, fields: Map<String, Value>) {
        self.audio_summary.write().extend(fields);
    }

    pub fn audio_summary(&self) -> Map<String, Value> {
        self.audio_summary.read().clone()
    }

    // ── metrics ─────────────────────────────────────────────────

    pub fn merge_quantitative_metrics(&self, fields: Map<String, Value>) {
        self.quantitative_metrics.write().extend(fields);
    }

    pub fn quantitative_metrics(&self) -> Map<String, Value> {
        self.quantitative_metrics.read().clone()
    }

    pub fn set_enhanced_acoustic_metrics(&self, fields: Map<String, Value>) {
        *self.enhanced_acoustic_metrics.write() = Some(fields);
    }

    pub fn enhanced_acoustic_metrics(&self) -> Option<Map<String, Value>> {
        self.enhanced_acoustic_metrics.read().clone()
    }

    pub fn set_enhanced_linguistic_metrics(&self, fields: Map<String, Value>) {
        *self.enhanced_linguistic_metrics.write() = Some(fields);
    }

    pub fn enhanced_linguistic_metrics(&self) -> Option<Map<String, Value>> {
        self.enhanced_linguistic_metrics.read().clone()
    }

    // ── baseline / session ──────────────────────────────────────

    pub fn baseline_profile(&self) -> Option<BaselineProfile> {
        self.baseline_profile.read().clone()
    }

    pub fn session_summary(&self) -> Option<Map<String, Value>> {
        self.session_summary.read().clone()
    }

    pub fn speaker_segments(&self) -> Vec<SpeakerSegment> {
        self.speaker_segments.read().clone()
    }

    pub fn set_speaker_segments(&self, segments: Vec<SpeakerSegment>) {
        *self.speaker_segments.write() = segments;
    }

    pub fn config(&self) -> &Map<String, Value> {
        &self.config
    }

    pub fn meta(&self) -> &RequestMeta {
        &self.meta
    }

    // ── service results ─────────────────────────────────────────

    /// Write this service's terminal result. Per the single-writer rule a
    /// service calls this exactly once, with its own name, before emitting
    /// its final chunk (invariant I7).
    pub fn write_service_result(&self, service_name: impl Into<String>, result: Map<String, Value>) {
        let name = service_name.into();
        let mut guard = self.service_results.write();
        if guard.contains_key(&name) {
            warn!(service = %name, "service_results entry already written — overwriting");
        }
        guard.insert(name, result);
    }

    pub fn service_result(&self, service_name: &str) -> Option<Map<String, Value>> {
        self.service_results.read().get(service_name).cloned()
    }

    pub fn service_results_snapshot(&self) -> HashMap<String, Map<String, Value>> {
        self.service_results.read().clone()
    }

    /// Word count of the best currently-available transcript. Used by the
    /// Runner's phase gates (spec §4.5).
    pub fn word_count(&self) -> usize {
        word_count(&self.best_transcript())
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
