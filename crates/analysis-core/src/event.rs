use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::result_chunk::ErrorDetail;
use crate::result_chunk::ResultChunk;

/// The consumer-facing envelope (spec §6). A transport (SSE, WebSocket —
/// both out of scope here) serializes these directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum AnalysisEvent {
    #[serde(rename = "analysis.update")]
    Update {
        service: String,
        payload: ResultChunk,
    },
    #[serde(rename = "analysis.done")]
    Done {
        payload: AnalysisDonePayload,
    },
}

/// Payload of the terminal `analysis.done` event.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalysisDonePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<HashMap<String, Map<String, Value>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<AnalysisDoneMeta>,
    /// Set only for a fully-failed request (spec §7: "a fully failed
    /// request ... emits a single `analysis.done` with an `errors` key at
    /// top level and no `results`").
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalysisDoneMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_final: Option<String>,
    #[serde(default)]
    pub speaker_segments: Vec<crate::context::SpeakerSegment>,
    #[serde(default)]
    pub audio_summary: Map<String, Value>,
    #[serde(default)]
    pub quantitative_metrics: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_event_serializes_with_the_literal_wire_tag() {
        let event = AnalysisEvent::Update {
            service: "manipulation".to_string(),
            payload: ResultChunk::terminal("manipulation", "1.0.0"),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "analysis.update");
    }

    #[test]
    fn done_event_serializes_with_the_literal_wire_tag() {
        let event = AnalysisEvent::Done {
            payload: AnalysisDonePayload::default(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "analysis.done");
    }
}
