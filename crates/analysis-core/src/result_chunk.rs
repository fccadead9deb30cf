use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which pass over the input produced a [`ResultChunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Best-effort early result; more chunks (coarse or final) may follow.
    Coarse,
    /// The service's terminal pass. A `final`-phase chunk with
    /// `partial = false` is always the last chunk a service emits.
    Final,
}

/// One error surfaced on a [`ResultChunk`] (spec §3, §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// A single streamed output unit from one [`crate::context::AnalysisContext`]
/// consumer service (spec §3).
///
/// Every `AnalysisService` implementation emits a sequence of these; the
/// Runner multiplexes sequences from concurrently-running services into a
/// single ordered output stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultChunk {
    pub service_name: String,
    pub service_version: String,
    /// Locally computed data (never LLM-derived).
    #[serde(default)]
    pub local: Map<String, Value>,
    /// Structured LLM output fragment, if this service calls an LLM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<Map<String, Value>>,
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
    pub partial: bool,
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
}

impl ResultChunk {
    /// Build a terminal (`phase = final`, `partial = false`) chunk.
    pub fn terminal(service_name: impl Into<String>, service_version: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_version: service_version.into(),
            local: Map::new(),
            llm: None,
            errors: Vec::new(),
            partial: false,
            phase: Phase::Final,
            chunk_index: None,
        }
    }

    /// Build a coarse, partial chunk.
    pub fn coarse(service_name: impl Into<String>, service_version: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_version: service_version.into(),
            local: Map::new(),
            llm: None,
            errors: Vec::new(),
            partial: true,
            phase: Phase::Coarse,
            chunk_index: None,
        }
    }

    /// A terminal chunk whose only content is a single error (spec §4.2 rule 3:
    /// a gated-out service "emit[s] a single final chunk containing an
    /// `errors` entry and otherwise-empty payload").
    pub fn terminal_error(
        service_name: impl Into<String>,
        service_version: impl Into<String>,
        error: ErrorDetail,
    ) -> Self {
        let mut chunk = Self::terminal(service_name, service_version);
        chunk.errors.push(error);
        chunk
    }

    pub fn with_local(mut self, local: Map<String, Value>) -> Self {
        self.local = local;
        self
    }

    pub fn with_llm(mut self, llm: Map<String, Value>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_chunk_index(mut self, index: u32) -> Self {
        self.chunk_index = Some(index);
        self
    }

    pub fn is_terminal(&self) -> bool {
        !self.partial && matches!(self.phase, Phase::Final)
    }
}
