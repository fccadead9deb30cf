use thiserror::Error;

/// Unified error type for the analysis pipeline.
///
/// Errors of this type are used internally (provider adapters, audio
/// decoding, schema validation). They are never thrown across the
/// streaming boundary — a service that hits one of these converts it to
/// an [`crate::ErrorDetail`] on its next [`crate::ResultChunk`] instead
/// (spec §7).
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("audio decode failed: {0}")]
    AudioDecode(String),

    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("llm call timed out after {0:?}")]
    LlmTimeout(std::time::Duration),

    #[error("llm provider error: {0}")]
    LlmProviderError(String),

    #[error("llm output violated schema: {0}")]
    SchemaViolation(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AnalysisError {
    /// Stable machine-readable code, used as [`crate::ErrorDetail::code`].
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::InvalidInput(_) => "InvalidInput",
            AnalysisError::AudioDecode(_) => "AudioDecode",
            AnalysisError::TranscriptionFailed(_) => "TranscriptionFailed",
            AnalysisError::LlmTimeout(_) => "LLMTimeout",
            AnalysisError::LlmProviderError(_) => "LLMProviderError",
            AnalysisError::SchemaViolation(_) => "SchemaViolation",
            AnalysisError::InsufficientData(_) => "InsufficientData",
            AnalysisError::Cancelled => "Cancelled",
            AnalysisError::InternalError(_) => "InternalError",
            AnalysisError::Io(_) => "InternalError",
            AnalysisError::Serialization(_) => "InternalError",
            AnalysisError::Other(_) => "InternalError",
        }
    }

    /// Convert into an [`crate::ErrorDetail`] suitable for attaching to a
    /// [`crate::ResultChunk`].
    pub fn into_detail(self) -> crate::result_chunk::ErrorDetail {
        crate::result_chunk::ErrorDetail {
            code: self.code().to_string(),
            message: self.to_string(),
            details: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
