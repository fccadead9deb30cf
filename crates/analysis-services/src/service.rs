use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use analysis_core::{AnalysisContext, ErrorDetail, ResultChunk};

/// Contract every analysis stage implements (spec §4.2).
///
/// `stream_analyze` returns a receiver rather than a `futures::Stream`
/// object directly — the same shape `LlmClient::json_stream` and
/// `transcribe_stream` use — so the Runner multiplexes every service and
/// every LLM call through one uniform channel-based idiom.
///
/// Implementations must:
/// 1. Emit at least one chunk with `phase = final, partial = false`.
/// 2. Emit nothing further once that terminal chunk has been sent.
/// 3. Honor `cancel` at every await point.
/// 4. Never touch `ctx.service_results` for any name but their own.
/// 5. Call `ctx.write_service_result(self.name(), ...)` before sending
///    their terminal chunk.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    fn name(&self) -> &'static str;

    fn version(&self) -> &'static str {
        "1.0.0"
    }

    async fn stream_analyze(
        &self,
        ctx: Arc<AnalysisContext>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<ResultChunk>;
}

/// Helper for the common "gate didn't open" terminal shape (spec §4.2 rule:
/// "a service must emit a single final chunk containing an `errors` entry
/// and otherwise-empty payload").
pub fn gated_out(name: &'static str, version: &'static str, error: ErrorDetail) -> ResultChunk {
    ResultChunk::terminal_error(name, version, error)
}

pub fn insufficient_data(
    name: &'static str,
    version: &'static str,
    message: impl Into<String>,
) -> ResultChunk {
    gated_out(
        name,
        version,
        ErrorDetail {
            code: "InsufficientData".to_string(),
            message: message.into(),
            details: None,
        },
    )
}
