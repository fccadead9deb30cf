//! # analysis-cli
//!
//! Thin CLI harness: reads an [`AnalysisRequest`] from a JSON file, drives
//! the [`Runner`], and prints the resulting `analysis.update`/
//! `analysis.done` event stream as JSON Lines to stdout. Stands in for the
//! HTTP/SSE transport that is out of scope for this crate — a real
//! deployment would serialize the same [`AnalysisEvent`] values over SSE
//! or a WebSocket instead of a line per `println!`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use analysis_config::{LlmConfig, RunnerConfig};
use analysis_core::AnalysisRequest;
use analysis_llm::{GeminiProvider, LlmClient, LlmProvider, MockProvider};
use analysis_runner::Runner;

/// Run a single request through the credibility analysis pipeline.
#[derive(Parser)]
#[command(name = "analysis-cli", version, about, long_about = None)]
pub struct Cli {
    /// Path to a JSON file matching `AnalysisRequest` (transcript and/or
    /// base64 audio_bytes, plus optional meta).
    pub input: PathBuf,

    /// Override `RunnerConfig::request_deadline` (seconds). Defaults to
    /// `REQUEST_DEADLINE_S` from the environment, or no deadline.
    #[arg(long)]
    pub deadline_s: Option<u64>,

    /// Log level passed to the `tracing` env-filter.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        init_logging(&self.log_level);

        let body = std::fs::read_to_string(&self.input)
            .with_context(|| format!("reading request file {}", self.input.display()))?;
        let request: AnalysisRequest = serde_json::from_str(&body)
            .with_context(|| format!("parsing {} as AnalysisRequest JSON", self.input.display()))?;

        let llm_config = LlmConfig::from_env();
        let mut runner_config = RunnerConfig::from_env();
        if let Some(secs) = self.deadline_s {
            runner_config.request_deadline = Some(Duration::from_secs(secs));
        }

        let provider = build_provider();
        let llm = Arc::new(LlmClient::new(provider, llm_config));
        let runner = Runner::new(llm, runner_config);

        info!(input = %self.input.display(), "starting analysis run");
        let mut events = runner.run(request, CancellationToken::new());
        while let Some(event) = events.recv().await {
            println!("{}", serde_json::to_string(&event)?);
        }

        Ok(())
    }
}

/// Use a real Gemini adapter when `GEMINI_API_KEY` is set, otherwise fall
/// back to the deterministic mock provider so the CLI is runnable out of
/// the box for demonstration without network access or credentials.
fn build_provider() -> Arc<dyn LlmProvider> {
    match std::env::var("GEMINI_API_KEY") {
        Ok(key) if !key.is_empty() => Arc::new(GeminiProvider::new(key)),
        _ => {
            warn!("GEMINI_API_KEY not set, running against the built-in mock provider");
            Arc::new(MockProvider::new())
        }
    }
}

fn init_logging(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level.to_string()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
