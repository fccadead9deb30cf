//! # analysis-config
//!
//! Environment-driven configuration (spec §6), loaded once per process and
//! passed explicitly to the [`analysis-llm`](../analysis_llm/index.html)
//! client and the [`analysis-runner`](../analysis_runner/index.html)
//! Runner rather than read from process-wide globals (spec §9: "replace
//! process-wide globals with an immutable `LLMConfig` constructed once and
//! passed to the client").

use std::time::Duration;

use tracing::warn;

/// Model selection + retry tuning for [`analysis_llm::LlmClient`].
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model_transcribe: String,
    pub model_analysis: String,
    pub model_structured: String,
    pub fallback_models: Vec<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub worker_threads: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model_transcribe: "gemini-2.5-flash".to_string(),
            model_analysis: "gemini-2.5-pro".to_string(),
            model_structured: "gemini-2.5-pro".to_string(),
            fallback_models: vec!["gemini-2.0-flash".to_string()],
            timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_base: Duration::from_millis(500),
            worker_threads: 4,
        }
    }
}

impl LlmConfig {
    /// Load from environment, falling back to defaults for anything unset
    /// or unparsable (an invalid value is logged and ignored, never a hard
    /// failure — the pipeline should degrade, not refuse to start).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("LLM_MODEL_TRANSCRIBE") {
            config.model_transcribe = v;
        }
        if let Ok(v) = std::env::var("LLM_MODEL_ANALYSIS") {
            config.model_analysis = v;
        }
        if let Ok(v) = std::env::var("LLM_MODEL_STRUCTURED") {
            config.model_structured = v;
        }
        if let Ok(v) = std::env::var("LLM_FALLBACK_MODELS") {
            config.fallback_models = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = std::env::var("LLM_TIMEOUT_S") {
            match v.parse::<u64>() {
                Ok(secs) => config.timeout = Duration::from_secs(secs),
                Err(_) => warn!(value = %v, "invalid LLM_TIMEOUT_S, keeping default"),
            }
        }
        if let Ok(v) = std::env::var("LLM_MAX_RETRIES") {
            match v.parse::<u32>() {
                Ok(n) => config.max_retries = n,
                Err(_) => warn!(value = %v, "invalid LLM_MAX_RETRIES, keeping default"),
            }
        }
        if let Ok(v) = std::env::var("LLM_BACKOFF_BASE_S") {
            match v.parse::<f64>() {
                Ok(secs) => config.backoff_base = Duration::from_secs_f64(secs),
                Err(_) => warn!(value = %v, "invalid LLM_BACKOFF_BASE_S, keeping default"),
            }
        }
        if let Ok(v) = std::env::var("LLM_WORKER_THREADS") {
            match v.parse::<usize>() {
                Ok(n) if n > 0 => config.worker_threads = n,
                _ => warn!(value = %v, "invalid LLM_WORKER_THREADS, keeping default"),
            }
        }

        config
    }
}

/// Runner-level tuning: the overall per-request deadline (spec §5, §6).
#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    pub request_deadline: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            request_deadline: None,
        }
    }
}

impl RunnerConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("REQUEST_DEADLINE_S") {
            match v.parse::<u64>() {
                Ok(secs) => config.request_deadline = Some(Duration::from_secs(secs)),
                Err(_) => warn!(value = %v, "invalid REQUEST_DEADLINE_S, keeping default"),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = LlmConfig::default();
        assert!(config.max_retries >= 1);
        assert!(!config.model_analysis.is_empty());
    }

    #[test]
    fn runner_config_defaults_to_no_deadline() {
        assert!(RunnerConfig::default().request_deadline.is_none());
    }
}
