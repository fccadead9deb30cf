use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use analysis_core::{AnalysisContext, ResultChunk};
use analysis_scoring::{CredibilityScorer, ScoringInput};

use crate::service::{AnalysisService, insufficient_data};

const NAME: &str = "credibility";
const VERSION: &str = "1.0.0";

/// spec §4.2.7 / §4.6. Gate: at least one of `enhanced_acoustic_metrics`,
/// `enhanced_linguistic_metrics`, or `quantitative_metrics` must be
/// present. Wraps the pure [`CredibilityScorer`], folding the three
/// metrics maps into the flat name space the scorer's weight table uses.
pub struct CredibilityService {
    scorer: CredibilityScorer,
}

impl CredibilityService {
    pub fn new() -> Self {
        Self {
            scorer: CredibilityScorer::new(),
        }
    }
}

impl Default for CredibilityService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisService for CredibilityService {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn stream_analyze(
        &self,
        ctx: Arc<AnalysisContext>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<ResultChunk> {
        let (tx, rx) = mpsc::channel(1);
        if cancel.is_cancelled() {
            return rx;
        }

        let acoustic = ctx.enhanced_acoustic_metrics();
        let linguistic = ctx.enhanced_linguistic_metrics();
        let quantitative = ctx.quantitative_metrics();

        if acoustic.is_none() && linguistic.is_none() && quantitative.is_empty() {
            let error = insufficient_data(
                NAME,
                VERSION,
                "none of enhanced_acoustic, enhanced_linguistic, or quantitative metrics were available",
            );
            let _ = tx.try_send(error);
            return rx;
        }

        let mut metrics = HashMap::new();
        merge_acoustic(&mut metrics, acoustic.as_ref());
        merge_linguistic(&mut metrics, linguistic.as_ref());
        merge_quantitative(&mut metrics, &quantitative);

        let input = ScoringInput {
            metrics,
            baseline: ctx.baseline_profile(),
            previous_score: ctx.meta().previous_credibility_score,
        };

        let score = self.scorer.score(&input);
        let local: Map<String, Value> =
            serde_json::to_value(&score)
                .ok()
                .and_then(|v| v.as_object().cloned())
                .unwrap_or_default();

        ctx.write_service_result(NAME, local.clone());
        let _ = tx
            .send(ResultChunk::terminal(NAME, VERSION).with_local(local))
            .await;
        rx
    }
}

fn as_f64(map: &Map<String, Value>, key: &str) -> Option<f64> {
    map.get(key).and_then(Value::as_f64)
}

fn merge_acoustic(metrics: &mut HashMap<String, f64>, acoustic: Option<&Map<String, Value>>) {
    let Some(acoustic) = acoustic else { return };
    for key in [
        "pitch_jitter",
        "pitch_shimmer",
        "vocal_tremor",
        "pause_rate",
        "formant_dispersion",
        "hnr_mean",
        "pitch_std",
        "intensity_std",
    ] {
        if let Some(value) = as_f64(acoustic, key) {
            metrics.insert(key.to_string(), value);
        }
    }
}

fn merge_linguistic(metrics: &mut HashMap<String, f64>, linguistic: Option<&Map<String, Value>>) {
    let Some(linguistic) = linguistic else { return };
    let pronoun_ratio = ["first_person_ratio", "second_person_ratio", "third_person_ratio"]
        .iter()
        .filter_map(|k| as_f64(linguistic, k))
        .sum::<f64>();
    metrics.insert("pronoun_ratio".to_string(), pronoun_ratio);
    if let Some(congruence) = as_f64(linguistic, "prosodic_congruence") {
        metrics.insert("prosodic_congruence".to_string(), congruence);
    }
}

fn merge_quantitative(metrics: &mut HashMap<String, f64>, quantitative: &Map<String, Value>) {
    if let Some(wpm) = as_f64(quantitative, "speech_rate_wpm") {
        metrics.insert("speech_rate".to_string(), wpm);
    }
    if let Some(hpm) = as_f64(quantitative, "hesitation_rate_hpm") {
        metrics.insert("hesitation_rate".to_string(), hpm);
    }
    let word_count = as_f64(quantitative, "word_count").unwrap_or(0.0);
    if word_count > 0.0 {
        if let Some(qualifiers) = as_f64(quantitative, "qualifier_count") {
            metrics.insert("qualifier_ratio".to_string(), qualifiers / word_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::RequestMeta;

    #[tokio::test]
    async fn gate_blocks_when_no_metrics_present() {
        let ctx = Arc::new(AnalysisContext::new(
            Some("hello".to_string()),
            None,
            RequestMeta::default(),
        ));
        let service = CredibilityService::new();
        let mut rx = service
            .stream_analyze(ctx, CancellationToken::new())
            .await;
        let chunk = rx.recv().await.unwrap();
        assert_eq!(chunk.errors[0].code, "InsufficientData");
    }

    #[tokio::test]
    async fn scores_when_quantitative_metrics_present() {
        let ctx = Arc::new(AnalysisContext::new(
            Some("hello there friend".to_string()),
            None,
            RequestMeta::default(),
        ));
        ctx.merge_quantitative_metrics(Map::from_iter([
            ("speech_rate_wpm".to_string(), json!(120.0)),
            ("word_count".to_string(), json!(3)),
        ]));
        let service = CredibilityService::new();
        let mut rx = service
            .stream_analyze(ctx.clone(), CancellationToken::new())
            .await;
        let chunk = rx.recv().await.unwrap();
        assert!(chunk.is_terminal());
        assert!(ctx.service_result(NAME).is_some());
    }
}
