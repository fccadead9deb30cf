use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use analysis_core::{AnalysisContext, ResultChunk};
use analysis_llm::LlmClient;

use crate::service::AnalysisService;

const NAME: &str = "quantitative_metrics";
const VERSION: &str = "1.0.0";
const MIN_WORDS_FOR_LLM: usize = 20;

static HESITATION_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(um|uh|er|ah)\b").unwrap());
static FILLER_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(like|you know|actually|basically|literally)\b").unwrap());
static QUALIFIERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(maybe|perhaps|possibly|sort of|kind of|i think|i guess|probably)\b").unwrap()
});
static CERTAINTY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(definitely|certainly|absolutely|always|never|without doubt|surely)\b").unwrap()
});
static DISCOURSE_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(however|therefore|moreover|furthermore|meanwhile|nonetheless|nevertheless|anyway|thus|consequently|additionally|otherwise|instead|besides)\b",
    )
    .unwrap()
});
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from_iter([
        "a", "an", "the", "and", "or", "but", "if", "is", "are", "was", "were", "be", "been",
        "being", "to", "of", "in", "on", "at", "for", "with", "about", "as", "by", "this", "that",
        "these", "those", "it", "its", "i", "you", "he", "she", "they", "we", "them", "his", "her",
        "my", "me", "do", "does", "did", "have", "has", "had", "not", "so", "than", "then", "there",
    ])
});

/// spec §4.2.3. Purely local text metrics plus an LLM-derived
/// `interaction_metrics` block via `query_json`, falling back to a
/// deterministic local estimate on LLM failure. Gate: ≥20 words before
/// the LLM piece is attempted; below that, publishes local metrics alone.
pub struct QuantitativeMetricsService {
    llm: Arc<LlmClient>,
}

impl QuantitativeMetricsService {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl AnalysisService for QuantitativeMetricsService {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn stream_analyze(
        &self,
        ctx: Arc<AnalysisContext>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<ResultChunk> {
        let (tx, rx) = mpsc::channel(1);
        let llm = Arc::clone(&self.llm);

        tokio::spawn(async move {
            if cancel.is_cancelled() {
                return;
            }

            let transcript = ctx.best_transcript();
            let duration_s = ctx.meta().duration_s;
            let mut fields = local_metrics(&transcript, duration_s);
            let word_count = fields["word_count"].as_u64().unwrap_or(0) as usize;

            if word_count >= MIN_WORDS_FOR_LLM {
                let prompt = format!(
                    "Given this transcript, estimate interaction metrics as JSON: \
                     sentiment_trend (improving/declining/stable), engagement_level \
                     (0-100), question_count, statement_count.\n\nTranscript:\n{transcript}"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    result = llm.query_json(&prompt, None) => {
                        let interaction = if result.contains_key("error") {
                            warn!(service = NAME, "llm interaction_metrics failed, using local estimate");
                            local_interaction_estimate(&transcript)
                        } else {
                            result
                        };
                        fields.insert("interaction_metrics".to_string(), Value::Object(interaction));
                    }
                }
            }

            ctx.merge_quantitative_metrics(fields.clone());
            ctx.write_service_result(NAME, fields.clone());
            let _ = tx.send(ResultChunk::terminal(NAME, VERSION).with_local(fields)).await;
        });

        rx
    }
}

fn local_interaction_estimate(transcript: &str) -> Map<String, Value> {
    let question_count = transcript.matches('?').count();
    let statement_count = transcript
        .split(|c| c == '.' || c == '!')
        .filter(|s| !s.trim().is_empty())
        .count();
    Map::from_iter([
        ("sentiment_trend".to_string(), json!("stable")),
        ("engagement_level".to_string(), json!(50)),
        ("question_count".to_string(), json!(question_count)),
        ("statement_count".to_string(), json!(statement_count)),
    ])
}

fn local_metrics(transcript: &str, duration_s: Option<f64>) -> Map<String, Value> {
    let words: Vec<String> = transcript
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    let word_count = words.len();
    let unique_word_count = words.iter().collect::<HashSet<_>>().len();

    let sentences: Vec<&str> = transcript
        .split(|c| c == '.' || c == '!' || c == '?')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    let sentence_count = sentences.len();

    let hesitation_marker_count = HESITATION_MARKERS.find_iter(transcript).count();
    let filler_word_count = FILLER_WORDS.find_iter(transcript).count();
    let qualifier_count = QUALIFIERS.find_iter(transcript).count();
    let certainty_indicator_count = CERTAINTY.find_iter(transcript).count();

    let immediate_repetition_count = words.windows(2).filter(|w| w[0] == w[1]).count();
    let discourse_marker_count = DISCOURSE_MARKERS.find_iter(transcript).count();
    let stopword_count = words.iter().filter(|w| STOPWORDS.contains(w.as_str())).count();

    let avg_word_len = if word_count == 0 {
        0.0
    } else {
        words.iter().map(|w| w.len()).sum::<usize>() as f64 / word_count as f64
    };
    let avg_sentence_len = if sentence_count == 0 {
        0.0
    } else {
        word_count as f64 / sentence_count as f64
    };
    let type_token_ratio = if word_count == 0 {
        0.0
    } else {
        unique_word_count as f64 / word_count as f64
    };
    let confidence_ratio = if certainty_indicator_count + qualifier_count == 0 {
        0.5
    } else {
        certainty_indicator_count as f64 / (certainty_indicator_count + qualifier_count) as f64
    };
    let stopword_ratio = if word_count == 0 {
        0.0
    } else {
        stopword_count as f64 / word_count as f64
    };

    let mut fields = Map::new();
    fields.insert("word_count".to_string(), json!(word_count));
    fields.insert("unique_word_count".to_string(), json!(unique_word_count));
    fields.insert("hesitation_marker_count".to_string(), json!(hesitation_marker_count));
    fields.insert("filler_word_count".to_string(), json!(filler_word_count));
    fields.insert("qualifier_count".to_string(), json!(qualifier_count));
    fields.insert("certainty_indicator_count".to_string(), json!(certainty_indicator_count));
    fields.insert("immediate_repetition_count".to_string(), json!(immediate_repetition_count));
    fields.insert("discourse_marker_count".to_string(), json!(discourse_marker_count));
    fields.insert("stopword_ratio".to_string(), json!(stopword_ratio));
    fields.insert("sentence_count".to_string(), json!(sentence_count));
    fields.insert("average_word_length".to_string(), json!(avg_word_len));
    fields.insert("average_sentence_length".to_string(), json!(avg_sentence_len));
    fields.insert("type_token_ratio".to_string(), json!(type_token_ratio));
    fields.insert("confidence_ratio".to_string(), json!(confidence_ratio));

    if let Some(duration_s) = duration_s.filter(|d| *d > 0.0) {
        fields.insert(
            "speech_rate_wpm".to_string(),
            json!(word_count as f64 / (duration_s / 60.0)),
        );
        fields.insert(
            "hesitation_rate_hpm".to_string(),
            json!(hesitation_marker_count as f64 / (duration_s / 60.0)),
        );
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_basic_metrics() {
        let fields = local_metrics(
            "I think maybe we should, um, possibly reconsider this decision later.",
            None,
        );
        assert_eq!(fields["word_count"], json!(12));
        assert_eq!(fields["hesitation_marker_count"], json!(1));
        assert!(fields["qualifier_count"].as_u64().unwrap() >= 2);
    }

    #[test]
    fn counts_discourse_markers_and_stopword_ratio() {
        let fields = local_metrics(
            "However, I went to the store. Therefore I bought the bread.",
            None,
        );
        assert_eq!(fields["discourse_marker_count"], json!(2));
        assert!(fields["stopword_ratio"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn speech_rate_only_present_with_duration() {
        let without = local_metrics("hello there friend", None);
        assert!(!without.contains_key("speech_rate_wpm"));
        let with = local_metrics("hello there friend", Some(2.0));
        assert!(with.contains_key("speech_rate_wpm"));
    }
}
