use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{Map, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use analysis_core::{AnalysisContext, ResultChunk};

use crate::service::AnalysisService;

const NAME: &str = "linguistic_enhancement";
const VERSION: &str = "1.0.0";

static FIRST_PERSON: &[&str] = &["i", "me", "my", "mine", "myself"];
static SECOND_PERSON: &[&str] = &["you", "your", "yours", "yourself"];
static THIRD_PERSON: &[&str] = &[
    "he", "him", "his", "she", "her", "hers", "they", "them", "their", "theirs",
];
static ARTICLES: &[&str] = &["a", "an", "the"];
static DEFINITE_ARTICLES: &[&str] = &["the"];
static SUBORDINATE_CONJUNCTIONS: &[&str] = &[
    "because", "although", "though", "since", "unless", "while", "whereas", "if", "when", "after",
    "before", "until",
];
static HEDGES: &[&str] = &["maybe", "perhaps", "possibly", "sort", "kind", "somewhat", "probably"];
static INTENSIFIERS: &[&str] = &["very", "really", "extremely", "totally", "absolutely"];
static QUALIFIERS: &[&str] = &["i think", "i guess", "i suppose", "i believe", "not sure"];
static POSITIVE_WORDS: &[&str] = &["good", "great", "happy", "glad", "love", "excellent", "pleased"];
static NEGATIVE_WORDS: &[&str] = &["bad", "sad", "angry", "hate", "terrible", "upset", "worried"];

static EMOTIONAL_LEXICON: Lazy<Vec<&'static str>> = Lazy::new(|| {
    HEDGES
        .iter()
        .chain(INTENSIFIERS.iter())
        .chain(QUALIFIERS.iter())
        .copied()
        .collect()
});

/// spec §4.2.5. Pure-text heuristics: pronoun ratios, article usage,
/// sentence complexity, emotional-leakage lexicon hits, and a textual
/// sentiment valence read. Prosodic congruence against an acoustic valence
/// is not computed: nothing in this pipeline classifies emotion from
/// audio, so there is no real signal to compare against.
pub struct LinguisticEnhancementService;

impl LinguisticEnhancementService {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LinguisticEnhancementService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisService for LinguisticEnhancementService {
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

        let transcript = ctx.best_transcript();
        let fields = compute(&transcript, ctx.has_audio());

        ctx.set_enhanced_linguistic_metrics(fields.clone());
        ctx.write_service_result(NAME, fields.clone());
        let _ = tx.try_send(ResultChunk::terminal(NAME, VERSION).with_local(fields));
        rx
    }
}

fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

fn compute(transcript: &str, has_audio: bool) -> Map<String, serde_json::Value> {
    let toks = words(transcript);
    let total = toks.len();
    let lower = transcript.to_lowercase();

    let first_person = toks.iter().filter(|w| FIRST_PERSON.contains(&w.as_str())).count();
    let second_person = toks.iter().filter(|w| SECOND_PERSON.contains(&w.as_str())).count();
    let third_person = toks.iter().filter(|w| THIRD_PERSON.contains(&w.as_str())).count();

    let articles = toks.iter().filter(|w| ARTICLES.contains(&w.as_str())).count();
    let definite_articles = toks.iter().filter(|w| DEFINITE_ARTICLES.contains(&w.as_str())).count();

    let sentences: Vec<&str> = transcript
        .split(|c| c == '.' || c == '!' || c == '?')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    let avg_sentence_len = if sentences.is_empty() {
        0.0
    } else {
        total as f64 / sentences.len() as f64
    };
    let subordinate_count = toks
        .iter()
        .filter(|w| SUBORDINATE_CONJUNCTIONS.contains(&w.as_str()))
        .count();
    let subordinate_ratio = ratio(subordinate_count, sentences.len().max(1));
    let sentence_complexity =
        ((avg_sentence_len / 30.0).clamp(0.0, 1.0) * 0.6 + subordinate_ratio.clamp(0.0, 1.0) * 0.4)
            .clamp(0.0, 1.0);

    let emotional_leakage_count = EMOTIONAL_LEXICON
        .iter()
        .filter(|phrase| lower.contains(*phrase))
        .count();

    let positive_hits = POSITIVE_WORDS.iter().filter(|w| toks.contains(&w.to_string())).count();
    let negative_hits = NEGATIVE_WORDS.iter().filter(|w| toks.contains(&w.to_string())).count();
    let textual_valence = if positive_hits > negative_hits {
        "positive"
    } else if negative_hits > positive_hits {
        "negative"
    } else {
        "neutral"
    };

    let mut fields = Map::new();
    fields.insert("first_person_ratio".to_string(), json!(ratio(first_person, total)));
    fields.insert("second_person_ratio".to_string(), json!(ratio(second_person, total)));
    fields.insert("third_person_ratio".to_string(), json!(ratio(third_person, total)));
    fields.insert("article_ratio".to_string(), json!(ratio(articles, total)));
    fields.insert(
        "definite_article_ratio".to_string(),
        json!(ratio(definite_articles, articles.max(1))),
    );
    fields.insert("sentence_complexity".to_string(), json!(sentence_complexity));
    fields.insert("emotional_leakage_count".to_string(), json!(emotional_leakage_count));
    fields.insert("textual_valence".to_string(), json!(textual_valence));

    // Congruence against an acoustic emotion valence (spec §4.2.5) needs a
    // real affect classifier to compare against; nothing in this pipeline
    // produces one, so the comparison always resolves to the spec's
    // "unknown" case (0.7, no mismatches) whenever audio is present at all.
    if has_audio {
        fields.insert("prosodic_congruence".to_string(), json!(0.7));
        fields.insert("prosodic_mismatches".to_string(), json!(Vec::<String>::new()));
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_first_person_and_hedges() {
        let fields = compute(
            "I think maybe we should, um, possibly reconsider this decision later.",
            false,
        );
        assert!(fields["first_person_ratio"].as_f64().unwrap() > 0.0);
        assert!(fields["emotional_leakage_count"].as_u64().unwrap() >= 3);
    }

    #[test]
    fn textual_valence_reflects_polarity_word_counts() {
        let fields = compute("I am so happy and glad about this.", false);
        assert_eq!(fields["textual_valence"], json!("positive"));

        let fields = compute("I am angry and upset about this.", false);
        assert_eq!(fields["textual_valence"], json!("negative"));
    }

    #[test]
    fn congruence_omitted_without_audio() {
        let fields = compute("hello there", false);
        assert!(!fields.contains_key("prosodic_congruence"));
    }

    #[test]
    fn congruence_present_and_unknown_with_audio() {
        let fields = compute("hello there", true);
        assert_eq!(fields["prosodic_congruence"], json!(0.7));
        assert_eq!(fields["prosodic_mismatches"], json!(Vec::<String>::new()));
    }
}
