//! # analysis-prompts
//!
//! Builds the `(prompt_text, json_schema)` pair each LLM-driven
//! `AnalysisService` passes to `LlmClient::json_stream` (spec §4.4).
//!
//! Every prompt embeds the privacy-safe [`context_report`] and, when audio
//! is present, an explicit instruction to weigh acoustic cues — the schema
//! alone cannot enforce that, so the prompt must ask for it directly.

mod context_report;

use analysis_core::{AnalysisContext, Phase};
use serde_json::{Value, json};

pub use context_report::{acoustic_cue_instruction, context_report};

fn preamble(service: &str, ctx: &AnalysisContext, phase: Phase) -> String {
    let report = context_report(ctx, phase);
    let mut preamble = format!(
        "You are the {service} analysis stage of a speech credibility pipeline.\n\
         Context report (summary only, not the transcript):\n{}\n\n\
         Transcript:\n{}\n",
        serde_json::to_string_pretty(&report).unwrap_or_default(),
        ctx.best_transcript(),
    );
    if let Some(instruction) = acoustic_cue_instruction(ctx) {
        preamble.push('\n');
        preamble.push_str(instruction);
        preamble.push('\n');
    }
    preamble
}

/// Manipulation tactic detection.
pub fn build_manipulation_prompt(ctx: &AnalysisContext, phase: Phase) -> (String, Value) {
    let prompt = format!(
        "{}\nIdentify manipulation tactics present in this speech (e.g. gaslighting, \
         minimization, deflection, guilt-tripping, false urgency). For each tactic \
         found, give its name, a 0-1 confidence, and the quoted evidence span.",
        preamble("manipulation", ctx, phase)
    );
    let schema = json!({
        "type": "object",
        "properties": {
            "tactics": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "confidence": { "type": "number" },
                        "evidence": { "type": "string" }
                    },
                    "required": ["name", "confidence", "evidence"]
                }
            },
            "overall_manipulation_score": { "type": "number" },
            "summary": { "type": "string" }
        },
        "required": ["tactics", "overall_manipulation_score", "summary"]
    });
    (prompt, schema)
}

/// Argument structure analysis: claims, evidence, logical fallacies.
pub fn build_argument_prompt(ctx: &AnalysisContext, phase: Phase) -> (String, Value) {
    let prompt = format!(
        "{}\nExtract the argument structure: the main claims, the evidence (if any) \
         offered for each, and any logical fallacies present. Rate overall argument \
         coherence 0-100.",
        preamble("argument", ctx, phase)
    );
    let schema = json!({
        "type": "object",
        "properties": {
            "claims": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "claim": { "type": "string" },
                        "evidence": { "type": "string" },
                        "supported": { "type": "boolean" }
                    },
                    "required": ["claim", "supported"]
                }
            },
            "fallacies": { "type": "array", "items": { "type": "string" } },
            "coherence_score": { "type": "number" }
        },
        "required": ["claims", "fallacies", "coherence_score"]
    });
    (prompt, schema)
}

/// Psychological state indicators (stress, defensiveness, confidence).
pub fn build_psychological_prompt(ctx: &AnalysisContext, phase: Phase) -> (String, Value) {
    let prompt = format!(
        "{}\nAssess psychological state indicators visible in the speech: stress, \
         defensiveness, confidence, evasiveness. Score each 0-100 and cite the \
         linguistic or acoustic basis for each score.",
        preamble("psychological", ctx, phase)
    );
    let schema = json!({
        "type": "object",
        "properties": {
            "stress_score": { "type": "number" },
            "defensiveness_score": { "type": "number" },
            "confidence_score": { "type": "number" },
            "evasiveness_score": { "type": "number" },
            "basis": { "type": "string" }
        },
        "required": ["stress_score", "defensiveness_score", "confidence_score", "evasiveness_score"]
    });
    (prompt, schema)
}

/// Speaker attitude toward the subject matter / interlocutor.
pub fn build_speaker_attitude_prompt(ctx: &AnalysisContext, phase: Phase) -> (String, Value) {
    let prompt = format!(
        "{}\nDescribe the speaker's attitude toward the subject matter and toward \
         any other party referenced. Classify overall tone as cooperative, \
         guarded, hostile, or neutral.",
        preamble("speaker_attitude", ctx, phase)
    );
    let schema = json!({
        "type": "object",
        "properties": {
            "tone": { "type": "string", "enum": ["cooperative", "guarded", "hostile", "neutral"] },
            "attitude_summary": { "type": "string" },
            "notable_shifts": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["tone", "attitude_summary"]
    });
    (prompt, schema)
}

/// Conversation flow: turn-taking, topic changes, interruption patterns.
pub fn build_conversation_flow_prompt(ctx: &AnalysisContext, phase: Phase) -> (String, Value) {
    let prompt = format!(
        "{}\nAnalyze the conversational flow: topic changes, interruptions, \
         turn-taking balance (if multiple speakers are present), and any abrupt \
         subject deflections.",
        preamble("conversation_flow", ctx, phase)
    );
    let schema = json!({
        "type": "object",
        "properties": {
            "topic_changes": { "type": "integer" },
            "deflections": { "type": "array", "items": { "type": "string" } },
            "turn_balance_notes": { "type": "string" }
        },
        "required": ["topic_changes", "deflections"]
    });
    (prompt, schema)
}

/// Enhanced semantic understanding beyond surface-level parsing.
pub fn build_enhanced_understanding_prompt(ctx: &AnalysisContext, phase: Phase) -> (String, Value) {
    let prompt = format!(
        "{}\nProvide a deeper semantic read: implied meaning not stated directly, \
         contradictions between stated and implied intent, and topics the speaker \
         appears to be avoiding.",
        preamble("enhanced_understanding", ctx, phase)
    );
    let schema = json!({
        "type": "object",
        "properties": {
            "implied_meaning": { "type": "string" },
            "contradictions": { "type": "array", "items": { "type": "string" } },
            "avoided_topics": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["implied_meaning", "contradictions", "avoided_topics"]
    });
    (prompt, schema)
}

/// LLM-assisted linguistic read (complements the purely local
/// `LinguisticEnhancement` service — spec §4.2.6 names "Linguistic" as a
/// distinct LLM-driven service from the local §4.2.5 pass).
pub fn build_linguistic_prompt(ctx: &AnalysisContext, phase: Phase) -> (String, Value) {
    let prompt = format!(
        "{}\nCharacterize the speaker's linguistic register (formal/informal), \
         notable word choices, and any language suggesting rehearsed or \
         scripted delivery versus spontaneous speech.",
        preamble("linguistic", ctx, phase)
    );
    let schema = json!({
        "type": "object",
        "properties": {
            "register": { "type": "string" },
            "notable_word_choices": { "type": "array", "items": { "type": "string" } },
            "rehearsed_likelihood": { "type": "number" }
        },
        "required": ["register", "rehearsed_likelihood"]
    });
    (prompt, schema)
}

/// Session-level insight: delta from the prior turn when `session_summary`
/// is present, otherwise a single-turn summary (spec §5 supplement).
pub fn build_session_insights_prompt(ctx: &AnalysisContext, phase: Phase) -> (String, Value) {
    let has_prior = ctx.session_summary().is_some();
    let instruction = if has_prior {
        "The prior turn's summary is included above in the context report under \
         `session_summary`; describe how this turn's credibility-relevant signals \
         changed relative to it."
    } else {
        "No prior-turn context is available; summarize this turn standalone."
    };
    let prompt = format!("{}\n{instruction}", preamble("session_insights", ctx, phase));
    let schema = json!({
        "type": "object",
        "properties": {
            "summary": { "type": "string" },
            "delta_narrative": { "type": ["string", "null"] },
            "trend": { "type": "string", "enum": ["improving", "stable", "deteriorating", "unknown"] }
        },
        "required": ["summary", "trend"]
    });
    (prompt, schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{AnalysisContext, RequestMeta};

    fn ctx_with_transcript(text: &str) -> AnalysisContext {
        AnalysisContext::new(Some(text.to_string()), None, RequestMeta::default())
    }

    #[test]
    fn manipulation_prompt_embeds_transcript_and_schema_shape() {
        let ctx = ctx_with_transcript("I never said that, you're remembering wrong.");
        let (prompt, schema) = build_manipulation_prompt(&ctx, Phase::Coarse);
        assert!(prompt.contains("I never said that"));
        assert_eq!(schema["required"][0], "tactics");
    }

    #[test]
    fn acoustic_instruction_only_present_with_audio() {
        let text_only = ctx_with_transcript("hello there");
        let (prompt, _) = build_argument_prompt(&text_only, Phase::Final);
        assert!(!prompt.contains("Incorporate acoustic cues"));

        let with_audio =
            AnalysisContext::new(Some("hello".to_string()), Some(vec![0u8; 64]), RequestMeta::default());
        let (prompt, _) = build_argument_prompt(&with_audio, Phase::Final);
        assert!(prompt.contains("Incorporate acoustic cues"));
    }

    #[test]
    fn session_insights_prompt_reflects_prior_turn_presence() {
        let no_prior = ctx_with_transcript("hello");
        let (prompt, _) = build_session_insights_prompt(&no_prior, Phase::Final);
        assert!(prompt.contains("standalone"));
    }

    #[test]
    fn session_insights_prompt_embeds_actual_summary_content() {
        use analysis_core::RequestMeta;
        use serde_json::{Map, json};

        let mut summary = Map::new();
        summary.insert("prior_trend".to_string(), json!("declining"));
        let ctx = AnalysisContext::new(
            Some("hello again".to_string()),
            None,
            RequestMeta {
                session_summary: Some(summary),
                ..Default::default()
            },
        );
        let (prompt, _) = build_session_insights_prompt(&ctx, Phase::Final);
        assert!(prompt.contains("prior_trend"));
        assert!(prompt.contains("declining"));
    }
}
