use analysis_core::{AnalysisContext, Phase};
use serde_json::{Map, Value, json};

/// Privacy-safe digest of `AnalysisContext` included in every LLM prompt
/// (spec §4.4). Raw transcript text is included separately since analysis
/// requires it; everything else here is length/count summaries only.
pub fn context_report(ctx: &AnalysisContext, phase: Phase) -> Value {
    let transcript = ctx.best_transcript();
    let audio_summary = ctx.audio_summary();
    let segments = ctx.speaker_segments();
    let unique_speakers: std::collections::HashSet<&str> =
        segments.iter().map(|s| s.speaker.as_str()).collect();

    let mut report = Map::new();
    report.insert("phase".to_string(), json!(phase));
    report.insert(
        "transcript_present".to_string(),
        json!(!transcript.is_empty()),
    );
    report.insert(
        "transcript_char_len".to_string(),
        json!(transcript.chars().count()),
    );
    report.insert(
        "transcript_word_len".to_string(),
        json!(analysis_core::word_count(&transcript)),
    );
    report.insert("audio_available".to_string(), json!(ctx.has_audio()));
    if !audio_summary.is_empty() {
        report.insert("audio_summary".to_string(), Value::Object(audio_summary));
    }
    report.insert(
        "speaker_segments_present".to_string(),
        json!(!segments.is_empty()),
    );
    report.insert(
        "unique_speaker_count".to_string(),
        json!(unique_speakers.len()),
    );
    match ctx.session_summary() {
        Some(summary) => {
            report.insert("session_summary_present".to_string(), json!(true));
            report.insert("session_summary".to_string(), Value::Object(summary));
        }
        None => {
            report.insert("session_summary_present".to_string(), json!(false));
        }
    }

    Value::Object(report)
}

/// Instruction appended to every prompt when audio is present (spec §4.4:
/// "contractual requirement the schema does not enforce but the prompt
/// must request").
pub fn acoustic_cue_instruction(ctx: &AnalysisContext) -> Option<&'static str> {
    ctx.has_audio().then_some(
        "Audio is available for this turn. Incorporate acoustic cues — tone, \
         pace, hesitations, and any shifts in vocal delivery — into your \
         analysis alongside the text.",
    )
}
