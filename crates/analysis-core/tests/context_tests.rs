use analysis_core::context::AnalysisContext;
use analysis_core::request::RequestMeta;
use serde_json::json;

fn ctx(transcript: Option<&str>) -> AnalysisContext {
    AnalysisContext::new(transcript.map(str::to_string), None, RequestMeta::default())
}

#[test]
fn transcript_partial_never_shrinks() {
    let c = ctx(None);
    c.update_transcript_partial("hello world");
    c.update_transcript_partial("hi");
    assert_eq!(c.transcript_partial(), "hello world");
    c.update_transcript_partial("hello world this is longer");
    assert_eq!(c.transcript_partial(), "hello world this is longer");
}

#[test]
fn transcript_final_is_set_once() {
    let c = ctx(None);
    c.set_transcript_final("final transcript");
    c.set_transcript_final("a different transcript");
    assert_eq!(c.transcript_final().unwrap(), "final transcript");
}

#[test]
fn setting_final_also_advances_partial() {
    let c = ctx(None);
    c.update_transcript_partial("partial so far");
    c.set_transcript_final("partial so far and then some");
    assert_eq!(c.transcript_partial(), "partial so far and then some");
}

#[test]
fn service_results_single_writer_per_entry() {
    let c = ctx(Some("hello there friend"));
    c.write_service_result("quantitative_metrics", serde_json::Map::from_iter([(
        "word_count".to_string(),
        json!(3),
    )]));
    let snapshot = c.service_results_snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(
        snapshot["quantitative_metrics"]["word_count"],
        json!(3)
    );
}

#[test]
fn word_count_prefers_final_transcript() {
    let c = ctx(None);
    c.update_transcript_partial("one two three");
    assert_eq!(c.word_count(), 3);
    c.set_transcript_final("one two three four five");
    assert_eq!(c.word_count(), 5);
}
