use std::collections::HashMap;

use analysis_core::{BaselineProfile, CalibrationQuality};
use analysis_core::scoring::MetricBaseline;
use analysis_scoring::{CredibilityScorer, ScoringInput};
use proptest::prelude::*;

fn baseline_with(mean: f64, std: f64) -> BaselineProfile {
    let mut metrics = HashMap::new();
    metrics.insert(
        "pitch_jitter".to_string(),
        MetricBaseline {
            mean,
            std,
            mad: None,
            min: None,
            max: None,
            sample_count: 30,
        },
    );
    BaselineProfile {
        user_id: None,
        created_at: None,
        metrics,
        calibration_quality: CalibrationQuality::Good,
    }
}

proptest! {
    /// Invariant I4 (spec §3): confidence_interval_low <= score <= high,
    /// and the score stays in [0, 100], for any observed value and any
    /// positive-std baseline.
    #[test]
    fn score_stays_within_bounds(
        observed in -1000.0f64..1000.0,
        mean in -1000.0f64..1000.0,
        std in 0.01f64..100.0,
    ) {
        let input = ScoringInput {
            metrics: HashMap::from([("pitch_jitter".to_string(), observed)]),
            baseline: Some(baseline_with(mean, std)),
            previous_score: None,
        };
        let score = CredibilityScorer::new().score(&input);
        prop_assert!(score.check_invariants());
    }

    /// The scorer is a pure function of its input: calling it twice with
    /// the same `ScoringInput` must yield bit-identical results.
    #[test]
    fn scoring_is_deterministic(
        observed in -1000.0f64..1000.0,
        mean in -1000.0f64..1000.0,
        std in 0.01f64..100.0,
        previous_score in proptest::option::of(0.0f64..100.0),
    ) {
        let input = ScoringInput {
            metrics: HashMap::from([("pitch_jitter".to_string(), observed)]),
            baseline: Some(baseline_with(mean, std)),
            previous_score,
        };
        let scorer = CredibilityScorer::new();
        let a = scorer.score(&input);
        let b = scorer.score(&input);
        prop_assert_eq!(a.credibility_score, b.credibility_score);
        prop_assert_eq!(a.confidence_interval_low, b.confidence_interval_low);
        prop_assert_eq!(a.confidence_interval_high, b.confidence_interval_high);
    }

    /// No baseline entry at all for the observed metric must never panic
    /// and must always fall back to the inconclusive midpoint.
    #[test]
    fn missing_baseline_never_panics(observed in -1000.0f64..1000.0) {
        let input = ScoringInput {
            metrics: HashMap::from([("pitch_jitter".to_string(), observed)]),
            baseline: None,
            previous_score: None,
        };
        let score = CredibilityScorer::new().score(&input);
        prop_assert!(score.check_invariants());
        prop_assert_eq!(score.credibility_score, 50.0);
    }
}
