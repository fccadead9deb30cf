//! # analysis-scoring
//!
//! The pure, side-effect-free credibility fusion engine (spec §4.6,
//! component C6). Takes observed metric values plus an optional baseline
//! and emits a [`CredibilityScore`]; never touches an LLM, never blocks.

mod weights;

use std::collections::HashMap;

use analysis_core::{
    BaselineProfile, CalibrationQuality, ConfidenceLevel, CredibilityCategory, CredibilityScore,
    MetricContribution,
};

const DEFAULT_EMA_ALPHA: f64 = 0.3;

/// Inputs to one credibility fusion pass.
#[derive(Debug, Clone, Default)]
pub struct ScoringInput {
    pub metrics: HashMap<String, f64>,
    pub baseline: Option<BaselineProfile>,
    pub previous_score: Option<f64>,
}

struct ActiveMetric {
    name: String,
    z: f64,
    direction: i8,
    weight: f64,
    contribution: f64,
}

/// Pure, stateless credibility scorer (spec §4.6 algorithm, steps 1-9).
#[derive(Debug, Default, Clone, Copy)]
pub struct CredibilityScorer {
    ema_alpha: f64,
}

impl CredibilityScorer {
    pub fn new() -> Self {
        Self {
            ema_alpha: DEFAULT_EMA_ALPHA,
        }
    }

    pub fn with_ema_alpha(mut self, alpha: f64) -> Self {
        self.ema_alpha = alpha;
        self
    }

    pub fn score(&self, input: &ScoringInput) -> CredibilityScore {
        let active = self.active_metrics(input);
        let total_weight_table: f64 = weights::WEIGHT_TABLE.iter().map(|m| m.weight).sum();

        let weighted_sum: f64 = active.iter().map(|m| m.contribution).sum();
        let total_weight: f64 = active.iter().map(|m| m.weight).sum();

        let mut warnings = Vec::new();

        let score = if total_weight > 0.0 {
            let normalized = weighted_sum / total_weight;
            (50.0 - 25.0 * normalized).clamp(0.0, 100.0)
        } else {
            warnings.push("insufficient metrics".to_string());
            50.0
        };

        let n = active.len();
        let margin = if n >= 3 {
            let zs: Vec<f64> = active.iter().map(|m| m.z).collect();
            let mean = zs.iter().sum::<f64>() / n as f64;
            let variance = zs.iter().map(|z| (z - mean).powi(2)).sum::<f64>() / n as f64;
            let sem = (variance / n as f64).sqrt();
            sem * 1.96 * 25.0
        } else {
            30.0
        };

        let low = (score - margin).clamp(0.0, 100.0);
        let high = (score + margin).clamp(0.0, 100.0);

        let mut inconclusive_reason = None;
        let category = if high - low > 50.0 {
            inconclusive_reason = Some(if active.is_empty() {
                "no metrics had both an observed value and a baseline entry".to_string()
            } else {
                "confidence interval too wide to classify".to_string()
            });
            CredibilityCategory::Inconclusive
        } else if score >= 70.0 {
            CredibilityCategory::HighCredibility
        } else if score >= 40.0 {
            CredibilityCategory::Moderate
        } else if score >= 20.0 {
            CredibilityCategory::LowCredibility
        } else {
            CredibilityCategory::VeryLowCredibility
        };

        let width = high - low;
        let confidence_level = if width < 20.0 {
            ConfidenceLevel::High
        } else if width < 40.0 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        };

        let physiological_load_score = mean_signed_z(&active, weights::is_acoustic)
            .map(|m| (50.0 + m * 20.0).clamp(0.0, 100.0));
        let cognitive_load_indicator = mean_signed_z(&active, weights::is_temporal)
            .map(|m| (50.0 + m * 20.0).clamp(0.0, 100.0));

        let mut ranked: Vec<&ActiveMetric> = active
            .iter()
            .filter(|m| m.direction as f64 * m.z > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.contribution.abs().partial_cmp(&a.contribution.abs()).unwrap());
        let primary_indicators = ranked
            .iter()
            .take(5)
            .map(|m| format!("{}: {:+.2}\u{3c3} (suspicious)", m.name, m.z))
            .collect();

        let metric_breakdown = active
            .iter()
            .map(|m| MetricContribution {
                name: m.name.clone(),
                z_score: Some(m.z),
                direction: m.direction,
                weight: m.weight,
                contribution: m.contribution,
            })
            .collect();

        let baseline_quality = input
            .baseline
            .as_ref()
            .map(|b| b.calibration_quality)
            .unwrap_or(CalibrationQuality::None);

        let metric_coverage = if total_weight_table > 0.0 {
            total_weight / total_weight_table
        } else {
            0.0
        };
        if metric_coverage < 0.3 {
            warnings.push(format!(
                "only {:.0}% of scorable metrics had both an observed value and a baseline",
                metric_coverage * 100.0
            ));
        }

        let (final_score, final_low, final_high) = match input.previous_score {
            Some(prior) => {
                let ema = self.ema_alpha * score + (1.0 - self.ema_alpha) * prior;
                let shift = ema - score;
                (
                    ema.clamp(0.0, 100.0),
                    (low + shift).clamp(0.0, 100.0),
                    (high + shift).clamp(0.0, 100.0),
                )
            }
            None => (score, low, high),
        };

        CredibilityScore {
            credibility_score: final_score,
            confidence_interval_low: final_low.min(final_score),
            confidence_interval_high: final_high.max(final_score),
            credibility_category: category,
            confidence_level,
            primary_indicators,
            metric_breakdown,
            baseline_quality,
            quality_warnings: warnings,
            inconclusive_reason,
            physiological_load_score,
            cognitive_load_indicator,
            metric_coverage,
        }
    }

    fn active_metrics(&self, input: &ScoringInput) -> Vec<ActiveMetric> {
        let Some(baseline) = &input.baseline else {
            return Vec::new();
        };
        let mut active = Vec::new();
        for spec in weights::WEIGHT_TABLE {
            let Some(&value) = input.metrics.get(spec.name) else {
                continue;
            };
            let Some(metric_baseline) = baseline.get(spec.name) else {
                continue;
            };
            if metric_baseline.std <= 0.0 {
                continue;
            }
            let z = (value - metric_baseline.mean) / metric_baseline.std;
            let z = match metric_baseline.mad {
                Some(mad) if mad > 0.0 => {
                    let mad_z = 0.6745 * (value - metric_baseline.mean) / mad;
                    if mad_z.abs() < z.abs() { mad_z } else { z }
                }
                _ => z,
            };
            let contribution = spec.direction as f64 * z * spec.weight;
            active.push(ActiveMetric {
                name: spec.name.to_string(),
                z,
                direction: spec.direction,
                weight: spec.weight,
                contribution,
            });
        }
        active
    }
}

fn mean_signed_z(active: &[ActiveMetric], predicate: impl Fn(&str) -> bool) -> Option<f64> {
    let signed: Vec<f64> = active
        .iter()
        .filter(|m| predicate(&m.name))
        .map(|m| m.direction as f64 * m.z)
        .collect();
    if signed.is_empty() {
        None
    } else {
        Some(signed.iter().sum::<f64>() / signed.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::scoring::MetricBaseline;
    use std::collections::HashMap;

    fn baseline_with(entries: &[(&str, f64, f64, Option<f64>)]) -> BaselineProfile {
        let mut metrics = HashMap::new();
        for (name, mean, std, mad) in entries {
            metrics.insert(
                name.to_string(),
                MetricBaseline {
                    mean: *mean,
                    std: *std,
                    mad: *mad,
                    min: None,
                    max: None,
                    sample_count: 30,
                },
            );
        }
        BaselineProfile {
            user_id: Some("u1".to_string()),
            created_at: None,
            metrics,
            calibration_quality: CalibrationQuality::Good,
        }
    }

    #[test]
    fn no_baseline_falls_back_to_inconclusive_fifty() {
        let input = ScoringInput {
            metrics: HashMap::from([("pitch_jitter".to_string(), 1.1)]),
            baseline: None,
            previous_score: None,
        };
        let score = CredibilityScorer::new().score(&input);
        assert_eq!(score.credibility_score, 50.0);
        assert_eq!(score.credibility_category, CredibilityCategory::Inconclusive);
        assert!(score.confidence_interval_high - score.confidence_interval_low >= 60.0);
        assert!(score.check_invariants());
    }

    #[test]
    fn elevated_jitter_vs_baseline_lowers_score() {
        let baseline = baseline_with(&[("pitch_jitter", 0.5, 0.2, None)]);
        let input = ScoringInput {
            metrics: HashMap::from([("pitch_jitter".to_string(), 1.1)]),
            baseline: Some(baseline),
            previous_score: None,
        };
        let score = CredibilityScorer::new().score(&input);
        assert!(score.credibility_score < 30.0, "got {}", score.credibility_score);
        assert_eq!(score.metric_breakdown.len(), 1);
        assert!((score.metric_breakdown[0].z_score.unwrap() - 3.0).abs() < 1e-9);
        assert!(score.primary_indicators[0].starts_with("pitch_jitter: +3.00"));
        assert!(score.check_invariants());
    }

    #[test]
    fn invariants_hold_across_many_metrics() {
        let baseline = baseline_with(&[
            ("pitch_jitter", 0.5, 0.2, None),
            ("hnr_mean", 20.0, 3.0, None),
            ("speech_rate", 150.0, 20.0, None),
            ("hesitation_rate", 5.0, 2.0, None),
        ]);
        let input = ScoringInput {
            metrics: HashMap::from([
                ("pitch_jitter".to_string(), 0.6),
                ("hnr_mean".to_string(), 18.0),
                ("speech_rate".to_string(), 140.0),
                ("hesitation_rate".to_string(), 7.0),
            ]),
            baseline: Some(baseline),
            previous_score: None,
        };
        let score = CredibilityScorer::new().score(&input);
        assert!(score.check_invariants());
        assert_eq!(score.metric_breakdown.len(), 4);
    }

    #[test]
    fn ema_smooths_toward_prior() {
        let baseline = baseline_with(&[("pitch_jitter", 0.5, 0.2, None)]);
        let input = ScoringInput {
            metrics: HashMap::from([("pitch_jitter".to_string(), 1.1)]),
            baseline: Some(baseline),
            previous_score: Some(80.0),
        };
        let score = CredibilityScorer::new().score(&input);
        // raw score alone would be well below 30; blended with an 80 prior
        // at alpha=0.3 it should land meaningfully higher.
        assert!(score.credibility_score > 30.0);
        assert!(score.check_invariants());
    }

    #[test]
    fn scoring_is_pure_same_input_same_output() {
        let baseline = baseline_with(&[("pitch_jitter", 0.5, 0.2, None)]);
        let input = ScoringInput {
            metrics: HashMap::from([("pitch_jitter".to_string(), 0.9)]),
            baseline: Some(baseline),
            previous_score: None,
        };
        let scorer = CredibilityScorer::new();
        let a = scorer.score(&input);
        let b = scorer.score(&input);
        assert_eq!(a.credibility_score, b.credibility_score);
        assert_eq!(a.confidence_interval_low, b.confidence_interval_low);
    }
}
