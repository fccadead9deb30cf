use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-metric baseline statistics for one user (spec §3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetricBaseline {
    pub mean: f64,
    pub std: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mad: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    pub sample_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationQuality {
    None,
    Poor,
    Fair,
    Good,
}

/// A user's personalized baseline profile, one [`MetricBaseline`] per
/// tracked metric name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub metrics: std::collections::HashMap<String, MetricBaseline>,
    pub calibration_quality: CalibrationQuality,
}

impl BaselineProfile {
    pub fn get(&self, metric: &str) -> Option<&MetricBaseline> {
        self.metrics.get(metric)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredibilityCategory {
    HighCredibility,
    Moderate,
    LowCredibility,
    VeryLowCredibility,
    Inconclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

/// One metric's contribution to the fused credibility score (spec §3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricContribution {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_score: Option<f64>,
    pub direction: i8,
    pub weight: f64,
    pub contribution: f64,
}

/// The fused, baseline-normalized credibility judgment (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredibilityScore {
    pub credibility_score: f64,
    pub confidence_interval_low: f64,
    pub confidence_interval_high: f64,
    pub credibility_category: CredibilityCategory,
    pub confidence_level: ConfidenceLevel,
    pub primary_indicators: Vec<String>,
    pub metric_breakdown: Vec<MetricContribution>,
    pub baseline_quality: CalibrationQuality,
    pub quality_warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inconclusive_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physiological_load_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognitive_load_indicator: Option<f64>,
    /// Fraction of the fixed weight table that had both an observed value
    /// and a baseline entry (supplemented from the original Python
    /// implementation's `credibility_scoring_service.py`; feeds
    /// `quality_warnings`).
    pub metric_coverage: f64,
}

impl CredibilityScore {
    /// Invariant I4 / spec §3: `low <= score <= high`.
    pub fn check_invariants(&self) -> bool {
        self.confidence_interval_low <= self.credibility_score
            && self.credibility_score <= self.confidence_interval_high
            && (0.0..=100.0).contains(&self.credibility_score)
    }
}
