/// One entry in the fixed per-metric weight table (spec §4.6).
///
/// Weights are given in the spec as ranges (e.g. "acoustic high:
/// 0.70-0.85"); this table picks the midpoint of each named band — recorded
/// as an open-question decision in DESIGN.md, since the spec leaves the
/// exact value within a band unspecified.
#[derive(Debug, Clone, Copy)]
pub struct MetricWeight {
    pub name: &'static str,
    /// +1 if an increase in this metric raises suspicion, -1 if a decrease does.
    pub direction: i8,
    pub weight: f64,
}

pub const ACOUSTIC_HIGH: f64 = 0.78;
pub const PROSODIC_MID: f64 = 0.60;
pub const LINGUISTIC_MID: f64 = 0.575;

/// Is this metric part of the "acoustic" cluster used for
/// `physiological_load_score` (spec §4.6 step 7)?
pub fn is_acoustic(name: &str) -> bool {
    matches!(
        name,
        "pitch_jitter"
            | "pitch_shimmer"
            | "vocal_tremor"
            | "pause_rate"
            | "formant_dispersion"
            | "hnr_mean"
            | "prosodic_congruence"
    )
}

/// Is this metric part of the "temporal" cluster used for
/// `cognitive_load_indicator` (spec §4.6 step 7: "hesitation, pause,
/// speech_rate metrics")?
pub fn is_temporal(name: &str) -> bool {
    matches!(name, "hesitation_rate" | "pause_rate" | "speech_rate")
}

pub const WEIGHT_TABLE: &[MetricWeight] = &[
    // acoustic high
    MetricWeight { name: "pitch_jitter", direction: 1, weight: ACOUSTIC_HIGH },
    MetricWeight { name: "pitch_shimmer", direction: 1, weight: ACOUSTIC_HIGH },
    MetricWeight { name: "vocal_tremor", direction: 1, weight: ACOUSTIC_HIGH },
    MetricWeight { name: "pause_rate", direction: 1, weight: ACOUSTIC_HIGH },
    MetricWeight { name: "formant_dispersion", direction: 1, weight: ACOUSTIC_HIGH },
    MetricWeight { name: "hnr_mean", direction: -1, weight: ACOUSTIC_HIGH },
    MetricWeight { name: "prosodic_congruence", direction: -1, weight: ACOUSTIC_HIGH },
    // prosodic mid
    MetricWeight { name: "pitch_std", direction: 1, weight: PROSODIC_MID },
    MetricWeight { name: "intensity_std", direction: 1, weight: PROSODIC_MID },
    MetricWeight { name: "speech_rate", direction: -1, weight: PROSODIC_MID },
    MetricWeight { name: "response_latency", direction: 1, weight: PROSODIC_MID },
    MetricWeight { name: "hesitation_rate", direction: 1, weight: PROSODIC_MID },
    // linguistic mid
    MetricWeight { name: "pronoun_ratio", direction: -1, weight: LINGUISTIC_MID },
    MetricWeight { name: "qualifier_ratio", direction: 1, weight: LINGUISTIC_MID },
];

pub fn lookup(name: &str) -> Option<&'static MetricWeight> {
    WEIGHT_TABLE.iter().find(|m| m.name == name)
}
