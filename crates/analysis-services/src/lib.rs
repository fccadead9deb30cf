//! # analysis-services
//!
//! Every concrete `AnalysisService` (spec §4.2) plus the static
//! [`ServiceRegistry`] (spec §4.3) the Runner constructs services from.

mod audio_dsp;
mod audio_quality;
mod credibility;
mod enhanced_acoustic;
mod linguistic_enhancement;
mod llm_driven;
mod quantitative_metrics;
mod registry;
mod service;
mod transcription;

pub use audio_quality::AudioQualityService;
pub use credibility::CredibilityService;
pub use enhanced_acoustic::EnhancedAcousticService;
pub use linguistic_enhancement::LinguisticEnhancementService;
pub use llm_driven::LlmDrivenService;
pub use quantitative_metrics::QuantitativeMetricsService;
pub use registry::ServiceRegistry;
pub use service::{AnalysisService, gated_out, insufficient_data};
pub use transcription::TranscriptionService;
