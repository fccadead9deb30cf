use std::sync::Arc;

use analysis_llm::LlmClient;
use analysis_prompts::{
    build_argument_prompt, build_conversation_flow_prompt, build_enhanced_understanding_prompt,
    build_linguistic_prompt, build_manipulation_prompt, build_psychological_prompt,
    build_session_insights_prompt, build_speaker_attitude_prompt,
};

use crate::audio_quality::AudioQualityService;
use crate::credibility::CredibilityService;
use crate::enhanced_acoustic::EnhancedAcousticService;
use crate::linguistic_enhancement::LinguisticEnhancementService;
use crate::llm_driven::LlmDrivenService;
use crate::quantitative_metrics::QuantitativeMetricsService;
use crate::service::AnalysisService;
use crate::transcription::TranscriptionService;

/// Static factory mapping service names to constructed instances (spec
/// §4.3). Registration is fixed per process; there is no dynamic
/// reconfiguration.
pub struct ServiceRegistry {
    llm: Arc<LlmClient>,
}

impl ServiceRegistry {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self { llm }
    }

    pub fn transcription(&self) -> TranscriptionService {
        TranscriptionService::new(Arc::clone(&self.llm))
    }

    pub fn audio_quality(&self) -> AudioQualityService {
        AudioQualityService::new()
    }

    pub fn quantitative_metrics(&self) -> QuantitativeMetricsService {
        QuantitativeMetricsService::new(Arc::clone(&self.llm))
    }

    pub fn enhanced_acoustic(&self) -> EnhancedAcousticService {
        EnhancedAcousticService::new()
    }

    pub fn linguistic_enhancement(&self) -> LinguisticEnhancementService {
        LinguisticEnhancementService::new()
    }

    pub fn credibility(&self) -> CredibilityService {
        CredibilityService::new()
    }

    /// The eight LLM-driven services of spec §4.2.6, each gated on its own
    /// minimum transcript length (chosen within the spec's 10-30 word
    /// band; see DESIGN.md).
    pub fn llm_driven_services(&self) -> Vec<LlmDrivenService> {
        vec![
            LlmDrivenService::new("manipulation", 15, build_manipulation_prompt, Arc::clone(&self.llm)),
            LlmDrivenService::new("argument", 20, build_argument_prompt, Arc::clone(&self.llm)),
            LlmDrivenService::new("psychological", 15, build_psychological_prompt, Arc::clone(&self.llm)),
            LlmDrivenService::new(
                "speaker_attitude",
                10,
                build_speaker_attitude_prompt,
                Arc::clone(&self.llm),
            ),
            LlmDrivenService::new(
                "conversation_flow",
                15,
                build_conversation_flow_prompt,
                Arc::clone(&self.llm),
            ),
            LlmDrivenService::new(
                "enhanced_understanding",
                20,
                build_enhanced_understanding_prompt,
                Arc::clone(&self.llm),
            ),
            LlmDrivenService::new("linguistic", 10, build_linguistic_prompt, Arc::clone(&self.llm)),
            LlmDrivenService::new(
                "session_insights",
                10,
                build_session_insights_prompt,
                Arc::clone(&self.llm),
            ),
        ]
    }

    /// All foundation-phase services as trait objects, for the Runner's
    /// uniform fan-out helpers.
    pub fn foundation_services(&self) -> Vec<Box<dyn AnalysisService>> {
        vec![Box::new(self.transcription()), Box::new(self.audio_quality())]
    }

    pub fn metrics_services(&self) -> Vec<Box<dyn AnalysisService>> {
        vec![
            Box::new(self.quantitative_metrics()),
            Box::new(self.enhanced_acoustic()),
            Box::new(self.linguistic_enhancement()),
        ]
    }

    pub fn llm_analysis_services(&self) -> Vec<Box<dyn AnalysisService>> {
        self.llm_driven_services()
            .into_iter()
            .map(|s| Box::new(s) as Box<dyn AnalysisService>)
            .collect()
    }

    pub fn credibility_service(&self) -> Box<dyn AnalysisService> {
        Box::new(self.credibility())
    }
}
