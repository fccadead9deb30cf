//! # analysis-core
//!
//! Core types, traits, and primitives for the speech credibility analysis
//! pipeline. This crate defines the shared vocabulary used by every other
//! crate in the workspace: the per-request [`AnalysisContext`], the
//! streamed [`ResultChunk`] unit, the consumer-facing event envelope, the
//! credibility scoring types, and the unified error taxonomy.

pub mod context;
pub mod error;
pub mod event;
pub mod request;
pub mod result_chunk;
pub mod scoring;

pub use context::AnalysisContext;
pub use error::{AnalysisError, Result};
pub use event::{AnalysisDonePayload, AnalysisEvent};
pub use request::{AnalysisRequest, RequestMeta};
pub use result_chunk::{ErrorDetail, Phase, ResultChunk};
pub use scoring::{
    BaselineProfile, CalibrationQuality, ConfidenceLevel, CredibilityCategory, CredibilityScore,
    MetricBaseline, MetricContribution,
};
