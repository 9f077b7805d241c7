//! Deterministic computation stages
//!
//! Each stage is an explicitly constructed value holding its tunables. The
//! stages are synchronous and side-effect free.

pub mod alerts;
pub mod analyzer;
pub mod config;
pub mod predictor;
pub mod scorer;

pub use alerts::{template_content, AlertPolicy, HazardEvaluation};
pub use analyzer::StatisticalAnalyzer;
pub use config::{AnalysisConfig, EngineConfig, PredictionConfig, RiskConfig};
pub use predictor::Predictor;
pub use scorer::RiskScorer;

/// Clamp to [0, 1], collapsing NaN to 0.0
pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
