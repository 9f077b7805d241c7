//! Alert orchestration
//!
//! Turns breaching risk scores into alert records. Text comes from the
//! configured formatter; when it fails or returns unusable text the hazard's
//! static template is used, so a breach always yields an alert.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use shared::{
    template_content, AlertCandidate, AlertContent, AlertPolicy, AlertRecord, AlertTextSource,
    HazardEvaluation, RiskScores,
};

use crate::error::AppResult;
use crate::services::publish::{publish_serialized, Publisher, Topic};
use crate::services::store::ReadingStore;

/// Produces human-readable alert text
#[async_trait]
pub trait AlertFormatter: Send + Sync {
    async fn format(&self, candidate: &AlertCandidate) -> AppResult<AlertContent>;
}

/// Formatter that always uses the static templates
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateAlertFormatter;

#[async_trait]
impl AlertFormatter for TemplateAlertFormatter {
    async fn format(&self, candidate: &AlertCandidate) -> AppResult<AlertContent> {
        Ok(template_content(candidate))
    }
}

/// Result of one sweep over a location's scores
#[derive(Debug, Clone, Default)]
pub struct SweepOutcome {
    pub emitted: Vec<AlertRecord>,
    pub below_threshold: usize,
    pub template_fallbacks: usize,
    pub store_failures: usize,
    /// Breaches skipped because the hazard already has an active alert
    pub already_active: usize,
}

pub struct AlertOrchestrator {
    policy: AlertPolicy,
    formatter: Arc<dyn AlertFormatter>,
    store: Arc<dyn ReadingStore>,
    publisher: Arc<dyn Publisher>,
}

impl AlertOrchestrator {
    pub fn new(
        policy: AlertPolicy,
        formatter: Arc<dyn AlertFormatter>,
        store: Arc<dyn ReadingStore>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            policy,
            formatter,
            store,
            publisher,
        }
    }

    /// Evaluate every hazard and emit an alert per breach. Never fails.
    pub async fn sweep(&self, location: &str, scores: &RiskScores) -> SweepOutcome {
        self.run(location, scores, false).await
    }

    /// Like [`sweep`](Self::sweep), but a breach whose hazard already has an
    /// active alert for the location is not raised again
    pub async fn sweep_unalerted(&self, location: &str, scores: &RiskScores) -> SweepOutcome {
        self.run(location, scores, true).await
    }

    async fn run(&self, location: &str, scores: &RiskScores, skip_active: bool) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();

        for evaluation in self.policy.evaluate(location, scores) {
            let candidate = match evaluation {
                HazardEvaluation::BelowThreshold { .. } => {
                    outcome.below_threshold += 1;
                    continue;
                }
                HazardEvaluation::BreachDetected(candidate) => candidate,
            };

            if skip_active && self.is_active(&candidate).await {
                outcome.already_active += 1;
                continue;
            }

            let (content, source) = self.content_for(&candidate).await;
            if source == AlertTextSource::Template {
                outcome.template_fallbacks += 1;
            }

            let record = AlertRecord::new(candidate, content, source, Utc::now());

            if let Err(e) = self.store.write_alert(&record).await {
                outcome.store_failures += 1;
                tracing::error!(
                    location = %record.location,
                    hazard = %record.hazard,
                    error = %e,
                    "Failed to store alert"
                );
            }
            publish_serialized(self.publisher.as_ref(), Topic::Alerts, &record);

            tracing::info!(
                location = %record.location,
                hazard = %record.hazard,
                severity = %record.severity,
                risk = record.risk_value,
                "Alert emitted"
            );
            outcome.emitted.push(record);
        }

        outcome
    }

    /// A failed lookup counts as inactive
    async fn is_active(&self, candidate: &AlertCandidate) -> bool {
        match self
            .store
            .has_active_alert(&candidate.location, candidate.hazard)
            .await
        {
            Ok(active) => active,
            Err(e) => {
                tracing::warn!(
                    location = %candidate.location,
                    hazard = %candidate.hazard,
                    error = %e,
                    "Failed to look up active alerts"
                );
                false
            }
        }
    }

    async fn content_for(&self, candidate: &AlertCandidate) -> (AlertContent, AlertTextSource) {
        match self.formatter.format(candidate).await {
            Ok(content) if content.is_usable() => (content, AlertTextSource::Formatter),
            Ok(_) => {
                tracing::warn!(hazard = %candidate.hazard, "Formatter returned empty text, using template");
                (template_content(candidate), AlertTextSource::Template)
            }
            Err(e) => {
                tracing::warn!(hazard = %candidate.hazard, error = %e, "Formatter failed, using template");
                (template_content(candidate), AlertTextSource::Template)
            }
        }
    }
}
