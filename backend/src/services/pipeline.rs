//! Per-location pipeline stages
//!
//! Each stage owns a cloned [`PipelineContext`] so it can run on its own task.
//! Collaborator failures surface as `Err` for the location; sparse data is a
//! [`LocationOutcome::Skipped`].

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use shared::{
    AnalysisReport, EngineConfig, Predictor, RiskScorer, RiskScores, StatisticalAnalyzer,
};

use crate::config::SchedulerConfig;
use crate::error::{AppError, AppResult};
use crate::external::weather::MeasurementSource;
use crate::services::alerts::{AlertFormatter, AlertOrchestrator};
use crate::services::attestation::AttestationSink;
use crate::services::publish::{publish_serialized, Publisher, Topic};
use crate::services::store::ReadingStore;

/// Stages and collaborators shared by every cadence
#[derive(Clone)]
pub struct PipelineContext {
    pub config: Arc<SchedulerConfig>,
    pub analyzer: Arc<StatisticalAnalyzer>,
    pub scorer: Arc<RiskScorer>,
    pub predictor: Arc<Predictor>,
    pub orchestrator: Arc<AlertOrchestrator>,
    pub store: Arc<dyn ReadingStore>,
    pub publisher: Arc<dyn Publisher>,
    pub source: Option<Arc<dyn MeasurementSource>>,
    pub attestation: Option<Arc<dyn AttestationSink>>,
    /// Where the next capped prediction tick starts in the sorted locations
    pub prediction_cursor: Arc<AtomicUsize>,
}

impl PipelineContext {
    pub fn new(
        scheduler: SchedulerConfig,
        engine: &EngineConfig,
        store: Arc<dyn ReadingStore>,
        publisher: Arc<dyn Publisher>,
        formatter: Arc<dyn AlertFormatter>,
    ) -> Self {
        let scorer = RiskScorer::new(engine.risk.clone());
        let orchestrator =
            AlertOrchestrator::new(engine.alerts, formatter, store.clone(), publisher.clone());

        Self {
            config: Arc::new(scheduler),
            analyzer: Arc::new(StatisticalAnalyzer::new(engine.analysis.clone())),
            predictor: Arc::new(Predictor::new(engine.prediction.clone(), scorer.clone())),
            scorer: Arc::new(scorer),
            orchestrator: Arc::new(orchestrator),
            store,
            publisher,
            source: None,
            attestation: None,
            prediction_cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn MeasurementSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_attestation(mut self, sink: Arc<dyn AttestationSink>) -> Self {
        self.attestation = Some(sink);
        self
    }
}

/// Result of running a stage for one location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationOutcome {
    Completed { alerts: usize },
    Skipped,
}

#[derive(Serialize)]
struct AnalysisSummary<'a> {
    #[serde(flatten)]
    report: &'a AnalysisReport,
    risk_scores: RiskScores,
}

/// Fetch, store, attest and publish the latest readings for a provider query
pub async fn collect(ctx: PipelineContext, query: String) -> AppResult<LocationOutcome> {
    let Some(source) = ctx.source.clone() else {
        return Ok(LocationOutcome::Skipped);
    };

    let timeout = ctx.config.fetch_timeout();
    let batch = tokio::time::timeout(timeout, source.fetch(&query))
        .await
        .map_err(|_| AppError::FetchTimeout {
            location: query.clone(),
            secs: timeout.as_secs(),
        })??;

    for measurement in batch.measurements() {
        ctx.store.write_measurement(measurement).await?;

        if let Some(sink) = &ctx.attestation {
            if let Err(e) = sink.submit(measurement).await {
                tracing::warn!(location = %measurement.location, error = %e, "Attestation failed");
            }
        }

        publish_serialized(ctx.publisher.as_ref(), Topic::WeatherUpdates, measurement);
    }

    tracing::debug!(query = %query, location = %batch.location(), stored = batch.len(), "Collected");
    Ok(LocationOutcome::Completed { alerts: 0 })
}

/// Analyze the recent window, score it and raise alerts
pub async fn analyze(ctx: PipelineContext, location: String) -> AppResult<LocationOutcome> {
    let batch = ctx
        .store
        .read_recent(&location, ctx.config.analysis_window)
        .await?;
    if batch.len() < ctx.config.analysis_min_samples {
        tracing::debug!(location = %location, samples = batch.len(), "Not enough samples to analyze");
        return Ok(LocationOutcome::Skipped);
    }

    let report = ctx.analyzer.analyze(&batch);
    let risk_scores = ctx.scorer.score(&batch);

    publish_serialized(
        ctx.publisher.as_ref(),
        Topic::AnalysisUpdates,
        &AnalysisSummary {
            report: &report,
            risk_scores,
        },
    );

    let outcome = ctx.orchestrator.sweep(&location, &risk_scores).await;
    let (hazard, risk) = risk_scores.dominant();
    tracing::info!(
        location = %location,
        samples = report.sample_count,
        anomalies = report.anomalies.len(),
        high_severity = report.high_severity_anomalies(),
        dominant_hazard = %hazard,
        dominant_risk = risk,
        alerts = outcome.emitted.len(),
        "Analysis complete"
    );

    Ok(LocationOutcome::Completed {
        alerts: outcome.emitted.len(),
    })
}

/// Predict from the recent window and persist the forecast
pub async fn predict(ctx: PipelineContext, location: String) -> AppResult<LocationOutcome> {
    let batch = ctx
        .store
        .read_recent(&location, ctx.config.prediction_window)
        .await?;
    if batch.len() < ctx.config.prediction_min_samples {
        tracing::debug!(location = %location, samples = batch.len(), "Not enough samples to predict");
        return Ok(LocationOutcome::Skipped);
    }

    let prediction = ctx.predictor.predict(&batch);
    ctx.store.write_prediction(&prediction).await?;
    publish_serialized(ctx.publisher.as_ref(), Topic::Predictions, &prediction);

    tracing::info!(
        location = %location,
        fields = prediction.predictions.len(),
        confidence = prediction.confidence,
        "Prediction stored"
    );
    Ok(LocationOutcome::Completed { alerts: 0 })
}

/// Re-evaluate the latest stored prediction for a location. Stale
/// predictions are ignored and hazards with an active alert are not raised again.
pub async fn sweep(ctx: PipelineContext, location: String) -> AppResult<LocationOutcome> {
    let Some(prediction) = ctx.store.latest_prediction(&location).await? else {
        return Ok(LocationOutcome::Skipped);
    };

    let age = Utc::now() - prediction.created_at;
    if age > ctx.config.prediction_max_age() {
        tracing::debug!(
            location = %location,
            age_hours = age.num_hours(),
            "Latest prediction is stale, not re-evaluating"
        );
        return Ok(LocationOutcome::Skipped);
    }

    let outcome = ctx
        .orchestrator
        .sweep_unalerted(&prediction.location, &prediction.risk_scores)
        .await;
    if outcome.already_active > 0 {
        tracing::debug!(location = %location, already_active = outcome.already_active, "Hazards already alerted");
    }
    Ok(LocationOutcome::Completed {
        alerts: outcome.emitted.len(),
    })
}
