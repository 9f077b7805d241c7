//! Cadence scheduler
//!
//! Every cadence runs on its own task driven by a tokio interval. A tick runs
//! to completion before the next one is awaited, so a cadence never overlaps
//! itself; missed ticks are skipped instead of bursting. Within a tick the
//! per-location stages fan out on a [`JoinSet`] and a failing location only
//! marks itself failed in the [`TickReport`].

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::SchedulerConfig;
use crate::error::AppResult;
use crate::services::pipeline::{self, LocationOutcome, PipelineContext};
use crate::services::publish::{Publisher, Topic};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    Collection,
    Analysis,
    Prediction,
    AlertSweep,
    Sync,
}

impl Cadence {
    pub const ALL: [Cadence; 5] = [
        Cadence::Collection,
        Cadence::Analysis,
        Cadence::Prediction,
        Cadence::AlertSweep,
        Cadence::Sync,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Collection => "collection",
            Cadence::Analysis => "analysis",
            Cadence::Prediction => "prediction",
            Cadence::AlertSweep => "alert_sweep",
            Cadence::Sync => "sync",
        }
    }

    /// Tick period, never shorter than one second
    pub fn interval(&self, config: &SchedulerConfig) -> Duration {
        let secs = match self {
            Cadence::Collection => config.collection_interval_secs,
            Cadence::Analysis => config.analysis_interval_secs,
            Cadence::Prediction => config.prediction_interval_secs,
            Cadence::AlertSweep => config.alert_sweep_interval_secs,
            Cadence::Sync => config.sync_interval_secs,
        };
        Duration::from_secs(secs.max(1))
    }

    /// Run one tick of this cadence. Only fatal errors and cadence-wide
    /// collaborator failures surface as `Err`.
    pub async fn run(self, ctx: &PipelineContext) -> AppResult<TickReport> {
        let mut report = TickReport::begin(self);

        match self {
            Cadence::Collection => {
                if ctx.source.is_none() {
                    warn!("No measurement source configured, skipping collection");
                } else {
                    let targets = ctx.config.locations.clone();
                    fan_out(ctx, targets, pipeline::collect, &mut report).await?;
                }
            }
            Cadence::Analysis => {
                let targets = known_locations(ctx).await?;
                fan_out(ctx, targets, pipeline::analyze, &mut report).await?;
            }
            Cadence::Prediction => {
                let targets = rotating_window(
                    known_locations(ctx).await?,
                    &ctx.prediction_cursor,
                    ctx.config.prediction_location_cap,
                );
                fan_out(ctx, targets, pipeline::predict, &mut report).await?;
            }
            Cadence::AlertSweep => {
                let cutoff = Utc::now() - ctx.config.alert_ttl();
                match ctx.store.expire_alerts(cutoff).await {
                    Ok(expired) => report.expired_alerts = expired,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => warn!(error = %e, "Failed to expire alerts"),
                }

                let targets = known_locations(ctx).await?;
                fan_out(ctx, targets, pipeline::sweep, &mut report).await?;
            }
            Cadence::Sync => sync_attestations(ctx, &mut report).await?,
        }

        report.finished_at = Utc::now();
        Ok(report)
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one tick did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub cadence: Cadence,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Locations the tick fanned out to
    pub targets: usize,
    pub completed: usize,
    pub skipped: usize,
    /// Locations whose stage returned an error, sorted
    pub failed: Vec<String>,
    pub panicked: usize,
    pub alerts: usize,
    pub expired_alerts: u64,
    pub receipts: usize,
}

impl TickReport {
    fn begin(cadence: Cadence) -> Self {
        let now = Utc::now();
        Self {
            cadence,
            started_at: now,
            finished_at: now,
            targets: 0,
            completed: 0,
            skipped: 0,
            failed: Vec::new(),
            panicked: 0,
            alerts: 0,
            expired_alerts: 0,
            receipts: 0,
        }
    }
}

async fn known_locations(ctx: &PipelineContext) -> AppResult<Vec<String>> {
    ctx.store
        .locations(Utc::now() - ctx.config.location_lookback())
        .await
}

/// Take up to `cap` targets starting at the cursor, wrapping around, and
/// advance the cursor so successive ticks cover every target
fn rotating_window(targets: Vec<String>, cursor: &AtomicUsize, cap: usize) -> Vec<String> {
    if targets.len() <= cap {
        return targets;
    }
    let start = cursor.fetch_add(cap, Ordering::Relaxed) % targets.len();
    targets.iter().cycle().skip(start).take(cap).cloned().collect()
}

/// Run `stage` for every target concurrently and tally the outcomes.
/// Returns the first fatal error after every task has finished.
async fn fan_out<F, Fut>(
    ctx: &PipelineContext,
    targets: Vec<String>,
    stage: F,
    report: &mut TickReport,
) -> AppResult<()>
where
    F: Fn(PipelineContext, String) -> Fut,
    Fut: Future<Output = AppResult<LocationOutcome>> + Send + 'static,
{
    report.targets = targets.len();

    let mut tasks = JoinSet::new();
    for target in targets {
        let stage_future = stage(ctx.clone(), target.clone());
        tasks.spawn(async move { (target, stage_future.await) });
    }

    let mut fatal = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(LocationOutcome::Completed { alerts }))) => {
                report.completed += 1;
                report.alerts += alerts;
            }
            Ok((_, Ok(LocationOutcome::Skipped))) => report.skipped += 1,
            Ok((target, Err(e))) => {
                if e.is_fatal() {
                    error!(cadence = %report.cadence, location = %target, error = %e, "Fatal stage error");
                    if fatal.is_none() {
                        fatal = Some(e);
                    }
                } else {
                    warn!(
                        cadence = %report.cadence,
                        location = %target,
                        code = e.code(),
                        error = %e,
                        "Stage failed"
                    );
                }
                report.failed.push(target);
            }
            Err(e) => {
                error!(cadence = %report.cadence, error = %e, "Stage task panicked");
                report.panicked += 1;
            }
        }
    }
    report.failed.sort();

    match fatal {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn sync_attestations(ctx: &PipelineContext, report: &mut TickReport) -> AppResult<()> {
    let Some(sink) = &ctx.attestation else {
        debug!("Attestation disabled, nothing to sync");
        return Ok(());
    };

    let receipts = sink.recent(ctx.config.sync_batch).await?;
    report.receipts = receipts.len();

    info!(receipts = receipts.len(), "Attestation sync");
    ctx.publisher.publish(
        Topic::AttestationEvents,
        json!({ "count": receipts.len(), "receipts": receipts }),
    );
    Ok(())
}

/// Per-cadence counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct CadenceStats {
    pub interval_secs: u64,
    pub ticks: u64,
    pub failures: u64,
    pub last_error: Option<String>,
    pub last_report: Option<TickReport>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStatus {
    pub started_at: Option<DateTime<Utc>>,
    pub stopping: bool,
    pub fatal_error: Option<String>,
    pub cadences: BTreeMap<Cadence, CadenceStats>,
}

impl SchedulerStatus {
    /// Record a finished tick. Returns true when the error is fatal.
    fn record(&mut self, cadence: Cadence, result: AppResult<TickReport>) -> bool {
        let stats = self.cadences.entry(cadence).or_default();
        stats.ticks += 1;

        match result {
            Ok(report) => {
                stats.last_report = Some(report);
                false
            }
            Err(e) => {
                stats.failures += 1;
                stats.last_error = Some(e.to_string());
                let fatal = e.is_fatal();
                if fatal && self.fatal_error.is_none() {
                    self.fatal_error = Some(e.to_string());
                }
                fatal
            }
        }
    }
}

pub type SharedStatus = Arc<RwLock<SchedulerStatus>>;

pub struct Scheduler {
    ctx: PipelineContext,
    cadences: Vec<Cadence>,
}

impl Scheduler {
    pub fn new(ctx: PipelineContext) -> Self {
        Self {
            ctx,
            cadences: Cadence::ALL.to_vec(),
        }
    }

    /// Restrict the scheduler to a subset of cadences
    pub fn with_cadences(mut self, cadences: &[Cadence]) -> Self {
        self.cadences = cadences.to_vec();
        self
    }

    /// Spawn one task per cadence. Must be called inside a tokio runtime.
    pub fn start(self) -> SchedulerHandle {
        let token = CancellationToken::new();

        let mut status = SchedulerStatus {
            started_at: Some(Utc::now()),
            ..SchedulerStatus::default()
        };
        for cadence in &self.cadences {
            status.cadences.insert(
                *cadence,
                CadenceStats {
                    interval_secs: cadence.interval(&self.ctx.config).as_secs(),
                    ..CadenceStats::default()
                },
            );
        }
        let status = Arc::new(RwLock::new(status));

        let mut tasks = JoinSet::new();
        for cadence in &self.cadences {
            tasks.spawn(run_cadence(
                *cadence,
                self.ctx.clone(),
                token.clone(),
                status.clone(),
            ));
        }

        info!(cadences = self.cadences.len(), "Scheduler started");

        SchedulerHandle {
            token,
            status,
            tasks,
            shutdown_timeout: self.ctx.config.shutdown_timeout(),
        }
    }
}

async fn run_cadence(
    cadence: Cadence,
    ctx: PipelineContext,
    token: CancellationToken,
    status: SharedStatus,
) {
    let mut ticker = interval(cadence.interval(&ctx.config));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = cadence
            .run(&ctx)
            .instrument(info_span!("tick", cadence = %cadence))
            .await;

        match &result {
            Ok(report) => debug!(
                cadence = %cadence,
                targets = report.targets,
                completed = report.completed,
                skipped = report.skipped,
                failed = report.failed.len(),
                alerts = report.alerts,
                "Tick finished"
            ),
            Err(e) if e.is_fatal() => {
                error!(cadence = %cadence, error = %e, "Fatal error, stopping scheduler")
            }
            Err(e) => warn!(cadence = %cadence, code = e.code(), error = %e, "Tick failed"),
        }

        let fatal = status.write().await.record(cadence, result);
        if fatal {
            token.cancel();
            break;
        }
    }

    debug!(cadence = %cadence, "Cadence stopped");
}

/// Control handle returned by [`Scheduler::start`]
pub struct SchedulerHandle {
    token: CancellationToken,
    status: SharedStatus,
    tasks: JoinSet<()>,
    shutdown_timeout: Duration,
}

impl SchedulerHandle {
    /// Cancelled on shutdown or after a fatal error
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn shared_status(&self) -> SharedStatus {
        self.status.clone()
    }

    pub async fn status(&self) -> SchedulerStatus {
        self.status.read().await.clone()
    }

    /// Stop every cadence. In-flight ticks get the configured grace period
    /// and are aborted after it. Returns the final status.
    pub async fn shutdown(mut self) -> SchedulerStatus {
        self.token.cancel();
        self.status.write().await.stopping = true;

        let tasks = &mut self.tasks;
        let drained = tokio::time::timeout(self.shutdown_timeout, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    error!(error = %e, "Cadence task ended abnormally");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                timeout_secs = self.shutdown_timeout.as_secs(),
                "Shutdown timed out, aborting in-flight ticks"
            );
            self.tasks.shutdown().await;
        }

        info!("Scheduler stopped");
        self.status.read().await.clone()
    }
}
