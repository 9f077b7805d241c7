//! Scheduler status handler

use axum::{extract::State, Json};

use crate::services::SchedulerStatus;
use crate::AppState;

/// Per-cadence tick counters, last error and last report
pub async fn scheduler_status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.scheduler.read().await.clone())
}
