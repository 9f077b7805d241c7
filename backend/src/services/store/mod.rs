//! Reading store collaborator

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{AlertRecord, Batch, Hazard, Measurement, Prediction};

use crate::error::AppResult;

/// Persistence seam for measurements, predictions and alerts
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Connectivity check for the health endpoint
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    /// Distinct locations with a measurement at or after `since`, sorted
    async fn locations(&self, since: DateTime<Utc>) -> AppResult<Vec<String>>;

    async fn write_measurement(&self, measurement: &Measurement) -> AppResult<()>;

    /// The most recent `window` measurements for a location, oldest first
    async fn read_recent(&self, location: &str, window: usize) -> AppResult<Batch>;

    async fn write_prediction(&self, prediction: &Prediction) -> AppResult<()>;

    async fn latest_prediction(&self, location: &str) -> AppResult<Option<Prediction>>;

    async fn write_alert(&self, alert: &AlertRecord) -> AppResult<()>;

    /// Whether an active alert exists for this location and hazard
    async fn has_active_alert(&self, location: &str, hazard: Hazard) -> AppResult<bool>;

    /// Deactivate active alerts that started before `before`. Returns the count.
    /// Bounded stores may drop the expired rows.
    async fn expire_alerts(&self, before: DateTime<Utc>) -> AppResult<u64>;
}
