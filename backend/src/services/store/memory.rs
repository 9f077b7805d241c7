//! In-process store used when no database is configured

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{AlertRecord, Batch, Hazard, Measurement, Prediction};
use tokio::sync::RwLock;

use super::ReadingStore;
use crate::error::AppResult;

/// Bounded per-location history kept in memory. Alerts are bounded by the
/// same capacity and expired alerts are dropped.
pub struct MemoryStore {
    capacity: usize,
    measurements: RwLock<BTreeMap<String, VecDeque<Measurement>>>,
    predictions: RwLock<HashMap<String, Prediction>>,
    alerts: RwLock<VecDeque<AlertRecord>>,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            measurements: RwLock::new(BTreeMap::new()),
            predictions: RwLock::new(HashMap::new()),
            alerts: RwLock::new(VecDeque::new()),
        }
    }

    /// Snapshot of the retained alerts, oldest first
    pub async fn alerts(&self) -> Vec<AlertRecord> {
        self.alerts.read().await.iter().cloned().collect()
    }

    pub async fn measurement_count(&self, location: &str) -> usize {
        self.measurements
            .read()
            .await
            .get(location)
            .map_or(0, VecDeque::len)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn locations(&self, since: DateTime<Utc>) -> AppResult<Vec<String>> {
        let measurements = self.measurements.read().await;
        Ok(measurements
            .iter()
            .filter(|(_, history)| history.iter().any(|m| m.timestamp >= since))
            .map(|(location, _)| location.clone())
            .collect())
    }

    async fn write_measurement(&self, measurement: &Measurement) -> AppResult<()> {
        let mut measurements = self.measurements.write().await;
        let history = measurements.entry(measurement.location.clone()).or_default();

        // Keep the history ordered so eviction drops the oldest reading
        let position = history.partition_point(|m| m.timestamp <= measurement.timestamp);
        history.insert(position, measurement.clone());
        while history.len() > self.capacity {
            history.pop_front();
        }
        Ok(())
    }

    async fn read_recent(&self, location: &str, window: usize) -> AppResult<Batch> {
        let measurements = self.measurements.read().await;
        let recent = measurements
            .get(location)
            .map(|history| {
                let start = history.len().saturating_sub(window);
                history.iter().skip(start).cloned().collect()
            })
            .unwrap_or_default();
        Ok(Batch::new(location, recent)?)
    }

    async fn write_prediction(&self, prediction: &Prediction) -> AppResult<()> {
        let mut predictions = self.predictions.write().await;
        let newer = predictions
            .get(&prediction.location)
            .map_or(true, |current| prediction.created_at >= current.created_at);
        if newer {
            predictions.insert(prediction.location.clone(), prediction.clone());
        }
        Ok(())
    }

    async fn latest_prediction(&self, location: &str) -> AppResult<Option<Prediction>> {
        Ok(self.predictions.read().await.get(location).cloned())
    }

    async fn write_alert(&self, alert: &AlertRecord) -> AppResult<()> {
        let mut alerts = self.alerts.write().await;
        alerts.push_back(alert.clone());
        while alerts.len() > self.capacity {
            alerts.pop_front();
        }
        Ok(())
    }

    async fn has_active_alert(&self, location: &str, hazard: Hazard) -> AppResult<bool> {
        Ok(self
            .alerts
            .read()
            .await
            .iter()
            .any(|a| a.is_active && a.hazard == hazard && a.location == location))
    }

    async fn expire_alerts(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let mut alerts = self.alerts.write().await;
        let expired = alerts
            .iter()
            .filter(|a| a.is_active && a.start_time < before)
            .count();
        alerts.retain(|a| a.is_active && a.start_time >= before);
        Ok(expired as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use shared::{AlertCandidate, AlertContent, AlertTextSource, Field, Severity};

    fn at(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 4, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    fn reading(location: &str, hour: i64, temperature: f64) -> Measurement {
        Measurement::new(location, at(hour)).with_value(Field::Temperature, temperature)
    }

    #[tokio::test]
    async fn test_read_recent_returns_tail_in_order() {
        let store = MemoryStore::new(100);
        for hour in [3, 1, 2, 0, 4] {
            store.write_measurement(&reading("Miami, US", hour, hour as f64)).await.unwrap();
        }

        let batch = store.read_recent("Miami, US", 3).await.unwrap();
        assert_eq!(batch.values(Field::Temperature), vec![2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let store = MemoryStore::new(2);
        for hour in 0..5 {
            store.write_measurement(&reading("Denver, US", hour, hour as f64)).await.unwrap();
        }

        assert_eq!(store.measurement_count("Denver, US").await, 2);
        let batch = store.read_recent("Denver, US", 10).await.unwrap();
        assert_eq!(batch.values(Field::Temperature), vec![3.0, 4.0]);
    }

    #[tokio::test]
    async fn test_unknown_location_is_empty_batch() {
        let store = MemoryStore::default();
        let batch = store.read_recent("Atlantis", 10).await.unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.location(), "Atlantis");
    }

    #[tokio::test]
    async fn test_locations_since() {
        let store = MemoryStore::default();
        store.write_measurement(&reading("Seattle, US", 0, 10.0)).await.unwrap();
        store.write_measurement(&reading("Houston, US", 10, 30.0)).await.unwrap();

        assert_eq!(store.locations(at(5)).await.unwrap(), vec!["Houston, US".to_string()]);
        assert_eq!(store.locations(at(0)).await.unwrap().len(), 2);
    }

    fn flood_alert(location: &str, start: DateTime<Utc>) -> AlertRecord {
        AlertRecord::new(
            AlertCandidate {
                hazard: Hazard::Flood,
                severity: Severity::High,
                location: location.to_string(),
                risk_value: 0.9,
            },
            AlertContent {
                title: "Flood".to_string(),
                description: "Flood".to_string(),
                instructions: String::new(),
                duration: String::new(),
            },
            AlertTextSource::Template,
            start,
        )
    }

    #[tokio::test]
    async fn test_expired_alerts_are_dropped() {
        let store = MemoryStore::default();
        store.write_alert(&flood_alert("Houston, US", at(0))).await.unwrap();
        store.write_alert(&flood_alert("Houston, US", at(1))).await.unwrap();
        store.write_alert(&flood_alert("Miami, US", at(10))).await.unwrap();

        assert_eq!(store.expire_alerts(at(5)).await.unwrap(), 2);
        let alerts = store.alerts().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].location, "Miami, US");
        assert!(!store.has_active_alert("Houston, US", Hazard::Flood).await.unwrap());
        assert!(store.has_active_alert("Miami, US", Hazard::Flood).await.unwrap());
        assert!(!store.has_active_alert("Miami, US", Hazard::Storm).await.unwrap());
    }

    #[tokio::test]
    async fn test_alert_history_is_capped() {
        let store = MemoryStore::new(3);
        for hour in 0..10 {
            store.write_alert(&flood_alert("Chicago, US", at(hour))).await.unwrap();
        }

        let alerts = store.alerts().await;
        assert_eq!(alerts.len(), 3);
        assert_eq!(alerts[0].start_time, at(7));
    }
}
