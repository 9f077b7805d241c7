//! Short-window trend extrapolation

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::engine::config::PredictionConfig;
use crate::engine::scorer::RiskScorer;
use crate::engine::{clamp01, mean};
use crate::models::{Batch, Field, FieldForecast, Prediction};
use crate::types::TrendDirection;

#[derive(Debug, Clone, Default)]
pub struct Predictor {
    config: PredictionConfig,
    scorer: RiskScorer,
}

impl Predictor {
    pub fn new(config: PredictionConfig, scorer: RiskScorer) -> Self {
        Self { config, scorer }
    }

    pub fn predict(&self, batch: &Batch) -> Prediction {
        self.predict_at(batch, Utc::now())
    }

    /// Build a prediction stamped with `now`.
    ///
    /// Batches shorter than the lookback produce an empty forecast map; risk
    /// scores are always computed on the full batch.
    pub fn predict_at(&self, batch: &Batch, now: DateTime<Utc>) -> Prediction {
        let lookback = self.config.lookback.max(2);
        let mut predictions = BTreeMap::new();

        if batch.len() >= lookback {
            for field in Field::ALL {
                let values = batch.values(field);
                if values.len() < lookback {
                    continue;
                }
                let recent = &values[values.len() - lookback..];
                predictions.insert(field, extrapolate(recent, self.config.epsilon));
            }
        }

        let confidences: Vec<f64> = predictions.values().map(|f| f.confidence).collect();

        Prediction {
            id: Uuid::new_v4(),
            location: batch.location().to_string(),
            created_at: now,
            forecast_horizon_hours: self.config.forecast_horizon_hours,
            predictions,
            risk_scores: self.scorer.score(batch),
            confidence: mean(&confidences).unwrap_or(0.0),
            model_version: self.config.model_version.clone(),
        }
    }
}

/// Project one step past `recent` (oldest first, at least two values)
fn extrapolate(recent: &[f64], epsilon: f64) -> FieldForecast {
    let n = recent.len() as f64;
    let first = recent[0];
    let last = recent[recent.len() - 1];
    let trend = (last - first) / n;

    let avg = recent.iter().sum::<f64>() / n;
    let variance = recent.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / n;
    let confidence = 0.7 + 0.2 * (1.0 - trend.abs() / (variance.sqrt() + epsilon));

    FieldForecast {
        value: last + trend,
        trend_direction: TrendDirection::from_rate(trend),
        confidence: clamp01(confidence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Measurement;
    use chrono::{Duration, TimeZone};

    fn temperatures(values: &[f64]) -> Batch {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let measurements = values
            .iter()
            .enumerate()
            .map(|(i, t)| {
                Measurement::new("Seattle, US", base + Duration::hours(i as i64))
                    .with_value(Field::Temperature, *t)
            })
            .collect();
        Batch::new("Seattle, US", measurements).unwrap()
    }

    #[test]
    fn test_three_point_extrapolation() {
        let prediction = Predictor::default().predict(&temperatures(&[20.0, 22.0, 25.0]));
        let forecast = prediction.forecast(Field::Temperature).unwrap();

        assert!((forecast.value - 26.666_666_666_666_668).abs() < 1e-9);
        assert_eq!(forecast.trend_direction, TrendDirection::Increasing);
        assert!(forecast.confidence > 0.7 && forecast.confidence < 0.75);
        assert_eq!(prediction.predictions.len(), 1);
        assert_eq!(prediction.confidence, forecast.confidence);
    }

    #[test]
    fn test_uses_most_recent_values() {
        let prediction = Predictor::default().predict(&temperatures(&[-5.0, 100.0, 10.0, 10.0, 10.0]));
        let forecast = prediction.forecast(Field::Temperature).unwrap();
        assert_eq!(forecast.value, 10.0);
        assert_eq!(forecast.trend_direction, TrendDirection::Decreasing);
        assert!((forecast.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_short_batch_has_no_forecasts() {
        let prediction = Predictor::default().predict(&temperatures(&[20.0, 22.0]));
        assert!(prediction.predictions.is_empty());
        assert_eq!(prediction.confidence, 0.0);
        assert_eq!(prediction.location, "Seattle, US");
    }

    #[test]
    fn test_metadata_and_risk() {
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let batch = temperatures(&[45.0, 45.0, 45.0]);
        let prediction = Predictor::default().predict_at(&batch, now);

        assert_eq!(prediction.created_at, now);
        assert_eq!(prediction.forecast_horizon_hours, 24);
        assert_eq!(prediction.model_version, "v1.0");
        assert_eq!(prediction.risk_scores, RiskScorer::default().score(&batch));
        assert_eq!(prediction.risk_scores.extreme_temperature, 1.0);
    }

    #[test]
    fn test_confidence_stays_in_unit_range() {
        let prediction = Predictor::default().predict(&temperatures(&[0.0, 0.0, 1000.0]));
        let confidence = prediction.forecast(Field::Temperature).unwrap().confidence;
        assert!((0.0..=1.0).contains(&confidence));
    }
}
