//! Prediction models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Field, RiskScores};
use crate::types::TrendDirection;

/// Forecast for a single field
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FieldForecast {
    pub value: f64,
    pub trend_direction: TrendDirection,
    pub confidence: f64,
}

/// Forecast for one location produced once per prediction cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub id: Uuid,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub forecast_horizon_hours: u32,
    pub predictions: BTreeMap<Field, FieldForecast>,
    pub risk_scores: RiskScores,
    pub confidence: f64,
    pub model_version: String,
}

impl Prediction {
    pub fn forecast(&self, field: Field) -> Option<&FieldForecast> {
        self.predictions.get(&field)
    }
}
