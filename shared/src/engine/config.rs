//! Engine tunables with their deployed defaults

use serde::{Deserialize, Serialize};

use crate::engine::alerts::AlertPolicy;
use crate::models::Field;

/// All engine constants, grouped by stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub analysis: AnalysisConfig,
    pub risk: RiskConfig,
    pub prediction: PredictionConfig,
    pub alerts: AlertPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Fence distance in multiples of the IQR
    pub iqr_multiplier: f64,
    /// Smallest sample count for which quartiles are computed
    pub min_anomaly_samples: usize,
    pub temperature_trend_threshold: Option<f64>,
    pub humidity_trend_threshold: Option<f64>,
    pub pressure_trend_threshold: Option<f64>,
    pub wind_speed_trend_threshold: Option<f64>,
    pub precipitation_trend_threshold: Option<f64>,
}

impl AnalysisConfig {
    /// Slope magnitude above which a trend is significant
    pub fn trend_threshold(&self, field: Field) -> Option<f64> {
        match field {
            Field::Temperature => self.temperature_trend_threshold,
            Field::Humidity => self.humidity_trend_threshold,
            Field::Pressure => self.pressure_trend_threshold,
            Field::WindSpeed => self.wind_speed_trend_threshold,
            Field::Precipitation => self.precipitation_trend_threshold,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            iqr_multiplier: 1.5,
            min_anomaly_samples: 4,
            temperature_trend_threshold: Some(0.5),
            humidity_trend_threshold: None,
            pressure_trend_threshold: None,
            wind_speed_trend_threshold: None,
            precipitation_trend_threshold: Some(1.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RiskConfig {
    /// Samples summed for flood risk (24 hourly samples)
    pub flood_window: usize,
    /// mm over the flood window that saturates the score
    pub flood_precipitation_threshold: f64,
    /// Samples averaged for drought risk (30 days of hourly samples)
    pub drought_window: usize,
    /// Mean mm per sample below which precipitation is in deficit
    pub drought_precipitation_threshold: f64,
    pub drought_temperature_baseline: f64,
    pub drought_temperature_threshold: f64,
    pub storm_wind_window: usize,
    /// km/h
    pub storm_wind_threshold: f64,
    pub storm_pressure_window: usize,
    /// hPa drop across the pressure window that saturates the score
    pub storm_pressure_drop_threshold: f64,
    pub extreme_temperature_window: usize,
    pub heat_threshold: f64,
    pub cold_threshold: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            flood_window: 24,
            flood_precipitation_threshold: 50.0,
            drought_window: 720,
            drought_precipitation_threshold: 5.0,
            drought_temperature_baseline: 25.0,
            drought_temperature_threshold: 35.0,
            storm_wind_window: 6,
            storm_wind_threshold: 60.0,
            storm_pressure_window: 3,
            storm_pressure_drop_threshold: 20.0,
            extreme_temperature_window: 6,
            heat_threshold: 40.0,
            cold_threshold: -20.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PredictionConfig {
    /// Most recent values used per field
    pub lookback: usize,
    pub forecast_horizon_hours: u32,
    pub model_version: String,
    /// Guards the confidence ratio against zero variance
    pub epsilon: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            lookback: 3,
            forecast_horizon_hours: 24,
            model_version: "v1.0".to_string(),
            epsilon: 1e-6,
        }
    }
}
