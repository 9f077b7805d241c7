//! Measurement and batch models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BatchError;
use crate::types::GpsCoordinates;

/// Numeric measurement fields
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Temperature,
    Humidity,
    Pressure,
    WindSpeed,
    Precipitation,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Temperature,
        Field::Humidity,
        Field::Pressure,
        Field::WindSpeed,
        Field::Precipitation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Temperature => "temperature",
            Field::Humidity => "humidity",
            Field::Pressure => "pressure",
            Field::WindSpeed => "wind_speed",
            Field::Precipitation => "precipitation",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorical weather condition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherType {
    Clear,
    Clouds,
    Rain,
    Drizzle,
    Thunderstorm,
    Snow,
    Mist,
    Fog,
    Haze,
    #[default]
    #[serde(other)]
    Unknown,
}

impl WeatherType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherType::Clear => "clear",
            WeatherType::Clouds => "clouds",
            WeatherType::Rain => "rain",
            WeatherType::Drizzle => "drizzle",
            WeatherType::Thunderstorm => "thunderstorm",
            WeatherType::Snow => "snow",
            WeatherType::Mist => "mist",
            WeatherType::Fog => "fog",
            WeatherType::Haze => "haze",
            WeatherType::Unknown => "unknown",
        }
    }
}

impl From<&str> for WeatherType {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "clear" => WeatherType::Clear,
            "clouds" => WeatherType::Clouds,
            "rain" => WeatherType::Rain,
            "drizzle" => WeatherType::Drizzle,
            "thunderstorm" => WeatherType::Thunderstorm,
            "snow" => WeatherType::Snow,
            "mist" => WeatherType::Mist,
            "fog" => WeatherType::Fog,
            "haze" => WeatherType::Haze,
            _ => WeatherType::Unknown,
        }
    }
}

/// A single observation at one location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Measurement {
    pub location: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<GpsCoordinates>,
    /// Celsius
    pub temperature: Option<f64>,
    /// Percentage
    pub humidity: Option<f64>,
    /// hPa
    pub pressure: Option<f64>,
    /// km/h
    pub wind_speed: Option<f64>,
    /// mm
    pub precipitation: Option<f64>,
    pub weather_type: WeatherType,
}

impl Measurement {
    /// Create a measurement with every numeric field absent
    pub fn new(location: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            location: location.into(),
            timestamp,
            coordinates: None,
            temperature: None,
            humidity: None,
            pressure: None,
            wind_speed: None,
            precipitation: None,
            weather_type: WeatherType::Unknown,
        }
    }

    pub fn value(&self, field: Field) -> Option<f64> {
        match field {
            Field::Temperature => self.temperature,
            Field::Humidity => self.humidity,
            Field::Pressure => self.pressure,
            Field::WindSpeed => self.wind_speed,
            Field::Precipitation => self.precipitation,
        }
    }

    pub fn with_value(mut self, field: Field, value: f64) -> Self {
        let slot = match field {
            Field::Temperature => &mut self.temperature,
            Field::Humidity => &mut self.humidity,
            Field::Pressure => &mut self.pressure,
            Field::WindSpeed => &mut self.wind_speed,
            Field::Precipitation => &mut self.precipitation,
        };
        *slot = Some(value);
        self
    }
}

/// Ordered measurements for one location
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Batch {
    location: String,
    measurements: Vec<Measurement>,
}

impl Batch {
    /// Build a batch, sorting by timestamp ascending.
    ///
    /// Every measurement must carry `location`.
    pub fn new(
        location: impl Into<String>,
        mut measurements: Vec<Measurement>,
    ) -> Result<Self, BatchError> {
        let location = location.into();
        if let Some(stray) = measurements.iter().find(|m| m.location != location) {
            return Err(BatchError::MixedLocations {
                expected: location,
                found: stray.location.clone(),
            });
        }
        measurements.sort_by_key(|m| m.timestamp);
        Ok(Self {
            location,
            measurements,
        })
    }

    pub fn empty(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            measurements: Vec::new(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.measurements.first().map(|m| m.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.measurements.last().map(|m| m.timestamp)
    }

    /// The most recent `n` measurements, or all of them if fewer exist
    pub fn tail(&self, n: usize) -> &[Measurement] {
        let start = self.measurements.len().saturating_sub(n);
        &self.measurements[start..]
    }

    /// Non-null values of a field, oldest first
    pub fn values(&self, field: Field) -> Vec<f64> {
        self.measurements.iter().filter_map(|m| m.value(field)).collect()
    }

    /// Non-null values of a field paired with their batch position
    pub fn indexed_values(&self, field: Field) -> Vec<(usize, f64)> {
        self.measurements
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.value(field).map(|v| (i, v)))
            .collect()
    }
}

/// Non-null values of a field inside a window of measurements
pub fn window_values(window: &[Measurement], field: Field) -> Vec<f64> {
    window.iter().filter_map(|m| m.value(field)).collect()
}
