//! Ingestion-boundary validation for raw observations
//!
//! Fetch adapters decode provider payloads into [`RawObservation`] and pass
//! them through [`validate_observation`] before anything reaches the store.
//! Ranges are physical plausibility limits, not climate norms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ObservationError;
use crate::models::{Measurement, WeatherType};
use crate::types::GpsCoordinates;

/// Observation as decoded from a provider, before validation
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RawObservation {
    #[validate(length(min = 1, max = 255, message = "Location must be 1-255 characters"))]
    pub location: String,
    pub timestamp: DateTime<Utc>,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude out of range"))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude out of range"))]
    pub longitude: Option<f64>,
    #[validate(range(min = -90.0, max = 60.0, message = "Temperature out of range"))]
    pub temperature: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0, message = "Humidity must be 0-100%"))]
    pub humidity: Option<f64>,
    #[validate(range(min = 800.0, max = 1100.0, message = "Pressure out of range"))]
    pub pressure: Option<f64>,
    #[validate(range(min = 0.0, max = 500.0, message = "Wind speed out of range"))]
    pub wind_speed: Option<f64>,
    #[validate(range(min = 0.0, message = "Precipitation cannot be negative"))]
    pub precipitation: Option<f64>,
    pub weather_type: Option<String>,
}

impl RawObservation {
    pub fn new(location: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            location: location.into(),
            timestamp,
            latitude: None,
            longitude: None,
            temperature: None,
            humidity: None,
            pressure: None,
            wind_speed: None,
            precipitation: None,
            weather_type: None,
        }
    }

    fn non_finite_field(&self) -> Option<&'static str> {
        [
            ("latitude", self.latitude),
            ("longitude", self.longitude),
            ("temperature", self.temperature),
            ("humidity", self.humidity),
            ("pressure", self.pressure),
            ("wind_speed", self.wind_speed),
            ("precipitation", self.precipitation),
        ]
        .into_iter()
        .find(|(_, value)| value.map_or(false, |v| !v.is_finite()))
        .map(|(name, _)| name)
    }
}

/// Validate a raw observation and convert it into a [`Measurement`]
pub fn validate_observation(raw: RawObservation) -> Result<Measurement, ObservationError> {
    if let Some(field) = raw.non_finite_field() {
        return Err(ObservationError::NonFinite { field });
    }
    raw.validate()?;

    let coordinates = match (raw.latitude, raw.longitude) {
        (Some(lat), Some(lon)) => Some(GpsCoordinates::new(lat, lon)),
        _ => None,
    };

    Ok(Measurement {
        location: raw.location.trim().to_string(),
        timestamp: raw.timestamp,
        coordinates,
        temperature: raw.temperature,
        humidity: raw.humidity,
        pressure: raw.pressure,
        wind_speed: raw.wind_speed,
        precipitation: raw.precipitation,
        weather_type: raw
            .weather_type
            .as_deref()
            .map(WeatherType::from)
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw() -> RawObservation {
        let ts = Utc.with_ymd_and_hms(2024, 9, 1, 6, 0, 0).unwrap();
        RawObservation {
            latitude: Some(29.76),
            longitude: Some(-95.37),
            temperature: Some(31.2),
            humidity: Some(78.0),
            pressure: Some(1009.0),
            wind_speed: Some(14.4),
            precipitation: Some(0.5),
            weather_type: Some("Rain".to_string()),
            ..RawObservation::new("Houston, US", ts)
        }
    }

    #[test]
    fn test_valid_observation() {
        let measurement = validate_observation(raw()).unwrap();
        assert_eq!(measurement.location, "Houston, US");
        assert_eq!(measurement.weather_type, WeatherType::Rain);
        assert_eq!(measurement.coordinates, Some(GpsCoordinates::new(29.76, -95.37)));
        assert_eq!(measurement.temperature, Some(31.2));
    }

    #[test]
    fn test_missing_fields_are_allowed() {
        let ts = Utc.with_ymd_and_hms(2024, 9, 1, 6, 0, 0).unwrap();
        let measurement = validate_observation(RawObservation::new("Denver, US", ts)).unwrap();
        assert_eq!(measurement.temperature, None);
        assert_eq!(measurement.coordinates, None);
        assert_eq!(measurement.weather_type, WeatherType::Unknown);
    }

    #[test]
    fn test_empty_location_rejected() {
        let mut observation = raw();
        observation.location = String::new();
        assert!(matches!(
            validate_observation(observation),
            Err(ObservationError::Invalid(_))
        ));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let mut humid = raw();
        humid.humidity = Some(101.0);
        assert!(validate_observation(humid).is_err());

        let mut pressure = raw();
        pressure.pressure = Some(500.0);
        assert!(validate_observation(pressure).is_err());

        let mut rain = raw();
        rain.precipitation = Some(-1.0);
        assert!(validate_observation(rain).is_err());

        let mut lat = raw();
        lat.latitude = Some(91.0);
        assert!(validate_observation(lat).is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut observation = raw();
        observation.wind_speed = Some(f64::NAN);
        assert!(matches!(
            validate_observation(observation),
            Err(ObservationError::NonFinite { field: "wind_speed" })
        ));
    }

    #[test]
    fn test_boundary_values_accepted() {
        let mut observation = raw();
        observation.humidity = Some(100.0);
        observation.wind_speed = Some(0.0);
        observation.precipitation = Some(0.0);
        assert!(validate_observation(observation).is_ok());
    }
}
