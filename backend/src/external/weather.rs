//! Weather API client for fetching current conditions
//!
//! Integrates with the OpenWeatherMap current-weather endpoint

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use shared::{validate_observation, Batch, RawObservation};
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Source of fresh measurements for a configured location
#[async_trait]
pub trait MeasurementSource: Send + Sync {
    /// Fetch the latest observations for a provider query such as "Houston,US"
    async fn fetch(&self, location: &str) -> AppResult<Batch>;
}

/// OpenWeatherMap client
#[derive(Clone)]
pub struct OpenWeatherClient {
    client: Client,
    api_key: String,
    base_url: String,
}

/// OpenWeatherMap API response for current weather
#[derive(Debug, Deserialize)]
struct OWMCurrentResponse {
    coord: Option<OWMCoord>,
    #[serde(default)]
    weather: Vec<OWMWeather>,
    main: OWMMain,
    wind: Option<OWMWind>,
    rain: Option<OWMPrecipitation>,
    snow: Option<OWMPrecipitation>,
    dt: i64,
    sys: Option<OWMSys>,
    name: String,
}

#[derive(Debug, Deserialize)]
struct OWMCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OWMWeather {
    main: String,
}

#[derive(Debug, Deserialize)]
struct OWMMain {
    temp: Option<f64>,
    pressure: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OWMWind {
    /// m/s
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OWMPrecipitation {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OWMSys {
    country: Option<String>,
}

impl OpenWeatherClient {
    /// Create a new OpenWeatherClient
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Weather HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn current(&self, location: &str) -> AppResult<OWMCurrentResponse> {
        let url = format!("{}/weather", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("q", location), ("appid", self.api_key.as_str()), ("units", "metric")])
            .send()
            .await
            .map_err(|e| AppError::Fetch {
                location: location.to_string(),
                message: format!("Weather API request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Fetch {
                location: location.to_string(),
                message: format!("Weather API error: {} - {}", status, body),
            });
        }

        response.json().await.map_err(|e| AppError::Fetch {
            location: location.to_string(),
            message: format!("Failed to parse weather response: {}", e),
        })
    }
}

#[async_trait]
impl MeasurementSource for OpenWeatherClient {
    async fn fetch(&self, location: &str) -> AppResult<Batch> {
        let data = self.current(location).await?;
        let measurement = validate_observation(convert_current_response(data, Utc::now()))?;
        Ok(Batch::new(measurement.location.clone(), vec![measurement])?)
    }
}

/// Location key used across the store: "{name}, {country}"
fn location_key(name: &str, country: Option<&str>) -> String {
    match country {
        Some(country) if !country.is_empty() => format!("{}, {}", name, country),
        _ => name.to_string(),
    }
}

/// Convert an OpenWeatherMap response into a raw observation
fn convert_current_response(data: OWMCurrentResponse, fallback: DateTime<Utc>) -> RawObservation {
    let country = data.sys.as_ref().and_then(|s| s.country.as_deref());
    let rain = data.rain.as_ref().and_then(|r| r.one_hour);
    let snow = data.snow.as_ref().and_then(|s| s.one_hour);

    RawObservation {
        location: location_key(&data.name, country),
        timestamp: DateTime::from_timestamp(data.dt, 0).unwrap_or(fallback),
        latitude: data.coord.as_ref().map(|c| c.lat),
        longitude: data.coord.as_ref().map(|c| c.lon),
        temperature: data.main.temp,
        humidity: data.main.humidity,
        pressure: data.main.pressure,
        // m/s to km/h
        wind_speed: data.wind.and_then(|w| w.speed).map(|s| s * 3.6),
        precipitation: Some(rain.unwrap_or(0.0) + snow.unwrap_or(0.0)),
        weather_type: data.weather.first().map(|w| w.main.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::WeatherType;

    const HOUSTON: &str = r#"{
        "coord": {"lon": -95.3633, "lat": 29.7633},
        "weather": [{"id": 501, "main": "Rain", "description": "moderate rain", "icon": "10d"}],
        "main": {"temp": 27.4, "feels_like": 30.1, "pressure": 1008, "humidity": 88},
        "wind": {"speed": 5.0, "deg": 160},
        "rain": {"1h": 3.2},
        "snow": {"1h": 0.3},
        "dt": 1717243200,
        "sys": {"country": "US", "sunrise": 1717240000, "sunset": 1717290000},
        "name": "Houston"
    }"#;

    #[test]
    fn test_convert_current_response() {
        let data: OWMCurrentResponse = serde_json::from_str(HOUSTON).unwrap();
        let raw = convert_current_response(data, Utc::now());

        assert_eq!(raw.location, "Houston, US");
        assert_eq!(raw.timestamp.timestamp(), 1_717_243_200);
        assert_eq!(raw.temperature, Some(27.4));
        assert_eq!(raw.pressure, Some(1008.0));
        assert!((raw.wind_speed.unwrap() - 18.0).abs() < 1e-9);
        assert!((raw.precipitation.unwrap() - 3.5).abs() < 1e-9);

        let measurement = validate_observation(raw).unwrap();
        assert_eq!(measurement.weather_type, WeatherType::Rain);
    }

    #[test]
    fn test_dry_response_has_zero_precipitation() {
        let data: OWMCurrentResponse = serde_json::from_str(
            r#"{"main": {"temp": 12.0}, "dt": 1717243200, "name": "Seattle", "sys": {"country": "US"}}"#,
        )
        .unwrap();
        let raw = convert_current_response(data, Utc::now());

        assert_eq!(raw.precipitation, Some(0.0));
        assert_eq!(raw.wind_speed, None);
        assert_eq!(raw.weather_type, None);
        assert_eq!(raw.latitude, None);
    }

    #[test]
    fn test_location_key_without_country() {
        assert_eq!(location_key("Denver", Some("US")), "Denver, US");
        assert_eq!(location_key("Denver", None), "Denver");
        assert_eq!(location_key("Denver", Some("")), "Denver");
    }
}
