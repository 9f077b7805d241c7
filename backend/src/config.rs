//! Configuration management for the WeatherGuard backend
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with WG_ prefix

use std::time::Duration;

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::EngineConfig;

/// Cities polled when no location list is configured
pub const DEFAULT_LOCATIONS: [&str; 8] = [
    "New York,US",
    "Los Angeles,US",
    "Chicago,US",
    "Houston,US",
    "Miami,US",
    "Seattle,US",
    "Denver,US",
    "Atlanta,US",
];

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Weather data provider
    pub weather_api: WeatherApiConfig,

    /// Alert text generation service
    pub alert_text: AlertTextConfig,

    #[serde(default)]
    pub attestation: AttestationConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Analysis, risk, prediction and alert tunables
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL. Without one the in-memory store is used.
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Measurements retained per location by the in-memory store
    pub memory_history: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherApiConfig {
    /// OpenWeatherMap API key. Collection is skipped without one.
    pub api_key: Option<String>,

    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertTextConfig {
    /// Chat-completions API key. Template text is used without one.
    pub api_key: Option<String>,

    pub base_url: String,

    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AttestationConfig {
    pub enabled: bool,

    /// HMAC key; receipts are unsigned without one
    pub signing_key: Option<String>,

    /// Receipts kept by the local journal
    pub journal_capacity: usize,
}

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            signing_key: None,
            journal_capacity: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    pub collection_interval_secs: u64,
    pub analysis_interval_secs: u64,
    pub prediction_interval_secs: u64,
    pub alert_sweep_interval_secs: u64,
    pub sync_interval_secs: u64,

    /// Provider query strings ("City,CC")
    pub locations: Vec<String>,

    pub fetch_timeout_secs: u64,

    /// Wait for in-flight ticks before aborting them
    pub shutdown_timeout_secs: u64,

    pub analysis_window: usize,
    pub analysis_min_samples: usize,
    pub prediction_window: usize,
    pub prediction_min_samples: usize,

    /// Locations predicted per prediction tick
    pub prediction_location_cap: usize,

    /// Locations with data newer than this are considered known
    pub location_lookback_hours: i64,

    /// Active alerts older than this are expired by the sweep
    pub alert_ttl_hours: i64,

    /// Predictions older than this are not re-evaluated by the sweep
    pub prediction_max_age_hours: i64,

    /// Receipts reported per sync tick
    pub sync_batch: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            collection_interval_secs: 5 * 60,
            analysis_interval_secs: 15 * 60,
            prediction_interval_secs: 30 * 60,
            alert_sweep_interval_secs: 60 * 60,
            sync_interval_secs: 6 * 60 * 60,
            locations: DEFAULT_LOCATIONS.iter().map(|l| l.to_string()).collect(),
            fetch_timeout_secs: 10,
            shutdown_timeout_secs: 30,
            analysis_window: 720,
            analysis_min_samples: 11,
            prediction_window: 100,
            prediction_min_samples: 10,
            prediction_location_cap: 5,
            location_lookback_hours: 7 * 24,
            alert_ttl_hours: 24,
            prediction_max_age_hours: 6,
            sync_batch: 50,
        }
    }
}

impl SchedulerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn location_lookback(&self) -> chrono::Duration {
        chrono::Duration::hours(self.location_lookback_hours)
    }

    pub fn alert_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.alert_ttl_hours)
    }

    pub fn prediction_max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(self.prediction_max_age_hours)
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("WG_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 8000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.memory_history", 1000)?
            .set_default("weather_api.base_url", "https://api.openweathermap.org/data/2.5")?
            .set_default("weather_api.timeout_secs", 10)?
            .set_default("alert_text.base_url", "https://api.openai.com/v1")?
            .set_default("alert_text.model", "gpt-3.5-turbo")?
            .set_default("alert_text.timeout_secs", 20)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (WG_ prefix)
            .add_source(
                Environment::with_prefix("WG")
                    .separator("__")
                    .list_separator(";")
                    .with_list_parse_key("scheduler.locations")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "0.0.0.0".to_string(),
        }
    }
}
