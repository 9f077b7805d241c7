//! PostgreSQL reading store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{AlertRecord, Batch, GpsCoordinates, Hazard, Measurement, Prediction, WeatherType};
use sqlx::{types::Json, FromRow, PgPool};

use super::ReadingStore;
use crate::error::AppResult;

/// Store backed by the tables in `migrations/`
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

/// Measurement row
#[derive(Debug, FromRow)]
struct MeasurementRow {
    location: String,
    recorded_at: DateTime<Utc>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    temperature: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
    wind_speed: Option<f64>,
    precipitation: Option<f64>,
    weather_type: String,
}

impl From<MeasurementRow> for Measurement {
    fn from(row: MeasurementRow) -> Self {
        let coordinates = match (row.latitude, row.longitude) {
            (Some(lat), Some(lon)) => Some(GpsCoordinates::new(lat, lon)),
            _ => None,
        };

        Measurement {
            location: row.location,
            timestamp: row.recorded_at,
            coordinates,
            temperature: row.temperature,
            humidity: row.humidity,
            pressure: row.pressure,
            wind_speed: row.wind_speed,
            precipitation: row.precipitation,
            weather_type: WeatherType::from(row.weather_type.as_str()),
        }
    }
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReadingStore for PgStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn locations(&self, since: DateTime<Utc>) -> AppResult<Vec<String>> {
        let locations = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT location FROM measurements
            WHERE recorded_at >= $1
            ORDER BY location
            "#,
        )
        .bind(since)
        .fetch_all(&self.db)
        .await?;

        Ok(locations)
    }

    async fn write_measurement(&self, measurement: &Measurement) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO measurements (
                location, recorded_at, latitude, longitude, temperature, humidity,
                pressure, wind_speed, precipitation, weather_type
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&measurement.location)
        .bind(measurement.timestamp)
        .bind(measurement.coordinates.map(|c| c.latitude))
        .bind(measurement.coordinates.map(|c| c.longitude))
        .bind(measurement.temperature)
        .bind(measurement.humidity)
        .bind(measurement.pressure)
        .bind(measurement.wind_speed)
        .bind(measurement.precipitation)
        .bind(measurement.weather_type.as_str())
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn read_recent(&self, location: &str, window: usize) -> AppResult<Batch> {
        let limit = i64::try_from(window).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, MeasurementRow>(
            r#"
            SELECT location, recorded_at, latitude, longitude, temperature, humidity,
                   pressure, wind_speed, precipitation, weather_type
            FROM measurements
            WHERE location = $1
            ORDER BY recorded_at DESC
            LIMIT $2
            "#,
        )
        .bind(location)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        let measurements = rows.into_iter().map(Measurement::from).collect();
        Ok(Batch::new(location, measurements)?)
    }

    async fn write_prediction(&self, prediction: &Prediction) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO predictions (id, location, created_at, payload)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(prediction.id)
        .bind(&prediction.location)
        .bind(prediction.created_at)
        .bind(Json(prediction))
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn latest_prediction(&self, location: &str) -> AppResult<Option<Prediction>> {
        let payload = sqlx::query_scalar::<_, Json<Prediction>>(
            r#"
            SELECT payload FROM predictions
            WHERE location = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(location)
        .fetch_optional(&self.db)
        .await?;

        Ok(payload.map(|Json(prediction)| prediction))
    }

    async fn write_alert(&self, alert: &AlertRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO alerts (
                id, hazard, severity, location, title, description, instructions,
                duration, risk_value, text_source, start_time, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(alert.id)
        .bind(alert.hazard.as_str())
        .bind(alert.severity.as_str())
        .bind(&alert.location)
        .bind(&alert.title)
        .bind(&alert.description)
        .bind(&alert.instructions)
        .bind(&alert.duration)
        .bind(alert.risk_value)
        .bind(match alert.text_source {
            shared::AlertTextSource::Formatter => "formatter",
            shared::AlertTextSource::Template => "template",
        })
        .bind(alert.start_time)
        .bind(alert.is_active)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn has_active_alert(&self, location: &str, hazard: Hazard) -> AppResult<bool> {
        let active = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM alerts
                WHERE is_active AND location = $1 AND hazard = $2
            )
            "#,
        )
        .bind(location)
        .bind(hazard.as_str())
        .fetch_one(&self.db)
        .await?;

        Ok(active)
    }

    async fn expire_alerts(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE alerts SET is_active = FALSE
            WHERE is_active AND start_time < $1
            "#,
        )
        .bind(before)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }
}
