//! Hazard risk scoring over the most recent samples of a batch

use crate::engine::config::RiskConfig;
use crate::engine::{clamp01, mean};
use crate::models::{window_values, Batch, Field, RiskScores};

/// Fuses recent readings into four independent hazard scores in [0, 1]
#[derive(Debug, Clone, Default)]
pub struct RiskScorer {
    config: RiskConfig,
}

impl RiskScorer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, batch: &Batch) -> RiskScores {
        RiskScores {
            flood: self.flood(batch),
            drought: self.drought(batch),
            storm: self.storm(batch),
            extreme_temperature: self.extreme_temperature(batch),
        }
    }

    /// Accumulated precipitation over the flood window
    pub fn flood(&self, batch: &Batch) -> f64 {
        let precipitation = window_values(batch.tail(self.config.flood_window), Field::Precipitation);
        if precipitation.is_empty() {
            return 0.0;
        }
        let total: f64 = precipitation.iter().sum();
        clamp01(total / self.config.flood_precipitation_threshold)
    }

    /// Mean of precipitation deficit and temperature excess
    pub fn drought(&self, batch: &Batch) -> f64 {
        let window = batch.tail(self.config.drought_window);
        let (Some(precipitation), Some(temperature)) = (
            mean(&window_values(window, Field::Precipitation)),
            mean(&window_values(window, Field::Temperature)),
        ) else {
            return 0.0;
        };

        let deficit = 1.0 - clamp01(precipitation / self.config.drought_precipitation_threshold);
        let span = self.config.drought_temperature_threshold - self.config.drought_temperature_baseline;
        let excess = clamp01((temperature - self.config.drought_temperature_baseline) / span);

        clamp01((deficit + excess) / 2.0)
    }

    /// Worse of peak wind and recent pressure drop
    pub fn storm(&self, batch: &Batch) -> f64 {
        let wind = window_values(batch.tail(self.config.storm_wind_window), Field::WindSpeed);
        let pressure = window_values(batch.tail(self.config.storm_pressure_window), Field::Pressure);
        if wind.is_empty() || pressure.is_empty() {
            return 0.0;
        }

        let peak = wind.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let wind_score = clamp01(peak / self.config.storm_wind_threshold);

        let pressure_score = match (pressure.first(), pressure.last()) {
            (Some(first), Some(last)) if pressure.len() >= 2 => {
                clamp01((first - last).max(0.0) / self.config.storm_pressure_drop_threshold)
            }
            _ => 0.0,
        };

        clamp01(wind_score.max(pressure_score))
    }

    /// Larger of the hot and cold sample fractions
    pub fn extreme_temperature(&self, batch: &Batch) -> f64 {
        let temperature = window_values(
            batch.tail(self.config.extreme_temperature_window),
            Field::Temperature,
        );
        if temperature.is_empty() {
            return 0.0;
        }
        let n = temperature.len() as f64;
        let hot = temperature.iter().filter(|t| **t > self.config.heat_threshold).count() as f64;
        let cold = temperature.iter().filter(|t| **t < self.config.cold_threshold).count() as f64;

        clamp01((hot / n).max(cold / n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Measurement;
    use chrono::{Duration, TimeZone, Utc};

    fn batch(location: &str, samples: Vec<Vec<(Field, f64)>>) -> Batch {
        let base = Utc.with_ymd_and_hms(2024, 8, 25, 0, 0, 0).unwrap();
        let measurements = samples
            .into_iter()
            .enumerate()
            .map(|(i, values)| {
                values.into_iter().fold(
                    Measurement::new(location, base + Duration::hours(i as i64)),
                    |m, (field, v)| m.with_value(field, v),
                )
            })
            .collect();
        Batch::new(location, measurements).unwrap()
    }

    #[test]
    fn test_houston_flood_saturates() {
        let samples = (0..24).map(|_| vec![(Field::Precipitation, 3.0)]).collect();
        let scores = RiskScorer::default().score(&batch("Houston, US", samples));
        assert_eq!(scores.flood, 1.0);
        assert_eq!(scores.storm, 0.0);
        assert_eq!(scores.extreme_temperature, 0.0);
    }

    #[test]
    fn test_flood_uses_most_recent_window() {
        // 30 samples: heavy rain in the oldest six, dry for the last 24
        let samples = (0..30)
            .map(|i| vec![(Field::Precipitation, if i < 6 { 40.0 } else { 0.0 })])
            .collect();
        let scores = RiskScorer::default().score(&batch("Houston, US", samples));
        assert_eq!(scores.flood, 0.0);
    }

    #[test]
    fn test_drought_components() {
        let samples = (0..10)
            .map(|_| vec![(Field::Precipitation, 0.0), (Field::Temperature, 30.0)])
            .collect();
        let drought = RiskScorer::default().drought(&batch("Denver, US", samples));
        // deficit 1.0, excess 0.5
        assert!((drought - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_drought_requires_temperature() {
        let samples = (0..10).map(|_| vec![(Field::Precipitation, 0.0)]).collect();
        assert_eq!(RiskScorer::default().drought(&batch("Denver, US", samples)), 0.0);
    }

    #[test]
    fn test_storm_pressure_drop() {
        let samples = vec![
            vec![(Field::WindSpeed, 6.0), (Field::Pressure, 1010.0)],
            vec![(Field::WindSpeed, 6.0), (Field::Pressure, 1000.0)],
            vec![(Field::WindSpeed, 6.0), (Field::Pressure, 995.0)],
        ];
        let storm = RiskScorer::default().storm(&batch("Miami, US", samples));
        // drop 15 hPa / 20 = 0.75 beats wind 0.1
        assert!((storm - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_storm_pressure_rise_is_not_risk() {
        let samples = vec![
            vec![(Field::WindSpeed, 30.0), (Field::Pressure, 990.0)],
            vec![(Field::WindSpeed, 30.0), (Field::Pressure, 1010.0)],
        ];
        let storm = RiskScorer::default().storm(&batch("Miami, US", samples));
        assert!((storm - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_storm_recency() {
        let mut calm: Vec<Vec<(Field, f64)>> = (0..8)
            .map(|_| vec![(Field::WindSpeed, 10.0), (Field::Pressure, 1012.0)])
            .collect();
        let before = RiskScorer::default().storm(&batch("Miami, US", calm.clone()));

        if let Some(last) = calm.last_mut() {
            last[0] = (Field::WindSpeed, 100.0);
        }
        let after = RiskScorer::default().storm(&batch("Miami, US", calm));

        assert!(after >= before);
        assert_eq!(after, 1.0);
    }

    #[test]
    fn test_extreme_temperature_fraction() {
        let samples = [42.0, 41.0, 20.0, 20.0, 20.0, 20.0]
            .iter()
            .map(|t| vec![(Field::Temperature, *t)])
            .collect();
        let score = RiskScorer::default().extreme_temperature(&batch("Atlanta, US", samples));
        assert!((score - 2.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_null_temperature_scores_zero() {
        let samples = (0..12).map(|_| vec![(Field::Humidity, 70.0)]).collect();
        let scores = RiskScorer::default().score(&batch("Seattle, US", samples));
        assert_eq!(scores, RiskScores::default());
    }

    #[test]
    fn test_pathological_values_clamped() {
        let samples = vec![vec![
            (Field::Precipitation, 1e9),
            (Field::Temperature, 1e6),
            (Field::WindSpeed, 1e9),
            (Field::Pressure, -1e9),
        ]];
        let scores = RiskScorer::default().score(&batch("Houston, US", samples));
        for (_, value) in scores.iter() {
            assert!((0.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn test_empty_batch_scores_zero() {
        let scores = RiskScorer::default().score(&Batch::empty("Chicago, US"));
        assert_eq!(scores, RiskScores::default());
    }
}
