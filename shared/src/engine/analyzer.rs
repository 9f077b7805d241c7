//! Statistical analyzer: summary statistics, trends and IQR anomalies

use std::collections::BTreeMap;

use crate::engine::config::AnalysisConfig;
use crate::models::{
    AnalysisReport, AnalysisStatus, Anomaly, Batch, Field, FieldStatistics, Significance, Trend,
};
use crate::types::{Severity, TrendDirection};

/// Computes per-field statistics, trends and anomalies over a batch
#[derive(Debug, Clone, Default)]
pub struct StatisticalAnalyzer {
    config: AnalysisConfig,
}

impl StatisticalAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Analyze a batch. An empty batch yields a `no_data` report.
    pub fn analyze(&self, batch: &Batch) -> AnalysisReport {
        if batch.is_empty() {
            return AnalysisReport::no_data(batch.location());
        }

        let mut statistics = BTreeMap::new();
        let mut trends = BTreeMap::new();
        let mut anomalies = Vec::new();

        for field in Field::ALL {
            let points = batch.indexed_values(field);
            let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();

            if let Some(stats) = field_statistics(&values) {
                statistics.insert(field, stats);
            }
            if let Some(trend) = linear_trend(&points, self.config.trend_threshold(field)) {
                trends.insert(field, trend);
            }
            anomalies.extend(self.field_anomalies(batch, field, &points));
        }

        AnalysisReport {
            location: batch.location().to_string(),
            status: AnalysisStatus::Complete,
            sample_count: batch.len(),
            window_start: batch.first_timestamp(),
            window_end: batch.last_timestamp(),
            statistics,
            trends,
            anomalies,
        }
    }

    /// IQR fence for a field, if enough samples exist
    pub fn fence(&self, values: &[f64]) -> Option<Fence> {
        if values.len() < self.config.min_anomaly_samples.max(1) {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let q1 = quantile(&sorted, 0.25)?;
        let q3 = quantile(&sorted, 0.75)?;
        let iqr = q3 - q1;
        Some(Fence {
            q1,
            q3,
            iqr,
            lower: q1 - self.config.iqr_multiplier * iqr,
            upper: q3 + self.config.iqr_multiplier * iqr,
        })
    }

    fn field_anomalies(&self, batch: &Batch, field: Field, points: &[(usize, f64)]) -> Vec<Anomaly> {
        let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
        let Some(fence) = self.fence(&values) else {
            return Vec::new();
        };

        points
            .iter()
            .filter(|(_, v)| *v < fence.lower || *v > fence.upper)
            .map(|&(index, value)| {
                let measurement = &batch.measurements()[index];
                Anomaly {
                    field,
                    value,
                    expected_range: [fence.lower, fence.upper],
                    severity: fence.severity(value),
                    timestamp: measurement.timestamp,
                    location: measurement.location.clone(),
                }
            })
            .collect()
    }
}

/// Interquartile fence of one field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fence {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Fence {
    /// High when the value lies more than one further IQR past the fence
    pub fn severity(&self, value: f64) -> Severity {
        if value < self.lower - self.iqr || value > self.upper + self.iqr {
            Severity::High
        } else {
            Severity::Medium
        }
    }
}

/// Mean, median, sample stddev, min and max. `None` for no samples.
pub fn field_statistics(values: &[f64]) -> Option<FieldStatistics> {
    if values.is_empty() {
        return None;
    }
    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let median = quantile(&sorted, 0.5)?;

    let stddev = if count > 1 {
        let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (count - 1) as f64).sqrt()
    } else {
        0.0
    };

    Some(FieldStatistics {
        count,
        mean,
        median,
        stddev,
        min: sorted[0],
        max: sorted[count - 1],
    })
}

/// Ordinary least-squares slope over `(position, value)` points.
///
/// Requires at least two points with distinct positions.
pub fn linear_trend(points: &[(usize, f64)], threshold: Option<f64>) -> Option<Trend> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let x_mean = points.iter().map(|(x, _)| *x as f64).sum::<f64>() / n;
    let y_mean = points.iter().map(|(_, y)| *y).sum::<f64>() / n;

    let (sxy, sxx) = points.iter().fold((0.0, 0.0), |(sxy, sxx), (x, y)| {
        let dx = *x as f64 - x_mean;
        (sxy + dx * (y - y_mean), sxx + dx * dx)
    });
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;

    let significance = match threshold {
        Some(limit) if slope.abs() > limit => Significance::High,
        _ => Significance::Low,
    };

    Some(Trend {
        direction: TrendDirection::from_rate(slope),
        rate: slope,
        significance,
    })
}

/// Empirical quantile with linear interpolation between closest ranks.
///
/// `sorted` must be ascending.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Measurement;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    fn batch_of(field: Field, values: &[f64]) -> Batch {
        let measurements = values
            .iter()
            .enumerate()
            .map(|(i, v)| Measurement::new("Chicago, US", at(i as i64)).with_value(field, *v))
            .collect();
        Batch::new("Chicago, US", measurements).unwrap()
    }

    #[test]
    fn test_statistics_basic() {
        let stats = field_statistics(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(stats.count, 8);
        assert!((stats.mean - 5.0).abs() < 1e-12);
        assert!((stats.median - 4.5).abs() < 1e-12);
        assert!((stats.stddev - 2.138089935299395).abs() < 1e-9);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
    }

    #[test]
    fn test_statistics_single_sample() {
        let stats = field_statistics(&[12.5]).unwrap();
        assert_eq!(stats.mean, 12.5);
        assert_eq!(stats.median, 12.5);
        assert_eq!(stats.stddev, 0.0);
        assert!(field_statistics(&[]).is_none());
    }

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.25), Some(1.75));
        assert_eq!(quantile(&sorted, 0.75), Some(3.25));
        assert_eq!(quantile(&sorted, 0.5), Some(2.5));
    }

    #[test]
    fn test_trend_increasing_high_significance() {
        let points: Vec<_> = [10.0, 11.0, 12.0, 13.0].iter().copied().enumerate().collect();
        let trend = linear_trend(&points, Some(0.5)).unwrap();
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert!((trend.rate - 1.0).abs() < 1e-12);
        assert_eq!(trend.significance, Significance::High);
    }

    #[test]
    fn test_trend_zero_slope_is_decreasing() {
        let points: Vec<_> = [5.0, 5.0, 5.0].iter().copied().enumerate().collect();
        let trend = linear_trend(&points, Some(0.5)).unwrap();
        assert_eq!(trend.rate, 0.0);
        assert_eq!(trend.direction, TrendDirection::Decreasing);
        assert_eq!(trend.significance, Significance::Low);
    }

    #[test]
    fn test_trend_without_threshold_is_low() {
        let points: Vec<_> = [0.0, 50.0, 100.0].iter().copied().enumerate().collect();
        let trend = linear_trend(&points, None).unwrap();
        assert_eq!(trend.significance, Significance::Low);
        assert!(linear_trend(&points[..1], None).is_none());
    }

    #[test]
    fn test_trend_uses_batch_positions() {
        // Gap at position 1 stretches the run
        let trend = linear_trend(&[(0, 0.0), (2, 2.0)], None).unwrap();
        assert!((trend.rate - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_anomaly_minimum_sample_count() {
        let analyzer = StatisticalAnalyzer::default();

        let three = analyzer.analyze(&batch_of(Field::WindSpeed, &[1.0, 1.0, 500.0]));
        assert!(three.anomalies.is_empty());

        let four = analyzer.analyze(&batch_of(Field::WindSpeed, &[1.0, 1.0, 1.0, 500.0]));
        assert_eq!(four.anomalies.len(), 1);
    }

    #[test]
    fn test_anomaly_severity() {
        let analyzer = StatisticalAnalyzer::default();
        // q1 = 11, q3 = 14, iqr = 3, fence = [6.5, 18.5]
        let values = [10.0, 11.0, 12.0, 13.0, 14.0, 18.0, 40.0, 10.0, 12.0];
        let report = analyzer.analyze(&batch_of(Field::Temperature, &values));

        let fence = analyzer.fence(&values).unwrap();
        let severities: Vec<_> = report
            .anomalies
            .iter()
            .map(|a| (a.value, a.severity))
            .collect();

        assert_eq!((fence.q1, fence.q3, fence.iqr), (11.0, 14.0, 3.0));
        assert_eq!((fence.lower, fence.upper), (6.5, 18.5));
        assert_eq!(severities, vec![(40.0, Severity::High)]);
        for anomaly in &report.anomalies {
            assert_eq!(anomaly.field, Field::Temperature);
            assert_eq!(anomaly.location, "Chicago, US");
            assert!(anomaly.value < fence.lower || anomaly.value > fence.upper);
        }
    }

    #[test]
    fn test_empty_batch_is_no_data() {
        let report = StatisticalAnalyzer::default().analyze(&Batch::empty("Miami, US"));
        assert!(report.is_no_data());
        assert!(report.statistics.is_empty());
        assert!(report.trends.is_empty());
        assert!(report.anomalies.is_empty());
    }

    #[test]
    fn test_absent_field_is_omitted() {
        let report = StatisticalAnalyzer::default().analyze(&batch_of(Field::Humidity, &[50.0, 60.0]));
        assert!(report.statistics.contains_key(&Field::Humidity));
        assert!(!report.statistics.contains_key(&Field::Temperature));
        assert!(!report.trends.contains_key(&Field::Temperature));
    }

    proptest::proptest! {
        #[test]
        fn prop_quantiles_stay_within_range(
            mut values in proptest::collection::vec(-1.0e6..1.0e6f64, 1..50),
            q in 0.0..=1.0f64,
        ) {
            values.sort_by(f64::total_cmp);
            let value = quantile(&values, q).unwrap();
            proptest::prop_assert!(value >= values[0] - 1e-6 && value <= values[values.len() - 1] + 1e-6);
        }

        #[test]
        fn prop_statistics_bracket_the_mean(values in proptest::collection::vec(-1.0e6..1.0e6f64, 1..50)) {
            let stats = field_statistics(&values).unwrap();
            proptest::prop_assert!(stats.min <= stats.mean + 1e-6 && stats.mean <= stats.max + 1e-6);
            proptest::prop_assert!(stats.stddev >= 0.0);
            proptest::prop_assert_eq!(stats.count, values.len());
        }
    }
}
