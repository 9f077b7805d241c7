//! Statistical analysis models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Field;
use crate::types::{Severity, TrendDirection};

/// Summary statistics for one field over a batch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FieldStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; 0.0 for a single sample
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
}

/// Significance of a fitted trend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Significance {
    High,
    Low,
}

/// Least-squares trend for one field
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Trend {
    pub direction: TrendDirection,
    /// Slope per sample position
    pub rate: f64,
    pub significance: Significance,
}

/// A sample outside the interquartile fence of its field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Anomaly {
    pub field: Field,
    pub value: f64,
    pub expected_range: [f64; 2],
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub location: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Complete,
    NoData,
}

/// Result of analyzing one batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisReport {
    pub location: String,
    pub status: AnalysisStatus,
    pub sample_count: usize,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub statistics: BTreeMap<Field, FieldStatistics>,
    pub trends: BTreeMap<Field, Trend>,
    pub anomalies: Vec<Anomaly>,
}

impl AnalysisReport {
    /// Report for a batch with no measurements
    pub fn no_data(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            status: AnalysisStatus::NoData,
            sample_count: 0,
            window_start: None,
            window_end: None,
            statistics: BTreeMap::new(),
            trends: BTreeMap::new(),
            anomalies: Vec::new(),
        }
    }

    pub fn is_no_data(&self) -> bool {
        self.status == AnalysisStatus::NoData
    }

    pub fn high_severity_anomalies(&self) -> usize {
        self.anomalies
            .iter()
            .filter(|a| a.severity == Severity::High)
            .count()
    }
}
