//! Alert models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Hazard;
use crate::types::Severity;

/// Transient breach of the alert threshold for one hazard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertCandidate {
    pub hazard: Hazard,
    pub severity: Severity,
    pub location: String,
    pub risk_value: f64,
}

/// Human-readable alert text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertContent {
    pub title: String,
    pub description: String,
    pub instructions: String,
    pub duration: String,
}

impl AlertContent {
    /// Title and description must both carry text
    pub fn is_usable(&self) -> bool {
        !self.title.trim().is_empty() && !self.description.trim().is_empty()
    }
}

/// Where the alert text came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertTextSource {
    Formatter,
    Template,
}

/// Alert ready for persistence and publication
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertRecord {
    pub id: Uuid,
    pub hazard: Hazard,
    pub severity: Severity,
    pub location: String,
    pub title: String,
    pub description: String,
    pub instructions: String,
    pub duration: String,
    pub risk_value: f64,
    pub text_source: AlertTextSource,
    pub start_time: DateTime<Utc>,
    pub is_active: bool,
}

impl AlertRecord {
    pub fn new(
        candidate: AlertCandidate,
        content: AlertContent,
        text_source: AlertTextSource,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            hazard: candidate.hazard,
            severity: candidate.severity,
            location: candidate.location,
            title: content.title,
            description: content.description,
            instructions: content.instructions,
            duration: content.duration,
            risk_value: candidate.risk_value,
            text_source,
            start_time,
            is_active: true,
        }
    }
}
