//! Error handling for the WeatherGuard backend
//!
//! Collaborator failures are transient and handled per location or per tick.
//! Only [`AppError::Invariant`] is fatal.

use shared::{BatchError, ObservationError};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Collaborator errors
    #[error("Fetch failed for {location}: {message}")]
    Fetch { location: String, message: String },

    #[error("Fetch for {location} timed out after {secs}s")]
    FetchTimeout { location: String, secs: u64 },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Alert formatter error: {0}")]
    Formatter(String),

    #[error("Attestation error: {0}")]
    Attestation(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    // Ingestion errors
    #[error("Validation error: {0}")]
    ValidationError(#[from] ObservationError),

    // Programming-invariant violations
    #[error("Invariant violated: {0}")]
    Invariant(#[from] BatchError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Stable code used in structured logs and status reports
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Fetch { .. } => "FETCH_ERROR",
            AppError::FetchTimeout { .. } => "FETCH_TIMEOUT",
            AppError::StorageError(_) => "STORAGE_ERROR",
            AppError::Formatter(_) => "FORMATTER_ERROR",
            AppError::Attestation(_) => "ATTESTATION_ERROR",
            AppError::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::Invariant(_) => "INVARIANT_VIOLATION",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// True for caller bugs that must stop the scheduler
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Invariant(_))
    }
}

/// Result type alias for the backend
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_invariant_is_fatal() {
        let invariant = AppError::from(BatchError::MixedLocations {
            expected: "Miami, US".to_string(),
            found: "Denver, US".to_string(),
        });
        assert!(invariant.is_fatal());
        assert_eq!(invariant.code(), "INVARIANT_VIOLATION");

        let fetch = AppError::Fetch {
            location: "Miami, US".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(!fetch.is_fatal());
        assert!(!AppError::StorageError("disk full".to_string()).is_fatal());
    }
}
