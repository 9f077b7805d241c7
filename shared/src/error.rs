//! Error types raised by the shared domain layer

use thiserror::Error;

/// Violations of the batch invariants. These indicate a caller bug.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error("Batch for '{expected}' contains a measurement for '{found}'")]
    MixedLocations { expected: String, found: String },
}

/// Rejections raised while turning a raw observation into a measurement
#[derive(Error, Debug)]
pub enum ObservationError {
    #[error("Invalid observation: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("Field {field} is not a finite number")]
    NonFinite { field: &'static str },
}
