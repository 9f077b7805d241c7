//! Shared types and computation for the WeatherGuard platform
//!
//! This crate holds the measurement model and the deterministic engine
//! (statistics, risk fusion, prediction, alert policy). Nothing here performs
//! I/O, so every stage can be exercised in isolation by the backend and tests.

pub mod engine;
pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use engine::*;
pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
