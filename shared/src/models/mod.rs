//! Domain models for the WeatherGuard platform

mod alert;
mod analysis;
mod measurement;
mod prediction;
mod risk;

pub use alert::*;
pub use analysis::*;
pub use measurement::*;
pub use prediction::*;
pub use risk::*;
