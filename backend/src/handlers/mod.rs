//! HTTP handlers for the operational surface

pub mod health;
pub mod status;

pub use health::health_check;
pub use status::scheduler_status;
