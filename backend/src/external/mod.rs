//! External API integrations

pub mod alert_text;
pub mod weather;

pub use alert_text::{parse_alert_text, OpenAiAlertFormatter};
pub use weather::{MeasurementSource, OpenWeatherClient};
