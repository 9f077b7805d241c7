//! Publish sink for real-time subscribers

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

/// Channels published by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    WeatherUpdates,
    AnalysisUpdates,
    Alerts,
    Predictions,
    AttestationEvents,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::WeatherUpdates => "weather_updates",
            Topic::AnalysisUpdates => "analysis_updates",
            Topic::Alerts => "alerts",
            Topic::Predictions => "predictions",
            Topic::AttestationEvents => "attestation_events",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fire-and-forget publication. Implementations must not block.
pub trait Publisher: Send + Sync {
    fn publish(&self, topic: Topic, payload: Value);
}

/// Serialize `payload` and publish it, logging encoding failures
pub fn publish_serialized<T: Serialize>(publisher: &dyn Publisher, topic: Topic, payload: &T) {
    match serde_json::to_value(payload) {
        Ok(value) => publisher.publish(topic, value),
        Err(e) => tracing::warn!(topic = %topic, error = %e, "Failed to encode payload"),
    }
}

/// Message delivered to subscribers
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub topic: Topic,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

/// In-process fan-out over a tokio broadcast channel
#[derive(Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<Envelope>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Publisher for BroadcastPublisher {
    fn publish(&self, topic: Topic, payload: Value) {
        let envelope = Envelope {
            topic,
            data: payload,
            timestamp: Utc::now(),
        };
        // An error only means nobody is subscribed
        if self.sender.send(envelope).is_err() {
            tracing::trace!(topic = %topic, "No subscribers for published message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscribers_receive_envelopes() {
        let publisher = BroadcastPublisher::default();
        let mut receiver = publisher.subscribe();

        publisher.publish(Topic::Alerts, json!({"hazard": "flood"}));

        let envelope = receiver.recv().await.unwrap();
        assert_eq!(envelope.topic, Topic::Alerts);
        assert_eq!(envelope.data["hazard"], "flood");

        let wire = serde_json::to_value(&envelope).unwrap();
        assert_eq!(wire["type"], "alerts");
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        BroadcastPublisher::new(4).publish(Topic::WeatherUpdates, json!({}));
    }
}
