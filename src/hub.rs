// In-process live-update channel. WebSocket clients subscribe; the fan-out publishes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::TransportError;
use crate::fanout::Broadcaster;

/// Wire shape sent to live subscribers: `{"target": topic, "arguments": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubMessage {
    pub target: String,
    pub arguments: Value,
}

#[derive(Debug, Clone)]
pub struct Hub {
    tx: broadcast::Sender<HubMessage>,
}

impl Hub {
    /// `capacity` messages are buffered per slow subscriber before it starts lagging.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubMessage> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl Broadcaster for Hub {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), TransportError> {
        let message = HubMessage {
            target: topic.to_string(),
            arguments: payload,
        };
        self.tx
            .send(message)
            .map(|_| ())
            .map_err(|_| TransportError::NoSubscribers)
    }
}
