//! Same-device publish/subscribe channel for alert notifications.
//!
//! Publishing is fire and forget: no acknowledgement, and a message sent while
//! no listener is subscribed is dropped. Listeners must tolerate duplicates
//! and dedupe by record id.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::models::AlertRecord;

/// Default number of messages buffered per slow subscriber.
pub const DEFAULT_BUS_CAPACITY: usize = 64;

/// Messages carried on the local bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LocalBusMessage {
    /// A record could not be delivered and was queued locally.
    #[serde(rename = "OFFLINE_ALERT")]
    OfflineAlert { record: AlertRecord },

    /// A previously queued record reached the backend.
    #[serde(rename = "ALERT_DELIVERED", rename_all = "camelCase")]
    AlertDelivered { record_id: Uuid },
}

impl LocalBusMessage {
    /// Id of the record the message is about.
    pub fn record_id(&self) -> Uuid {
        match self {
            LocalBusMessage::OfflineAlert { record } => record.id,
            LocalBusMessage::AlertDelivered { record_id } => *record_id,
        }
    }
}

/// Publisher side of the local bus.
pub trait AlertPublisher: Send + Sync {
    fn publish(&self, message: LocalBusMessage);
}

/// Local bus backed by a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastAlertBus {
    sender: broadcast::Sender<LocalBusMessage>,
}

impl BroadcastAlertBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LocalBusMessage> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastAlertBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl AlertPublisher for BroadcastAlertBus {
    fn publish(&self, message: LocalBusMessage) {
        let record_id = message.record_id();
        if self.sender.send(message).is_err() {
            debug!(record_id = %record_id, "No local listeners for bus message");
        }
    }
}

/// Publisher that only remembers what was published.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<LocalBusMessage>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<LocalBusMessage> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

impl AlertPublisher for RecordingPublisher {
    fn publish(&self, message: LocalBusMessage) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message);
        }
    }
}
