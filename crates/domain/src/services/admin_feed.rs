//! Admin-side view of alerts that went through the offline path.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::local_bus::LocalBusMessage;
use super::offline_queue::{OfflineQueue, QueueError};
use crate::models::{AlertRecord, DeliveryStatus};

/// Default number of records kept in the feed.
pub const DEFAULT_FEED_SIZE: usize = 100;

/// Bounded, newest-first list of offline alerts, deduplicated by record id.
#[derive(Debug)]
pub struct AdminAlertFeed {
    entries: Mutex<VecDeque<AlertRecord>>,
    capacity: usize,
}

impl AdminAlertFeed {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Applies one bus message. Returns true when the feed changed.
    pub fn apply(&self, message: LocalBusMessage) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            return false;
        };

        match message {
            LocalBusMessage::OfflineAlert { record } => {
                if let Some(existing) = entries.iter_mut().find(|e| e.id == record.id) {
                    // A late duplicate must not undo a delivery we already saw.
                    if existing.status == DeliveryStatus::Delivered || *existing == record {
                        return false;
                    }
                    *existing = record;
                    return true;
                }

                entries.push_front(record);
                entries.truncate(self.capacity);
                true
            }
            LocalBusMessage::AlertDelivered { record_id } => {
                match entries.iter_mut().find(|e| e.id == record_id) {
                    Some(existing) if existing.status != DeliveryStatus::Delivered => {
                        existing.status = DeliveryStatus::Delivered;
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    /// Newest first.
    pub fn snapshot(&self) -> Vec<AlertRecord> {
        self.entries
            .lock()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Polling fallback: folds queued records that never reached us over the
    /// bus into the feed. Returns how many were added or updated.
    pub async fn reconcile(&self, queue: &dyn OfflineQueue) -> Result<usize, QueueError> {
        let queued = queue.list().await?;
        let changed = queued
            .into_iter()
            .filter(|record| self.apply(LocalBusMessage::OfflineAlert { record: record.clone() }))
            .count();

        if changed > 0 {
            debug!(changed = changed, "Admin feed reconciled from offline queue");
        }
        Ok(changed)
    }

    /// Spawns a listener applying every bus message until the bus closes.
    pub fn spawn_listener(
        self: &Arc<Self>,
        mut receiver: broadcast::Receiver<LocalBusMessage>,
    ) -> JoinHandle<()> {
        let feed = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => {
                        feed.apply(message);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "Admin feed lagged behind the local bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Default for AdminAlertFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_SIZE)
    }
}
