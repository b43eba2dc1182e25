//! Alert relay: backend delivery with an offline fallback.
//!
//! Every alert either reaches the backend or lands in the local offline queue
//! and is announced on the local bus. Delivery and storage failures are never
//! returned to the caller; only malformed input is.
//!
//! ```text
//! CREATED -> DELIVERED          backend write succeeds
//! CREATED -> QUEUED_OFFLINE     backend write fails, or device offline
//! QUEUED_OFFLINE -> DELIVERED   replay succeeds after reconnect
//! ```

use async_trait::async_trait;
use metrics::counter;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::local_bus::{AlertPublisher, LocalBusMessage};
use super::network::NetworkMonitor;
use super::offline_queue::OfflineQueue;
use crate::models::{AlertDraft, AlertError, AlertRecord, GeoPoint};

/// Errors returned by a backend sink.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("Backend rejected alert: {0}")]
    Rejected(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Backend write for alert records.
///
/// Implementations must treat a repeated record id as already delivered.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, record: &AlertRecord) -> Result<(), DeliveryError>;
}

/// Mock sink for development and testing.
///
/// Logs deliveries and remembers them instead of writing anywhere.
#[derive(Debug, Default)]
pub struct MockAlertSink {
    simulate_failure: AtomicBool,
    latency_ms: AtomicU64,
    accepted_calls: AtomicUsize,
    delivered: Mutex<Vec<AlertRecord>>,
}

impl MockAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every delivery until told otherwise.
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.set_failing(true);
        sink
    }

    pub fn set_failing(&self, failing: bool) {
        self.simulate_failure.store(failing, Ordering::SeqCst);
    }

    /// Delay applied to every accepted delivery.
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(millis, Ordering::SeqCst);
    }

    /// Number of accepted `deliver` calls, repeats of the same record included.
    pub fn accepted_calls(&self) -> usize {
        self.accepted_calls.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<AlertRecord> {
        self.delivered
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn delivery_count(&self) -> usize {
        self.delivered().len()
    }
}

#[async_trait]
impl AlertSink for MockAlertSink {
    async fn deliver(&self, record: &AlertRecord) -> Result<(), DeliveryError> {
        if self.simulate_failure.load(Ordering::SeqCst) {
            warn!(record_id = %record.id, "Mock alert sink simulating failure");
            return Err(DeliveryError::Unavailable("Simulated failure".to_string()));
        }

        info!(
            record_id = %record.id,
            subject_id = %record.subject_id,
            category = %record.category,
            severity = %record.severity,
            "Mock: Would write alert to backend"
        );

        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        self.accepted_calls.fetch_add(1, Ordering::SeqCst);

        if let Ok(mut delivered) = self.delivered.lock() {
            if !delivered.iter().any(|r| r.id == record.id) {
                delivered.push(record.clone());
            }
        }
        Ok(())
    }
}

/// Relay tunables.
#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    /// Location used when neither the alert nor a previous fix has one.
    pub fallback_location: GeoPoint,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            fallback_location: GeoPoint::new(0.0, 0.0),
        }
    }
}

/// Terminal result of `AlertRelay::send`.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Delivered(AlertRecord),
    QueuedOffline(AlertRecord),
}

impl SendOutcome {
    pub fn record(&self) -> &AlertRecord {
        match self {
            SendOutcome::Delivered(record) | SendOutcome::QueuedOffline(record) => record,
        }
    }

    pub fn into_record(self) -> AlertRecord {
        match self {
            SendOutcome::Delivered(record) | SendOutcome::QueuedOffline(record) => record,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered(_))
    }

    /// Text shown to the person who raised the alert.
    pub fn user_message(&self) -> &'static str {
        match self {
            SendOutcome::Delivered(_) => "Alert sent",
            SendOutcome::QueuedOffline(_) => "Alert sent, will retry when back online",
        }
    }
}

/// Counters from one replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    pub remaining: usize,
    pub skipped_offline: bool,
}

/// Delivers alerts, queues them offline on failure, and replays the queue.
pub struct AlertRelay {
    sink: Arc<dyn AlertSink>,
    queue: Arc<dyn OfflineQueue>,
    publisher: Arc<dyn AlertPublisher>,
    network: NetworkMonitor,
    settings: RelaySettings,
    last_known: RwLock<HashMap<String, GeoPoint>>,
    replay_lock: tokio::sync::Mutex<()>,
}

impl AlertRelay {
    pub fn new(
        sink: Arc<dyn AlertSink>,
        queue: Arc<dyn OfflineQueue>,
        publisher: Arc<dyn AlertPublisher>,
        network: NetworkMonitor,
        settings: RelaySettings,
    ) -> Self {
        Self {
            sink,
            queue,
            publisher,
            network,
            settings,
            last_known: RwLock::new(HashMap::new()),
            replay_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    /// Remembers the latest fix for a subject, used when an alert has none.
    pub fn record_position(&self, subject_id: &str, location: GeoPoint) {
        if let Ok(mut last_known) = self.last_known.write() {
            last_known.insert(subject_id.to_string(), location);
        }
    }

    pub fn last_known_location(&self, subject_id: &str) -> Option<GeoPoint> {
        self.last_known
            .read()
            .ok()
            .and_then(|last_known| last_known.get(subject_id).copied())
    }

    /// Builds a record from `draft` and delivers or queues it.
    ///
    /// Fails only when the draft is malformed; nothing is written then.
    pub async fn send(&self, draft: AlertDraft) -> Result<SendOutcome, AlertError> {
        let fallback = self
            .last_known_location(draft.subject_id.trim())
            .unwrap_or(self.settings.fallback_location);
        let mut record = AlertRecord::from_draft(draft, fallback)?;

        if self.network.is_online() {
            let mut outgoing = record.clone();
            outgoing.mark_delivered();

            match self.sink.deliver(&outgoing).await {
                Ok(()) => {
                    counter!("alerts_delivered_total", "category" => outgoing.category.as_str())
                        .increment(1);
                    info!(
                        record_id = %outgoing.id,
                        subject_id = %outgoing.subject_id,
                        category = %outgoing.category,
                        severity = %outgoing.severity,
                        "Alert delivered"
                    );
                    return Ok(SendOutcome::Delivered(outgoing));
                }
                Err(e) => {
                    warn!(
                        record_id = %record.id,
                        error = %e,
                        "Alert delivery failed, falling back to offline queue"
                    );
                    record.mark_failed_attempt();
                }
            }
        } else {
            debug!(record_id = %record.id, "Device offline, queueing alert");
        }

        Ok(SendOutcome::QueuedOffline(self.queue_offline(record).await))
    }

    /// Stores the record locally and announces it on the bus.
    async fn queue_offline(&self, mut record: AlertRecord) -> AlertRecord {
        record.mark_queued_offline();

        match self.queue.push(record.clone()).await {
            Ok(evicted) => {
                if !evicted.is_empty() {
                    warn!(
                        evicted = evicted.len(),
                        capacity = self.queue.capacity(),
                        "Offline queue full, dropped oldest alerts"
                    );
                }
            }
            Err(e) => {
                error!(
                    record_id = %record.id,
                    error = %e,
                    "Failed to persist offline alert, relying on local broadcast"
                );
            }
        }

        counter!("alerts_queued_offline_total", "category" => record.category.as_str())
            .increment(1);
        info!(
            record_id = %record.id,
            subject_id = %record.subject_id,
            severity = %record.severity,
            "Alert queued offline"
        );

        self.publisher.publish(LocalBusMessage::OfflineAlert {
            record: record.clone(),
        });
        record
    }

    /// Attempts delivery of every queued record.
    ///
    /// Delivered records leave the queue; failures stay queued for the next
    /// trigger. Overlapping calls run one after another.
    pub async fn replay_queued(&self) -> ReplaySummary {
        let _guard = self.replay_lock.lock().await;
        let mut summary = ReplaySummary::default();

        if !self.network.is_online() {
            debug!("Skipping offline replay while offline");
            summary.skipped_offline = true;
            summary.remaining = self.queue.len().await.unwrap_or(0);
            return summary;
        }

        let queued = match self.queue.list().await {
            Ok(queued) => queued,
            Err(e) => {
                error!(error = %e, "Failed to read offline queue");
                return summary;
            }
        };

        let mut delivered_ids = Vec::new();
        for mut record in queued {
            summary.attempted += 1;

            let mut outgoing = record.clone();
            outgoing.mark_delivered();

            match self.sink.deliver(&outgoing).await {
                Ok(()) => delivered_ids.push(record.id),
                Err(e) => {
                    summary.failed += 1;
                    record.mark_failed_attempt();
                    warn!(
                        record_id = %record.id,
                        attempts = record.attempts,
                        error = %e,
                        "Replay of offline alert failed"
                    );
                    if let Err(e) = self.queue.update(&record).await {
                        warn!(record_id = %record.id, error = %e, "Failed to update offline alert");
                    }
                }
            }
        }

        if !delivered_ids.is_empty() {
            if let Err(e) = self.queue.remove(&delivered_ids).await {
                error!(error = %e, "Failed to remove replayed alerts from offline queue");
            }
            for record_id in &delivered_ids {
                self.publisher
                    .publish(LocalBusMessage::AlertDelivered { record_id: *record_id });
            }
            counter!("alerts_replayed_total").increment(delivered_ids.len() as u64);
        }

        summary.delivered = delivered_ids.len();
        summary.remaining = self.queue.len().await.unwrap_or(0);

        if summary.attempted > 0 {
            info!(
                attempted = summary.attempted,
                delivered = summary.delivered,
                failed = summary.failed,
                remaining = summary.remaining,
                "Offline alert replay finished"
            );
        }
        summary
    }

    /// Records currently waiting in the offline queue.
    pub async fn queued(&self) -> Vec<AlertRecord> {
        match self.queue.list().await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Failed to read offline queue");
                Vec::new()
            }
        }
    }

    /// Spawns a task replaying the queue on every offline -> online edge.
    pub fn spawn_reconnect_replay(self: &Arc<Self>) -> JoinHandle<()> {
        let relay = Arc::clone(self);
        let mut status = relay.network.subscribe();

        tokio::spawn(async move {
            while status.changed().await.is_ok() {
                let online = *status.borrow_and_update();
                if online {
                    info!("Connectivity restored, replaying offline alerts");
                    relay.replay_queued().await;
                }
            }
        })
    }
}
