//! Bounded local queue of alerts awaiting delivery.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::AlertRecord;

/// Default number of records retained in the offline queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// Errors raised by an offline queue backend.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Offline queue I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Offline queue is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Offline queue unavailable: {0}")]
    Unavailable(String),
}

/// Ordered (oldest first), bounded list of records keyed by record id.
#[async_trait]
pub trait OfflineQueue: Send + Sync {
    /// Appends a record, or replaces the entry with the same id. Returns the
    /// records evicted to stay within capacity.
    async fn push(&self, record: AlertRecord) -> Result<Vec<AlertRecord>, QueueError>;

    /// All queued records, oldest first.
    async fn list(&self) -> Result<Vec<AlertRecord>, QueueError>;

    /// Replaces a queued record in place. Returns false when it is not queued.
    async fn update(&self, record: &AlertRecord) -> Result<bool, QueueError>;

    /// Removes records by id. Returns how many were removed.
    async fn remove(&self, ids: &[Uuid]) -> Result<usize, QueueError>;

    async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.list().await?.len())
    }

    fn capacity(&self) -> usize;
}

/// Inserts `record` into `records` and trims the oldest entries beyond
/// `capacity`, returning the evicted ones.
pub fn append_bounded(
    records: &mut Vec<AlertRecord>,
    record: AlertRecord,
    capacity: usize,
) -> Vec<AlertRecord> {
    match records.iter_mut().find(|existing| existing.id == record.id) {
        Some(existing) => *existing = record,
        None => records.push(record),
    }

    let overflow = records.len().saturating_sub(capacity.max(1));
    records.drain(..overflow).collect()
}

/// Replaces the entry with the same id. Returns false when absent.
pub fn replace_by_id(records: &mut [AlertRecord], record: &AlertRecord) -> bool {
    match records.iter_mut().find(|existing| existing.id == record.id) {
        Some(existing) => {
            *existing = record.clone();
            true
        }
        None => false,
    }
}

/// Removes entries whose id is in `ids`. Returns how many were removed.
pub fn remove_by_ids(records: &mut Vec<AlertRecord>, ids: &[Uuid]) -> usize {
    let before = records.len();
    records.retain(|record| !ids.contains(&record.id));
    before - records.len()
}

/// In-memory queue for development and testing.
#[derive(Debug)]
pub struct MemoryOfflineQueue {
    records: Mutex<Vec<AlertRecord>>,
    capacity: usize,
    /// Whether to simulate storage failures for testing.
    pub simulate_failure: bool,
}

impl MemoryOfflineQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
            simulate_failure: false,
        }
    }

    /// A queue whose every operation fails.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::new(DEFAULT_QUEUE_CAPACITY)
        }
    }

    fn check(&self) -> Result<(), QueueError> {
        if self.simulate_failure {
            Err(QueueError::Unavailable("Simulated failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryOfflineQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[async_trait]
impl OfflineQueue for MemoryOfflineQueue {
    async fn push(&self, record: AlertRecord) -> Result<Vec<AlertRecord>, QueueError> {
        self.check()?;
        let mut records = self.records.lock().await;
        Ok(append_bounded(&mut records, record, self.capacity))
    }

    async fn list(&self) -> Result<Vec<AlertRecord>, QueueError> {
        self.check()?;
        Ok(self.records.lock().await.clone())
    }

    async fn update(&self, record: &AlertRecord) -> Result<bool, QueueError> {
        self.check()?;
        let mut records = self.records.lock().await;
        Ok(replace_by_id(&mut records, record))
    }

    async fn remove(&self, ids: &[Uuid]) -> Result<usize, QueueError> {
        self.check()?;
        let mut records = self.records.lock().await;
        Ok(remove_by_ids(&mut records, ids))
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertCategory, AlertDraft, GeoPoint};

    fn record(message: &str) -> AlertRecord {
        let draft = AlertDraft::user_action("tourist-5", AlertCategory::Assistance, message);
        AlertRecord::from_draft(draft, GeoPoint::new(11.0, 76.9)).unwrap()
    }

    #[tokio::test]
    async fn test_queue_keeps_most_recent() {
        let queue = MemoryOfflineQueue::new(3);
        let records: Vec<AlertRecord> = (0..5).map(|i| record(&format!("alert {i}"))).collect();

        let mut evicted = Vec::new();
        for r in &records {
            evicted.extend(queue.push(r.clone()).await.unwrap());
        }

        let kept: Vec<String> = queue
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.message)
            .collect();
        assert_eq!(kept, vec!["alert 2", "alert 3", "alert 4"]);
        assert_eq!(evicted.len(), 2);
        assert_eq!(evicted[0].id, records[0].id);
    }

    #[tokio::test]
    async fn test_push_same_id_replaces() {
        let queue = MemoryOfflineQueue::default();
        let mut r = record("first");
        queue.push(r.clone()).await.unwrap();
        r.message = "edited".to_string();
        queue.push(r.clone()).await.unwrap();

        let listed = queue.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].message, "edited");
    }

    #[tokio::test]
    async fn test_update_and_remove() {
        let queue = MemoryOfflineQueue::default();
        let mut a = record("a");
        let b = record("b");
        queue.push(a.clone()).await.unwrap();
        queue.push(b.clone()).await.unwrap();

        a.mark_failed_attempt();
        assert!(queue.update(&a).await.unwrap());
        assert!(!queue.update(&record("missing")).await.unwrap());

        assert_eq!(queue.remove(&[a.id, Uuid::new_v4()]).await.unwrap(), 1);
        assert_eq!(queue.len().await.unwrap(), 1);
        assert_eq!(queue.capacity(), DEFAULT_QUEUE_CAPACITY);
    }

    #[tokio::test]
    async fn test_failing_queue_errors() {
        let queue = MemoryOfflineQueue::failing();
        tokio_test::assert_err!(queue.push(record("x")).await);
        tokio_test::assert_err!(queue.list().await);
    }
}
