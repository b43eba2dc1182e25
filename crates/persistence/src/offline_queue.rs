//! File-backed offline alert queue.
//!
//! The queue is one JSON array, oldest first. Every write reads the whole
//! list, modifies it, and overwrites the file through a temporary file and a
//! rename. Writers in this process are serialized by a mutex; separate
//! processes sharing the file are not coordinated.

use async_trait::async_trait;
use domain::models::AlertRecord;
use domain::services::offline_queue::{append_bounded, remove_by_ids, replace_by_id};
use domain::services::{OfflineQueue, QueueError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct FileOfflineQueue {
    path: PathBuf,
    capacity: usize,
    lock: Mutex<()>,
}

impl FileOfflineQueue {
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity: capacity.max(1),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<AlertRecord>, QueueError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, records: &[AlertRecord]) -> Result<(), QueueError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(records)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), records = records.len(), "Offline queue written");
        Ok(())
    }
}

#[async_trait]
impl OfflineQueue for FileOfflineQueue {
    async fn push(&self, record: AlertRecord) -> Result<Vec<AlertRecord>, QueueError> {
        let _guard = self.lock.lock().await;

        let mut records = match self.read_all().await {
            Ok(records) => records,
            Err(QueueError::Corrupt(e)) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Offline queue file is corrupt, starting a new one"
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let evicted = append_bounded(&mut records, record, self.capacity);
        self.write_all(&records).await?;
        Ok(evicted)
    }

    async fn list(&self) -> Result<Vec<AlertRecord>, QueueError> {
        let _guard = self.lock.lock().await;
        self.read_all().await
    }

    async fn update(&self, record: &AlertRecord) -> Result<bool, QueueError> {
        let _guard = self.lock.lock().await;

        let mut records = self.read_all().await?;
        if !replace_by_id(&mut records, record) {
            return Ok(false);
        }
        self.write_all(&records).await?;
        Ok(true)
    }

    async fn remove(&self, ids: &[Uuid]) -> Result<usize, QueueError> {
        let _guard = self.lock.lock().await;

        let mut records = self.read_all().await?;
        let removed = remove_by_ids(&mut records, ids);
        if removed > 0 {
            self.write_all(&records).await?;
        }
        Ok(removed)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{AlertCategory, AlertDraft, DeliveryStatus, GeoPoint};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn record(message: &str) -> AlertRecord {
        let draft = AlertDraft::user_action("tourist-1", AlertCategory::Emergency, message)
            .with_location(GeoPoint::new(11.030, 76.992));
        let mut record = AlertRecord::from_draft(draft, GeoPoint::new(0.0, 0.0)).unwrap();
        record.mark_queued_offline();
        record
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_queue() {
        let dir = tempdir().unwrap();
        let queue = FileOfflineQueue::new(dir.path().join("queue.json"), 50);

        assert!(queue.list().await.unwrap().is_empty());
        assert_eq!(queue.remove(&[Uuid::new_v4()]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("queue.json");
        let first = record("first");

        FileOfflineQueue::new(&path, 50)
            .push(first.clone())
            .await
            .unwrap();

        let reopened = FileOfflineQueue::new(&path, 50);
        let listed = reopened.list().await.unwrap();
        assert_eq!(listed, vec![first]);
        assert_eq!(listed[0].status, DeliveryStatus::QueuedOffline);
    }

    #[tokio::test]
    async fn test_file_queue_is_bounded() {
        let dir = tempdir().unwrap();
        let queue = FileOfflineQueue::new(dir.path().join("queue.json"), 2);

        for i in 0..4 {
            queue.push(record(&format!("alert {i}"))).await.unwrap();
        }

        let messages: Vec<_> = queue
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.message)
            .collect();
        assert_eq!(messages, vec!["alert 2", "alert 3"]);
    }

    #[tokio::test]
    async fn test_update_and_remove_rewrite_file() {
        let dir = tempdir().unwrap();
        let queue = FileOfflineQueue::new(dir.path().join("queue.json"), 50);
        let mut a = record("a");
        let b = record("b");
        queue.push(a.clone()).await.unwrap();
        queue.push(b.clone()).await.unwrap();

        a.mark_failed_attempt();
        assert!(queue.update(&a).await.unwrap());
        assert_eq!(queue.list().await.unwrap()[0].status, DeliveryStatus::Failed);

        assert_eq!(queue.remove(&[a.id]).await.unwrap(), 1);
        assert_eq!(queue.list().await.unwrap(), vec![b]);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_replaced_on_push() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let queue = FileOfflineQueue::new(&path, 50);

        tokio_test::assert_err!(queue.list().await);

        let fresh = record("fresh");
        queue.push(fresh.clone()).await.unwrap();
        assert_eq!(queue.list().await.unwrap(), vec![fresh]);
    }

    #[tokio::test]
    async fn test_concurrent_pushes_are_not_lost() {
        let dir = tempdir().unwrap();
        let queue = Arc::new(FileOfflineQueue::new(dir.path().join("queue.json"), 50));

        let tasks: Vec<_> = (0..10)
            .map(|i| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.push(record(&format!("alert {i}"))).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(queue.len().await.unwrap(), 10);
    }
}
