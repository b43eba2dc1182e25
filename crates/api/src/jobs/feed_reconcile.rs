//! Polling fallback keeping the admin feed in step with the offline queue.

use domain::services::{AdminAlertFeed, OfflineQueue};
use std::sync::Arc;

use super::scheduler::{Job, JobFrequency};

pub struct FeedReconcileJob {
    feed: Arc<AdminAlertFeed>,
    queue: Arc<dyn OfflineQueue>,
}

impl FeedReconcileJob {
    pub fn new(feed: Arc<AdminAlertFeed>, queue: Arc<dyn OfflineQueue>) -> Self {
        Self { feed, queue }
    }
}

#[async_trait::async_trait]
impl Job for FeedReconcileJob {
    fn name(&self) -> &'static str {
        "feed_reconcile"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(1)
    }

    async fn execute(&self) -> Result<(), String> {
        self.feed
            .reconcile(self.queue.as_ref())
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}
