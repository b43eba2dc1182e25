//! Periodic replay of the offline alert queue.
//!
//! Reconnects already trigger a replay; this job covers alerts that stayed
//! queued because the backend kept rejecting them while the device was
//! online.

use domain::services::AlertRelay;
use std::sync::Arc;
use tracing::{debug, info};

use super::scheduler::{Job, JobFrequency};

pub struct OfflineReplayJob {
    relay: Arc<AlertRelay>,
    interval_secs: u64,
}

impl OfflineReplayJob {
    pub fn new(relay: Arc<AlertRelay>, interval_secs: u64) -> Self {
        Self {
            relay,
            interval_secs,
        }
    }
}

#[async_trait::async_trait]
impl Job for OfflineReplayJob {
    fn name(&self) -> &'static str {
        "offline_replay"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.interval_secs)
    }

    async fn execute(&self) -> Result<(), String> {
        if !self.relay.network().is_online() {
            debug!("Offline, replay deferred");
            return Ok(());
        }

        let summary = self.relay.replay_queued().await;
        if summary.attempted > 0 {
            info!(
                delivered = summary.delivered,
                failed = summary.failed,
                remaining = summary.remaining,
                "Offline queue replayed"
            );
        }

        if summary.failed > 0 {
            return Err(format!("{} queued alerts could not be delivered", summary.failed));
        }
        Ok(())
    }
}
