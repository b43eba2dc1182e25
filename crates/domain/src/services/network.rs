//! Network status signal.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Online/offline flag with change notifications.
///
/// Clones share the same underlying state.
#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    sender: Arc<watch::Sender<bool>>,
}

impl NetworkMonitor {
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(online);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    /// Updates the flag. Returns true when the status actually changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.sender.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            info!(online = online, "Network status changed");
        }
        changed
    }

    /// Receiver notified on every status change.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
