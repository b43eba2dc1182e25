//! Continuous position tracking on top of a platform location provider.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::error::Elapsed;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{LocationError, PositionSample, TrackingOptions};

/// A fix or a provider failure, in arrival order.
pub type PositionEvent = Result<PositionSample, LocationError>;

const PROVIDER_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 64;

/// Platform location API.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Opens a continuous subscription. The stream ends when the provider
    /// drops its sender.
    async fn watch_position(
        &self,
        options: &TrackingOptions,
    ) -> Result<mpsc::Receiver<PositionEvent>, LocationError>;
}

struct ProviderSubscriber {
    sender: mpsc::Sender<PositionEvent>,
    options: TrackingOptions,
}

/// Provider fed from outside: device fixes pushed over HTTP, or synthetic
/// fixes in tests.
#[derive(Default)]
pub struct ChannelLocationProvider {
    subscribers: Mutex<Vec<ProviderSubscriber>>,
    permission_denied: AtomicBool,
}

impl ChannelLocationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `watch_position` calls fail with `PermissionDenied`.
    pub fn deny_permission(&self, denied: bool) {
        self.permission_denied.store(denied, Ordering::SeqCst);
    }

    /// Pushes a fix to every live subscription. Fixes older than a
    /// subscription's `max_sample_age_ms` are not handed to it.
    ///
    /// Returns the number of subscriptions that received the fix.
    pub fn feed(&self, sample: PositionSample) -> usize {
        let age = Utc::now()
            .signed_duration_since(sample.captured_at)
            .to_std()
            .unwrap_or(Duration::ZERO);

        self.dispatch(|options| {
            if options.max_sample_age_ms > 0 && age > options.max_sample_age() {
                debug!(age_ms = age.as_millis() as u64, "Dropping stale position fix");
                None
            } else {
                Some(Ok(sample.clone()))
            }
        })
    }

    /// Pushes a provider failure to every live subscription.
    pub fn feed_error(&self, error: LocationError) -> usize {
        self.dispatch(|_| Some(Err(error.clone())))
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .map(|subscribers| subscribers.iter().filter(|s| !s.sender.is_closed()).count())
            .unwrap_or(0)
    }

    /// Ends every open subscription, as a platform does when it shuts down.
    pub fn close(&self) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.clear();
        }
    }

    fn dispatch<F>(&self, event_for: F) -> usize
    where
        F: Fn(&TrackingOptions) -> Option<PositionEvent>,
    {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return 0;
        };

        let mut delivered = 0;
        subscribers.retain(|subscriber| {
            let Some(event) = event_for(&subscriber.options) else {
                return !subscriber.sender.is_closed();
            };
            match subscriber.sender.try_send(event) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("Position subscriber is not keeping up, dropping fix");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
        delivered
    }
}

#[async_trait]
impl LocationProvider for ChannelLocationProvider {
    async fn watch_position(
        &self,
        options: &TrackingOptions,
    ) -> Result<mpsc::Receiver<PositionEvent>, LocationError> {
        if self.permission_denied.load(Ordering::SeqCst) {
            return Err(LocationError::PermissionDenied);
        }

        let (sender, receiver) = mpsc::channel(PROVIDER_BUFFER);
        self.subscribers
            .lock()
            .map_err(|_| LocationError::PositionUnavailable("Provider state poisoned".into()))?
            .push(ProviderSubscriber {
                sender,
                options: *options,
            });
        Ok(receiver)
    }
}

/// Handle to one tracking subscription.
///
/// Clones refer to the same subscription. Dropping every clone stops it.
#[derive(Clone)]
pub struct TrackingHandle {
    id: Uuid,
    shutdown: Arc<watch::Sender<bool>>,
    events: Arc<Mutex<Option<broadcast::Sender<PositionEvent>>>>,
}

impl TrackingHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// New receiver for the event stream, or `None` once tracking ended.
    /// The stream closes when tracking stops.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<PositionEvent>> {
        self.events
            .lock()
            .ok()
            .and_then(|events| events.as_ref().map(broadcast::Sender::subscribe))
    }

    /// Cancels the subscription. Safe to call repeatedly.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
            || self
                .events
                .lock()
                .map(|events| events.is_none())
                .unwrap_or(true)
    }
}

impl std::fmt::Debug for TrackingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingHandle")
            .field("id", &self.id)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Starts and stops position subscriptions.
#[derive(Clone)]
pub struct PositionWatcher {
    provider: Arc<dyn LocationProvider>,
}

impl PositionWatcher {
    pub fn new(provider: Arc<dyn LocationProvider>) -> Self {
        Self { provider }
    }

    /// Subscribes to the provider and forwards every event to the handle's
    /// subscribers. A gap longer than `timeout_ms` emits a `Timeout` error
    /// and tracking continues. No retries and no resubscription.
    pub async fn start_tracking(
        &self,
        options: TrackingOptions,
    ) -> Result<TrackingHandle, LocationError> {
        let mut fixes = self.provider.watch_position(&options).await?;

        let id = Uuid::new_v4();
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        let events = Arc::new(Mutex::new(Some(sender)));
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let limit = (options.timeout_ms > 0).then(|| options.timeout());

        info!(
            tracking_id = %id,
            high_accuracy = options.high_accuracy,
            timeout_ms = options.timeout_ms,
            "Position tracking started"
        );

        let task_events = Arc::clone(&events);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        debug!(tracking_id = %id, "Position tracking cancelled");
                        break;
                    }
                    next = next_fix(&mut fixes, limit) => match next {
                        Ok(Some(event)) => emit(&task_events, event),
                        Ok(None) => {
                            debug!(tracking_id = %id, "Location provider closed the stream");
                            break;
                        }
                        Err(_) => emit(&task_events, Err(LocationError::Timeout(options.timeout_ms))),
                    }
                }
            }

            if let Ok(mut events) = task_events.lock() {
                events.take();
            }
            info!(tracking_id = %id, "Position tracking stopped");
        });

        Ok(TrackingHandle {
            id,
            shutdown: Arc::new(shutdown),
            events,
        })
    }

    /// Cancels tracking. Idempotent.
    pub fn stop_tracking(&self, handle: &TrackingHandle) {
        handle.stop();
    }
}

async fn next_fix(
    fixes: &mut mpsc::Receiver<PositionEvent>,
    limit: Option<Duration>,
) -> Result<Option<PositionEvent>, Elapsed> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fixes.recv()).await,
        None => Ok(fixes.recv().await),
    }
}

fn emit(events: &Mutex<Option<broadcast::Sender<PositionEvent>>>, event: PositionEvent) {
    if let Ok(events) = events.lock() {
        if let Some(sender) = events.as_ref() {
            // No subscribers is fine; the event is simply not observed.
            let _ = sender.send(event);
        }
    }
}
