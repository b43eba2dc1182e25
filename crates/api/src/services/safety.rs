//! Safety runtime: the explicitly constructed object owning every geofencing
//! and relay component for the lifetime of the process.

use domain::models::{
    LocationError, PositionHistory, PositionSample, TrackingOptions, Zone,
};
use domain::services::{
    validate_zones, AdminAlertFeed, AlertPublisher, AlertRelay, AlertSink, BroadcastAlertBus,
    ChannelLocationProvider, GeofenceSession, NetworkMonitor, OfflineQueue, PositionWatcher,
    RelaySettings, TrackingHandle, ZoneError, ZoneTracker,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;

const SESSION_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Construction parameters for [`SafetyRuntime`].
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub zones: Vec<Zone>,
    pub tracking: TrackingOptions,
    pub history_size: usize,
    pub relay: RelaySettings,
    pub feed_size: usize,
    pub bus_capacity: usize,
    pub start_online: bool,
}

impl RuntimeOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            zones: config.zones(),
            tracking: config.tracking_options(),
            history_size: config.tracking.history_size,
            relay: config.relay_settings(),
            feed_size: config.relay.feed_size,
            bus_capacity: config.relay.bus_capacity,
            start_online: config.relay.start_online,
        }
    }
}

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingStarted {
    pub tracking_id: Uuid,
    pub already_tracking: bool,
}

struct TrackedSubject {
    provider: Arc<ChannelLocationProvider>,
    handle: TrackingHandle,
    session: JoinHandle<()>,
}

pub struct SafetyRuntime {
    zones: Arc<Vec<Zone>>,
    tracking_defaults: TrackingOptions,
    history_size: usize,
    tracker: Arc<Mutex<ZoneTracker>>,
    relay: Arc<AlertRelay>,
    queue: Arc<dyn OfflineQueue>,
    bus: BroadcastAlertBus,
    feed: Arc<AdminAlertFeed>,
    network: NetworkMonitor,
    subjects: tokio::sync::Mutex<HashMap<String, TrackedSubject>>,
    histories: Mutex<HashMap<String, Arc<Mutex<PositionHistory>>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SafetyRuntime {
    /// Wires the components together. Fails on a malformed zone list.
    pub fn new(
        options: RuntimeOptions,
        sink: Arc<dyn AlertSink>,
        queue: Arc<dyn OfflineQueue>,
    ) -> Result<Self, ZoneError> {
        validate_zones(&options.zones)?;

        let bus = BroadcastAlertBus::new(options.bus_capacity);
        let network = NetworkMonitor::new(options.start_online);
        let publisher: Arc<dyn AlertPublisher> = Arc::new(bus.clone());
        let relay = Arc::new(AlertRelay::new(
            sink,
            queue.clone(),
            publisher,
            network.clone(),
            options.relay,
        ));

        Ok(Self {
            zones: Arc::new(options.zones),
            tracking_defaults: options.tracking,
            history_size: options.history_size,
            tracker: Arc::new(Mutex::new(ZoneTracker::new())),
            relay,
            queue,
            bus,
            feed: Arc::new(AdminAlertFeed::new(options.feed_size)),
            network,
            subjects: tokio::sync::Mutex::new(HashMap::new()),
            histories: Mutex::new(HashMap::new()),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Starts the bus listener and the reconnect replay, after folding alerts
    /// queued by a previous run into the admin feed.
    pub async fn start(&self) {
        match self.feed.reconcile(self.queue.as_ref()).await {
            Ok(restored) if restored > 0 => {
                info!(restored = restored, "Restored queued alerts into admin feed");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Could not read offline queue at startup"),
        }

        let listener = self.feed.spawn_listener(self.bus.subscribe());
        let replay = self.relay.spawn_reconnect_replay();

        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(listener);
            tasks.push(replay);
        }
        info!(zones = self.zones.len(), "Safety runtime started");
    }

    /// Stops every tracking session and background task.
    pub async fn shutdown(&self) {
        let subjects: Vec<String> = self.subjects.lock().await.keys().cloned().collect();
        for subject_id in subjects {
            self.stop_tracking(&subject_id).await;
        }

        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
        info!("Safety runtime stopped");
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn relay(&self) -> &Arc<AlertRelay> {
        &self.relay
    }

    pub fn feed(&self) -> &Arc<AdminAlertFeed> {
        &self.feed
    }

    pub fn queue(&self) -> &Arc<dyn OfflineQueue> {
        &self.queue
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    pub fn tracking_defaults(&self) -> TrackingOptions {
        self.tracking_defaults
    }

    /// Starts tracking a subject. Starting an already tracked subject is a
    /// no-op returning the existing subscription.
    pub async fn start_tracking(
        &self,
        subject_id: &str,
        options: TrackingOptions,
        permission_granted: bool,
    ) -> Result<TrackingStarted, LocationError> {
        let mut subjects = self.subjects.lock().await;

        if let Some(existing) = subjects.get(subject_id) {
            if !existing.handle.is_stopped() {
                return Ok(TrackingStarted {
                    tracking_id: existing.handle.id(),
                    already_tracking: true,
                });
            }
        }

        let provider = Arc::new(ChannelLocationProvider::new());
        provider.deny_permission(!permission_granted);

        let watcher = PositionWatcher::new(provider.clone());
        let handle = watcher.start_tracking(options).await?;
        let events = handle.subscribe().ok_or_else(|| {
            LocationError::PositionUnavailable("Tracking ended before it started".into())
        })?;

        let history = Arc::new(Mutex::new(PositionHistory::new(self.history_size)));
        if let Ok(mut histories) = self.histories.lock() {
            histories.insert(subject_id.to_string(), history.clone());
        }

        let session = GeofenceSession::new(
            subject_id,
            self.zones.clone(),
            self.tracker.clone(),
            self.relay.clone(),
            history,
        )
        .spawn(events);

        let started = TrackingStarted {
            tracking_id: handle.id(),
            already_tracking: false,
        };
        subjects.insert(
            subject_id.to_string(),
            TrackedSubject {
                provider,
                handle,
                session,
            },
        );

        info!(subject_id = %subject_id, tracking_id = %started.tracking_id, "Tracking started");
        Ok(started)
    }

    /// Stops tracking a subject. Returns false when it was not tracked.
    pub async fn stop_tracking(&self, subject_id: &str) -> bool {
        let Some(tracked) = self.subjects.lock().await.remove(subject_id) else {
            return false;
        };

        tracked.handle.stop();
        if tokio::time::timeout(SESSION_STOP_TIMEOUT, tracked.session)
            .await
            .is_err()
        {
            error!(subject_id = %subject_id, "Geofence session did not stop in time");
        }

        info!(subject_id = %subject_id, "Tracking stopped");
        true
    }

    pub async fn is_tracking(&self, subject_id: &str) -> bool {
        self.subjects
            .lock()
            .await
            .get(subject_id)
            .is_some_and(|tracked| !tracked.handle.is_stopped())
    }

    pub async fn tracked_count(&self) -> usize {
        self.subjects.lock().await.len()
    }

    /// Hands a device fix to the subject's provider. `None` when the subject
    /// is not tracked.
    pub async fn push_position(&self, subject_id: &str, sample: PositionSample) -> Option<usize> {
        let subjects = self.subjects.lock().await;
        subjects
            .get(subject_id)
            .map(|tracked| tracked.provider.feed(sample))
    }

    /// Hands a device-side location failure to the subject's provider.
    pub async fn report_location_error(
        &self,
        subject_id: &str,
        error: LocationError,
    ) -> Option<usize> {
        let subjects = self.subjects.lock().await;
        subjects
            .get(subject_id)
            .map(|tracked| tracked.provider.feed_error(error))
    }

    /// Recent samples, oldest first. Kept after tracking stops until the
    /// subject is tracked again.
    pub fn history(&self, subject_id: &str) -> Option<Vec<PositionSample>> {
        let history = self.histories.lock().ok()?.get(subject_id)?.clone();
        let samples = history.lock().ok()?.samples();
        Some(samples)
    }

    pub fn current_zone(&self, subject_id: &str) -> Option<Zone> {
        let zone_id = self
            .tracker
            .lock()
            .ok()?
            .current(subject_id)
            .map(str::to_string)?;
        self.zones.iter().find(|zone| zone.id == zone_id).cloned()
    }
}
