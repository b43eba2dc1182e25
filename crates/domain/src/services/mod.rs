//! Domain services for tourist safety.
//!
//! Services contain the geofencing and alert relay logic that operates on
//! domain models. Platform and backend access sit behind traits so the
//! hosting runtime injects concrete implementations.

pub mod admin_feed;
pub mod alert_relay;
pub mod geofence_session;
pub mod local_bus;
pub mod network;
pub mod offline_queue;
pub mod position_watcher;
pub mod zone_matcher;

pub use admin_feed::AdminAlertFeed;
pub use alert_relay::{
    AlertRelay, AlertSink, DeliveryError, MockAlertSink, RelaySettings, ReplaySummary, SendOutcome,
};
pub use geofence_session::GeofenceSession;
pub use local_bus::{AlertPublisher, BroadcastAlertBus, LocalBusMessage, RecordingPublisher};
pub use network::NetworkMonitor;
pub use offline_queue::{MemoryOfflineQueue, OfflineQueue, QueueError, DEFAULT_QUEUE_CAPACITY};
pub use position_watcher::{
    ChannelLocationProvider, LocationProvider, PositionEvent, PositionWatcher, TrackingHandle,
};
pub use zone_matcher::{evaluate, validate_zones, ZoneError, ZoneEvaluation, ZoneTracker};
