//! Domain models for tourist safety.

pub mod alert;
pub mod position;
pub mod zone;

pub use alert::{
    AlertCategory, AlertDraft, AlertError, AlertRecord, DeliveryStatus, GeoPoint, Severity,
};
pub use position::{LocationError, PositionHistory, PositionSample, TrackingOptions};
pub use zone::{Zone, ZoneCategory, ZoneTransition};
