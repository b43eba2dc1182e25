//! Services owned by the HTTP process.

pub mod safety;

pub use safety::{RuntimeOptions, SafetyRuntime, TrackingStarted};
