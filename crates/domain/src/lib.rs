//! Domain layer for the tourist safety service.
//!
//! This crate contains:
//! - Domain models (Zone, PositionSample, AlertRecord)
//! - Geofencing and alert relay services
//! - Domain error types

pub mod models;
pub mod services;
