//! HTTP route handlers.

pub mod admin;
pub mod alerts;
pub mod health;
pub mod network;
pub mod positions;
pub mod tracking;
pub mod zones;
