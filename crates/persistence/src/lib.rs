//! Persistence layer for the tourist safety service.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations, including the backend alert sink
//! - The file-backed offline alert queue

pub mod db;
pub mod entities;
pub mod metrics;
pub mod offline_queue;
pub mod repositories;

pub use offline_queue::FileOfflineQueue;
