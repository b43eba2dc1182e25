//! Shared utilities for the tourist safety workspace.
//!
//! This crate provides functionality used by every other crate:
//! - Coordinate and sensor range validation
//! - Great-circle distance between coordinates

pub mod distance;
pub mod validation;
