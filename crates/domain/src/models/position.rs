//! Position domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;
use validator::Validate;

use super::alert::GeoPoint;

/// Default number of samples kept for display.
pub const DEFAULT_HISTORY_SIZE: usize = 100;

/// A single device fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PositionSample {
    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,

    #[validate(custom(function = "shared::validation::validate_accuracy"))]
    pub accuracy_meters: f64,

    #[validate(custom(function = "shared::validation::validate_speed"))]
    pub speed_mps: Option<f64>,

    #[validate(custom(function = "shared::validation::validate_heading"))]
    pub heading_degrees: Option<f64>,

    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,

    #[validate(custom(function = "shared::validation::validate_battery_level"))]
    pub battery_level: Option<i32>,
}

impl PositionSample {
    /// Creates a sample captured now with only the required fields set.
    pub fn new(latitude: f64, longitude: f64, accuracy_meters: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters,
            speed_mps: None,
            heading_degrees: None,
            captured_at: Utc::now(),
            battery_level: None,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Options forwarded to the platform location provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingOptions {
    #[serde(default = "default_high_accuracy")]
    pub high_accuracy: bool,

    /// Maximum wait for the next fix before a timeout error is reported.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum age of a cached fix the provider may hand out.
    #[serde(default = "default_max_sample_age_ms")]
    pub max_sample_age_ms: u64,
}

fn default_high_accuracy() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_sample_age_ms() -> u64 {
    5_000
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            high_accuracy: default_high_accuracy(),
            timeout_ms: default_timeout_ms(),
            max_sample_age_ms: default_max_sample_age_ms(),
        }
    }
}

impl TrackingOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn max_sample_age(&self) -> Duration {
        Duration::from_millis(self.max_sample_age_ms)
    }
}

/// Errors reported by the location provider. Never retried by the watcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Position unavailable: {0}")]
    PositionUnavailable(String),

    #[error("No position fix within {0}ms")]
    Timeout(u64),
}

impl LocationError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            LocationError::PermissionDenied => "permission_denied",
            LocationError::PositionUnavailable(_) => "position_unavailable",
            LocationError::Timeout(_) => "timeout",
        }
    }
}

/// Bounded most-recent-N buffer of samples, oldest first.
#[derive(Debug, Clone)]
pub struct PositionHistory {
    samples: VecDeque<PositionSample>,
    capacity: usize,
}

impl PositionHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a sample, dropping the oldest one when full.
    pub fn push(&mut self, sample: PositionSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn latest(&self) -> Option<&PositionSample> {
        self.samples.back()
    }

    pub fn samples(&self) -> Vec<PositionSample> {
        self.samples.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for PositionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}
