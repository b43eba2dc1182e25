//! Alert domain model.
//!
//! An `AlertRecord` is the unit of delivery between the relay, the backend
//! and the offline queue. Records are built from a validated `AlertDraft`,
//! either by the geofence session on a zone transition or by a user action.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use super::position::PositionSample;
use super::zone::{Zone, ZoneCategory, ZoneTransition};

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// What the alert is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Emergency,
    Medical,
    Security,
    Assistance,
    ZoneEntry,
    ZoneExit,
}

impl AlertCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCategory::Emergency => "emergency",
            AlertCategory::Medical => "medical",
            AlertCategory::Security => "security",
            AlertCategory::Assistance => "assistance",
            AlertCategory::ZoneEntry => "zone_entry",
            AlertCategory::ZoneExit => "zone_exit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "emergency" => Some(AlertCategory::Emergency),
            "medical" => Some(AlertCategory::Medical),
            "security" => Some(AlertCategory::Security),
            "assistance" => Some(AlertCategory::Assistance),
            "zone_entry" => Some(AlertCategory::ZoneEntry),
            "zone_exit" => Some(AlertCategory::ZoneExit),
            _ => None,
        }
    }

    /// Severity used when a user-initiated alert does not pick one.
    pub fn default_severity(&self) -> Severity {
        match self {
            AlertCategory::Emergency | AlertCategory::Medical => Severity::Critical,
            AlertCategory::Security => Severity::High,
            AlertCategory::Assistance => Severity::Medium,
            AlertCategory::ZoneEntry | AlertCategory::ZoneExit => Severity::Low,
        }
    }
}

impl std::fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Alert severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    /// Severity of a zone transition alert.
    ///
    /// Entering a zone is graded by the zone category; leaving any zone is low.
    pub fn for_zone_transition(category: ZoneCategory, transition: ZoneTransition) -> Self {
        match transition {
            ZoneTransition::Enter => match category {
                ZoneCategory::Safe => Severity::Low,
                ZoneCategory::Caution => Severity::Medium,
                ZoneCategory::Restricted => Severity::High,
                ZoneCategory::HighRisk => Severity::Critical,
            },
            ZoneTransition::Exit | ZoneTransition::None => Severity::Low,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Delivery state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Created, no delivery attempted yet.
    Pending,
    /// Accepted by the backend.
    Delivered,
    /// Held in the local queue awaiting replay.
    QueuedOffline,
    /// Held in the local queue; the last replay attempt failed.
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::QueuedOffline => "queued_offline",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DeliveryStatus::Pending),
            "delivered" => Some(DeliveryStatus::Delivered),
            "queued_offline" => Some(DeliveryStatus::QueuedOffline),
            "failed" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised while building an alert.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlertError {
    #[error("Invalid alert: {0}")]
    Validation(String),
}

impl From<validator::ValidationErrors> for AlertError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    let message = e.message.as_ref().map(|m| m.to_string()).unwrap_or_default();
                    format!("{}: {}", field, message)
                })
            })
            .collect();
        messages.sort();
        AlertError::Validation(messages.join(", "))
    }
}

/// Upper bound on an alert message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Unvalidated alert input, from a panic button or a zone transition.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AlertDraft {
    #[validate(
        custom(function = "shared::validation::validate_not_blank"),
        length(max = 128, message = "Subject id must be at most 128 characters")
    )]
    pub subject_id: String,

    pub category: AlertCategory,

    /// Explicit severity; derived from the category when absent.
    #[serde(default)]
    pub severity: Option<Severity>,

    #[validate(length(max = 1000, message = "Message must be at most 1000 characters"))]
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub location: Option<GeoPoint>,

    #[serde(default)]
    pub zone_id: Option<String>,
}

impl AlertDraft {
    /// Draft for a user-initiated alert.
    pub fn user_action(
        subject_id: impl Into<String>,
        category: AlertCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            category,
            severity: None,
            message: message.into(),
            location: None,
            zone_id: None,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    /// Draft for a zone transition, or `None` when nothing changed.
    pub fn zone_transition(
        subject_id: impl Into<String>,
        zone: &Zone,
        transition: ZoneTransition,
        sample: &PositionSample,
    ) -> Option<Self> {
        let (category, message) = match transition {
            ZoneTransition::Enter => {
                let mut message = format!("Entered {} zone: {}", zone.category, zone.name);
                if !zone.description.is_empty() {
                    message.push_str(". ");
                    message.push_str(&zone.description);
                }
                (AlertCategory::ZoneEntry, truncate_chars(message, MAX_MESSAGE_CHARS))
            }
            ZoneTransition::Exit => (
                AlertCategory::ZoneExit,
                truncate_chars(format!("Left zone: {}", zone.name), MAX_MESSAGE_CHARS),
            ),
            ZoneTransition::None => return None,
        };

        Some(Self {
            subject_id: subject_id.into(),
            category,
            severity: Some(Severity::for_zone_transition(zone.category, transition)),
            message,
            location: Some(sample.point()),
            zone_id: Some(zone.id.clone()),
        })
    }

    /// Runs field validation, including the optional location.
    pub fn check(&self) -> Result<(), AlertError> {
        self.validate()?;
        if let Some(location) = &self.location {
            location.validate()?;
        }
        Ok(())
    }
}

fn truncate_chars(mut text: String, max: usize) -> String {
    if let Some((cut, _)) = text.char_indices().nth(max) {
        text.truncate(cut);
    }
    text
}

/// A single alert awaiting or past delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub id: Uuid,
    pub subject_id: String,
    pub category: AlertCategory,
    pub severity: Severity,
    pub message: String,
    pub location: GeoPoint,
    /// Location came from a last-known fix or the configured placeholder.
    pub location_approximate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: DeliveryStatus,
    pub offline: bool,
    #[serde(default)]
    pub attempts: u32,
}

impl AlertRecord {
    /// Validates a draft and turns it into a pending record.
    ///
    /// `fallback` is used when the draft carries no location; the record is
    /// then flagged as approximate.
    pub fn from_draft(draft: AlertDraft, fallback: GeoPoint) -> Result<Self, AlertError> {
        draft.check()?;

        let (location, location_approximate) = match draft.location {
            Some(location) => (location, false),
            None => (fallback, true),
        };
        let severity = draft
            .severity
            .unwrap_or_else(|| draft.category.default_severity());

        Ok(Self {
            id: Uuid::new_v4(),
            subject_id: draft.subject_id.trim().to_string(),
            category: draft.category,
            severity,
            message: draft.message,
            location,
            location_approximate,
            zone_id: draft.zone_id,
            created_at: Utc::now(),
            status: DeliveryStatus::Pending,
            offline: false,
            attempts: 0,
        })
    }

    pub fn mark_delivered(&mut self) {
        self.status = DeliveryStatus::Delivered;
        self.attempts += 1;
    }

    pub fn mark_queued_offline(&mut self) {
        self.status = DeliveryStatus::QueuedOffline;
        self.offline = true;
    }

    /// Records a failed replay attempt; the record stays queued.
    pub fn mark_failed_attempt(&mut self) {
        self.status = DeliveryStatus::Failed;
        self.attempts += 1;
    }
}
