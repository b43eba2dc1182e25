//! Zone matching and transition detection.
//!
//! `evaluate` is a pure function of the current sample, the zone list and the
//! previously matched zone. `ZoneTracker` keeps that previous zone per
//! tracked subject.

use std::collections::{HashMap, HashSet};
use thiserror::Error;
use validator::Validate;

use crate::models::{PositionSample, Zone, ZoneTransition};

/// Configuration faults detected while matching.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZoneError {
    #[error("Invalid zone '{id}': {message}")]
    InvalidZone { id: String, message: String },

    #[error("Duplicate zone id: {0}")]
    DuplicateZone(String),

    #[error("Invalid position sample: {0}")]
    InvalidSample(String),
}

/// Result of evaluating one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneEvaluation {
    pub current_zone_id: Option<String>,
    pub transition: ZoneTransition,
    /// Entered zone on `Enter`, left zone on `Exit`, current zone otherwise.
    pub zone: Option<Zone>,
}

fn describe(errors: validator::ValidationErrors) -> String {
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
    messages.join(", ")
}

/// Checks every zone's fields and that ids are unique.
pub fn validate_zones(zones: &[Zone]) -> Result<(), ZoneError> {
    let mut seen = HashSet::with_capacity(zones.len());
    for zone in zones {
        zone.validate().map_err(|e| ZoneError::InvalidZone {
            id: zone.id.clone(),
            message: describe(e),
        })?;
        if !seen.insert(zone.id.as_str()) {
            return Err(ZoneError::DuplicateZone(zone.id.clone()));
        }
    }
    Ok(())
}

/// Picks the zone containing the sample.
///
/// Overlaps resolve to the smallest radius, then the lowest zone id, so the
/// result never depends on list order.
fn best_match<'a>(sample: &PositionSample, zones: &'a [Zone]) -> Option<&'a Zone> {
    zones
        .iter()
        .filter(|zone| zone.contains(sample.latitude, sample.longitude))
        .min_by(|a, b| {
            a.radius_meters
                .total_cmp(&b.radius_meters)
                .then_with(|| a.id.cmp(&b.id))
        })
}

/// Evaluates zone membership for `sample` and the transition from
/// `previous_zone_id`.
pub fn evaluate(
    sample: &PositionSample,
    zones: &[Zone],
    previous_zone_id: Option<&str>,
) -> Result<ZoneEvaluation, ZoneError> {
    sample
        .validate()
        .map_err(|e| ZoneError::InvalidSample(describe(e)))?;
    validate_zones(zones)?;

    let current = best_match(sample, zones);

    let evaluation = match (previous_zone_id, current) {
        (previous, Some(zone)) if previous != Some(zone.id.as_str()) => ZoneEvaluation {
            current_zone_id: Some(zone.id.clone()),
            transition: ZoneTransition::Enter,
            zone: Some(zone.clone()),
        },
        (Some(previous), None) => ZoneEvaluation {
            current_zone_id: None,
            transition: ZoneTransition::Exit,
            zone: zones.iter().find(|z| z.id == previous).cloned(),
        },
        (_, current) => ZoneEvaluation {
            current_zone_id: current.map(|z| z.id.clone()),
            transition: ZoneTransition::None,
            zone: current.cloned(),
        },
    };

    Ok(evaluation)
}

/// Current zone per tracked subject.
#[derive(Debug, Default)]
pub struct ZoneTracker {
    membership: HashMap<String, String>,
}

impl ZoneTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates a sample for `subject_id` and records the new membership.
    pub fn observe(
        &mut self,
        subject_id: &str,
        sample: &PositionSample,
        zones: &[Zone],
    ) -> Result<ZoneEvaluation, ZoneError> {
        let previous = self.membership.get(subject_id).map(String::as_str);
        let evaluation = evaluate(sample, zones, previous)?;

        match &evaluation.current_zone_id {
            Some(zone_id) => {
                self.membership
                    .insert(subject_id.to_string(), zone_id.clone());
            }
            None => {
                self.membership.remove(subject_id);
            }
        }

        Ok(evaluation)
    }

    pub fn current(&self, subject_id: &str) -> Option<&str> {
        self.membership.get(subject_id).map(String::as_str)
    }

    /// Forgets the subject's membership (tracking stopped).
    pub fn clear(&mut self, subject_id: &str) {
        self.membership.remove(subject_id);
    }
}
