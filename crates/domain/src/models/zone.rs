//! Zone domain model.
//!
//! A zone is a named circular region with a risk category. Zones are static
//! configuration for a tracking session.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Risk category of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneCategory {
    Safe,
    Caution,
    HighRisk,
    Restricted,
}

impl ZoneCategory {
    /// Converts to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneCategory::Safe => "safe",
            ZoneCategory::Caution => "caution",
            ZoneCategory::HighRisk => "high_risk",
            ZoneCategory::Restricted => "restricted",
        }
    }

    /// Parses from string representation (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "safe" => Some(ZoneCategory::Safe),
            "caution" => Some(ZoneCategory::Caution),
            "high_risk" => Some(ZoneCategory::HighRisk),
            "restricted" => Some(ZoneCategory::Restricted),
            _ => None,
        }
    }
}

impl std::fmt::Display for ZoneCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Zone membership change between two consecutive samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneTransition {
    Enter,
    Exit,
    None,
}

impl ZoneTransition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneTransition::Enter => "enter",
            ZoneTransition::Exit => "exit",
            ZoneTransition::None => "none",
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, ZoneTransition::None)
    }
}

impl std::fmt::Display for ZoneTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named circular region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    #[validate(
        custom(function = "shared::validation::validate_not_blank"),
        length(max = 128, message = "Zone id must be at most 128 characters")
    )]
    pub id: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,

    #[validate(custom(function = "shared::validation::validate_radius"))]
    pub radius_meters: f64,

    pub category: ZoneCategory,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    #[serde(default)]
    pub description: String,
}

impl Zone {
    /// Great-circle distance in meters from the zone center.
    pub fn distance_to(&self, latitude: f64, longitude: f64) -> f64 {
        shared::distance::haversine_meters(self.latitude, self.longitude, latitude, longitude)
    }

    /// Whether a coordinate lies inside the zone (boundary inclusive).
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        self.distance_to(latitude, longitude) <= self.radius_meters
    }
}
