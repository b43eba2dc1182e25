//! Alert database entity.

use chrono::{DateTime, Utc};
use domain::models::{AlertCategory, AlertRecord, DeliveryStatus, GeoPoint, Severity};
use sqlx::FromRow;
use uuid::Uuid;

/// Database entity for the alerts table.
#[derive(Debug, Clone, FromRow)]
pub struct AlertEntity {
    pub id: i64,
    pub alert_id: Uuid,
    pub subject_id: String,
    pub category: String,
    pub severity: String,
    pub message: String,
    pub latitude: f64,
    pub longitude: f64,
    pub location_approximate: bool,
    pub zone_id: Option<String>,
    pub status: String,
    pub offline: bool,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

fn decode_error(column: &str, value: &str) -> sqlx::Error {
    sqlx::Error::Decode(format!("unknown {column} value '{value}'").into())
}

impl TryFrom<AlertEntity> for AlertRecord {
    type Error = sqlx::Error;

    fn try_from(entity: AlertEntity) -> Result<Self, Self::Error> {
        let category = AlertCategory::parse(&entity.category)
            .ok_or_else(|| decode_error("category", &entity.category))?;
        let severity = Severity::parse(&entity.severity)
            .ok_or_else(|| decode_error("severity", &entity.severity))?;
        let status = DeliveryStatus::parse(&entity.status)
            .ok_or_else(|| decode_error("status", &entity.status))?;

        Ok(Self {
            id: entity.alert_id,
            subject_id: entity.subject_id,
            category,
            severity,
            message: entity.message,
            location: GeoPoint::new(entity.latitude, entity.longitude),
            location_approximate: entity.location_approximate,
            zone_id: entity.zone_id,
            created_at: entity.created_at,
            status,
            offline: entity.offline,
            attempts: entity.attempts.max(0) as u32,
        })
    }
}
