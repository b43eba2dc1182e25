//! Alert repository and backend alert sink.

use async_trait::async_trait;
use domain::models::AlertRecord;
use domain::services::{AlertSink, DeliveryError};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::entities::AlertEntity;
use crate::metrics::QueryTimer;

/// Repository for alert database operations.
#[derive(Clone)]
pub struct AlertRepository {
    pool: PgPool,
}

impl AlertRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a record, ignoring one whose `alert_id` is already stored.
    ///
    /// Returns whether a row was created.
    pub async fn insert(&self, record: &AlertRecord) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("insert_alert");

        let result = sqlx::query(
            r#"
            INSERT INTO alerts (
                alert_id, subject_id, category, severity, message,
                latitude, longitude, location_approximate, zone_id,
                status, offline, attempts, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (alert_id) DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(&record.subject_id)
        .bind(record.category.as_str())
        .bind(record.severity.as_str())
        .bind(&record.message)
        .bind(record.location.latitude)
        .bind(record.location.longitude)
        .bind(record.location_approximate)
        .bind(record.zone_id.as_deref())
        .bind(record.status.as_str())
        .bind(record.offline)
        .bind(i32::try_from(record.attempts).unwrap_or(i32::MAX))
        .bind(record.created_at)
        .execute(&self.pool)
        .await;

        timer.record();
        Ok(result?.rows_affected() > 0)
    }

    /// Finds an alert by its record id.
    pub async fn find_by_alert_id(&self, alert_id: Uuid) -> Result<Option<AlertRecord>, sqlx::Error> {
        let timer = QueryTimer::new("find_alert_by_id");

        let entity = sqlx::query_as::<_, AlertEntity>(
            r#"
            SELECT * FROM alerts
            WHERE alert_id = $1
            "#,
        )
        .bind(alert_id)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        entity?.map(AlertRecord::try_from).transpose()
    }

    /// Most recently received alerts, newest first.
    pub async fn find_recent(&self, limit: i64) -> Result<Vec<AlertRecord>, sqlx::Error> {
        let timer = QueryTimer::new("find_recent_alerts");

        let entities = sqlx::query_as::<_, AlertEntity>(
            r#"
            SELECT * FROM alerts
            ORDER BY received_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await;

        timer.record();
        entities?.into_iter().map(AlertRecord::try_from).collect()
    }
}

#[async_trait]
impl AlertSink for AlertRepository {
    async fn deliver(&self, record: &AlertRecord) -> Result<(), DeliveryError> {
        match self.insert(record).await {
            Ok(created) => {
                if !created {
                    debug!(record_id = %record.id, "Alert already stored, treating as delivered");
                }
                Ok(())
            }
            Err(sqlx::Error::Database(e)) => Err(DeliveryError::Rejected(e.to_string())),
            Err(e) => Err(DeliveryError::Unavailable(e.to_string())),
        }
    }
}
