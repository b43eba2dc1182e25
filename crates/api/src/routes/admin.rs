//! Admin API routes.
//!
//! The alert feed lists alerts that went through the offline path. The
//! stored-alert endpoints read the backend and need a database.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use domain::models::AlertRecord;
use persistence::repositories::AlertRepository;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;

const DEFAULT_ALERT_LIMIT: i64 = 50;
const MAX_ALERT_LIMIT: i64 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    /// Fold the offline queue into the feed before answering.
    #[serde(default)]
    pub reconcile: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoredAlertsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AlertListResponse {
    pub alerts: Vec<AlertRecord>,
    pub count: usize,
}

/// GET /api/v1/admin/alert-feed
///
/// Newest first, deduplicated by alert id.
pub async fn alert_feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<AlertListResponse>, ApiError> {
    let feed = state.runtime.feed();

    if query.reconcile {
        let changed = feed.reconcile(state.runtime.queue().as_ref()).await?;
        debug!(changed = changed, "Admin feed reconciled on request");
    }

    let alerts = feed.snapshot();
    Ok(Json(AlertListResponse {
        count: alerts.len(),
        alerts,
    }))
}

fn repository(state: &AppState) -> Result<&AlertRepository, ApiError> {
    state
        .alerts
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Alert backend is not configured".into()))
}

/// GET /api/v1/admin/alerts
///
/// Alerts stored by the backend, newest first.
pub async fn list_stored_alerts(
    State(state): State<AppState>,
    Query(query): Query<StoredAlertsQuery>,
) -> Result<Json<AlertListResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_ALERT_LIMIT);
    if !(1..=MAX_ALERT_LIMIT).contains(&limit) {
        return Err(ApiError::Validation(format!(
            "limit: must be between 1 and {MAX_ALERT_LIMIT}"
        )));
    }

    let alerts = repository(&state)?.find_recent(limit).await?;
    Ok(Json(AlertListResponse {
        count: alerts.len(),
        alerts,
    }))
}

/// GET /api/v1/admin/alerts/:alert_id
pub async fn get_stored_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<Uuid>,
) -> Result<Json<AlertRecord>, ApiError> {
    repository(&state)?
        .find_by_alert_id(alert_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Alert {alert_id} not found")))
}
