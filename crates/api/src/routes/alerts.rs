//! Alert endpoint handlers.

use axum::{extract::State, http::StatusCode, Json};
use domain::models::{AlertDraft, AlertRecord};
use domain::services::ReplaySummary;
use serde::Serialize;
use tracing::info;

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAlertResponse {
    pub alert: AlertRecord,
    pub delivered: bool,
    /// Confirmation shown to the user.
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineAlertsResponse {
    pub alerts: Vec<AlertRecord>,
    pub count: usize,
    pub capacity: usize,
}

/// Raise an alert. Delivery failures are not errors: the alert is queued
/// offline and the response says so.
///
/// POST /api/v1/alerts
pub async fn send_alert(
    State(state): State<AppState>,
    Json(draft): Json<AlertDraft>,
) -> Result<(StatusCode, Json<SendAlertResponse>), ApiError> {
    let outcome = state.runtime.relay().send(draft).await?;

    let delivered = outcome.is_delivered();
    let message = outcome.user_message();
    let alert = outcome.into_record();

    info!(
        alert_id = %alert.id,
        subject_id = %alert.subject_id,
        category = %alert.category,
        delivered = delivered,
        "Alert raised"
    );

    Ok((
        StatusCode::CREATED,
        Json(SendAlertResponse {
            alert,
            delivered,
            message,
        }),
    ))
}

/// Alerts waiting in the offline queue, oldest first.
///
/// GET /api/v1/alerts/offline
pub async fn list_offline_alerts(
    State(state): State<AppState>,
) -> Result<Json<OfflineAlertsResponse>, ApiError> {
    let queue = state.runtime.queue();
    let alerts = queue.list().await?;

    Ok(Json(OfflineAlertsResponse {
        count: alerts.len(),
        capacity: queue.capacity(),
        alerts,
    }))
}

/// Replay the offline queue now.
///
/// POST /api/v1/alerts/replay
pub async fn replay_offline_alerts(State(state): State<AppState>) -> Json<ReplaySummary> {
    Json(state.runtime.relay().replay_queued().await)
}
