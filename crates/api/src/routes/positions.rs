//! Position endpoint handlers.
//!
//! Devices push their fixes here; each fix is handed to the subject's
//! location provider and flows through the geofence session.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use domain::models::{LocationError, PositionSample};
use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PositionReport {
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub subject_id: String,

    #[serde(flatten)]
    pub sample: PositionSample,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionAccepted {
    pub subject_id: String,
    /// False when the fix was too old to be handed out.
    pub accepted: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LocationErrorReport {
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub subject_id: String,

    /// One of `permission_denied`, `position_unavailable`, `timeout`.
    pub code: String,

    #[serde(default)]
    pub message: Option<String>,
}

impl LocationErrorReport {
    fn to_error(&self) -> Result<LocationError, ApiError> {
        match self.code.as_str() {
            "permission_denied" => Ok(LocationError::PermissionDenied),
            "position_unavailable" => Ok(LocationError::PositionUnavailable(
                self.message.clone().unwrap_or_default(),
            )),
            "timeout" => Ok(LocationError::Timeout(0)),
            other => Err(ApiError::Validation(format!(
                "code: unknown location error '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub subject_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub subject_id: String,
    pub positions: Vec<PositionSample>,
    pub count: usize,
}

/// Push a device fix for a tracked subject.
///
/// POST /api/v1/positions
pub async fn report_position(
    State(state): State<AppState>,
    Json(report): Json<PositionReport>,
) -> Result<(StatusCode, Json<PositionAccepted>), ApiError> {
    report.validate()?;
    report.sample.validate()?;

    let subject_id = report.subject_id.trim().to_string();
    let delivered = state
        .runtime
        .push_position(&subject_id, report.sample)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Subject {subject_id} is not tracked")))?;

    debug!(subject_id = %subject_id, delivered = delivered, "Position reported");
    Ok((
        StatusCode::ACCEPTED,
        Json(PositionAccepted {
            subject_id,
            accepted: delivered > 0,
        }),
    ))
}

/// Report a device-side location failure for a tracked subject.
///
/// POST /api/v1/positions/errors
pub async fn report_location_error(
    State(state): State<AppState>,
    Json(report): Json<LocationErrorReport>,
) -> Result<StatusCode, ApiError> {
    report.validate()?;
    let error = report.to_error()?;

    let subject_id = report.subject_id.trim();
    state
        .runtime
        .report_location_error(subject_id, error)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Subject {subject_id} is not tracked")))?;

    Ok(StatusCode::ACCEPTED)
}

/// Recent fixes of a subject, oldest first.
///
/// GET /api/v1/positions/history?subjectId=
pub async fn position_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let positions = state
        .runtime
        .history(&query.subject_id)
        .ok_or_else(|| ApiError::NotFound(format!("No history for {}", query.subject_id)))?;

    Ok(Json(HistoryResponse {
        subject_id: query.subject_id,
        count: positions.len(),
        positions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_position_report_flattens_sample() {
        let report: PositionReport = serde_json::from_value(json!({
            "subjectId": "tourist-1",
            "latitude": 11.03,
            "longitude": 76.992,
            "accuracyMeters": 8.5,
            "batteryLevel": 40
        }))
        .unwrap();

        assert_eq!(report.subject_id, "tourist-1");
        assert_eq!(report.sample.accuracy_meters, 8.5);
        assert_eq!(report.sample.battery_level, Some(40));
        assert!(report.sample.validate().is_ok());
    }

    #[test]
    fn test_unknown_error_code_is_rejected() {
        let report = LocationErrorReport {
            subject_id: "tourist-1".into(),
            code: "solar_flare".into(),
            message: None,
        };
        assert!(matches!(report.to_error(), Err(ApiError::Validation(_))));
    }
}
