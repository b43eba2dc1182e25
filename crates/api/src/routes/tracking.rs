//! Tracking endpoint handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::{PositionSample, TrackingOptions, Zone};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartTrackingRequest {
    #[validate(
        custom(function = "shared::validation::validate_not_blank"),
        length(max = 128, message = "Subject id must be at most 128 characters")
    )]
    pub subject_id: String,

    pub high_accuracy: Option<bool>,

    #[validate(range(max = 600_000, message = "timeoutMs must be at most 600000"))]
    pub timeout_ms: Option<u64>,

    pub max_sample_age_ms: Option<u64>,

    /// Location permission state reported by the device.
    #[serde(default = "default_permission_granted")]
    pub permission_granted: bool,
}

fn default_permission_granted() -> bool {
    true
}

impl StartTrackingRequest {
    fn options(&self, defaults: TrackingOptions) -> TrackingOptions {
        TrackingOptions {
            high_accuracy: self.high_accuracy.unwrap_or(defaults.high_accuracy),
            timeout_ms: self.timeout_ms.unwrap_or(defaults.timeout_ms),
            max_sample_age_ms: self.max_sample_age_ms.unwrap_or(defaults.max_sample_age_ms),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTrackingResponse {
    pub subject_id: String,
    pub tracking_id: Uuid,
    pub already_tracking: bool,
    pub options: TrackingOptions,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StopTrackingRequest {
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub subject_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopTrackingResponse {
    pub subject_id: String,
    pub stopped: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStatusResponse {
    pub subject_id: String,
    pub tracking: bool,
    pub current_zone: Option<Zone>,
    pub last_position: Option<PositionSample>,
}

/// Start tracking a subject.
///
/// POST /api/v1/tracking/start
pub async fn start_tracking(
    State(state): State<AppState>,
    Json(request): Json<StartTrackingRequest>,
) -> Result<(StatusCode, Json<StartTrackingResponse>), ApiError> {
    request.validate()?;

    let subject_id = request.subject_id.trim().to_string();
    let options = request.options(state.runtime.tracking_defaults());
    let started = state
        .runtime
        .start_tracking(&subject_id, options, request.permission_granted)
        .await?;

    let status = if started.already_tracking {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((
        status,
        Json(StartTrackingResponse {
            subject_id,
            tracking_id: started.tracking_id,
            already_tracking: started.already_tracking,
            options,
        }),
    ))
}

/// Stop tracking a subject. Stopping an untracked subject succeeds with
/// `stopped: false`.
///
/// POST /api/v1/tracking/stop
pub async fn stop_tracking(
    State(state): State<AppState>,
    Json(request): Json<StopTrackingRequest>,
) -> Result<Json<StopTrackingResponse>, ApiError> {
    request.validate()?;

    let subject_id = request.subject_id.trim().to_string();
    let stopped = state.runtime.stop_tracking(&subject_id).await;

    Ok(Json(StopTrackingResponse {
        subject_id,
        stopped,
    }))
}

/// Tracking state, current zone and last fix of a subject.
///
/// GET /api/v1/tracking/:subject_id
pub async fn tracking_status(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> Json<TrackingStatusResponse> {
    let runtime = &state.runtime;
    let last_position = runtime
        .history(&subject_id)
        .and_then(|samples| samples.last().cloned());

    Json(TrackingStatusResponse {
        tracking: runtime.is_tracking(&subject_id).await,
        current_zone: runtime.current_zone(&subject_id),
        last_position,
        subject_id,
    })
}
