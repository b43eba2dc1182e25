//! Zone endpoint handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use domain::models::Zone;
use serde::Serialize;

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZonesResponse {
    pub zones: Vec<Zone>,
    pub count: usize,
}

/// List configured zones.
///
/// GET /api/v1/zones
pub async fn list_zones(State(state): State<AppState>) -> Json<ZonesResponse> {
    let zones = state.runtime.zones().to_vec();
    Json(ZonesResponse {
        count: zones.len(),
        zones,
    })
}

/// Get one zone.
///
/// GET /api/v1/zones/:zone_id
pub async fn get_zone(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
) -> Result<Json<Zone>, ApiError> {
    state
        .runtime
        .zones()
        .iter()
        .find(|zone| zone.id == zone_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Zone {zone_id} not found")))
}
