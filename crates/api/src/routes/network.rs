//! Network status endpoint handlers.
//!
//! The device reports connectivity changes here. Going back online triggers
//! a replay of the offline queue.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct NetworkUpdate {
    pub online: bool,
}

#[derive(Debug, Serialize)]
pub struct NetworkStatus {
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<bool>,
}

/// GET /api/v1/network
pub async fn network_status(State(state): State<AppState>) -> Json<NetworkStatus> {
    Json(NetworkStatus {
        online: state.runtime.network().is_online(),
        changed: None,
    })
}

/// PUT /api/v1/network
pub async fn set_network_status(
    State(state): State<AppState>,
    Json(update): Json<NetworkUpdate>,
) -> Json<NetworkStatus> {
    let changed = state.runtime.network().set_online(update.online);
    Json(NetworkStatus {
        online: update.online,
        changed: Some(changed),
    })
}
