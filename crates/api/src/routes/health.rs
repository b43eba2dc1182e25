//! Health check endpoint handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::app::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: DatabaseHealth,
    pub relay: RelayHealth,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseHealth {
    pub configured: bool,
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RelayHealth {
    pub online: bool,
    pub queued_alerts: usize,
    pub queue_capacity: usize,
    pub tracked_subjects: usize,
}

/// Simple status response for liveness/readiness probes.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

async fn check_database(state: &AppState) -> DatabaseHealth {
    let Some(pool) = &state.pool else {
        return DatabaseHealth {
            configured: false,
            connected: false,
            latency_ms: None,
        };
    };

    let start = std::time::Instant::now();
    let connected = persistence::db::ping(pool).await.is_ok();
    DatabaseHealth {
        configured: true,
        connected,
        latency_ms: connected.then(|| start.elapsed().as_millis() as u64),
    }
}

/// Full health check.
///
/// An unreachable database degrades the service without failing it: alerts
/// fall back to the offline queue.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = check_database(&state).await;
    let runtime = &state.runtime;

    let relay = RelayHealth {
        online: runtime.network().is_online(),
        queued_alerts: runtime.queue().len().await.unwrap_or(0),
        queue_capacity: runtime.queue().capacity(),
        tracked_subjects: runtime.tracked_count().await,
    };

    let healthy = !database.configured || database.connected;
    Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        relay,
    })
}

/// Liveness probe endpoint.
pub async fn live() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe: 503 while a configured database is unreachable.
pub async fn ready(State(state): State<AppState>) -> Result<Json<StatusResponse>, StatusCode> {
    let database = check_database(&state).await;

    if database.configured && !database.connected {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(StatusResponse {
        status: "ready".to_string(),
    }))
}
