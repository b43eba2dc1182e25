use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use persistence::repositories::AlertRepository;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{admin, alerts, health, network, positions, tracking, zones};
use crate::services::SafetyRuntime;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub runtime: Arc<SafetyRuntime>,
    /// Absent when no database is configured.
    pub pool: Option<PgPool>,
    pub alerts: Option<AlertRepository>,
}

pub fn create_app(config: Config, runtime: Arc<SafetyRuntime>, pool: Option<PgPool>) -> Router {
    let config = Arc::new(config);

    let state = AppState {
        config: config.clone(),
        runtime,
        alerts: pool.clone().map(AlertRepository::new),
        pool,
    };

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let tracking_routes = Router::new()
        .route("/api/v1/zones", get(zones::list_zones))
        .route("/api/v1/zones/:zone_id", get(zones::get_zone))
        .route("/api/v1/tracking/start", post(tracking::start_tracking))
        .route("/api/v1/tracking/stop", post(tracking::stop_tracking))
        .route("/api/v1/tracking/:subject_id", get(tracking::tracking_status))
        .route("/api/v1/positions", post(positions::report_position))
        .route(
            "/api/v1/positions/errors",
            post(positions::report_location_error),
        )
        .route(
            "/api/v1/positions/history",
            get(positions::position_history),
        );

    let alert_routes = Router::new()
        .route("/api/v1/alerts", post(alerts::send_alert))
        .route("/api/v1/alerts/offline", get(alerts::list_offline_alerts))
        .route("/api/v1/alerts/replay", post(alerts::replay_offline_alerts))
        .route(
            "/api/v1/network",
            get(network::network_status).put(network::set_network_status),
        );

    let admin_routes = Router::new()
        .route("/api/v1/admin/alert-feed", get(admin::alert_feed))
        .route("/api/v1/admin/alerts", get(admin::list_stored_alerts))
        .route(
            "/api/v1/admin/alerts/:alert_id",
            get(admin::get_stored_alert),
        );

    // Public routes
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(tracking_routes)
        .merge(alert_routes)
        .merge(admin_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
