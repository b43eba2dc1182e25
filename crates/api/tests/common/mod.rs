//! Common test utilities for integration tests.
//!
//! The app is wired with an in-memory offline queue and a mock alert sink,
//! so these tests run without a database.

// Not every helper is used by every test binary.
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use domain::services::{MemoryOfflineQueue, MockAlertSink};
use std::sync::Arc;
use std::time::Duration;
use tourist_safety_api::{
    app::create_app,
    config::{
        Config, DatabaseConfig, LoggingConfig, RelayConfig, SecurityConfig, ServerConfig,
        TrackingConfig, ZoneConfig,
    },
    services::{RuntimeOptions, SafetyRuntime},
};

pub const MARKET_LATITUDE: f64 = 11.030;
pub const MARKET_LONGITUDE: f64 = 76.992;
pub const PLACEHOLDER_LATITUDE: f64 = 11.0168;
pub const PLACEHOLDER_LONGITUDE: f64 = 76.9558;

/// Test configuration with a single high-risk zone and no database.
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        },
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 5,
            idle_timeout_secs: 600,
        },
        logging: LoggingConfig {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig::default(),
        tracking: TrackingConfig {
            // No fix timeouts while tests wait on each other.
            timeout_ms: 0,
            ..TrackingConfig::default()
        },
        relay: RelayConfig {
            queue_capacity: 5,
            placeholder_latitude: PLACEHOLDER_LATITUDE,
            placeholder_longitude: PLACEHOLDER_LONGITUDE,
            ..RelayConfig::default()
        },
        zones: vec![ZoneConfig {
            id: "market".to_string(),
            name: "Night Market".to_string(),
            latitude: MARKET_LATITUDE,
            longitude: MARKET_LONGITUDE,
            radius_meters: 20.0,
            category: domain::models::ZoneCategory::HighRisk,
            description: "Pickpocketing reported".to_string(),
        }],
    }
}

pub struct TestApp {
    pub router: Router,
    pub runtime: Arc<SafetyRuntime>,
    pub sink: Arc<MockAlertSink>,
    pub queue: Arc<MemoryOfflineQueue>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let sink = Arc::new(MockAlertSink::new());
        let queue = Arc::new(MemoryOfflineQueue::new(config.relay.queue_capacity));
        let runtime = Arc::new(
            SafetyRuntime::new(
                RuntimeOptions::from_config(&config),
                sink.clone(),
                queue.clone(),
            )
            .expect("test zones are valid"),
        );
        runtime.start().await;

        Self {
            router: create_app(config, runtime.clone(), None),
            runtime,
            sink,
            queue,
        }
    }

    /// Polls `condition` for up to a second.
    pub async fn wait_for(&self, condition: impl Fn(&Self) -> bool) -> bool {
        for _ in 0..100 {
            if condition(self) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        condition(self)
    }
}

/// Create a JSON request.
pub fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Parse response body as JSON.
pub async fn parse_response_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
}
