//! Offline alerts survive a restart when the queue lives on disk.

mod common;

use axum::http::{Method, StatusCode};
use common::{get_request, json_request, parse_response_body, test_config};
use domain::services::MockAlertSink;
use persistence::FileOfflineQueue;
use serde_json::json;
use std::sync::Arc;
use tourist_safety_api::{
    app::create_app,
    services::{RuntimeOptions, SafetyRuntime},
};
use tower::ServiceExt;

async fn boot(
    queue_path: &std::path::Path,
    sink: Arc<MockAlertSink>,
) -> (axum::Router, Arc<SafetyRuntime>) {
    let config = test_config();
    let queue = Arc::new(FileOfflineQueue::new(queue_path, config.relay.queue_capacity));
    let runtime = Arc::new(
        SafetyRuntime::new(RuntimeOptions::from_config(&config), sink, queue).unwrap(),
    );
    runtime.start().await;
    (create_app(config, runtime.clone(), None), runtime)
}

#[tokio::test]
async fn test_queued_alert_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let queue_path = dir.path().join("offline_alerts.json");

    let sink = Arc::new(MockAlertSink::failing());
    let (router, runtime) = boot(&queue_path, sink.clone()).await;

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/alerts",
            json!({ "subjectId": "tourist-1", "category": "emergency", "message": "Stuck" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let alert_id = parse_response_body(response).await["alert"]["id"].clone();
    runtime.shutdown().await;

    // Second process: the feed is rebuilt from disk and the backend is back.
    let sink = Arc::new(MockAlertSink::new());
    let (router, runtime) = boot(&queue_path, sink.clone()).await;

    let response = router
        .clone()
        .oneshot(get_request("/api/v1/admin/alert-feed"))
        .await
        .unwrap();
    let feed = parse_response_body(response).await;
    assert_eq!(feed["count"], 1);
    assert_eq!(feed["alerts"][0]["id"], alert_id);

    let response = router
        .clone()
        .oneshot(json_request(Method::POST, "/api/v1/alerts/replay", json!({})))
        .await
        .unwrap();
    let summary = parse_response_body(response).await;
    assert_eq!(summary["delivered"], 1);
    assert_eq!(summary["remaining"], 0);
    assert_eq!(sink.delivered()[0].id.to_string(), alert_id.as_str().unwrap());

    runtime.shutdown().await;
}
