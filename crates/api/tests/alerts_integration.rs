//! Integration tests for alert endpoints.

mod common;

use axum::http::{Method, StatusCode};
use common::{
    get_request, json_request, parse_response_body, TestApp, PLACEHOLDER_LATITUDE,
    PLACEHOLDER_LONGITUDE,
};
use domain::services::OfflineQueue;
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn test_send_alert_delivered_online() {
    let app = TestApp::new().await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/alerts",
            json!({
                "subjectId": "tourist-1",
                "category": "emergency",
                "message": "Help needed near the temple",
                "location": { "latitude": 11.02, "longitude": 76.95 }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = parse_response_body(response).await;
    assert_eq!(body["delivered"], true);
    assert_eq!(body["message"], "Alert sent");
    assert_eq!(body["alert"]["status"], "delivered");
    assert_eq!(body["alert"]["severity"], "critical");
    assert_eq!(body["alert"]["locationApproximate"], false);
    assert_eq!(app.sink.delivery_count(), 1);
}

#[tokio::test]
async fn test_alert_without_location_uses_placeholder() {
    let app = TestApp::new().await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/alerts",
            json!({ "subjectId": "tourist-2", "category": "medical" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = parse_response_body(response).await;
    assert_eq!(body["alert"]["locationApproximate"], true);
    assert_eq!(body["alert"]["location"]["latitude"], PLACEHOLDER_LATITUDE);
    assert_eq!(body["alert"]["location"]["longitude"], PLACEHOLDER_LONGITUDE);
}

#[tokio::test]
async fn test_backend_failure_queues_alert() {
    let app = TestApp::new().await;
    app.sink.set_failing(true);

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/alerts",
            json!({ "subjectId": "tourist-3", "category": "security", "message": "Followed" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = parse_response_body(response).await;
    assert_eq!(body["delivered"], false);
    assert_eq!(body["message"], "Alert sent, will retry when back online");
    assert_eq!(body["alert"]["status"], "queued_offline");
    assert_eq!(body["alert"]["offline"], true);

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/alerts/offline"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["capacity"], 5);
    assert_eq!(body["alerts"][0]["subjectId"], "tourist-3");
}

#[tokio::test]
async fn test_blank_subject_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/alerts",
            json!({ "subjectId": "   ", "category": "assistance" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "validation_error");
    assert_eq!(app.sink.delivery_count(), 0);
    assert!(app.queue.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_out_of_range_location_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/alerts",
            json!({
                "subjectId": "tourist-4",
                "category": "emergency",
                "location": { "latitude": 95.0, "longitude": 76.95 }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_category_is_unprocessable() {
    let app = TestApp::new().await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/alerts",
            json!({ "subjectId": "tourist-5", "category": "weather" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_manual_replay_drains_queue() {
    let app = TestApp::new().await;
    app.sink.set_failing(true);

    for subject in ["tourist-6", "tourist-7"] {
        app.router
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/alerts",
                json!({ "subjectId": subject, "category": "assistance" }),
            ))
            .await
            .unwrap();
    }

    let response = app
        .router
        .clone()
        .oneshot(json_request(Method::POST, "/api/v1/alerts/replay", json!({})))
        .await
        .unwrap();
    let body = parse_response_body(response).await;
    assert_eq!(body["attempted"], 2);
    assert_eq!(body["failed"], 2);
    assert_eq!(body["remaining"], 2);

    app.sink.set_failing(false);
    let response = app
        .router
        .clone()
        .oneshot(json_request(Method::POST, "/api/v1/alerts/replay", json!({})))
        .await
        .unwrap();
    let body = parse_response_body(response).await;
    assert_eq!(body["delivered"], 2);
    assert_eq!(body["remaining"], 0);
    assert_eq!(app.sink.delivery_count(), 2);
}
