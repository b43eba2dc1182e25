//! Integration tests for tracking, position and zone endpoints.

mod common;

use axum::http::{Method, StatusCode};
use common::{
    get_request, json_request, parse_response_body, TestApp, MARKET_LATITUDE, MARKET_LONGITUDE,
};
use serde_json::json;
use tower::ServiceExt;

async fn start(app: &TestApp, body: serde_json::Value) -> axum::response::Response {
    app.router
        .clone()
        .oneshot(json_request(Method::POST, "/api/v1/tracking/start", body))
        .await
        .unwrap()
}

async fn push(app: &TestApp, subject: &str, latitude: f64, longitude: f64) -> StatusCode {
    app.router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/positions",
            json!({
                "subjectId": subject,
                "latitude": latitude,
                "longitude": longitude,
                "accuracyMeters": 5.0
            }),
        ))
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn test_start_tracking_is_idempotent() {
    let app = TestApp::new().await;

    let response = start(&app, json!({ "subjectId": "tourist-1" })).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let first = parse_response_body(response).await;
    assert_eq!(first["alreadyTracking"], false);
    assert_eq!(first["options"]["highAccuracy"], true);

    let response = start(&app, json!({ "subjectId": "tourist-1", "timeoutMs": 500 })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let second = parse_response_body(response).await;
    assert_eq!(second["alreadyTracking"], true);
    assert_eq!(second["trackingId"], first["trackingId"]);

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/tracking/tourist-1"))
        .await
        .unwrap();
    let status = parse_response_body(response).await;
    assert_eq!(status["tracking"], true);
    assert!(status["currentZone"].is_null());
}

#[tokio::test]
async fn test_permission_denied_start() {
    let app = TestApp::new().await;

    let response = start(
        &app,
        json!({ "subjectId": "tourist-2", "permissionGranted": false }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(!app.runtime.is_tracking("tourist-2").await);
}

#[tokio::test]
async fn test_invalid_timeout_is_rejected() {
    let app = TestApp::new().await;

    let response = start(
        &app,
        json!({ "subjectId": "tourist-3", "timeoutMs": 3_600_000 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_position_for_untracked_subject() {
    let app = TestApp::new().await;

    assert_eq!(
        push(&app, "nobody", MARKET_LATITUDE, MARKET_LONGITUDE).await,
        StatusCode::NOT_FOUND
    );

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/positions/history?subjectId=nobody"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_zone_entry_and_exit_raise_alerts() {
    let app = TestApp::new().await;
    start(&app, json!({ "subjectId": "tourist-4" })).await;

    assert_eq!(
        push(&app, "tourist-4", MARKET_LATITUDE, MARKET_LONGITUDE).await,
        StatusCode::ACCEPTED
    );
    assert!(app.wait_for(|app| app.sink.delivery_count() == 1).await);

    let entry = &app.sink.delivered()[0];
    assert_eq!(entry.category.as_str(), "zone_entry");
    assert_eq!(entry.severity.as_str(), "critical");
    assert_eq!(entry.zone_id.as_deref(), Some("market"));

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/tracking/tourist-4"))
        .await
        .unwrap();
    let status = parse_response_body(response).await;
    assert_eq!(status["currentZone"]["id"], "market");
    assert_eq!(status["lastPosition"]["latitude"], MARKET_LATITUDE);

    // Roughly 550 m north, well outside the 20 m zone.
    push(&app, "tourist-4", MARKET_LATITUDE + 0.005, MARKET_LONGITUDE).await;
    assert!(app.wait_for(|app| app.sink.delivery_count() == 2).await);

    let exit = &app.sink.delivered()[1];
    assert_eq!(exit.category.as_str(), "zone_exit");
    assert_eq!(exit.message, "Left zone: Night Market");

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/positions/history?subjectId=tourist-4"))
        .await
        .unwrap();
    let history = parse_response_body(response).await;
    assert_eq!(history["count"], 2);
}

#[tokio::test]
async fn test_out_of_range_position_is_rejected() {
    let app = TestApp::new().await;
    start(&app, json!({ "subjectId": "tourist-5" })).await;

    assert_eq!(
        push(&app, "tourist-5", 123.0, MARKET_LONGITUDE).await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(app.runtime.history("tourist-5").unwrap().len(), 0);
}

#[tokio::test]
async fn test_location_error_reports() {
    let app = TestApp::new().await;
    start(&app, json!({ "subjectId": "tourist-6" })).await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/positions/errors",
            json!({ "subjectId": "tourist-6", "code": "position_unavailable", "message": "No GPS" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/positions/errors",
            json!({ "subjectId": "tourist-6", "code": "eclipse" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Errors are never alerts.
    assert_eq!(app.sink.delivery_count(), 0);
}

#[tokio::test]
async fn test_stop_tracking() {
    let app = TestApp::new().await;
    start(&app, json!({ "subjectId": "tourist-7" })).await;

    let stop = || {
        json_request(
            Method::POST,
            "/api/v1/tracking/stop",
            json!({ "subjectId": "tourist-7" }),
        )
    };

    let response = app.router.clone().oneshot(stop()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(parse_response_body(response).await["stopped"], true);

    let response = app.router.clone().oneshot(stop()).await.unwrap();
    assert_eq!(parse_response_body(response).await["stopped"], false);

    assert_eq!(
        push(&app, "tourist-7", MARKET_LATITUDE, MARKET_LONGITUDE).await,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_zone_listing() {
    let app = TestApp::new().await;

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/zones"))
        .await
        .unwrap();
    let body = parse_response_body(response).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["zones"][0]["category"], "high_risk");

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/zones/market"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/zones/harbour"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
