//! Integration tests for the hub API endpoints

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use async_trait::async_trait;
use hub_lib::{
    health::{components, UNHEALTHY_AFTER_FAILURES},
    models::{NewReading, Reading},
    store::open_store,
    ReadingStore, SensorHub, StoreError,
};
use sensor_hub::api::{create_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let store = open_store("sqlite::memory:", 1).await.unwrap();
    let hub = SensorHub::new(store);
    hub.health().set_ready(true).await;

    let state = Arc::new(AppState::new(hub));
    (create_router(state.clone()), state)
}

/// Store whose every operation fails, as when the database is unreachable
struct UnreachableStore;

#[async_trait]
impl ReadingStore for UnreachableStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert(&self, _reading: NewReading) -> Result<Reading, StoreError> {
        Err(StoreError::Task("connection refused".to_string()))
    }

    async fn history(&self) -> Result<Vec<Reading>, StoreError> {
        Err(StoreError::Task("connection refused".to_string()))
    }

    async fn abnormal_history(&self) -> Result<Vec<Reading>, StoreError> {
        Err(StoreError::Task("connection refused".to_string()))
    }

    async fn abnormal_count(&self) -> Result<u64, StoreError> {
        Err(StoreError::Task("connection refused".to_string()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Task("connection refused".to_string()))
    }

    fn backend(&self) -> &'static str {
        "unreachable"
    }
}

async fn setup_unreachable_app() -> Router {
    let hub = SensorHub::new(Arc::new(UnreachableStore));
    hub.health().register(components::STORE).await;
    hub.health().set_ready(true).await;

    create_router(Arc::new(AppState::new(hub)))
}

async fn get_raw(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_reading(app: &Router, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sensor-data")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn get_json(app: &Router, uri: &str) -> Value {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_normal_reading_is_stored() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = post_reading(
        &app,
        json!({"temperature": 25, "humidity": 50, "soil_moisture": 40}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Data received successfully");

    let history = get_json(&app, "/history").await;
    let rows = history.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["temperature"], 25.0);
    assert_eq!(rows[0]["is_abnormal"], false);
    assert!(rows[0]["id"].is_i64());

    let abnormal = get_json(&app, "/abnormal-history").await;
    assert!(abnormal.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_abnormal_reading_is_counted_and_labelled() {
    let (app, _state) = setup_test_app().await;

    let before = get_json(&app, "/abnormal-count").await;
    assert_eq!(before["count"], 0);

    let (status, _) = post_reading(
        &app,
        json!({"temperature": 55, "humidity": 50, "soil_moisture": 40}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let after = get_json(&app, "/abnormal-count").await;
    assert_eq!(after["count"], 1);

    let abnormal = get_json(&app, "/abnormal-history").await;
    let rows = abnormal.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["type"], "Temperature");
    assert!(rows[0]["timestamp"].is_string());
}

#[tokio::test]
async fn test_soil_moisture_label_has_a_space() {
    let (app, _state) = setup_test_app().await;

    post_reading(
        &app,
        json!({"temperature": 25, "humidity": 50, "soil_moisture": 2.5}),
    )
    .await;

    let abnormal = get_json(&app, "/abnormal-history").await;
    assert_eq!(abnormal[0]["type"], "Soil Moisture");
}

#[tokio::test]
async fn test_missing_field_is_rejected_without_persisting() {
    let (app, _state) = setup_test_app().await;

    let (status, body) =
        post_reading(&app, json!({"temperature": 25, "humidity": 50})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid data");

    let history = get_json(&app, "/history").await;
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let (app, _state) = setup_test_app().await;

    for (content_type, body) in [
        ("application/json", "{not json"),
        ("application/json", ""),
        ("text/plain", r#"{"temperature":25,"humidity":50,"soil_moisture":40}"#),
    ] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/sensor-data")
                    .header(header::CONTENT_TYPE, content_type)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Invalid data");
    }

    let history = get_json(&app, "/history").await;
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_history_is_newest_first() {
    let (app, _state) = setup_test_app().await;

    for temperature in [21.0, 60.0, 22.0, 10.0] {
        post_reading(
            &app,
            json!({"temperature": temperature, "humidity": 50, "soil_moisture": 40}),
        )
        .await;
    }

    let history = get_json(&app, "/history").await;
    let rows = history.as_array().unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0]["temperature"], 10.0);

    for pair in rows.windows(2) {
        let newer = pair[0]["timestamp"].as_str().unwrap();
        let older = pair[1]["timestamp"].as_str().unwrap();
        assert!(newer >= older);
        assert!(pair[0]["id"].as_i64() > pair[1]["id"].as_i64());
    }

    let abnormal = get_json(&app, "/abnormal-history").await;
    assert_eq!(abnormal.as_array().unwrap().len(), 2);

    let count = get_json(&app, "/abnormal-count").await;
    let flagged = rows.iter().filter(|r| r["is_abnormal"] == true).count();
    assert_eq!(count["count"], flagged as u64);
}

#[tokio::test]
async fn test_csv_export_matches_history() {
    let (app, _state) = setup_test_app().await;

    for temperature in [25.0, 55.0, 30.5] {
        post_reading(
            &app,
            json!({"temperature": temperature, "humidity": 50, "soil_moisture": 40}),
        )
        .await;
    }

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/download-csv")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"sensor_data.csv\""
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let csv = String::from_utf8(body.to_vec()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines[0], "timestamp,temperature,humidity,soil_moisture");
    assert!(lines[1].ends_with(",30.5,50.0,40.0"));

    let history = get_json(&app, "/history").await;
    assert_eq!(lines.len() - 1, history.as_array().unwrap().len());
}

#[tokio::test]
async fn test_events_stream_delivers_update_and_notification() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/events").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    let mut frames = response.into_body().into_data_stream();

    post_reading(
        &app,
        json!({"temperature": 55, "humidity": 50, "soil_moisture": 40}),
    )
    .await;

    let mut received = String::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !received.contains("event: notification") {
            let chunk = frames.next().await.unwrap().unwrap();
            received.push_str(std::str::from_utf8(&chunk).unwrap());
        }
    })
    .await
    .unwrap();

    let update_at = received.find("event: update").unwrap();
    let notification_at = received.find("event: notification").unwrap();
    assert!(update_at < notification_at);
    assert!(received.contains("Abnormal data detected!"));
}

#[tokio::test]
async fn test_healthz_and_readyz() {
    let (app, state) = setup_test_app().await;

    let health = get_json(&app, "/healthz").await;
    assert_eq!(health["status"], "healthy");

    let readiness = get_json(&app, "/readyz").await;
    assert_eq!(readiness["ready"], true);

    state.hub.health().set_ready(false).await;
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _state) = setup_test_app().await;

    post_reading(
        &app,
        json!({"temperature": 25, "humidity": 50, "soil_moisture": 40}),
    )
    .await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("sensor_hub_readings_ingested_total"));
}

#[tokio::test]
async fn test_store_outage_returns_internal_error() {
    let app = setup_unreachable_app().await;

    let (status, body) = post_reading(
        &app,
        json!({"temperature": 25, "humidity": 50, "soil_moisture": 40}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"message": "Internal server error"}));

    for uri in ["/history", "/abnormal-count", "/abnormal-history"] {
        let (status, body) = get_raw(&app, uri).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", uri);
        assert_eq!(body["message"], "Internal server error");
    }

    let (status, body) = get_raw(&app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["components"]["store"]["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_fails_after_repeated_store_checks() {
    let app = setup_unreachable_app().await;

    for _ in 1..UNHEALTHY_AFTER_FAILURES {
        let (status, _) = get_raw(&app, "/readyz").await;
        assert_eq!(status, StatusCode::OK, "degraded store still serves");
    }

    let (status, body) = get_raw(&app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);
    assert_eq!(body["reason"], "Critical component unhealthy");
}

#[tokio::test]
async fn test_metrics_reports_live_subscribers() {
    let (app, state) = setup_test_app().await;
    let subscription = state.hub.subscribe();
    drop(subscription);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    assert!(text.contains("sensor_hub_live_subscribers"));
    assert_eq!(state.hub.live().subscriber_count(), 0);
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(Request::builder().uri("/unknown").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
