//! HTTP API: ingestion, queries, CSV export, live events, health and metrics

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use hub_lib::{
    export::CSV_FILENAME,
    health::ComponentStatus,
    models::{AbnormalCount, AbnormalHistoryEntry, HistoryEntry, MessageResponse, SensorPayload},
    HubError, SensorHub,
};
use prometheus::{Encoder, TextEncoder};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::{Stream, StreamExt as _};
use tracing::{error, info, warn};

pub const RECEIVED_MESSAGE: &str = "Data received successfully";
pub const INVALID_DATA_MESSAGE: &str = "Invalid data";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Shared application state
pub struct AppState {
    pub hub: SensorHub,
}

impl AppState {
    pub fn new(hub: SensorHub) -> Self {
        Self { hub }
    }
}

/// Error returned by handlers, rendered as `{"message": ...}`
#[derive(Debug)]
pub struct ApiError(HubError);

impl From<HubError> for ApiError {
    fn from(e: HubError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(HubError::InvalidReading(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            HubError::InvalidReading(reason) => {
                warn!(reason = %reason, "Rejected sensor payload");
                (StatusCode::BAD_REQUEST, INVALID_DATA_MESSAGE)
            }
            HubError::Store(e) => {
                error!(error = %e, "Request failed on store error");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
            }
        };

        (status, Json(MessageResponse::new(message))).into_response()
    }
}

/// Accept one reading
async fn receive_sensor_data(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SensorPayload>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(payload) = payload?;
    state.hub.ingest(payload).await?;

    Ok(Json(MessageResponse::new(RECEIVED_MESSAGE)))
}

async fn history(State(state): State<Arc<AppState>>) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    Ok(Json(state.hub.history().await?))
}

async fn abnormal_count(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AbnormalCount>, ApiError> {
    Ok(Json(state.hub.abnormal_count().await?))
}

async fn abnormal_history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AbnormalHistoryEntry>>, ApiError> {
    Ok(Json(state.hub.abnormal_history().await?))
}

/// Full history as a chunked CSV attachment
async fn download_csv(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let lines = state.hub.export_csv().await?;
    let body = Body::from_stream(lines.map(Ok::<_, Infallible>));

    let headers = [
        (header::CONTENT_TYPE, "text/csv".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", CSV_FILENAME),
        ),
    ];

    Ok((headers, body).into_response())
}

/// Live channel as Server-Sent Events
async fn events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = state
        .hub
        .subscribe()
        .into_stream()
        .filter_map(|event| match event.to_json() {
            Ok(json) => Some(Ok(Event::default().event(event.name()).data(json))),
            Err(e) => {
                error!(error = %e, event = event.name(), "Failed to encode live event");
                None
            }
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.hub.health().health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness probe - pings the store first so outages show up here
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Err(e) = state.hub.check_store().await {
        warn!(error = %e, "Readiness store probe failed");
    }
    let readiness = state.hub.health().readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    state.hub.refresh_live_subscribers();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/sensor-data", post(receive_sensor_data))
        .route("/history", get(history))
        .route("/abnormal-count", get(abnormal_count))
        .route("/abnormal-history", get(abnormal_history))
        .route("/download-csv", get(download_csv))
        .route("/events", get(events))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(
            tower::ServiceBuilder::new()
                .layer(tower_http::trace::TraceLayer::new_for_http())
                .layer(tower_http::cors::CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
