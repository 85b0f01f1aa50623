//! HTTP API for health checks, Prometheus metrics, and detector control

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use detector_lib::{
    classifier::DebugToggle,
    engine::EngineStatus,
    health::{ComponentStatus, HealthRegistry},
    history::DetectionHistory,
    observability::{DetectorLogger, DetectorMetrics},
    removal::RemovalLedger,
    southbound::AttachmentPointRegistry,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Detections returned when the query names no limit
const DEFAULT_DETECTION_LIMIT: usize = 50;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: DetectorMetrics,
    pub debug: DebugToggle,
    pub engine_status: Arc<EngineStatus>,
    pub registry: Arc<AttachmentPointRegistry>,
    pub ledger: Arc<RemovalLedger>,
    pub history: Arc<DetectionHistory>,
    pub logger: DetectorLogger,
    pub instance: String,
    pub enabled: bool,
    pub started_at: Instant,
}

/// Operator-facing snapshot of detector state
#[derive(Debug, Serialize)]
pub struct DetectorStatus {
    pub instance: String,
    pub version: String,
    pub enabled: bool,
    pub debug: bool,
    pub epochs: u64,
    pub last_epoch_ms: u64,
    pub attachment_points: usize,
    pub ledger_entries: usize,
    pub pending_removals: u64,
    pub detections_total: u64,
    pub uptime_secs: u64,
}

#[derive(Debug, Deserialize)]
struct DetectionsQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct DebugState {
    debug: bool,
}

/// Health check response - returns 200 if healthy, 503 if degraded/unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer).unwrap();

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Detector status summary
async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(DetectorStatus {
        instance: state.instance.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        enabled: state.enabled,
        debug: state.debug.is_enabled(),
        epochs: state.engine_status.epochs(),
        last_epoch_ms: state.engine_status.last_epoch_ms(),
        attachment_points: state.registry.len(),
        ledger_entries: state.ledger.entry_count(),
        pending_removals: state.ledger.pending_total(),
        detections_total: state.history.total(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

/// Most recent detections, newest first
async fn detections(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DetectionsQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_DETECTION_LIMIT);
    Json(state.history.recent(limit).await)
}

/// Current debug-output state
async fn debug_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(DebugState {
        debug: state.debug.is_enabled(),
    })
}

/// Enable per-classification debug output
async fn debug_on(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.debug.set(true);
    state.logger.log_debug_toggled(true);
    Json(DebugState { debug: true })
}

/// Disable per-classification debug output
async fn debug_off(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.debug.set(false);
    state.logger.log_debug_toggled(false);
    Json(DebugState { debug: false })
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/status", get(status))
        .route("/api/v1/detections", get(detections))
        .route("/api/v1/debug", get(debug_state))
        .route("/api/v1/debug/on", post(debug_on))
        .route("/api/v1/debug/off", post(debug_off))
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
