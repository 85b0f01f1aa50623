//! Integration tests for the detector API endpoints

use axum::{
    body::Body,
    extract::{Query, State},
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use detector_lib::{
    classifier::DebugToggle,
    engine::EngineStatus,
    health::{components, ComponentStatus, HealthRegistry},
    history::DetectionHistory,
    observability::{DetectorLogger, DetectorMetrics},
    removal::RemovalLedger,
    southbound::{AttachmentPointRegistry, SimFabric},
    Detection, FeatureVector,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceExt;

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

#[derive(Debug, Serialize)]
struct DetectorStatus {
    instance: String,
    version: String,
    enabled: bool,
    debug: bool,
    epochs: u64,
    last_epoch_ms: u64,
    attachment_points: usize,
    ledger_entries: usize,
    pending_removals: u64,
    detections_total: u64,
    uptime_secs: u64,
}

#[derive(Debug, Deserialize)]
struct DetectionsQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct DebugState {
    debug: bool,
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(readiness))
}

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

async fn detections(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DetectionsQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(50);
    Json(state.history.recent(limit).await)
}

async fn debug_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(DebugState {
        debug: state.debug.is_enabled(),
    })
}

async fn debug_on(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.debug.set(true);
    state.logger.log_debug_toggled(true);
    Json(DebugState { debug: true })
}

async fn debug_off(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.debug.set(false);
    state.logger.log_debug_toggled(false);
    Json(DebugState { debug: false })
}

fn create_test_router(state: Arc<AppState>) -> Router {
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

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let fabric = SimFabric::with_demo_topology();
    let registry = Arc::new(AttachmentPointRegistry::discover(&fabric).await.unwrap());

    let health_registry = HealthRegistry::new();
    health_registry.register(components::ENGINE).await;
    health_registry.register(components::CLASSIFIER).await;

    let state = Arc::new(AppState {
        health_registry,
        metrics: DetectorMetrics::new(),
        debug: DebugToggle::new(),
        engine_status: Arc::new(EngineStatus::default()),
        registry,
        ledger: Arc::new(RemovalLedger::new()),
        history: Arc::new(DetectionHistory::new(16)),
        logger: DetectorLogger::new("test"),
        instance: "test".to_string(),
        enabled: true,
        started_at: Instant::now(),
    });
    let router = create_test_router(state.clone());

    (router, state)
}

fn sample_detection(epoch: u64) -> Detection {
    Detection {
        dpid: 1,
        port: 3,
        host: Some("02:00:00:00:01:03".to_string()),
        epoch,
        score: 2.5,
        features: FeatureVector {
            live_flows: 40.0,
            flow_rate: 12.0,
            mean_packet_delta: 900.0,
            stddev_packet_delta: 35.0,
        },
        detected_at: 1_700_000_000,
    }
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_degraded(components::ENGINE, "Switch stats running slow")
        .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Degraded still returns 200 (operational)
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(components::ENGINE, "Failed to reach controller")
        .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_when_not_ready() {
    let (app, _state) = setup_test_app().await;

    // By default, the detector is not ready
    let response = app
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_returns_ok_when_ready() {
    let (app, state) = setup_test_app().await;

    state.health_registry.set_ready(true).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_readyz_returns_503_when_ready_but_unhealthy() {
    let (app, state) = setup_test_app().await;

    state.health_registry.set_ready(true).await;
    state
        .health_registry
        .set_unhealthy(components::ENGINE, "Failed")
        .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app().await;

    // Record some metrics
    state.metrics.observe_epoch_latency(0.5);
    state.metrics.observe_snapshot_latency(0.01);
    state.metrics.set_attachment_points(8);
    state.metrics.set_ledger_depth(2, 1);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    // Verify expected metrics are present
    assert!(metrics_text.contains("ddos_detector_epoch_latency_seconds"));
    assert!(metrics_text.contains("ddos_detector_snapshot_latency_seconds"));
    assert!(metrics_text.contains("ddos_detector_attachment_points"));
    assert!(metrics_text.contains("ddos_detector_ledger_entries"));
}

#[tokio::test]
async fn test_metrics_contains_histogram_buckets() {
    let (app, state) = setup_test_app().await;

    state.metrics.observe_epoch_latency(0.1);
    state.metrics.observe_epoch_latency(0.5);
    state.metrics.observe_epoch_latency(1.0);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    // Verify histogram has bucket labels
    assert!(metrics_text.contains("ddos_detector_epoch_latency_seconds_bucket"));
    assert!(metrics_text.contains("ddos_detector_epoch_latency_seconds_count"));
    assert!(metrics_text.contains("ddos_detector_epoch_latency_seconds_sum"));
}

#[tokio::test]
async fn test_healthz_includes_component_details() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert!(health["components"].is_object());
    assert!(health["components"]["engine"].is_object());
    assert!(health["components"]["classifier"].is_object());
}

#[tokio::test]
async fn test_status_reports_detector_state() {
    let (app, state) = setup_test_app().await;
    state.history.push(sample_detection(1)).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let status: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(status["instance"], "test");
    assert_eq!(status["enabled"], true);
    assert_eq!(status["debug"], false);
    assert_eq!(status["epochs"], 0);
    // Demo topology: two switches with four ports each
    assert_eq!(status["attachment_points"], 8);
    assert_eq!(status["detections_total"], 1);
}

#[tokio::test]
async fn test_detections_respects_limit_newest_first() {
    let (app, state) = setup_test_app().await;
    state.history.push(sample_detection(1)).await;
    state.history.push(sample_detection(2)).await;
    state.history.push(sample_detection(3)).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/detections?limit=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let detections: serde_json::Value = serde_json::from_slice(&body).unwrap();

    let list = detections.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["epoch"], 3);
    assert_eq!(list[1]["epoch"], 2);
}

#[tokio::test]
async fn test_debug_toggle_roundtrip() {
    let (app, state) = setup_test_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/debug/on")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(state.debug.is_enabled());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/debug")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let debug: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(debug["debug"], true);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/debug/off")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!state.debug.is_enabled());
}
