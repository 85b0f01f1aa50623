//! DoS detection daemon for SDN fabrics
//!
//! This binary polls every switch for flow statistics on a fixed period,
//! reduces each attachment point's traffic to a feature vector, and flags
//! ports whose traffic the linear classifier scores as a DoS source.

use anyhow::{Context, Result};
use detector_lib::{
    classifier::{Classifier, ClassifierModel, DebugToggle},
    engine::EngineBuilder,
    health::{components, HealthRegistry},
    history::DetectionHistory,
    observability::{DetectorLogger, DetectorMetrics},
    removal::{run_removal_listener, RemovalLedger},
    southbound::{AttachmentPointRegistry, SimFabric},
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const DETECTOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting ddos-detector");

    // Load configuration
    let config = config::DetectorConfig::load()?;
    info!(instance = %config.instance, enabled = config.enabled, "Detector configured");

    // A detector that cannot score traffic must not come up at all, so the
    // weights file is loaded before anything is spawned.
    let model = ClassifierModel::load(&config.weights_file).with_context(|| {
        format!(
            "failed to load classifier weights from {}",
            config.weights_file
        )
    })?;
    let classifier = Classifier::new(model);

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::ENGINE).await;
    health_registry.register(components::REMOVAL_LISTENER).await;
    health_registry.register(components::SOUTHBOUND).await;
    health_registry.register(components::CLASSIFIER).await;

    // Initialize metrics and structured logger
    let metrics = DetectorMetrics::new();
    let logger = DetectorLogger::new(&config.instance);
    logger.log_startup(DETECTOR_VERSION, &config.weights_file);

    // Southbound: the simulated fabric stands in for a controller session
    let fabric = Arc::new(SimFabric::with_demo_topology());
    let registry = Arc::new(
        AttachmentPointRegistry::discover(fabric.as_ref())
            .await
            .context("attachment point discovery failed")?,
    );
    metrics.set_attachment_points(registry.len() as i64);

    let ledger = Arc::new(RemovalLedger::new());
    let history = Arc::new(DetectionHistory::default());
    let debug = DebugToggle::new();
    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let (engine, mut detections) = EngineBuilder::new()
        .inventory(fabric.clone())
        .stats_source(fabric.clone())
        .registry(Arc::clone(&registry))
        .ledger(Arc::clone(&ledger))
        .classifier(classifier)
        .debug_toggle(debug.clone())
        .logger(logger.clone())
        .poll_period(Duration::from_secs(config.data_pickup_period_secs))
        .stats_timeout(Duration::from_millis(config.stats_timeout_ms))
        .build()?;
    let engine_status = engine.status();

    // Create shared application state
    let app_state = Arc::new(api::AppState {
        health_registry: health_registry.clone(),
        metrics: metrics.clone(),
        debug: debug.clone(),
        engine_status,
        registry: Arc::clone(&registry),
        ledger: Arc::clone(&ledger),
        history: Arc::clone(&history),
        logger: logger.clone(),
        instance: config.instance.clone(),
        enabled: config.enabled,
        started_at: Instant::now(),
    });

    // Mark detector as ready after initialization
    health_registry.set_ready(true).await;

    // Start health, metrics and control server
    let _api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    if config.enabled {
        // The removal listener must be subscribed before any traffic runs,
        // or early removal notifications are lost.
        tokio::spawn(run_removal_listener(
            Arc::clone(&ledger),
            fabric.removal_feed(),
            shutdown_tx.subscribe(),
        ));

        // Demo traffic so a standalone run has flows to classify
        let _traffic = Arc::clone(&fabric).spawn_traffic(shutdown_tx.subscribe());

        // Detections flow into the history ring for the API
        let recorder_history = Arc::clone(&history);
        tokio::spawn(async move {
            while let Some(detection) = detections.recv().await {
                recorder_history.push(detection).await;
            }
        });

        tokio::spawn(engine.run(shutdown_tx.subscribe()));
    } else {
        info!("Detection loop disabled by configuration");
    }

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    let _ = shutdown_tx.send(());
    info!("Shutting down");

    Ok(())
}
