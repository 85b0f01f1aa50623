//! Observability infrastructure for the detector
//!
//! Provides:
//! - Prometheus metrics (epoch latency, ledger depth, detection totals)
//! - Structured JSON logging with tracing

use crate::models::{AttachmentPoint, Detection, FeatureVector};
use prometheus::{register_histogram, register_int_gauge, Histogram, IntGauge};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<DetectorMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct DetectorMetricsInner {
    epoch_latency_seconds: Histogram,
    snapshot_latency_seconds: Histogram,
    attachment_points: IntGauge,
    ledger_entries: IntGauge,
    pending_removals: IntGauge,
    stale_packet_entries: IntGauge,
    epochs: IntGauge,
    detections: IntGauge,
    reconciled_removals: IntGauge,
    unreconciled_removals: IntGauge,
    negative_rate_warnings: IntGauge,
    snapshot_errors: IntGauge,
}

impl DetectorMetricsInner {
    fn new() -> Self {
        Self {
            epoch_latency_seconds: register_histogram!(
                "ddos_detector_epoch_latency_seconds",
                "Time spent collecting and classifying one epoch",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register epoch_latency_seconds"),

            snapshot_latency_seconds: register_histogram!(
                "ddos_detector_snapshot_latency_seconds",
                "Time spent waiting for one switch flow-stats reply",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register snapshot_latency_seconds"),

            attachment_points: register_int_gauge!(
                "ddos_detector_attachment_points",
                "Attachment points tracked since the startup sweep"
            )
            .expect("Failed to register attachment_points"),

            ledger_entries: register_int_gauge!(
                "ddos_detector_ledger_entries",
                "Removal ledger entries awaiting reconciliation"
            )
            .expect("Failed to register ledger_entries"),

            pending_removals: register_int_gauge!(
                "ddos_detector_pending_removals",
                "Pending removal credits not yet taken by the engine"
            )
            .expect("Failed to register pending_removals"),

            stale_packet_entries: register_int_gauge!(
                "ddos_detector_stale_packet_entries",
                "Per-flow packet counters whose flow was absent from the last snapshot"
            )
            .expect("Failed to register stale_packet_entries"),

            epochs: register_int_gauge!(
                "ddos_detector_epochs_total",
                "Total number of completed detection epochs"
            )
            .expect("Failed to register epochs_total"),

            detections: register_int_gauge!(
                "ddos_detector_detections_total",
                "Total number of malicious verdicts"
            )
            .expect("Failed to register detections_total"),

            reconciled_removals: register_int_gauge!(
                "ddos_detector_reconciled_removals_total",
                "Total removed flows credited into epoch statistics"
            )
            .expect("Failed to register reconciled_removals_total"),

            unreconciled_removals: register_int_gauge!(
                "ddos_detector_unreconciled_removals_total",
                "Total removal ledger entries dropped for untracked attachment points"
            )
            .expect("Failed to register unreconciled_removals_total"),

            negative_rate_warnings: register_int_gauge!(
                "ddos_detector_negative_rate_warnings_total",
                "Epoch computations that produced a negative flow rate"
            )
            .expect("Failed to register negative_rate_warnings_total"),

            snapshot_errors: register_int_gauge!(
                "ddos_detector_snapshot_errors_total",
                "Per-switch stats requests that failed or timed out"
            )
            .expect("Failed to register snapshot_errors_total"),
        }
    }
}

/// Detector metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct DetectorMetrics {
    // This is just a marker - we use the global instance
    _private: (),
}

impl Default for DetectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(DetectorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &DetectorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record the duration of one full epoch
    pub fn observe_epoch_latency(&self, duration_secs: f64) {
        self.inner().epoch_latency_seconds.observe(duration_secs);
    }

    /// Record the duration of one per-switch stats request
    pub fn observe_snapshot_latency(&self, duration_secs: f64) {
        self.inner().snapshot_latency_seconds.observe(duration_secs);
    }

    /// Set the size of the frozen attachment-point registry
    pub fn set_attachment_points(&self, count: i64) {
        self.inner().attachment_points.set(count);
    }

    /// Update ledger depth gauges
    pub fn set_ledger_depth(&self, entries: i64, pending: i64) {
        self.inner().ledger_entries.set(entries);
        self.inner().pending_removals.set(pending);
    }

    /// Update the stale packet-counter gauge
    pub fn set_stale_packet_entries(&self, count: i64) {
        self.inner().stale_packet_entries.set(count);
    }

    /// Increment the completed-epoch counter
    pub fn inc_epochs(&self) {
        self.inner().epochs.inc();
    }

    /// Increment the detection counter
    pub fn inc_detections(&self) {
        self.inner().detections.inc();
    }

    /// Credit reconciled removals into the running total
    pub fn add_reconciled_removals(&self, count: i64) {
        self.inner().reconciled_removals.add(count);
    }

    /// Count removal entries dropped at the residual check
    pub fn add_unreconciled_removals(&self, count: i64) {
        self.inner().unreconciled_removals.add(count);
    }

    /// Increment the negative flow-rate warning counter
    pub fn inc_negative_rate_warnings(&self) {
        self.inner().negative_rate_warnings.inc();
    }

    /// Increment the failed-snapshot counter
    pub fn inc_snapshot_errors(&self) {
        self.inner().snapshot_errors.inc();
    }
}

/// Structured logger for detector events
///
/// Provides consistent JSON-formatted logging for detections,
/// reconciliation problems, and lifecycle events.
#[derive(Clone)]
pub struct DetectorLogger {
    instance: String,
}

impl DetectorLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log a malicious verdict
    pub fn log_detection(&self, detection: &Detection) {
        warn!(
            event = "dos_detected",
            instance = %self.instance,
            dpid = detection.dpid,
            port = detection.port,
            host = ?detection.host,
            epoch = detection.epoch,
            score = detection.score,
            live_flows = detection.features.live_flows,
            flow_rate = detection.features.flow_rate,
            mean_packet_delta = detection.features.mean_packet_delta,
            stddev_packet_delta = detection.features.stddev_packet_delta,
            "Attachment point classified as DoS source"
        );
    }

    /// Log a negative flow-creation rate (valid input, suspect bookkeeping)
    pub fn log_negative_rate(&self, ap: AttachmentPoint, rate: f64, epoch: u64) {
        warn!(
            event = "negative_flow_rate",
            instance = %self.instance,
            dpid = ap.dpid,
            port = ap.port,
            rate = rate,
            epoch = epoch,
            "Computed negative flow creation rate"
        );
    }

    /// Log removal entries left over at the end of an epoch
    pub fn log_unreconciled(&self, epoch: u64, entries: usize) {
        error!(
            event = "unreconciled_removals",
            instance = %self.instance,
            epoch = epoch,
            entries = entries,
            "Not all removed flows were reconciled"
        );
    }

    /// Log the raw classifier input and score (debug toggle only)
    pub fn log_classifier_debug(&self, ap: AttachmentPoint, features: &FeatureVector, score: f64) {
        info!(
            event = "classifier_debug",
            instance = %self.instance,
            dpid = ap.dpid,
            port = ap.port,
            live_flows = features.live_flows,
            flow_rate = features.flow_rate,
            mean_packet_delta = features.mean_packet_delta,
            stddev_packet_delta = features.stddev_packet_delta,
            score = score,
            "Classifier input"
        );
    }

    /// Log a debug toggle transition
    pub fn log_debug_toggled(&self, enabled: bool) {
        info!(
            event = "debug_toggled",
            instance = %self.instance,
            enabled = enabled,
            "Classifier debug output toggled"
        );
    }

    /// Log detector startup
    pub fn log_startup(&self, version: &str, weights_file: &str) {
        info!(
            event = "detector_started",
            instance = %self.instance,
            version = %version,
            weights_file = %weights_file,
            "DDoS detector started"
        );
    }

    /// Log detector shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "detector_shutdown",
            instance = %self.instance,
            reason = %reason,
            "DDoS detector shutting down"
        );
    }
}
