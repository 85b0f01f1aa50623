//! Detection epoch loop
//!
//! One dedicated task drives the whole detection cycle on a fixed period:
//! snapshot every switch's flow counters, reconcile flows the Removal Ledger
//! parked since the last epoch, reduce each attachment point's flows to a
//! four-feature vector, and hand it to the classifier. All cross-epoch
//! counters live inside the engine and `run` consumes it, so they have a
//! single writer by construction.

mod stats;


use crate::classifier::{Classifier, DebugToggle};
use crate::models::{AttachmentPoint, Detection, FeatureVector, FlowCookie, FlowStatsEntry};
use crate::observability::{DetectorLogger, DetectorMetrics};
use crate::removal::RemovalLedger;
use crate::southbound::{AttachmentPointRegistry, FlowStatsSource, StatsFilter, SwitchInventory};
use anyhow::Result;
use chrono::Utc;
use stats::PacketDeltaStats;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio::time::{interval, timeout, Instant};
use tracing::{debug, info, warn};

/// Configuration for the detection epoch loop
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Time between epochs (default: 3 seconds)
    pub poll_period: Duration,
    /// Per-switch flow-stats deadline, so one unresponsive switch only
    /// degrades its own attachment points (default: 2 seconds)
    pub stats_timeout: Duration,
    /// Channel buffer size for emitted detections
    pub detection_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_period: Duration::from_secs(3),
            stats_timeout: Duration::from_secs(2),
            detection_buffer: 64,
        }
    }
}

/// Counters shared with the status API
#[derive(Debug, Default)]
pub struct EngineStatus {
    epochs: AtomicU64,
    last_epoch_ms: AtomicU64,
}

impl EngineStatus {
    /// Completed epoch count
    pub fn epochs(&self) -> u64 {
        self.epochs.load(Ordering::Relaxed)
    }

    /// Duration of the most recent epoch in milliseconds
    pub fn last_epoch_ms(&self) -> u64 {
        self.last_epoch_ms.load(Ordering::Relaxed)
    }

    fn record_epoch(&self, duration: Duration) {
        self.epochs.fetch_add(1, Ordering::Relaxed);
        self.last_epoch_ms
            .store(duration.as_millis() as u64, Ordering::Relaxed);
    }
}

/// Epoch-driven statistics and classification engine
pub struct StatsEngine {
    inventory: Arc<dyn SwitchInventory>,
    stats_source: Arc<dyn FlowStatsSource>,
    registry: Arc<AttachmentPointRegistry>,
    ledger: Arc<RemovalLedger>,
    classifier: Classifier,
    debug: DebugToggle,
    config: EngineConfig,
    metrics: DetectorMetrics,
    logger: DetectorLogger,
    status: Arc<EngineStatus>,
    detection_tx: mpsc::Sender<Detection>,
    /// Last cumulative packet count per cookie. Entries whose flow vanishes
    /// without a removal notification are never pruned; the stale gauge
    /// makes that growth visible.
    prev_packets: HashMap<FlowCookie, u64>,
    /// Live flow count per attachment point in the previous epoch
    prev_flow_counts: HashMap<AttachmentPoint, u64>,
    epoch: u64,
}

impl StatsEngine {
    /// Create a new engine and the receiving end of its detection channel.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        inventory: Arc<dyn SwitchInventory>,
        stats_source: Arc<dyn FlowStatsSource>,
        registry: Arc<AttachmentPointRegistry>,
        ledger: Arc<RemovalLedger>,
        classifier: Classifier,
        debug: DebugToggle,
        logger: DetectorLogger,
        config: EngineConfig,
    ) -> (Self, mpsc::Receiver<Detection>) {
        let (detection_tx, detection_rx) = mpsc::channel(config.detection_buffer);

        let engine = Self {
            inventory,
            stats_source,
            registry,
            ledger,
            classifier,
            debug,
            config,
            metrics: DetectorMetrics::new(),
            logger,
            status: Arc::new(EngineStatus::default()),
            detection_tx,
            prev_packets: HashMap::new(),
            prev_flow_counts: HashMap::new(),
            epoch: 0,
        };

        (engine, detection_rx)
    }

    /// Shared counters for the status API.
    pub fn status(&self) -> Arc<EngineStatus> {
        Arc::clone(&self.status)
    }

    /// Drive epochs until shutdown is signalled. Cancellation is observed at
    /// the inter-epoch select point; in-flight switch requests are bounded
    /// by the per-request timeout.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            period_secs = self.config.poll_period.as_secs(),
            attachment_points = self.registry.len(),
            "Starting detection epoch loop"
        );
        self.metrics.set_attachment_points(self.registry.len() as i64);

        let mut ticker = interval(self.config.poll_period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let start = Instant::now();
                    self.run_epoch().await;
                    let elapsed = start.elapsed();
                    self.metrics.observe_epoch_latency(elapsed.as_secs_f64());
                    self.status.record_epoch(elapsed);
                }
                _ = shutdown.recv() => {
                    info!("Shutting down detection epoch loop");
                    break;
                }
            }
        }
    }

    /// One full detection cycle: snapshot, per-port statistics, residual
    /// check, state gauges.
    async fn run_epoch(&mut self) {
        self.epoch += 1;
        let snapshot = self.collect_snapshot().await;

        let mut live_cookies: HashSet<FlowCookie> = HashSet::new();
        for entries in snapshot.values() {
            for entry in entries {
                live_cookies.insert(entry.cookie);
            }
        }

        let points = self.registry.attachment_points().to_vec();
        for ap in points {
            self.process_attachment_point(ap, &snapshot);
        }

        // Anything still parked in the ledger belongs to attachment points
        // discovery never saw. Drop it so the ledger cannot grow without
        // bound, and say so loudly.
        let leftovers = self.ledger.drain_unknown(&self.registry);
        if !leftovers.is_empty() {
            self.logger.log_unreconciled(self.epoch, leftovers.len());
            self.metrics.add_unreconciled_removals(leftovers.len() as i64);
        }

        // Counters held for flows absent from this snapshot. They are kept
        // (a removal may still arrive) but the growth must stay visible.
        let stale = self
            .prev_packets
            .keys()
            .filter(|cookie| !live_cookies.contains(cookie))
            .count();
        self.metrics.set_stale_packet_entries(stale as i64);
        if stale > 0 {
            debug!(
                stale_entries = stale,
                epoch = self.epoch,
                "Holding packet counters for flows absent from this snapshot"
            );
        }

        self.metrics.set_ledger_depth(
            self.ledger.entry_count() as i64,
            self.ledger.pending_total() as i64,
        );
        self.metrics.inc_epochs();
    }

    /// Query every switch concurrently and merge the replies into one
    /// working set keyed by the attachment point decoded from each cookie.
    async fn collect_snapshot(&self) -> HashMap<AttachmentPoint, Vec<FlowStatsEntry>> {
        let switches = match self.inventory.switches().await {
            Ok(switches) => switches,
            Err(e) => {
                warn!(error = %e, epoch = self.epoch, "Switch enumeration failed, skipping snapshot");
                self.metrics.inc_snapshot_errors();
                return HashMap::new();
            }
        };

        let mut requests = JoinSet::new();
        for dpid in switches {
            let source = Arc::clone(&self.stats_source);
            let deadline = self.config.stats_timeout;
            requests.spawn(async move {
                let start = Instant::now();
                let reply =
                    timeout(deadline, source.request_flow_stats(dpid, StatsFilter::all())).await;
                (dpid, start.elapsed(), reply)
            });
        }

        let mut snapshot: HashMap<AttachmentPoint, Vec<FlowStatsEntry>> = HashMap::new();
        while let Some(joined) = requests.join_next().await {
            let (dpid, elapsed, reply) = match joined {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(error = %e, "Snapshot task failed");
                    self.metrics.inc_snapshot_errors();
                    continue;
                }
            };
            self.metrics.observe_snapshot_latency(elapsed.as_secs_f64());

            match reply {
                Ok(Ok(entries)) => {
                    for entry in entries {
                        snapshot
                            .entry(entry.cookie.attachment_point())
                            .or_default()
                            .push(entry);
                    }
                }
                Ok(Err(e)) => {
                    warn!(dpid = dpid, error = %e, "Flow stats request failed");
                    self.metrics.inc_snapshot_errors();
                }
                Err(_) => {
                    warn!(
                        dpid = dpid,
                        timeout_ms = self.config.stats_timeout.as_millis() as u64,
                        "Flow stats request timed out"
                    );
                    self.metrics.inc_snapshot_errors();
                }
            }
        }

        snapshot
    }

    /// Reduce one attachment point's flows to a feature vector and classify
    /// it. Removed flows drained from the ledger are credited alongside the
    /// live ones.
    fn process_attachment_point(
        &mut self,
        ap: AttachmentPoint,
        snapshot: &HashMap<AttachmentPoint, Vec<FlowStatsEntry>>,
    ) {
        let live_entries: &[FlowStatsEntry] = snapshot.get(&ap).map(Vec::as_slice).unwrap_or(&[]);
        let live_count = live_entries.len() as u64;
        let pending = self.ledger.take_pending(ap);

        // Idle port: nothing live, nothing removed, no state touched.
        if live_count == 0 && pending == 0 {
            return;
        }

        let prev_count = self.prev_flow_counts.get(&ap).copied().unwrap_or(0);
        let flow_rate = live_count as f64 - prev_count as f64 + pending as f64;
        if flow_rate < 0.0 {
            self.logger.log_negative_rate(ap, flow_rate, self.epoch);
            self.metrics.inc_negative_rate_warnings();
        }
        self.prev_flow_counts.insert(ap, live_count);

        let mut deltas = PacketDeltaStats::new();
        for entry in live_entries {
            let delta = match self.prev_packets.get(&entry.cookie) {
                Some(prev) => entry.packet_count as i64 - *prev as i64,
                None => entry.packet_count as i64,
            };
            deltas.record(entry.cookie, delta as f64);
            self.prev_packets.insert(entry.cookie, entry.packet_count);
        }

        let mut reconciled = 0u64;
        for (cookie, final_count) in self.ledger.drain_for(ap) {
            let delta = match self.prev_packets.remove(&cookie) {
                Some(prev) => final_count as i64 - prev as i64,
                None => final_count as i64,
            };
            deltas.record(cookie, delta as f64);
            reconciled += 1;
        }
        if reconciled > 0 {
            self.metrics.add_reconciled_removals(reconciled as i64);
        }

        let flows_total = live_count + reconciled;
        if flows_total == 0 {
            // Pending credit whose ledger entry was already consumed in a
            // prior epoch; nothing to average over.
            debug!(
                dpid = ap.dpid,
                port = ap.port,
                epoch = self.epoch,
                "Pending removals with no flows to reconcile"
            );
            return;
        }

        let mean = deltas.mean(flows_total);
        let stddev = deltas.stddev(mean, flows_total);

        let features = FeatureVector {
            live_flows: live_count as f64,
            flow_rate,
            mean_packet_delta: mean,
            stddev_packet_delta: stddev,
        };

        let verdict = self.classifier.classify(&features);
        if self.debug.is_enabled() {
            self.logger.log_classifier_debug(ap, &features, verdict.score);
        }

        if verdict.malicious {
            self.metrics.inc_detections();
            let detection = Detection {
                dpid: ap.dpid,
                port: ap.port,
                host: self.registry.host_at(ap).map(str::to_string),
                epoch: self.epoch,
                score: verdict.score,
                features,
                detected_at: Utc::now().timestamp(),
            };
            self.logger.log_detection(&detection);
            // The epoch loop must never stall on a slow consumer
            if let Err(e) = self.detection_tx.try_send(detection) {
                warn!(error = %e, "Failed to queue detection");
            }
        }
    }
}

/// Builder for creating the engine and its detection channel
pub struct EngineBuilder {
    inventory: Option<Arc<dyn SwitchInventory>>,
    stats_source: Option<Arc<dyn FlowStatsSource>>,
    registry: Option<Arc<AttachmentPointRegistry>>,
    ledger: Option<Arc<RemovalLedger>>,
    classifier: Option<Classifier>,
    debug: DebugToggle,
    logger: Option<DetectorLogger>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            inventory: None,
            stats_source: None,
            registry: None,
            ledger: None,
            classifier: None,
            debug: DebugToggle::new(),
            logger: None,
            config: EngineConfig::default(),
        }
    }

    pub fn inventory(mut self, inventory: Arc<dyn SwitchInventory>) -> Self {
        self.inventory = Some(inventory);
        self
    }

    pub fn stats_source(mut self, source: Arc<dyn FlowStatsSource>) -> Self {
        self.stats_source = Some(source);
        self
    }

    pub fn registry(mut self, registry: Arc<AttachmentPointRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn ledger(mut self, ledger: Arc<RemovalLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Share a debug toggle owned elsewhere (the HTTP control surface).
    pub fn debug_toggle(mut self, debug: DebugToggle) -> Self {
        self.debug = debug;
        self
    }

    pub fn logger(mut self, logger: DetectorLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Set the time between epochs
    pub fn poll_period(mut self, period: Duration) -> Self {
        self.config.poll_period = period;
        self
    }

    /// Set the per-switch stats deadline
    pub fn stats_timeout(mut self, deadline: Duration) -> Self {
        self.config.stats_timeout = deadline;
        self
    }

    /// Set the detection channel capacity
    pub fn detection_buffer(mut self, size: usize) -> Self {
        self.config.detection_buffer = size;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<(StatsEngine, mpsc::Receiver<Detection>)> {
        let inventory = self
            .inventory
            .ok_or_else(|| anyhow::anyhow!("Inventory is required"))?;
        let stats_source = self
            .stats_source
            .ok_or_else(|| anyhow::anyhow!("Stats source is required"))?;
        let registry = self
            .registry
            .ok_or_else(|| anyhow::anyhow!("Registry is required"))?;
        let ledger = self
            .ledger
            .ok_or_else(|| anyhow::anyhow!("Ledger is required"))?;
        let classifier = self
            .classifier
            .ok_or_else(|| anyhow::anyhow!("Classifier is required"))?;
        let logger = self
            .logger
            .ok_or_else(|| anyhow::anyhow!("Logger is required"))?;

        Ok(StatsEngine::new(
            inventory,
            stats_source,
            registry,
            ledger,
            classifier,
            self.debug,
            logger,
            self.config,
        ))
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
