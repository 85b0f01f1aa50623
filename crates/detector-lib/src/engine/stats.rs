//! Per-epoch packet-delta statistics

use crate::models::FlowCookie;
use std::collections::HashMap;

/// Accumulates per-flow packet deltas for one attachment point in one epoch.
///
/// Keeps a running sum alongside a per-cookie map: the sum feeds the mean,
/// the map feeds the spread. Recording the same cookie twice (a flow seen
/// live and reconciled as removed in the same epoch) adds to the sum both
/// times but overwrites the map slot.
#[derive(Debug, Default)]
pub(crate) struct PacketDeltaStats {
    sum: f64,
    deltas: HashMap<FlowCookie, f64>,
}

impl PacketDeltaStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, cookie: FlowCookie, delta: f64) {
        self.sum += delta;
        self.deltas.insert(cookie, delta);
    }

    /// Mean packet delta over `flows_total` flows. The caller guarantees a
    /// non-zero total.
    pub fn mean(&self, flows_total: u64) -> f64 {
        self.sum / flows_total as f64
    }

    /// Population standard deviation of the recorded deltas about `mean`,
    /// with `flows_total` as the divisor.
    pub fn stddev(&self, mean: f64, flows_total: u64) -> f64 {
        let sum_sq: f64 = self
            .deltas
            .values()
            .map(|delta| (delta - mean).powi(2))
            .sum();
        (sum_sq / flows_total as f64).sqrt()
    }
}
