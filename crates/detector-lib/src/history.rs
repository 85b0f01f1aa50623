//! In-memory record of recent detections
//!
//! A bounded ring keeps the last detections for the status API. Nothing is
//! persisted; a restart starts clean, like the rest of the detector state.

use crate::models::Detection;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Default ring capacity
const DEFAULT_CAPACITY: usize = 256;

/// Capacity-bounded ring of detections, newest kept
pub struct DetectionHistory {
    entries: RwLock<VecDeque<Detection>>,
    capacity: usize,
    /// Detections ever recorded, including evicted ones
    total: AtomicU64,
}

impl Default for DetectionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl DetectionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            total: AtomicU64::new(0),
        }
    }

    /// Append a detection, evicting the oldest entry at capacity.
    pub async fn push(&self, detection: Detection) {
        let mut entries = self.entries.write().await;
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(detection);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Up to `limit` most recent detections, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<Detection> {
        let entries = self.entries.read().await;
        entries.iter().rev().take(limit).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Detections recorded over the process lifetime.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureVector;

    fn detection(epoch: u64) -> Detection {
        Detection {
            dpid: 1,
            port: 1,
            host: None,
            epoch,
            score: 1.0,
            features: FeatureVector {
                live_flows: 1.0,
                flow_rate: 1.0,
                mean_packet_delta: 1.0,
                stddev_packet_delta: 0.0,
            },
            detected_at: 0,
        }
    }

    #[tokio::test]
    async fn test_push_and_recent_newest_first() {
        let history = DetectionHistory::new(10);
        for epoch in 1..=3 {
            history.push(detection(epoch)).await;
        }

        let recent = history.recent(2).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].epoch, 3);
        assert_eq!(recent[1].epoch, 2);
        assert_eq!(history.total(), 3);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let history = DetectionHistory::new(2);
        for epoch in 1..=5 {
            history.push(detection(epoch)).await;
        }

        assert_eq!(history.len().await, 2);
        let recent = history.recent(10).await;
        assert_eq!(recent[0].epoch, 5);
        assert_eq!(recent[1].epoch, 4);
        // Total keeps counting past evictions
        assert_eq!(history.total(), 5);
    }
}
