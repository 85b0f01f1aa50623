//! Thread-safe ledger of evicted flows awaiting reconciliation

use crate::models::{AttachmentPoint, FlowCookie, FlowRemoved};
use crate::southbound::AttachmentPointRegistry;
use dashmap::DashMap;
use tracing::debug;

/// Parking space for removal notifications between epochs.
///
/// Written concurrently by the removal listener, drained exclusively by the
/// engine. Two maps: final packet counts keyed by cookie, and a per
/// attachment-point count of removals credited since the last drain. A
/// repeated notification for the same cookie overwrites the stale count but
/// still bumps the pending counter once per event.
pub struct RemovalLedger {
    /// cookie -> final cumulative packet count
    final_counts: DashMap<FlowCookie, u64>,
    /// Removals seen per attachment point since its last `take_pending`
    pending: DashMap<AttachmentPoint, u64>,
}

impl Default for RemovalLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl RemovalLedger {
    pub fn new() -> Self {
        Self {
            final_counts: DashMap::new(),
            pending: DashMap::new(),
        }
    }

    /// Record one removal notification. Never blocks beyond a shard lock.
    pub fn record(&self, removed: FlowRemoved) {
        let ap = removed.cookie.attachment_point();
        *self.pending.entry(ap).or_insert(0) += 1;
        self.final_counts.insert(removed.cookie, removed.packet_count);
    }

    /// Atomically take and reset the pending-removal count of `ap`.
    ///
    /// Remove-and-return leaves no window where a concurrent `record` could
    /// be wiped without being read; a notification landing after the take is
    /// simply credited next epoch.
    pub fn take_pending(&self, ap: AttachmentPoint) -> u64 {
        self.pending.remove(&ap).map(|(_, n)| n).unwrap_or(0)
    }

    /// Drain every parked final count belonging to `ap`.
    pub fn drain_for(&self, ap: AttachmentPoint) -> Vec<(FlowCookie, u64)> {
        let cookies: Vec<FlowCookie> = self
            .final_counts
            .iter()
            .filter(|entry| entry.key().attachment_point() == ap)
            .map(|entry| *entry.key())
            .collect();

        cookies
            .into_iter()
            .filter_map(|cookie| self.final_counts.remove(&cookie))
            .collect()
    }

    /// Drain everything parked for attachment points the registry does not
    /// track. Tracked entries are left alone so a notification that raced
    /// past its epoch drain is still credited next time around.
    pub fn drain_unknown(&self, registry: &AttachmentPointRegistry) -> Vec<(FlowCookie, u64)> {
        let cookies: Vec<FlowCookie> = self
            .final_counts
            .iter()
            .filter(|entry| !registry.contains(entry.key().attachment_point()))
            .map(|entry| *entry.key())
            .collect();

        let drained: Vec<(FlowCookie, u64)> = cookies
            .into_iter()
            .filter_map(|cookie| self.final_counts.remove(&cookie))
            .collect();

        self.pending.retain(|ap, _| registry.contains(*ap));

        if !drained.is_empty() {
            debug!(entries = drained.len(), "Dropped removals for untracked attachment points");
        }
        drained
    }

    /// Parked final counts, all attachment points.
    pub fn entry_count(&self) -> usize {
        self.final_counts.len()
    }

    /// Sum of all pending-removal counters.
    pub fn pending_total(&self) -> u64 {
        self.pending.iter().map(|e| *e.value()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.final_counts.is_empty() && self.pending.is_empty()
    }
}
