//! Attachment point discovery
//!
//! One sweep over the inventory at startup enumerates every (switch, port)
//! pair and the hosts bound to them. The set is frozen afterwards; the
//! detector assumes a stable topology for the life of the process.

use super::SwitchInventory;
use crate::models::{AttachmentPoint, Dpid};
use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Frozen result of the startup topology sweep
pub struct AttachmentPointRegistry {
    /// Discovery order, one entry per (switch, port)
    points: Vec<AttachmentPoint>,
    /// Membership index for the residual check
    index: HashSet<AttachmentPoint>,
    /// Host bound to a port, where discovery found one
    hosts: HashMap<AttachmentPoint, String>,
}

impl AttachmentPointRegistry {
    /// Sweep the inventory once and freeze the attachment-point set.
    pub async fn discover(inventory: &dyn SwitchInventory) -> Result<Self> {
        let switches = inventory
            .switches()
            .await
            .context("Failed to enumerate switches")?;

        let mut points = Vec::new();
        for dpid in switches {
            let ports = inventory
                .ports(dpid)
                .await
                .with_context(|| format!("Failed to enumerate ports of switch {}", dpid))?;
            debug!(dpid = dpid, ports = ports.len(), "Discovered switch");
            for port in ports {
                points.push(AttachmentPoint::new(dpid, port));
            }
        }

        let mut hosts = HashMap::new();
        for binding in inventory.hosts().await.context("Failed to enumerate hosts")? {
            hosts.insert(binding.attachment_point(), binding.host_id);
        }

        let index: HashSet<_> = points.iter().copied().collect();
        info!(
            attachment_points = points.len(),
            hosts = hosts.len(),
            "Attachment point discovery complete"
        );

        Ok(Self {
            points,
            index,
            hosts,
        })
    }

    /// All tracked attachment points, in discovery order.
    pub fn attachment_points(&self) -> &[AttachmentPoint] {
        &self.points
    }

    /// Whether `ap` was present at discovery time.
    pub fn contains(&self, ap: AttachmentPoint) -> bool {
        self.index.contains(&ap)
    }

    /// Host bound to `ap`, if discovery found one.
    pub fn host_at(&self, ap: AttachmentPoint) -> Option<&str> {
        self.hosts.get(&ap).map(String::as_str)
    }

    /// Tracked switches, deduplicated.
    pub fn switches(&self) -> Vec<Dpid> {
        let mut seen = HashSet::new();
        self.points
            .iter()
            .filter(|ap| seen.insert(ap.dpid))
            .map(|ap| ap.dpid)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
