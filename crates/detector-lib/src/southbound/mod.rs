//! Southbound seams to the SDN fabric
//!
//! The detector never talks a switch protocol itself. It sees the network
//! through two narrow traits: an inventory of switches, ports and hosts, and
//! a per-switch flow-stats request. Production deployments back these with a
//! controller binding; tests and local runs use the in-memory [`SimFabric`].

mod registry;
mod sim;

pub use registry::AttachmentPointRegistry;
pub use sim::SimFabric;

use crate::models::{Dpid, FlowCookie, FlowStatsEntry, HostBinding, PortNo};
use anyhow::Result;

pub use async_trait::async_trait;

/// Cookie predicate for a flow-stats request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsFilter {
    /// Match cookies where `cookie & mask == value & mask`; `None` matches
    /// every flow
    pub cookie: Option<CookieMatch>,
}

/// A masked cookie comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieMatch {
    pub value: u64,
    pub mask: u64,
}

impl StatsFilter {
    /// Match every flow on the switch.
    pub fn all() -> Self {
        Self { cookie: None }
    }

    /// Match flows whose cookie agrees with `value` on the bits of `mask`.
    pub fn matching(value: u64, mask: u64) -> Self {
        Self {
            cookie: Some(CookieMatch { value, mask }),
        }
    }

    pub fn matches(&self, cookie: FlowCookie) -> bool {
        match self.cookie {
            Some(m) => cookie.raw() & m.mask == m.value & m.mask,
            None => true,
        }
    }
}

/// Topology questions answered by the controller
#[async_trait]
pub trait SwitchInventory: Send + Sync {
    /// All switches currently connected to the fabric
    async fn switches(&self) -> Result<Vec<Dpid>>;

    /// Port numbers of one switch
    async fn ports(&self, dpid: Dpid) -> Result<Vec<PortNo>>;

    /// Known host-to-port bindings
    async fn hosts(&self) -> Result<Vec<HostBinding>>;
}

/// Per-switch flow counter snapshots
#[async_trait]
pub trait FlowStatsSource: Send + Sync {
    /// Request the flow entries of one switch, filtered by cookie.
    async fn request_flow_stats(
        &self,
        dpid: Dpid,
        filter: StatsFilter,
    ) -> Result<Vec<FlowStatsEntry>>;
}
