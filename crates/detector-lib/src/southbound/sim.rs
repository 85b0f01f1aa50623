//! Scriptable in-memory fabric
//!
//! Implements both southbound traits over shared state so the engine can be
//! driven without a controller: tests script switches, flows and removals
//! directly, and the standalone binary runs a small demo topology with
//! synthetic churn.

use super::{FlowStatsSource, StatsFilter, SwitchInventory};
use crate::models::{
    AttachmentPoint, Dpid, FlowCookie, FlowRemoved, FlowStatsEntry, HostBinding, PortNo,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::interval;

/// Capacity of the removal broadcast channel
const REMOVAL_CHANNEL_CAPACITY: usize = 1024;

/// Demo churn: ticks a synthetic flow lives before being expired
const FLOW_LIFETIME_TICKS: u64 = 8;

#[derive(Default)]
struct SimSwitch {
    ports: Vec<PortNo>,
    /// cookie -> cumulative packet count
    flows: HashMap<FlowCookie, u64>,
    /// Injected latency for stats requests
    stall: Option<Duration>,
}

/// In-memory switch fabric
pub struct SimFabric {
    switches: DashMap<Dpid, SimSwitch>,
    hosts: DashMap<AttachmentPoint, String>,
    removal_tx: broadcast::Sender<FlowRemoved>,
}

impl Default for SimFabric {
    fn default() -> Self {
        Self::new()
    }
}

impl SimFabric {
    pub fn new() -> Self {
        let (removal_tx, _) = broadcast::channel(REMOVAL_CHANNEL_CAPACITY);
        Self {
            switches: DashMap::new(),
            hosts: DashMap::new(),
            removal_tx,
        }
    }

    /// Two switches with four host ports each, hosts bound to every port.
    /// Gives a standalone run something to sample.
    pub fn with_demo_topology() -> Self {
        let fabric = Self::new();
        for dpid in [1u64, 2u64] {
            fabric.add_switch(dpid, vec![1, 2, 3, 4]);
            for port in 1u32..=4 {
                fabric.bind_host(format!("02:00:00:00:{:02x}:{:02x}", dpid, port), dpid, port);
            }
        }
        fabric
    }

    /// Add a switch with the given ports (replaces any existing state).
    pub fn add_switch(&self, dpid: Dpid, ports: Vec<PortNo>) {
        self.switches.insert(
            dpid,
            SimSwitch {
                ports,
                ..Default::default()
            },
        );
    }

    /// Bind a host to an attachment point.
    pub fn bind_host(&self, host_id: impl Into<String>, dpid: Dpid, port: PortNo) {
        self.hosts
            .insert(AttachmentPoint::new(dpid, port), host_id.into());
    }

    /// Upsert a flow entry with an absolute cumulative packet count.
    /// Creates the switch if it does not exist yet.
    pub fn install_flow(&self, dpid: Dpid, cookie: FlowCookie, packet_count: u64) {
        self.switches
            .entry(dpid)
            .or_default()
            .flows
            .insert(cookie, packet_count);
    }

    /// Remove a flow entry and broadcast its removal with the final count.
    /// Returns false if the flow was not installed.
    pub fn expire_flow(&self, dpid: Dpid, cookie: FlowCookie) -> bool {
        let removed = self
            .switches
            .get_mut(&dpid)
            .and_then(|mut sw| sw.flows.remove(&cookie));

        match removed {
            Some(packet_count) => {
                let _ = self.removal_tx.send(FlowRemoved {
                    cookie,
                    packet_count,
                });
                true
            }
            None => false,
        }
    }

    /// Broadcast a removal event without touching switch state. Lets tests
    /// inject notifications for flows no switch ever reported.
    pub fn emit_removal(&self, removed: FlowRemoved) {
        let _ = self.removal_tx.send(removed);
    }

    /// Drop a flow entry without any removal notification, as a switch that
    /// lost state (or a dropped message) would. Returns false if the flow
    /// was not installed.
    pub fn vanish_flow(&self, dpid: Dpid, cookie: FlowCookie) -> bool {
        self.switches
            .get_mut(&dpid)
            .and_then(|mut sw| sw.flows.remove(&cookie))
            .is_some()
    }

    /// Delay every future stats request to `dpid` by `delay`.
    pub fn stall_switch(&self, dpid: Dpid, delay: Duration) {
        if let Some(mut sw) = self.switches.get_mut(&dpid) {
            sw.stall = Some(delay);
        }
    }

    /// New subscription to the removal feed.
    pub fn removal_feed(&self) -> broadcast::Receiver<FlowRemoved> {
        self.removal_tx.subscribe()
    }

    /// Background task that walks synthetic flows across the topology:
    /// counters rise every tick and each flow is expired and replaced after
    /// a fixed lifetime, so removals and reconciliation stay exercised.
    pub fn spawn_traffic(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(1));
            let mut tick = 0u64;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tick += 1;
                        self.churn(tick);
                    }
                    _ = shutdown.recv() => break,
                }
            }
        })
    }

    fn churn(&self, tick: u64) {
        // Snapshot the topology first; mutating the map while iterating it
        // would contend on the same shards.
        let topo: Vec<(Dpid, Vec<PortNo>)> = self
            .switches
            .iter()
            .map(|e| (*e.key(), e.value().ports.clone()))
            .collect();

        let generation = tick / FLOW_LIFETIME_TICKS;
        for (dpid, ports) in topo {
            for port in ports {
                let ap = AttachmentPoint::new(dpid, port);
                if tick % FLOW_LIFETIME_TICKS == 0 && generation > 0 {
                    let old = FlowCookie::for_attachment_point(ap, (generation - 1) << 32);
                    self.expire_flow(dpid, old);
                }
                let cookie = FlowCookie::for_attachment_point(ap, generation << 32);
                let rate = 5 + (dpid * 3 + port as u64) % 11;
                let age = tick - generation * FLOW_LIFETIME_TICKS;
                self.install_flow(dpid, cookie, age * rate);
            }
        }
    }
}

#[async_trait]
impl SwitchInventory for SimFabric {
    async fn switches(&self) -> Result<Vec<Dpid>> {
        let mut dpids: Vec<Dpid> = self.switches.iter().map(|e| *e.key()).collect();
        dpids.sort_unstable();
        Ok(dpids)
    }

    async fn ports(&self, dpid: Dpid) -> Result<Vec<PortNo>> {
        self.switches
            .get(&dpid)
            .map(|sw| sw.ports.clone())
            .ok_or_else(|| anyhow!("Unknown switch {}", dpid))
    }

    async fn hosts(&self) -> Result<Vec<HostBinding>> {
        Ok(self
            .hosts
            .iter()
            .map(|e| HostBinding {
                host_id: e.value().clone(),
                dpid: e.key().dpid,
                port: e.key().port,
            })
            .collect())
    }
}

#[async_trait]
impl FlowStatsSource for SimFabric {
    async fn request_flow_stats(
        &self,
        dpid: Dpid,
        filter: StatsFilter,
    ) -> Result<Vec<FlowStatsEntry>> {
        // Copy the stall out before sleeping; holding a map guard across an
        // await point would block writers.
        let stall = self.switches.get(&dpid).and_then(|sw| sw.stall);
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }

        self.switches
            .get(&dpid)
            .map(|sw| {
                sw.flows
                    .iter()
                    .filter(|(cookie, _)| filter.matches(**cookie))
                    .map(|(cookie, packet_count)| FlowStatsEntry {
                        cookie: *cookie,
                        packet_count: *packet_count,
                    })
                    .collect()
            })
            .ok_or_else(|| anyhow!("Unknown switch {}", dpid))
    }
}
