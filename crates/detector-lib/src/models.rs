//! Core data models for the DDoS detector

use serde::{Deserialize, Serialize};

/// Datapath identifier of a switch
pub type Dpid = u64;

/// Switch port number
pub type PortNo = u32;

/// Cookie bits holding the port number of the owning attachment point
pub const PORT_MASK: u64 = 0x0000_0000_FFFF_0000;

/// Cookie bits holding the low 16 bits of the owning datapath id
pub const DPID_MASK: u64 = 0x0000_0000_0000_FFFF;

const PORT_SHIFT: u32 = 16;

/// A host-facing switch port. All detection state is keyed by this pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttachmentPoint {
    pub dpid: Dpid,
    pub port: PortNo,
}

impl AttachmentPoint {
    pub fn new(dpid: Dpid, port: PortNo) -> Self {
        Self { dpid, port }
    }
}

impl std::fmt::Display for AttachmentPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.dpid, self.port)
    }
}

/// Per-flow correlation key carried by every flow entry.
///
/// The owning attachment point is packed into fixed bit positions (port in
/// bits 16..32, low 16 bits of the dpid in bits 0..16), so any stats reply or
/// removal event can be traced back to the host port it belongs to without
/// knowing which switch reported it. The remaining bits are free for
/// flow-specific use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowCookie(u64);

impl FlowCookie {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Build a cookie owned by `ap`, keeping the bits of `flow_bits` that do
    /// not collide with the attachment-point fields.
    ///
    /// Only the low 16 bits of the dpid are representable; the cookie layout
    /// truncates anything above them.
    pub fn for_attachment_point(ap: AttachmentPoint, flow_bits: u64) -> Self {
        let packed = (((ap.port as u64) << PORT_SHIFT) & PORT_MASK) | (ap.dpid & DPID_MASK);
        Self(packed | (flow_bits & !(PORT_MASK | DPID_MASK)))
    }

    /// Recover the owning attachment point from the packed bits.
    pub fn attachment_point(self) -> AttachmentPoint {
        AttachmentPoint {
            dpid: self.0 & DPID_MASK,
            port: ((self.0 & PORT_MASK) >> PORT_SHIFT) as PortNo,
        }
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for FlowCookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// One flow entry from a switch flow-stats reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowStatsEntry {
    pub cookie: FlowCookie,
    /// Cumulative packets matched by this flow since installation
    pub packet_count: u64,
}

/// Notification that a switch evicted a flow entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowRemoved {
    pub cookie: FlowCookie,
    /// Final cumulative packet count reported with the eviction
    pub packet_count: u64,
}

/// A host known to sit behind an attachment point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostBinding {
    pub host_id: String,
    pub dpid: Dpid,
    pub port: PortNo,
}

impl HostBinding {
    pub fn attachment_point(&self) -> AttachmentPoint {
        AttachmentPoint::new(self.dpid, self.port)
    }
}

/// Traffic summary classified once per epoch per attachment point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Number of live flow entries observed this epoch
    pub live_flows: f64,
    /// Net flow creation per epoch: live minus previous plus removed
    pub flow_rate: f64,
    /// Mean per-flow packet-count delta since the previous epoch
    pub mean_packet_delta: f64,
    /// Population standard deviation of the per-flow deltas
    pub stddev_packet_delta: f64,
}

impl FeatureVector {
    /// Order matches the weights-file column order.
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.live_flows,
            self.flow_rate,
            self.mean_packet_delta,
            self.stddev_packet_delta,
        ]
    }
}

/// A malicious verdict for one attachment point in one epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub dpid: Dpid,
    pub port: PortNo,
    /// Host bound to the attachment point, when discovery knows one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub epoch: u64,
    pub score: f64,
    pub features: FeatureVector,
    pub detected_at: i64,
}

impl Detection {
    pub fn attachment_point(&self) -> AttachmentPoint {
        AttachmentPoint::new(self.dpid, self.port)
    }
}
