//! Types for the controller runtime and the transport agent link.

use crate::transport::SwitchHandle;
use flowrules::{Command, MacAddress, PortDescriptor, SwitchId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

/// Group serving traffic that arrives on the surviving ring port.
pub const GROUP_FROM_SURVIVOR: u32 = 51;
/// Group serving traffic that arrives on the failed ring port.
pub const GROUP_FROM_FAILED: u32 = 52;
/// Group carrying traffic from the attached host onto the ring.
pub const GROUP_HOST_UPLINK: u32 = 53;

pub const PRIORITY_FORWARD: u16 = 1;
pub const PRIORITY_HOST: u16 = 100;

/// Ring ports assumed for a switch missing from the configured topology.
pub const DEFAULT_RING_PORTS: [u32; 2] = [1, 2];

/// Controller runtime configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Interval between port description polls
    pub poll_interval: Duration,

    /// Socket path for the transport agent
    pub transport_socket: String,

    /// Inbound event channel buffer size
    pub event_channel_size: usize,

    /// Outbound command channel buffer size
    pub command_channel_size: usize,

    /// Whether to serve Prometheus metrics
    pub metrics_enabled: bool,

    /// Metrics listen address
    pub metrics_listen_addr: String,

    /// Ring layout and host attachments
    pub topology: Topology,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            transport_socket: "/var/run/ringguard/transport.sock".to_string(),
            event_channel_size: 1024,
            command_channel_size: 4096,
            metrics_enabled: false,
            metrics_listen_addr: "127.0.0.1:9480".to_string(),
            topology: Topology::default(),
        }
    }
}

/// A host attached to a switch through its uplink port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAttachment {
    pub name: String,
    pub ip: Ipv4Addr,
    pub mac: MacAddress,
    pub uplink_port: u32,
}

/// Forwarding profile of one ring switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchProfile {
    pub ring_ports: [u32; 2],
    pub host: Option<HostAttachment>,
}

impl Default for SwitchProfile {
    fn default() -> Self {
        Self {
            ring_ports: DEFAULT_RING_PORTS,
            host: None,
        }
    }
}

impl SwitchProfile {
    pub fn uplink_port(&self) -> Option<u32> {
        self.host.as_ref().map(|h| h.uplink_port)
    }
}

/// Fixed ring topology, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    switches: BTreeMap<SwitchId, SwitchProfile>,
}

impl Topology {
    pub fn new(switches: BTreeMap<SwitchId, SwitchProfile>) -> Self {
        Self { switches }
    }

    /// Profile for `id`, or the default profile when the switch is not configured.
    pub fn profile(&self, id: SwitchId) -> SwitchProfile {
        self.switches.get(&id).cloned().unwrap_or_default()
    }

    pub fn is_configured(&self, id: SwitchId) -> bool {
        self.switches.contains_key(&id)
    }

    pub fn switches(&self) -> impl Iterator<Item = (&SwitchId, &SwitchProfile)> {
        self.switches.iter()
    }

    /// Every host address the ring routes to, in ascending order.
    pub fn host_destinations(&self) -> Vec<Ipv4Addr> {
        let mut hosts: Vec<Ipv4Addr> = self
            .switches
            .values()
            .filter_map(|p| p.host.as_ref().map(|h| h.ip))
            .collect();
        hosts.sort_unstable();
        hosts.dedup();
        hosts
    }
}

impl Default for Topology {
    /// Six-switch ring with `h1` on `s1` and `h2` on `s5`.
    fn default() -> Self {
        let mut switches = BTreeMap::new();
        for id in 1..=6u64 {
            switches.insert(SwitchId(id), SwitchProfile::default());
        }

        let attach = |name: &str, ip: [u8; 4], last_octet: u8| HostAttachment {
            name: name.to_string(),
            ip: Ipv4Addr::from(ip),
            mac: MacAddress::new([0, 0, 0, 0, 0, last_octet]),
            uplink_port: 3,
        };

        if let Some(p) = switches.get_mut(&SwitchId(1)) {
            p.host = Some(attach("h1", [10, 0, 1, 2], 1));
        }
        if let Some(p) = switches.get_mut(&SwitchId(5)) {
            p.host = Some(attach("h2", [10, 0, 2, 2], 2));
        }

        Self { switches }
    }
}

/// Recovery state of an inter-switch port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    Up,
    /// Traffic has been rerouted around this port. No automatic way back.
    DownRerouted,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Up => write!(f, "UP"),
            LinkState::DownRerouted => write!(f, "DOWN_REROUTED"),
        }
    }
}

/// Reason carried by a port status message (OFPPR_*).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortStatusReason {
    Add,
    Delete,
    Modify,
}

/// A packet the switch sent to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketIn {
    pub switch_id: SwitchId,
    #[serde(default)]
    pub buffer_id: Option<u32>,
    pub eth_type: u16,
    pub src: MacAddress,
    pub dst: MacAddress,
    pub in_port: u32,
    #[serde(default)]
    pub payload: Vec<u8>,
}

/// Inbound event delivered to the controller.
#[derive(Clone)]
pub enum Event {
    SwitchConnected {
        switch_id: SwitchId,
        handle: Arc<dyn SwitchHandle>,
        ports: Vec<PortDescriptor>,
    },
    PortDescStatsReply {
        switch_id: SwitchId,
        ports: Vec<PortDescriptor>,
    },
    PortStatus {
        switch_id: SwitchId,
        reason: PortStatusReason,
        port: PortDescriptor,
    },
    PacketIn(PacketIn),
}

impl Event {
    pub fn switch_id(&self) -> SwitchId {
        match self {
            Event::SwitchConnected { switch_id, .. }
            | Event::PortDescStatsReply { switch_id, .. }
            | Event::PortStatus { switch_id, .. } => *switch_id,
            Event::PacketIn(p) => p.switch_id,
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::SwitchConnected { .. } => "switch_connected",
            Event::PortDescStatsReply { .. } => "port_desc_stats_reply",
            Event::PortStatus { .. } => "port_status",
            Event::PacketIn(_) => "packet_in",
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::SwitchConnected {
                switch_id, ports, ..
            } => f
                .debug_struct("SwitchConnected")
                .field("switch_id", switch_id)
                .field("ports", ports)
                .finish_non_exhaustive(),
            Event::PortDescStatsReply { switch_id, ports } => f
                .debug_struct("PortDescStatsReply")
                .field("switch_id", switch_id)
                .field("ports", ports)
                .finish(),
            Event::PortStatus {
                switch_id,
                reason,
                port,
            } => f
                .debug_struct("PortStatus")
                .field("switch_id", switch_id)
                .field("reason", reason)
                .field("port", port)
                .finish(),
            Event::PacketIn(p) => f.debug_tuple("PacketIn").field(p).finish(),
        }
    }
}

/// Message from the transport agent to the controller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    SwitchConnected {
        switch_id: SwitchId,
        #[serde(default)]
        ports: Vec<PortDescriptor>,
    },
    PortDescStatsReply {
        switch_id: SwitchId,
        ports: Vec<PortDescriptor>,
    },
    PortStatus {
        switch_id: SwitchId,
        reason: PortStatusReason,
        port: PortDescriptor,
    },
    PacketIn(PacketIn),
}

/// Message from the controller to the transport agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundCommand {
    pub switch_id: SwitchId,
    pub command: Command,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_topology() {
        let topology = Topology::default();
        assert_eq!(topology.switches().count(), 6);
        assert_eq!(
            topology.host_destinations(),
            vec![
                "10.0.1.2".parse::<Ipv4Addr>().unwrap(),
                "10.0.2.2".parse::<Ipv4Addr>().unwrap()
            ]
        );

        let s1 = topology.profile(SwitchId(1));
        assert_eq!(s1.ring_ports, [1, 2]);
        assert_eq!(s1.uplink_port(), Some(3));
        assert_eq!(s1.host.unwrap().mac.to_string(), "00:00:00:00:00:01");
        assert!(topology.profile(SwitchId(2)).host.is_none());
    }

    #[test]
    fn test_unconfigured_switch_gets_default_profile() {
        let topology = Topology::default();
        assert!(!topology.is_configured(SwitchId(42)));
        assert_eq!(topology.profile(SwitchId(42)), SwitchProfile::default());
    }

    #[test]
    fn test_agent_message_decoding() {
        let line = r#"{"type":"port_status","switch_id":1,"reason":"modify",
            "port":{"name":"s1-eth2","hw_addr":"00:00:00:00:01:02","port_no":2,"state":1}}"#;

        match serde_json::from_str::<AgentMessage>(line).unwrap() {
            AgentMessage::PortStatus {
                switch_id,
                reason,
                port,
            } => {
                assert_eq!(switch_id, SwitchId(1));
                assert_eq!(reason, PortStatusReason::Modify);
                assert_eq!(port.name, "s1-eth2");
                assert!(!port.state.is_enabled());
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_link_state_display() {
        assert_eq!(LinkState::Up.to_string(), "UP");
        assert_eq!(LinkState::DownRerouted.to_string(), "DOWN_REROUTED");
    }
}
