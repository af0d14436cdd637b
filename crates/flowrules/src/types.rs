//! OpenFlow 1.3 data types used by the rule compiler.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Main flow table.
pub const MAIN_TABLE: u8 = 0;

/// Reserved port numbers (OFPP_*).
pub mod port_no {
    /// Highest number usable by a physical port.
    pub const MAX: u32 = 0xffff_ff00;
    /// Send the packet back out its ingress port.
    pub const IN_PORT: u32 = 0xffff_fff8;
    /// All physical ports except the ingress port.
    pub const FLOOD: u32 = 0xffff_fffb;
    pub const CONTROLLER: u32 = 0xffff_fffd;
    /// The bridge-local port.
    pub const LOCAL: u32 = 0xffff_fffe;
    pub const ANY: u32 = 0xffff_ffff;
}

/// Ask the switch not to buffer packets sent to the controller (OFPCML_NO_BUFFER).
pub const NO_BUFFER: u16 = 0xffff;

/// Ethertypes the controller cares about.
pub mod ether_type {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const LLDP: u16 = 0x88cc;
    pub const IPV6: u16 = 0x86dd;
}

/// Error returned when parsing a MAC address fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid MAC address: {0}")]
pub struct MacParseError(String);

/// A 48-bit Ethernet MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// The broadcast MAC address (FF:FF:FF:FF:FF:FF).
    pub const BROADCAST: MacAddress = MacAddress([0xff; 6]);

    /// Creates a new MAC address from raw bytes.
    pub const fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    /// Returns the raw bytes of the MAC address.
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let separator = if s.contains(':') { ':' } else { '-' };

        let parts: Vec<&str> = s.split(separator).collect();
        if parts.len() != 6 {
            return Err(MacParseError(s.to_string()));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(MacParseError(s.to_string()));
            }
            bytes[i] = u8::from_str_radix(part, 16).map_err(|_| MacParseError(s.to_string()))?;
        }

        Ok(MacAddress(bytes))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = MacParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> String {
        mac.to_string()
    }
}

/// Datapath identifier of a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SwitchId(pub u64);

impl fmt::Display for SwitchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl From<u64> for SwitchId {
    fn from(id: u64) -> Self {
        SwitchId(id)
    }
}

/// Port state bits (OFPPS_*).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortState(pub u32);

impl PortState {
    pub const LINK_DOWN: u32 = 0x1;
    pub const BLOCKED: u32 = 0x2;
    pub const LIVE: u32 = 0x4;

    /// A port counts as enabled only when it reports exactly LIVE.
    pub fn is_enabled(&self) -> bool {
        self.0 == Self::LIVE
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Port configuration bits (OFPPC_*).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortConfig(pub u32);

/// A switch-reported description of one port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescriptor {
    pub name: String,
    pub hw_addr: MacAddress,
    pub port_no: u32,
    #[serde(default)]
    pub config: PortConfig,
    pub state: PortState,
}

impl PortDescriptor {
    /// Whether this describes a reserved port such as the bridge-local one.
    pub fn is_reserved(&self) -> bool {
        self.port_no > port_no::MAX
    }
}

impl fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hw_addr={} name={} config=0x{:08x} state={}",
            self.hw_addr, self.name, self.config.0, self.state
        )
    }
}

/// Flow match predicate. Unset fields are wildcards.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Match {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_port: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eth_type: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eth_dst: Option<MacAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_src: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_dst: Option<Ipv4Addr>,
}

impl Match {
    /// The empty match (matches every packet).
    pub fn any() -> Self {
        Self::default()
    }

    pub fn in_port(mut self, port: u32) -> Self {
        self.in_port = Some(port);
        self
    }

    pub fn eth_type(mut self, eth_type: u16) -> Self {
        self.eth_type = Some(eth_type);
        self
    }

    pub fn eth_dst(mut self, mac: MacAddress) -> Self {
        self.eth_dst = Some(mac);
        self
    }

    /// Match an IPv4 source address. Implies `eth_type=IPv4`.
    pub fn ipv4_src(mut self, addr: Ipv4Addr) -> Self {
        self.eth_type = Some(ether_type::IPV4);
        self.ipv4_src = Some(addr);
        self
    }

    /// Match an IPv4 destination address. Implies `eth_type=IPv4`.
    pub fn ipv4_dst(mut self, addr: Ipv4Addr) -> Self {
        self.eth_type = Some(ether_type::IPV4);
        self.ipv4_dst = Some(addr);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether some packet could satisfy both predicates.
    pub fn overlaps(&self, other: &Match) -> bool {
        fn compatible<T: PartialEq>(a: &Option<T>, b: &Option<T>) -> bool {
            match (a, b) {
                (Some(x), Some(y)) => x == y,
                _ => true,
            }
        }

        compatible(&self.in_port, &other.in_port)
            && compatible(&self.eth_type, &other.eth_type)
            && compatible(&self.eth_dst, &other.eth_dst)
            && compatible(&self.ipv4_src, &other.ipv4_src)
            && compatible(&self.ipv4_dst, &other.ipv4_dst)
    }

    /// Whether a packet with the given header fields satisfies this predicate.
    pub fn matches(&self, packet: &PacketFields) -> bool {
        fn field<T: PartialEq>(want: &Option<T>, have: &Option<T>) -> bool {
            match want {
                Some(w) => have.as_ref() == Some(w),
                None => true,
            }
        }

        self.in_port.is_none_or(|p| p == packet.in_port)
            && self.eth_type.is_none_or(|t| t == packet.eth_type)
            && self.eth_dst.is_none_or(|m| m == packet.eth_dst)
            && field(&self.ipv4_src, &packet.ipv4_src)
            && field(&self.ipv4_dst, &packet.ipv4_dst)
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields = Vec::new();
        if let Some(p) = self.in_port {
            fields.push(format!("in_port={}", p));
        }
        if let Some(t) = self.eth_type {
            fields.push(format!("eth_type=0x{:04x}", t));
        }
        if let Some(m) = self.eth_dst {
            fields.push(format!("eth_dst={}", m));
        }
        if let Some(a) = self.ipv4_src {
            fields.push(format!("ipv4_src={}", a));
        }
        if let Some(a) = self.ipv4_dst {
            fields.push(format!("ipv4_dst={}", a));
        }
        if fields.is_empty() {
            write!(f, "*")
        } else {
            write!(f, "{}", fields.join(","))
        }
    }
}

/// Header fields of a packet, as seen by the flow table lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketFields {
    pub in_port: u32,
    pub eth_type: u16,
    pub eth_dst: MacAddress,
    pub ipv4_src: Option<Ipv4Addr>,
    pub ipv4_dst: Option<Ipv4Addr>,
}

impl PacketFields {
    /// An IPv4 packet between two addresses.
    pub fn ipv4(in_port: u32, src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        Self {
            in_port,
            eth_type: ether_type::IPV4,
            eth_dst: MacAddress::BROADCAST,
            ipv4_src: Some(src),
            ipv4_dst: Some(dst),
        }
    }
}

/// An action applied to a matching packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Output {
        port: u32,
        #[serde(default)]
        max_len: u16,
    },
    SetEthDst {
        mac: MacAddress,
    },
    Group {
        group_id: u32,
    },
}

impl Action {
    pub fn output(port: u32) -> Self {
        Action::Output { port, max_len: 0 }
    }

    /// Send the whole packet to the controller, unbuffered.
    pub fn to_controller() -> Self {
        Action::Output {
            port: port_no::CONTROLLER,
            max_len: NO_BUFFER,
        }
    }

    pub fn flood() -> Self {
        Self::output(port_no::FLOOD)
    }

    pub fn in_port() -> Self {
        Self::output(port_no::IN_PORT)
    }

    pub fn group(group_id: u32) -> Self {
        Action::Group { group_id }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Output { port, .. } => match *port {
                port_no::IN_PORT => write!(f, "output:IN_PORT"),
                port_no::FLOOD => write!(f, "output:FLOOD"),
                port_no::CONTROLLER => write!(f, "output:CONTROLLER"),
                p => write!(f, "output:{}", p),
            },
            Action::SetEthDst { mac } => write!(f, "set_field:{}->eth_dst", mac),
            Action::Group { group_id } => write!(f, "group:{}", group_id),
        }
    }
}

/// Identity of a flow entry: entries with the same key replace each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowKey {
    pub table_id: u8,
    pub priority: u16,
    pub matcher: Match,
}

/// A flow table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEntry {
    pub table_id: u8,
    pub priority: u16,
    #[serde(rename = "match")]
    pub matcher: Match,
    pub actions: Vec<Action>,
}

impl FlowEntry {
    pub fn key(&self) -> FlowKey {
        FlowKey {
            table_id: self.table_id,
            priority: self.priority,
            matcher: self.matcher.clone(),
        }
    }
}

impl fmt::Display for FlowEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actions: Vec<String> = self.actions.iter().map(|a| a.to_string()).collect();
        write!(
            f,
            "table={},priority={},{} actions={}",
            self.table_id,
            self.priority,
            self.matcher,
            actions.join(",")
        )
    }
}

/// Group type. Only fast-failover groups are compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    FastFailover,
}

/// One bucket of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub watch_port: u32,
    pub actions: Vec<Action>,
}

/// A group table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub group_id: u32,
    pub group_type: GroupType,
    pub buckets: Vec<Bucket>,
}

impl GroupEntry {
    /// The bucket a fast-failover group uses: the first whose watch port is live.
    pub fn select(&self, is_live: impl Fn(u32) -> bool) -> Option<&Bucket> {
        self.buckets.iter().find(|b| is_live(b.watch_port))
    }

    /// Every port referenced by a bucket, watched or output.
    pub fn referenced_ports(&self) -> Vec<u32> {
        let mut ports = Vec::new();
        for bucket in &self.buckets {
            ports.push(bucket.watch_port);
            for action in &bucket.actions {
                if let Action::Output { port, .. } = action {
                    if *port <= port_no::MAX {
                        ports.push(*port);
                    }
                }
            }
        }
        ports.sort_unstable();
        ports.dedup();
        ports
    }
}
