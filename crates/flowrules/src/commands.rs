//! Controller-to-switch commands.
//!
//! Each command corresponds to one OpenFlow 1.3 message. Encoding onto the
//! wire is left to the transport agent.

use crate::types::{Action, FlowEntry, GroupEntry};
use serde::{Deserialize, Serialize};

/// Packet-out message. References a switch buffer when one exists,
/// otherwise carries the packet bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketOut {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_id: Option<u32>,
    pub in_port: u32,
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,
}

/// A command addressed to one switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Install or replace a flow entry (OFPFC_ADD).
    FlowInstall {
        entry: FlowEntry,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        buffer_id: Option<u32>,
    },
    /// Delete every entry of a table (OFPFC_DELETE with an empty match).
    FlowFlush { table_id: u8 },
    /// Install or replace a group entry.
    GroupInstall { group: GroupEntry },
    PacketOut(PacketOut),
    /// Request the port descriptions (OFPMP_PORT_DESC).
    PortDescStatsRequest,
}

impl Command {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::FlowInstall { .. } => "flow_install",
            Command::FlowFlush { .. } => "flow_flush",
            Command::GroupInstall { .. } => "group_install",
            Command::PacketOut(_) => "packet_out",
            Command::PortDescStatsRequest => "port_desc_stats_request",
        }
    }

    pub fn as_flow(&self) -> Option<&FlowEntry> {
        match self {
            Command::FlowInstall { entry, .. } => Some(entry),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&GroupEntry> {
        match self {
            Command::GroupInstall { group } => Some(group),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Match;

    #[test]
    fn test_flow_install_json_shape() {
        let cmd = Command::FlowInstall {
            entry: FlowEntry {
                table_id: 0,
                priority: 0,
                matcher: Match::any(),
                actions: vec![Action::to_controller()],
            },
            buffer_id: None,
        };

        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "flow_install");
        assert_eq!(json["entry"]["priority"], 0);
        assert!(json["entry"]["match"].as_object().unwrap().is_empty());
        assert_eq!(json["entry"]["actions"][0]["type"], "output");
        assert!(json.get("buffer_id").is_none());
    }
}
