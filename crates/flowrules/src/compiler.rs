//! Stateless translation from forwarding intents to table commands.

use crate::commands::{Command, PacketOut};
use crate::types::{Action, Bucket, FlowEntry, GroupEntry, GroupType, MAIN_TABLE, Match};

/// Priority of the catch-all entry that sends unmatched packets to the controller.
pub const TABLE_MISS_PRIORITY: u16 = 0;

/// Install or replace the flow keyed by `(table_id, priority, matcher)`.
pub fn install_flow(table_id: u8, priority: u16, matcher: Match, actions: Vec<Action>) -> Command {
    Command::FlowInstall {
        entry: FlowEntry {
            table_id,
            priority,
            matcher,
            actions,
        },
        buffer_id: None,
    }
}

/// Delete every entry in `table_id`.
pub fn flush_table(table_id: u8) -> Command {
    Command::FlowFlush { table_id }
}

/// Lowest-priority catch-all that sends unmatched traffic to the controller.
pub fn table_miss() -> Command {
    install_flow(MAIN_TABLE, TABLE_MISS_PRIORITY, Match::any(), vec![Action::to_controller()])
}

/// Two-bucket fast-failover group.
///
/// The first bucket watches `primary` and forwards out of it. The second
/// bucket watches `backup` and sends the packet back out its ingress port,
/// so for traffic that arrived on `backup` the effective output becomes
/// `backup` once `primary` goes down.
pub fn build_failover_group(primary: u32, backup: u32, group_id: u32) -> Command {
    fast_failover(
        group_id,
        vec![
            Bucket {
                watch_port: primary,
                actions: vec![Action::output(primary)],
            },
            Bucket {
                watch_port: backup,
                actions: vec![Action::in_port()],
            },
        ],
    )
}

/// Two-bucket fast-failover group whose buckets output to the port they watch.
pub fn build_uplink_group(first: u32, second: u32, group_id: u32) -> Command {
    fast_failover(
        group_id,
        vec![
            Bucket {
                watch_port: first,
                actions: vec![Action::output(first)],
            },
            Bucket {
                watch_port: second,
                actions: vec![Action::output(second)],
            },
        ],
    )
}

fn fast_failover(group_id: u32, buckets: Vec<Bucket>) -> Command {
    Command::GroupInstall {
        group: GroupEntry {
            group_id,
            group_type: GroupType::FastFailover,
            buckets,
        },
    }
}

/// Emit a packet, either from a switch buffer or with its bytes.
pub fn packet_out(
    buffer_id: Option<u32>,
    in_port: u32,
    actions: Vec<Action>,
    payload: &[u8],
) -> Command {
    let payload = match buffer_id {
        Some(_) => None,
        None => Some(payload.to_vec()),
    };

    Command::PacketOut(PacketOut {
        buffer_id,
        in_port,
        actions,
        payload,
    })
}
