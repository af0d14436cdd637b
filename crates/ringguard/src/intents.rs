//! Forwarding intents of a ring switch, expressed as table commands.

use crate::types::{
    GROUP_FROM_FAILED, GROUP_FROM_SURVIVOR, GROUP_HOST_UPLINK, HostAttachment, PRIORITY_FORWARD,
    PRIORITY_HOST, SwitchProfile,
};
use flowrules::compiler::{self, build_failover_group, build_uplink_group, install_flow};
use flowrules::{Action, Command, MAIN_TABLE, Match};
use std::net::Ipv4Addr;

/// Rules installed when a switch first connects.
///
/// Table-miss, ring forwarding in both directions for every host, then the
/// host-redirect and return-path rules when a host is attached.
pub fn baseline(profile: &SwitchProfile, hosts: &[Ipv4Addr]) -> Vec<Command> {
    let [a, b] = profile.ring_ports;
    let mut commands = vec![compiler::table_miss()];

    for &host in hosts {
        commands.push(ring_forward(a, b, host));
        commands.push(ring_forward(b, a, host));
    }

    if let Some(ref host) = profile.host {
        commands.push(host_redirect(host));
        commands.push(install_flow(
            MAIN_TABLE,
            PRIORITY_FORWARD,
            Match::any().in_port(host.uplink_port),
            vec![Action::output(a)],
        ));
    }

    commands
}

/// `{in_port=from, IPv4, ipv4_dst=host} -> output to`
pub fn ring_forward(from: u32, to: u32, host: Ipv4Addr) -> Command {
    install_flow(
        MAIN_TABLE,
        PRIORITY_FORWARD,
        Match::any().in_port(from).ipv4_dst(host),
        vec![Action::output(to)],
    )
}

/// Rewrite the destination MAC of traffic for the attached host and send it down the uplink.
pub fn host_redirect(host: &HostAttachment) -> Command {
    install_flow(
        MAIN_TABLE,
        PRIORITY_HOST,
        Match::any().ipv4_dst(host.ip),
        vec![
            Action::SetEthDst { mac: host.mac },
            Action::output(host.uplink_port),
        ],
    )
}

/// Rules that replace the main table once `failed_port` has gone down.
///
/// Groups are installed first so the flows that reference them never point
/// at a missing group. The batch flushes the table before reinstalling.
pub fn reroute(
    profile: &SwitchProfile,
    hosts: &[Ipv4Addr],
    surviving_port: u32,
    failed_port: u32,
) -> Vec<Command> {
    let mut commands = vec![
        build_failover_group(failed_port, surviving_port, GROUP_FROM_SURVIVOR),
        build_failover_group(surviving_port, failed_port, GROUP_FROM_FAILED),
        compiler::flush_table(MAIN_TABLE),
    ];

    for (ingress, group_id) in [
        (surviving_port, GROUP_FROM_SURVIVOR),
        (failed_port, GROUP_FROM_FAILED),
    ] {
        for &host in hosts {
            commands.push(install_flow(
                MAIN_TABLE,
                PRIORITY_FORWARD,
                Match::any().in_port(ingress).ipv4_dst(host),
                vec![Action::group(group_id)],
            ));
        }
    }

    if let Some(ref host) = profile.host {
        let [first, second] = profile.ring_ports;
        commands.push(host_redirect(host));
        commands.push(build_uplink_group(first, second, GROUP_HOST_UPLINK));
        commands.push(install_flow(
            MAIN_TABLE,
            PRIORITY_FORWARD,
            Match::any().in_port(host.uplink_port).ipv4_src(host.ip),
            vec![Action::group(GROUP_HOST_UPLINK)],
        ));
    }

    commands.push(compiler::table_miss());
    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Topology;
    use flowrules::{SwitchId, SwitchTables};

    #[test]
    fn test_baseline_plain_switch() {
        let topology = Topology::default();
        let commands = baseline(&topology.profile(SwitchId(2)), &topology.host_destinations());

        // table-miss + 2 hosts x 2 directions
        assert_eq!(commands.len(), 5);
        assert_eq!(commands[0], compiler::table_miss());
        assert!(commands.iter().all(|c| c.as_flow().is_some()));
    }

    #[test]
    fn test_reroute_orders_groups_before_flush() {
        let topology = Topology::default();
        let commands = reroute(&topology.profile(SwitchId(1)), &topology.host_destinations(), 1, 2);

        assert_eq!(commands[0].as_group().unwrap().group_id, GROUP_FROM_SURVIVOR);
        assert_eq!(commands[1].as_group().unwrap().group_id, GROUP_FROM_FAILED);
        assert_eq!(commands[2], compiler::flush_table(MAIN_TABLE));
        assert_eq!(commands.last(), Some(&compiler::table_miss()));
    }

    #[test]
    fn test_reroute_leaves_no_overlap() {
        let topology = Topology::default();
        let profile = topology.profile(SwitchId(5));
        let mut tables = SwitchTables::new();

        for cmd in baseline(&profile, &topology.host_destinations()) {
            tables.apply(&cmd);
        }
        assert!(tables.overlapping_entries().is_empty());

        for cmd in reroute(&profile, &topology.host_destinations(), 2, 1) {
            tables.apply(&cmd);
        }
        assert!(tables.overlapping_entries().is_empty());
        assert_eq!(tables.flows_with_priority(MAIN_TABLE, PRIORITY_HOST).len(), 1);
        assert_eq!(tables.group_count(), 3);
    }
}
