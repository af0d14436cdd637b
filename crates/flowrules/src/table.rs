//! Software mirror of a switch's flow and group tables.
//!
//! Applies the same commands the switch receives and answers questions about
//! the resulting state: which entry wins for a packet, which bucket a
//! fast-failover group selects, and whether equal-priority entries overlap.

use crate::commands::Command;
use crate::types::{Action, FlowEntry, FlowKey, GroupEntry, PacketFields, port_no};
use std::collections::BTreeMap;

/// Flow and group tables of one switch.
#[derive(Debug, Clone, Default)]
pub struct SwitchTables {
    flows: BTreeMap<FlowKey, FlowEntry>,
    groups: BTreeMap<u32, GroupEntry>,
}

impl SwitchTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a command. Commands that do not touch the tables are ignored.
    pub fn apply(&mut self, command: &Command) {
        match command {
            Command::FlowInstall { entry, .. } => {
                self.flows.insert(entry.key(), entry.clone());
            }
            Command::FlowFlush { table_id } => {
                self.flows.retain(|key, _| key.table_id != *table_id);
            }
            Command::GroupInstall { group } => {
                self.groups.insert(group.group_id, group.clone());
            }
            Command::PacketOut(_) | Command::PortDescStatsRequest => {}
        }
    }

    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Entries in `table_id`, in key order.
    pub fn flows(&self, table_id: u8) -> impl Iterator<Item = &FlowEntry> {
        self.flows.values().filter(move |e| e.table_id == table_id)
    }

    pub fn flows_with_priority(&self, table_id: u8, priority: u16) -> Vec<&FlowEntry> {
        self.flows(table_id)
            .filter(|e| e.priority == priority)
            .collect()
    }

    pub fn group(&self, group_id: u32) -> Option<&GroupEntry> {
        self.groups.get(&group_id)
    }

    /// The highest-priority entry in `table_id` matching `packet`.
    pub fn lookup(&self, table_id: u8, packet: &PacketFields) -> Option<&FlowEntry> {
        self.flows(table_id)
            .filter(|e| e.matcher.matches(packet))
            .max_by_key(|e| e.priority)
    }

    /// Physical port the packet leaves through, resolving groups and `IN_PORT`.
    ///
    /// Returns `None` when the packet is dropped or sent to a reserved port.
    pub fn resolve_output(
        &self,
        table_id: u8,
        packet: &PacketFields,
        is_live: impl Fn(u32) -> bool,
    ) -> Option<u32> {
        let entry = self.lookup(table_id, packet)?;
        self.output_of(&entry.actions, packet.in_port, &is_live)
    }

    fn output_of(
        &self,
        actions: &[Action],
        in_port: u32,
        is_live: &dyn Fn(u32) -> bool,
    ) -> Option<u32> {
        for action in actions {
            match action {
                Action::Output { port, .. } => {
                    return match *port {
                        port_no::IN_PORT => Some(in_port),
                        p if p <= port_no::MAX => Some(p),
                        _ => None,
                    };
                }
                Action::Group { group_id } => {
                    let bucket = self.group(*group_id)?.select(is_live)?;
                    return self.output_of(&bucket.actions, in_port, is_live);
                }
                Action::SetEthDst { .. } => {}
            }
        }
        None
    }

    /// Pairs of entries with equal priority whose matches overlap.
    pub fn overlapping_entries(&self) -> Vec<(&FlowEntry, &FlowEntry)> {
        let entries: Vec<&FlowEntry> = self.flows.values().collect();
        let mut pairs = Vec::new();

        for (i, a) in entries.iter().enumerate() {
            for b in &entries[i + 1..] {
                if a.table_id == b.table_id
                    && a.priority == b.priority
                    && a.matcher.overlaps(&b.matcher)
                {
                    pairs.push((*a, *b));
                }
            }
        }

        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{build_failover_group, flush_table, install_flow, table_miss};
    use crate::types::{MAIN_TABLE, Match};
    use std::net::Ipv4Addr;

    fn h1() -> Ipv4Addr {
        "10.0.1.2".parse().unwrap()
    }

    fn h2() -> Ipv4Addr {
        "10.0.2.2".parse().unwrap()
    }

    #[test]
    fn test_install_is_replace() {
        let mut tables = SwitchTables::new();
        let matcher = Match::any().in_port(1).ipv4_dst(h2());
        let cmd = install_flow(MAIN_TABLE, 1, matcher.clone(), vec![Action::output(2)]);

        tables.apply(&cmd);
        tables.apply(&cmd);
        assert_eq!(tables.flow_count(), 1);

        // Same key, new actions: still one entry, actions replaced
        let replaced = install_flow(MAIN_TABLE, 1, matcher, vec![Action::output(3)]);
        tables.apply(&replaced);
        assert_eq!(tables.flow_count(), 1);
        assert_eq!(
            tables.flows(MAIN_TABLE).next().unwrap().actions,
            vec![Action::output(3)]
        );
    }

    #[test]
    fn test_flush_clears_only_that_table() {
        let mut tables = SwitchTables::new();
        tables.apply(&table_miss());
        tables.apply(&install_flow(1, 5, Match::any(), vec![Action::output(1)]));
        tables.apply(&build_failover_group(1, 2, 51));

        tables.apply(&flush_table(MAIN_TABLE));
        assert_eq!(tables.flows(MAIN_TABLE).count(), 0);
        assert_eq!(tables.flow_count(), 1);
        assert_eq!(tables.group_count(), 1);
    }

    #[test]
    fn test_lookup_highest_priority_wins() {
        let mut tables = SwitchTables::new();
        tables.apply(&table_miss());
        tables.apply(&install_flow(
            MAIN_TABLE,
            100,
            Match::any().ipv4_dst(h1()),
            vec![Action::output(3)],
        ));
        tables.apply(&install_flow(
            MAIN_TABLE,
            1,
            Match::any().in_port(2).ipv4_dst(h1()),
            vec![Action::output(1)],
        ));

        let packet = PacketFields::ipv4(2, h2(), h1());
        assert_eq!(tables.lookup(MAIN_TABLE, &packet).unwrap().priority, 100);
        assert_eq!(tables.resolve_output(MAIN_TABLE, &packet, |_| true), Some(3));

        let other = PacketFields::ipv4(2, h1(), h2());
        assert_eq!(tables.lookup(MAIN_TABLE, &other).unwrap().priority, 0);
        assert_eq!(tables.resolve_output(MAIN_TABLE, &other, |_| true), None);
    }

    #[test]
    fn test_failover_group_falls_back_to_ingress() {
        let mut tables = SwitchTables::new();
        tables.apply(&build_failover_group(2, 1, 51));
        tables.apply(&install_flow(
            MAIN_TABLE,
            1,
            Match::any().in_port(1).ipv4_dst(h2()),
            vec![Action::group(51)],
        ));

        let packet = PacketFields::ipv4(1, h1(), h2());

        // Primary port live: forward onward
        assert_eq!(tables.resolve_output(MAIN_TABLE, &packet, |_| true), Some(2));

        // Primary port down: bounce back out the ingress port
        assert_eq!(tables.resolve_output(MAIN_TABLE, &packet, |p| p != 2), Some(1));

        // Both down: nothing selected
        assert_eq!(tables.resolve_output(MAIN_TABLE, &packet, |_| false), None);
    }

    #[test]
    fn test_overlap_audit() {
        let mut tables = SwitchTables::new();
        tables.apply(&install_flow(
            MAIN_TABLE,
            1,
            Match::any().in_port(1).ipv4_dst(h1()),
            vec![Action::output(2)],
        ));
        tables.apply(&install_flow(
            MAIN_TABLE,
            1,
            Match::any().in_port(1).ipv4_dst(h2()),
            vec![Action::output(2)],
        ));
        assert!(tables.overlapping_entries().is_empty());

        tables.apply(&install_flow(

            MAIN_TABLE,

            1,

            Match::any().in_port(1),

            vec![Action::output(2)],

        ));
        assert_eq!(tables.overlapping_entries().len(), 2);
    }
}
