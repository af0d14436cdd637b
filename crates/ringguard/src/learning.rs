//! Source-address learning and reactive forwarding for packets sent to the controller.

use crate::metrics::MetricsRegistry;
use crate::registry::SwitchRegistry;
use crate::types::{PRIORITY_FORWARD, PacketIn};
use common::Result;
use flowrules::compiler::{install_flow, packet_out};
use flowrules::{Action, Command, MAIN_TABLE, Match, ether_type};
use std::sync::Arc;
use tracing::{debug, warn};

/// What the handler did with an arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrivalOutcome {
    /// LLDP, IPv6 or another ethertype the controller does not forward
    Ignored,
    /// Destination unknown; flooded without installing a flow
    Flooded,
    /// Destination known; flow installed (unless it would overlap) and packet sent
    Forwarded { out_port: u32, flow_installed: bool },
}

pub struct ArrivalHandler {
    registry: Arc<SwitchRegistry>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl ArrivalHandler {
    pub fn new(registry: Arc<SwitchRegistry>, metrics: Option<Arc<MetricsRegistry>>) -> Self {
        Self { registry, metrics }
    }

    pub async fn on_packet_in(&self, packet: &PacketIn) -> Result<ArrivalOutcome> {
        match packet.eth_type {
            ether_type::LLDP | ether_type::IPV6 => return Ok(ArrivalOutcome::Ignored),
            ether_type::ARP => {}
            other => {
                debug!(
                    switch = %packet.switch_id,
                    eth_type = %format!("0x{:04x}", other),
                    in_port = packet.in_port,
                    "Dropping unhandled ethertype"
                );
                return Ok(ArrivalOutcome::Ignored);
            }
        }

        let entry = self.registry.get(packet.switch_id)?;
        let mut state = entry.lock().await;

        if !state.mac_table.contains_key(&packet.src) {
            state.mac_table.insert(packet.src, packet.in_port);
            debug!(
                switch = %packet.switch_id,
                mac = %packet.src,
                port = packet.in_port,
                "Learned source address"
            );
            if let Some(ref m) = self.metrics {
                m.set_learned_macs(&packet.switch_id.to_string(), state.mac_table.len());
            }
        }

        let known = state.mac_table.get(&packet.dst).copied();
        let mut commands: Vec<Command> = Vec::new();

        let outcome = match known {
            Some(out_port) => {
                let matcher = Match::any()
                    .in_port(packet.in_port)
                    .eth_type(ether_type::ARP)
                    .eth_dst(packet.dst);

                let clashes = state
                    .tables
                    .flows_with_priority(MAIN_TABLE, PRIORITY_FORWARD)
                    .into_iter()
                    .any(|e| e.matcher != matcher && e.matcher.overlaps(&matcher));

                if clashes {
                    warn!(
                        switch = %packet.switch_id,
                        matcher = %matcher,
                        "Skipping reactive flow that would overlap an existing entry"
                    );
                } else {
                    commands.push(install_flow(
                        MAIN_TABLE,
                        PRIORITY_FORWARD,
                        matcher,
                        vec![Action::output(out_port)],
                    ));
                }

                ArrivalOutcome::Forwarded {
                    out_port,
                    flow_installed: !clashes,
                }
            }
            None => ArrivalOutcome::Flooded,
        };

        let out_action = match outcome {
            ArrivalOutcome::Forwarded { out_port, .. } => Action::output(out_port),
            _ => Action::flood(),
        };
        commands.push(packet_out(
            packet.buffer_id,
            packet.in_port,
            vec![out_action],
            &packet.payload,
        ));

        debug!(
            switch = %packet.switch_id,
            src = %packet.src,
            dst = %packet.dst,
            in_port = packet.in_port,
            outcome = ?outcome,
            "Forwarding decision"
        );

        entry.deliver(&mut state, commands).await?;
        Ok(outcome)
    }
}
