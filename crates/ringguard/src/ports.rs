//! Port state tracking.

use crate::metrics::MetricsRegistry;
use crate::recovery::{LinkDownOutcome, RecoveryEngine};
use crate::registry::{SwitchRegistry, SwitchState};
use crate::types::{LinkState, PortStatusReason};
use common::Result;
use flowrules::{PortDescriptor, SwitchId};
use std::sync::Arc;
use tracing::{debug, info};

/// Add every enabled ring port from `ports` that is not tracked yet.
///
/// Host uplinks and reserved ports are skipped. Returns the names added.
pub(crate) fn track_enabled(state: &mut SwitchState, ports: &[PortDescriptor]) -> Vec<String> {
    let mut added = Vec::new();

    for port in ports {
        if !port.state.is_enabled() || port.is_reserved() || state.is_uplink(port) {
            continue;
        }
        if state.active_ports.insert(port.name.clone()) {
            state
                .link_states
                .entry(port.name.clone())
                .or_insert(LinkState::Up);
            added.push(port.name.clone());
        }
    }

    added
}

/// Keeps each switch's active port set current and hands failures to recovery.
pub struct PortTracker {
    registry: Arc<SwitchRegistry>,
    recovery: Arc<RecoveryEngine>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl PortTracker {
    pub fn new(
        registry: Arc<SwitchRegistry>,
        recovery: Arc<RecoveryEngine>,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            registry,
            recovery,
            metrics,
        }
    }

    /// Apply a port description reply. Returns the port names newly tracked.
    pub async fn on_stats_reply(
        &self,
        switch_id: SwitchId,
        ports: &[PortDescriptor],
    ) -> Result<Vec<String>> {
        let entry = self.registry.get(switch_id)?;
        let mut state = entry.lock().await;

        state.bind_ports(ports);
        let added = track_enabled(&mut state, ports);

        if !added.is_empty() {
            debug!(switch = %switch_id, added = ?added, "Tracking newly enabled ports");
        }
        info!(
            switch = %switch_id,
            active = ?state.active_ports,
            "Active ports"
        );

        if let Some(ref m) = self.metrics {
            m.set_active_ports(&switch_id.to_string(), state.active_ports.len());
        }

        Ok(added)
    }

    /// Apply a port status change.
    ///
    /// A port that is not enabled goes to recovery. An enabled port is only
    /// logged; it rejoins the active set on the next poll.
    pub async fn on_port_status(
        &self,
        switch_id: SwitchId,
        reason: PortStatusReason,
        port: &PortDescriptor,
    ) -> Result<Option<LinkDownOutcome>> {
        if port.state.is_enabled() {
            info!(
                switch = %switch_id,
                port = %port.name,
                reason = ?reason,
                "Port enabled, waiting for next poll"
            );
            return Ok(None);
        }

        info!(
            switch = %switch_id,
            port = %port.name,
            reason = ?reason,
            state = %port.state,
            "Port disabled"
        );

        self.recovery
            .on_link_down(switch_id, &port.name)
            .await
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SwitchProfile;
    use flowrules::{MacAddress, PortConfig, PortState, port_no};

    fn port(name: &str, port_no: u32, state: u32) -> PortDescriptor {
        PortDescriptor {
            name: name.to_string(),
            hw_addr: MacAddress::new([0, 0, 0, 0, 0, port_no as u8]),
            port_no,
            config: PortConfig::default(),
            state: PortState(state),
        }
    }

    #[test]
    fn test_track_enabled_skips_uplink_reserved_and_down() {
        let profile = crate::types::Topology::default().profile(SwitchId(1));
        let mut state = SwitchState::new(profile);

        let ports = vec![
            port("s1", port_no::LOCAL, PortState::LIVE),
            port("s1-eth1", 1, PortState::LIVE),
            port("s1-eth2", 2, PortState::LINK_DOWN),
            port("s1-eth3", 3, PortState::LIVE),
        ];

        let added = track_enabled(&mut state, &ports);
        assert_eq!(added, vec!["s1-eth1".to_string()]);
        assert!(!state.active_ports.contains("s1-eth3"));
        assert!(!state.active_ports.contains("s1"));
    }

    #[test]
    fn test_track_enabled_is_additive() {
        let mut state = SwitchState::new(SwitchProfile::default());

        track_enabled(&mut state, &[port("s2-eth1", 1, PortState::LIVE)]);
        let added = track_enabled(
            &mut state,
            &[port("s2-eth1", 1, PortState::LIVE), port("s2-eth2", 2, PortState::LIVE)],
        );

        assert_eq!(added, vec!["s2-eth2".to_string()]);
        assert_eq!(state.active_ports.len(), 2);
        assert_eq!(state.link_states.get("s2-eth2"), Some(&LinkState::Up));
    }

    #[test]
    fn test_live_with_other_bits_is_not_enabled() {
        let mut state = SwitchState::new(SwitchProfile::default());
        let added = track_enabled(
            &mut state,
            &[port("s2-eth1", 1, PortState::LIVE | PortState::BLOCKED)],
        );
        assert!(added.is_empty());
    }
}
