//! Event dispatcher.

use crate::learning::{ArrivalHandler, ArrivalOutcome};
use crate::metrics::MetricsRegistry;
use crate::ports::PortTracker;
use crate::recovery::{LinkDownOutcome, RecoveryEngine};
use crate::registry::{SwitchRegistry, SwitchSnapshot};
use crate::transport::SwitchHandle;
use crate::types::{Event, PacketIn, PortStatusReason, Topology};
use common::Result;
use flowrules::{PortDescriptor, SwitchId};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Routes inbound events to the component that owns them.
pub struct Controller {
    topology: Topology,
    hosts: Vec<Ipv4Addr>,
    registry: Arc<SwitchRegistry>,
    ports: PortTracker,
    recovery: Arc<RecoveryEngine>,
    arrivals: ArrivalHandler,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl Controller {
    pub fn new(topology: Topology, metrics: Option<Arc<MetricsRegistry>>) -> Self {
        let hosts = topology.host_destinations();
        let registry = Arc::new(SwitchRegistry::new(metrics.clone()));
        let recovery = Arc::new(RecoveryEngine::new(
            registry.clone(),
            hosts.clone(),
            metrics.clone(),
        ));
        let ports = PortTracker::new(registry.clone(), recovery.clone(), metrics.clone());
        let arrivals = ArrivalHandler::new(registry.clone(), metrics.clone());

        Self {
            topology,
            hosts,
            registry,
            ports,
            recovery,
            arrivals,
            metrics,
        }
    }

    pub fn registry(&self) -> Arc<SwitchRegistry> {
        self.registry.clone()
    }

    /// Handle one event to completion.
    pub async fn handle_event(&self, event: Event) -> Result<()> {
        if let Some(ref m) = self.metrics {
            m.record_event(event.kind());
        }

        match event {
            Event::SwitchConnected {
                switch_id,
                handle,
                ports,
            } => {
                self.on_switch_connect(switch_id, handle, &ports).await?;
            }
            Event::PortDescStatsReply { switch_id, ports } => {
                self.on_stats_reply(switch_id, &ports).await?;
            }
            Event::PortStatus {
                switch_id,
                reason,
                port,
            } => {
                self.on_port_status(switch_id, reason, &port).await?;
            }
            Event::PacketIn(packet) => {
                self.on_packet_in(&packet).await?;
            }
        }

        Ok(())
    }

    /// Register a switch; baseline rules are installed on first connect only.
    pub async fn on_switch_connect(
        &self,
        switch_id: SwitchId,
        handle: Arc<dyn SwitchHandle>,
        ports: &[PortDescriptor],
    ) -> Result<bool> {
        if !self.topology.is_configured(switch_id) {
            warn!(
                switch = %switch_id,
                "Switch not in configured topology, using default ring ports"
            );
        }
        let profile = self.topology.profile(switch_id);

        self.registry
            .connect(switch_id, handle, profile, &self.hosts, ports)
            .await
    }

    pub async fn on_stats_reply(
        &self,
        switch_id: SwitchId,
        ports: &[PortDescriptor],
    ) -> Result<Vec<String>> {
        self.ports.on_stats_reply(switch_id, ports).await
    }

    pub async fn on_port_status(
        &self,
        switch_id: SwitchId,
        reason: PortStatusReason,
        port: &PortDescriptor,
    ) -> Result<Option<LinkDownOutcome>> {
        self.ports.on_port_status(switch_id, reason, port).await
    }

    pub async fn on_link_down(
        &self,
        switch_id: SwitchId,
        port_name: &str,
    ) -> Result<LinkDownOutcome> {
        self.recovery.on_link_down(switch_id, port_name).await
    }

    pub async fn on_packet_in(&self, packet: &PacketIn) -> Result<ArrivalOutcome> {
        self.arrivals.on_packet_in(packet).await
    }

    /// Read-only copy of one switch's state
    pub async fn snapshot(&self, switch_id: SwitchId) -> Result<SwitchSnapshot> {
        Ok(self.registry.get(switch_id)?.snapshot().await)
    }

    /// Dispatch events until the channel closes.
    ///
    /// Handler errors are logged and counted; they never end the loop.
    pub async fn run(&self, mut events: mpsc::Receiver<Event>) {
        info!(switches = self.topology.switches().count(), "Controller dispatch loop started");

        while let Some(event) = events.recv().await {
            let switch_id = event.switch_id();
            let kind = event.kind();

            if let Err(e) = self.handle_event(event).await {
                warn!(switch = %switch_id, event = kind, error = %e, "Event handler failed");
                if let Some(ref m) = self.metrics {
                    m.record_error(e.kind());
                }
            }
        }

        info!("Event channel closed, dispatch loop exiting");
    }
}
