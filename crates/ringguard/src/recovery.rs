//! Link-failure recovery.
//!
//! When a tracked ring port goes down, the switch's main table is replaced
//! by one that steers both traffic directions through fast-failover groups
//! around the dead link. The replacement batch is computed and validated in
//! full before the first command is sent, and sent under the switch's lock.

use crate::intents;
use crate::metrics::MetricsRegistry;
use crate::registry::{SwitchRegistry, SwitchState};
use crate::types::LinkState;
use common::{Error, Result};
use flowrules::{Command, SwitchId};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Result of handling a link-down report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkDownOutcome {
    /// The port was not tracked as active; nothing changed.
    Untracked,
    /// The table was rebuilt around the failed port.
    Rerouted {
        surviving_port: String,
        commands: usize,
    },
}

/// Validated replacement for a switch's table.
#[derive(Debug)]
pub(crate) struct ReroutePlan {
    pub surviving_port: String,
    pub surviving_no: u32,
    pub failed_no: u32,
    pub commands: Vec<Command>,
}

/// Compute the reroute batch for `failed_port`.
///
/// Expects `failed_port` to have been removed from the active set already.
/// Leaves `state` untouched.
pub(crate) fn plan_reroute(
    state: &SwitchState,
    hosts: &[Ipv4Addr],
    failed_port: &str,
) -> Result<ReroutePlan> {
    let uplink = state.profile.uplink_port();
    let surviving: Vec<&String> = state
        .active_ports
        .iter()
        .filter(|name| match (uplink, state.port_ids.get(name.as_str())) {
            (Some(up), Some(&no)) => no != up,
            _ => true,
        })
        .collect();

    let surviving_port = match surviving.as_slice() {
        [only] => (*only).clone(),
        [] => {
            return Err(Error::topology(format!(
                "no surviving ring port after {} went down",
                failed_port
            )));
        }
        many => {
            return Err(Error::topology(format!(
                "{} candidate surviving ports after {} went down: {:?}",
                many.len(),
                failed_port,
                many
            )));
        }
    };

    let surviving_no = state.resolve_port(&surviving_port)?;
    let failed_no = state.resolve_port(failed_port)?;

    let commands = intents::reroute(&state.profile, hosts, surviving_no, failed_no);

    Ok(ReroutePlan {
        surviving_port,
        surviving_no,
        failed_no,
        commands,
    })
}

/// Drives the per-port `Up -> DownRerouted` transition.
pub struct RecoveryEngine {
    registry: Arc<SwitchRegistry>,
    hosts: Vec<Ipv4Addr>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl RecoveryEngine {
    pub fn new(
        registry: Arc<SwitchRegistry>,
        hosts: Vec<Ipv4Addr>,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            registry,
            hosts,
            metrics,
        }
    }

    /// Reroute `switch_id` around `failed_port`.
    ///
    /// A port that is not in the active set is a no-op. The port leaves the
    /// active set before validation; if validation or sending fails that
    /// removal stays and the port is not marked rerouted.
    pub async fn on_link_down(
        &self,
        switch_id: SwitchId,
        failed_port: &str,
    ) -> Result<LinkDownOutcome> {
        let entry = self.registry.get(switch_id)?;
        let started = Instant::now();
        let mut state = entry.lock().await;

        if !state.active_ports.remove(failed_port) {
            debug!(
                switch = %switch_id,
                port = %failed_port,
                "Port not tracked, ignoring link down"
            );
            self.record("ignored");
            return Ok(LinkDownOutcome::Untracked);
        }

        if let Some(ref m) = self.metrics {
            m.set_active_ports(&switch_id.to_string(), state.active_ports.len());
        }

        let plan = match plan_reroute(&state, &self.hosts, failed_port) {
            Ok(plan) => plan,
            Err(e) => {
                error!(
                    switch = %switch_id,
                    port = %failed_port,
                    error = %e,
                    "Cannot reroute, tables left untouched"
                );
                self.record("error");
                return Err(e);
            }
        };

        let count = plan.commands.len();
        if let Err(e) = entry.deliver(&mut state, plan.commands).await {
            self.record("error");
            return Err(e);
        }

        state
            .link_states
            .insert(failed_port.to_string(), LinkState::DownRerouted);

        if let Some(ref m) = self.metrics {
            m.record_recovery_duration(started.elapsed());
        }
        self.record("rerouted");

        info!(
            switch = %switch_id,
            failed = %failed_port,
            failed_no = plan.failed_no,
            surviving = %plan.surviving_port,
            surviving_no = plan.surviving_no,
            commands = count,
            "Traffic rerouted around failed link"
        );

        Ok(LinkDownOutcome::Rerouted {
            surviving_port: plan.surviving_port,
            commands: count,
        })
    }

    fn record(&self, outcome: &str) {
        if let Some(ref m) = self.metrics {
            m.record_link_failure(outcome);
        }
    }
}
