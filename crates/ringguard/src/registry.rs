//! Switch registry and per-switch state.

use crate::intents;
use crate::metrics::MetricsRegistry;
use crate::transport::SwitchHandle;
use crate::types::{LinkState, SwitchProfile};
use common::{Error, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use flowrules::{Command, MacAddress, PortDescriptor, SwitchId, SwitchTables};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Mutable state of one switch. Always accessed through the switch's lock.
#[derive(Debug)]
pub struct SwitchState {
    pub(crate) profile: SwitchProfile,
    /// Port name to numeric id, bound once per name
    pub(crate) port_ids: HashMap<String, u32>,
    /// Enabled, non-host-facing ports
    pub(crate) active_ports: BTreeSet<String>,
    /// Source address to ingress port, first write wins
    pub(crate) mac_table: HashMap<MacAddress, u32>,
    pub(crate) link_states: BTreeMap<String, LinkState>,
    /// Mirror of what has been sent to the switch
    pub(crate) tables: SwitchTables,
}

impl SwitchState {
    pub(crate) fn new(profile: SwitchProfile) -> Self {
        Self {
            profile,
            port_ids: HashMap::new(),
            active_ports: BTreeSet::new(),
            mac_table: HashMap::new(),
            link_states: BTreeMap::new(),
            tables: SwitchTables::new(),
        }
    }

    /// Record name/id bindings for names not bound yet. Returns how many were added.
    pub(crate) fn bind_ports(&mut self, ports: &[PortDescriptor]) -> usize {
        let mut added = 0;
        for port in ports {
            match self.port_ids.get(&port.name) {
                Some(&bound) if bound != port.port_no => {
                    warn!(
                        port = %port.name,
                        bound,
                        reported = port.port_no,
                        "Ignoring rebinding of port name"
                    );
                }
                Some(_) => {}
                None => {
                    self.port_ids.insert(port.name.clone(), port.port_no);
                    added += 1;
                }
            }
        }
        added
    }

    /// Numeric id bound to `name`.
    pub(crate) fn resolve_port(&self, name: &str) -> Result<u32> {
        self.port_ids
            .get(name)
            .copied()
            .ok_or_else(|| Error::port_resolution(format!("no numeric id bound to port {}", name)))
    }

    /// Whether `port` is the host-facing uplink of this switch.
    pub(crate) fn is_uplink(&self, port: &PortDescriptor) -> bool {
        self.profile.uplink_port() == Some(port.port_no)
    }

    fn snapshot(&self) -> SwitchSnapshot {
        SwitchSnapshot {
            active_ports: self.active_ports.iter().cloned().collect(),
            port_ids: self.port_ids.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            mac_table: self.mac_table.iter().map(|(k, v)| (*k, *v)).collect(),
            link_states: self.link_states.clone(),
            tables: self.tables.clone(),
        }
    }
}

/// Read-only copy of a switch's state.
#[derive(Debug, Clone)]
pub struct SwitchSnapshot {
    pub active_ports: Vec<String>,
    pub port_ids: BTreeMap<String, u32>,
    pub mac_table: BTreeMap<MacAddress, u32>,
    pub link_states: BTreeMap<String, LinkState>,
    pub tables: SwitchTables,
}

/// A registered switch: its command handle and its locked state.
pub struct SwitchEntry {
    id: SwitchId,
    handle: Arc<dyn SwitchHandle>,
    state: Mutex<SwitchState>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl SwitchEntry {
    pub fn id(&self) -> SwitchId {
        self.id
    }

    pub fn handle(&self) -> Arc<dyn SwitchHandle> {
        self.handle.clone()
    }

    /// Lock this switch's state. Handlers for other switches are unaffected.
    pub async fn lock(&self) -> MutexGuard<'_, SwitchState> {
        self.state.lock().await
    }

    /// Send `commands` in order while the caller holds the state lock.
    ///
    /// The table mirror follows every command the transport accepted. The
    /// first failure stops the batch and is returned; nothing is rolled back.
    pub(crate) async fn deliver(
        &self,
        state: &mut SwitchState,
        commands: Vec<Command>,
    ) -> Result<()> {
        for command in commands {
            let kind = command.kind();
            if let Err(e) = self.handle.send(command.clone()).await {
                warn!(switch = %self.id, kind, error = %e, "Failed to send command");
                return Err(e);
            }
            state.tables.apply(&command);
            if let Some(ref m) = self.metrics {
                m.record_command(kind);
            }
        }
        Ok(())
    }

    pub async fn snapshot(&self) -> SwitchSnapshot {
        self.lock().await.snapshot()
    }
}

/// Tracks known switches by identity.
pub struct SwitchRegistry {
    switches: DashMap<SwitchId, Arc<SwitchEntry>>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl SwitchRegistry {
    pub fn new(metrics: Option<Arc<MetricsRegistry>>) -> Self {
        Self {
            switches: DashMap::new(),
            metrics,
        }
    }

    /// Register a switch and, on first registration only, install its baseline rules.
    ///
    /// Returns `true` when the switch was newly registered.
    pub async fn connect(
        &self,
        id: SwitchId,
        handle: Arc<dyn SwitchHandle>,
        profile: SwitchProfile,
        hosts: &[Ipv4Addr],
        ports: &[PortDescriptor],
    ) -> Result<bool> {
        let (entry, created) = match self.switches.entry(id) {
            Entry::Occupied(e) => (e.get().clone(), false),
            Entry::Vacant(v) => {
                let entry = Arc::new(SwitchEntry {
                    id,
                    handle,
                    state: Mutex::new(SwitchState::new(profile)),
                    metrics: self.metrics.clone(),
                });
                v.insert(entry.clone());
                (entry, true)
            }
        };

        let mut state = entry.lock().await;
        let bound = state.bind_ports(ports);

        if !created {
            debug!(switch = %id, bound, "Switch already registered");
            return Ok(false);
        }

        if let Some(ref m) = self.metrics {
            m.set_switches(self.switches.len());
        }

        let commands = intents::baseline(&state.profile, hosts);
        let count = commands.len();
        entry.deliver(&mut state, commands).await?;

        info!(switch = %id, rules = count, bound, "Switch registered, baseline rules installed");
        Ok(true)
    }

    /// Entry for `id`, or `Error::UnknownSwitch`.
    pub fn get(&self, id: SwitchId) -> Result<Arc<SwitchEntry>> {
        self.switches
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or_else(|| Error::unknown_switch(id))
    }

    /// Every registered switch, in id order.
    pub fn entries(&self) -> Vec<Arc<SwitchEntry>> {
        let mut entries: Vec<Arc<SwitchEntry>> =
            self.switches.iter().map(|e| e.value().clone()).collect();
        entries.sort_by_key(|e| e.id());
        entries
    }

    pub fn len(&self) -> usize {
        self.switches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }
}
