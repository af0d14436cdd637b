//! Configuration loading and validation for the ring controller

use crate::types::{ControllerConfig, DEFAULT_RING_PORTS, HostAttachment, SwitchProfile, Topology};
use flowrules::{MacAddress, SwitchId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found in search paths")]
    FileNotFound,

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerSettings,

    #[serde(default)]
    pub topology: TopologySettings,

    #[serde(default)]
    pub metrics: MetricsSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationErrors> {
        self.controller.validate()?;
        self.topology.validate()?;
        self.metrics.validate()?;
        Ok(())
    }
}

/// Controller runtime settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ControllerSettings {
    #[validate(length(min = 1), custom = "validate_socket_path")]
    pub transport_socket: String,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_poll_interval")]
    pub poll_interval: Duration,

    #[validate(range(min = 16, max = 100000))]
    pub event_channel_size: usize,

    #[validate(range(min = 16, max = 100000))]
    pub command_channel_size: usize,
}

/// One ring switch
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SwitchSettings {
    pub id: u64,

    #[serde(default = "default_ring_ports")]
    #[validate(custom = "validate_ring_ports")]
    pub ring_ports: [u32; 2],
}

/// A host attached to a ring switch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSettings {
    pub name: String,
    pub switch: u64,
    pub ip: Ipv4Addr,
    pub mac: MacAddress,
    pub uplink_port: u32,
}

/// Ring layout and host attachments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySettings {
    #[serde(default)]
    pub switches: Vec<SwitchSettings>,

    #[serde(default)]
    pub hosts: Vec<HostSettings>,
}

impl Validate for TopologySettings {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let mut ids = HashSet::new();
        for switch in &self.switches {
            switch.validate()?;
            if !ids.insert(switch.id) {
                errors.add("switches", ValidationError::new("duplicate_switch_id"));
            }
        }

        let mut ips = HashSet::new();
        let mut attached = HashSet::new();
        for host in &self.hosts {
            match self.switches.iter().find(|s| s.id == host.switch) {
                Some(switch) => {
                    if switch.ring_ports.contains(&host.uplink_port) {
                        errors.add("hosts", ValidationError::new("uplink_is_ring_port"));
                    }
                }
                None => errors.add("hosts", ValidationError::new("host_on_unknown_switch")),
            }
            if !ips.insert(host.ip) {
                errors.add("hosts", ValidationError::new("duplicate_host_ip"));
            }
            if !attached.insert(host.switch) {
                errors.add("hosts", ValidationError::new("multiple_hosts_on_switch"));
            }
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Metrics settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,

    #[validate(custom = "validate_listen_addr")]
    pub listen_addr: String,
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
}

impl LoggingSettings {
    pub fn is_json(&self) -> bool {
        self.format.as_deref() == Some("json")
    }
}

// Default implementations

fn default_ring_ports() -> [u32; 2] {
    DEFAULT_RING_PORTS
}

impl Default for ControllerSettings {
    fn default() -> Self {
        let defaults = ControllerConfig::default();
        Self {
            transport_socket: defaults.transport_socket,
            poll_interval: defaults.poll_interval,
            event_channel_size: defaults.event_channel_size,
            command_channel_size: defaults.command_channel_size,
        }
    }
}

impl Default for TopologySettings {
    /// Mirrors the built-in six-switch ring.
    fn default() -> Self {
        let topology = Topology::default();
        let mut switches = Vec::new();
        let mut hosts = Vec::new();

        for (id, profile) in topology.switches() {
            switches.push(SwitchSettings {
                id: id.0,
                ring_ports: profile.ring_ports,
            });
            if let Some(ref host) = profile.host {
                hosts.push(HostSettings {
                    name: host.name.clone(),
                    switch: id.0,
                    ip: host.ip,
                    mac: host.mac,
                    uplink_port: host.uplink_port,
                });
            }
        }

        Self { switches, hosts }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        let defaults = ControllerConfig::default();
        Self {
            enabled: defaults.metrics_enabled,
            listen_addr: defaults.metrics_listen_addr,
        }
    }
}

// Custom validators

fn validate_socket_path(path: &str) -> Result<(), ValidationError> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("socket_path_empty"));
    }

    if !trimmed.starts_with('/') && !trimmed.starts_with("./") {
        return Err(ValidationError::new("socket_path_invalid_format"));
    }

    Ok(())
}

fn validate_poll_interval(interval: &Duration) -> Result<(), ValidationError> {
    if *interval < Duration::from_secs(1) || *interval > Duration::from_secs(600) {
        return Err(ValidationError::new("poll_interval_out_of_range"));
    }
    Ok(())
}

fn validate_ring_ports(ports: &[u32; 2]) -> Result<(), ValidationError> {
    if ports[0] == ports[1] {
        return Err(ValidationError::new("ring_ports_equal"));
    }
    if ports.iter().any(|&p| p == 0 || p > flowrules::port_no::MAX) {
        return Err(ValidationError::new("ring_port_out_of_range"));
    }
    Ok(())
}

fn validate_listen_addr(addr: &str) -> Result<(), ValidationError> {
    addr.parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("listen_addr_invalid"))
}

// Configuration loading implementation

impl Config {
    /// Load configuration from default search paths
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(&path)
            }
            None => {
                tracing::info!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/ringguard/ringguard.yaml")];

        if let Some(home_path) = Self::home_config_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./ringguard.yaml"));

        paths.into_iter().find(|p: &PathBuf| p.exists() && p.is_file())
    }

    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/ringguard/ringguard.yaml"))
    }

    /// Resolve into the runtime configuration
    pub fn to_controller_config(&self) -> ControllerConfig {
        let mut switches: BTreeMap<SwitchId, SwitchProfile> = self
            .topology
            .switches
            .iter()
            .map(|s| {
                (
                    SwitchId(s.id),
                    SwitchProfile {
                        ring_ports: s.ring_ports,
                        host: None,
                    },
                )
            })
            .collect();

        for host in &self.topology.hosts {
            if let Some(profile) = switches.get_mut(&SwitchId(host.switch)) {
                profile.host = Some(HostAttachment {
                    name: host.name.clone(),
                    ip: host.ip,
                    mac: host.mac,
                    uplink_port: host.uplink_port,
                });
            }
        }

        ControllerConfig {
            poll_interval: self.controller.poll_interval,
            transport_socket: self.controller.transport_socket.clone(),
            event_channel_size: self.controller.event_channel_size,
            command_channel_size: self.controller.command_channel_size,
            metrics_enabled: self.metrics.enabled,
            metrics_listen_addr: self.metrics.listen_addr.clone(),
            topology: Topology::new(switches),
        }
    }
}
