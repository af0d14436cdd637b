//! Ringguard - fast-failover controller for OpenFlow switch rings
//!
//! Reacts to switch connection, port status and packet arrival events to
//! learn host locations, install forwarding rules and reroute traffic
//! around a failed inter-switch link using fast-failover groups.
//!
//! # Architecture
//!
//! - An external transport agent speaks OpenFlow to the switches
//! - This crate holds all forwarding decisions
//! - JSON lines over a Unix socket connect the two
//!
//! # Components
//!
//! - **Registry**: per-switch state behind a per-switch lock
//! - **Port tracker**: active ring ports, fed by polling and status events
//! - **Recovery**: rebuilds a switch's table when a ring link fails
//! - **Learning**: source-address learning and reactive ARP forwarding
//! - **Poller**: periodic port description requests

pub mod config;
pub mod controller;
pub mod http_server;
pub mod intents;
pub mod learning;
pub mod metrics;
pub mod poller;
pub mod ports;
pub mod proxy;
pub mod recovery;
pub mod registry;
pub mod server;
pub mod transport;
pub mod types;

pub use config::{Config, ConfigError};
pub use controller::Controller;
pub use http_server::MetricsServer;
pub use learning::ArrivalOutcome;
pub use metrics::MetricsRegistry;
pub use poller::StatsPoller;
pub use recovery::LinkDownOutcome;
pub use registry::SwitchSnapshot;
pub use server::RingServer;
pub use transport::SwitchHandle;
pub use types::{ControllerConfig, Event, PacketIn, PortStatusReason, Topology};
