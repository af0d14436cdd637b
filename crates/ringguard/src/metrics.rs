//! Prometheus metrics for the ring controller.

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::time::Duration;

/// Labels for inbound event metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EventLabels {
    /// Event kind (switch_connected, port_status, ...)
    pub kind: String,
}

/// Labels for outbound command metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CommandLabels {
    /// Command kind (flow_install, group_install, ...)
    pub kind: String,
}

/// Labels for link failure metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct LinkFailureLabels {
    /// Outcome (rerouted, ignored, error)
    pub outcome: String,
}

/// Labels for per-switch gauges
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct SwitchLabels {
    pub switch: String,
}

/// Labels for error metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    /// Error type (topology, port_resolution, transport, ...)
    pub error_type: String,
}

/// Metrics registry with all controller metrics
pub struct MetricsRegistry {
    /// Prometheus registry
    pub registry: Registry,

    events_total: Family<EventLabels, Counter>,
    commands_sent_total: Family<CommandLabels, Counter>,
    link_failures_total: Family<LinkFailureLabels, Counter>,
    errors_total: Family<ErrorLabels, Counter>,
    switches_connected: Gauge,
    active_ports: Family<SwitchLabels, Gauge>,
    learned_macs: Family<SwitchLabels, Gauge>,
    poll_rounds_total: Counter,
    /// Time from link-down event to rebuilt table
    recovery_duration_seconds: Histogram,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let events_total = Family::<EventLabels, Counter>::default();
        registry.register(
            "ringguard_events_total",
            "Total inbound events by kind",
            events_total.clone(),
        );

        let commands_sent_total = Family::<CommandLabels, Counter>::default();
        registry.register(
            "ringguard_commands_sent_total",
            "Total commands accepted by the transport, by kind",
            commands_sent_total.clone(),
        );

        let link_failures_total = Family::<LinkFailureLabels, Counter>::default();
        registry.register(
            "ringguard_link_failures_total",
            "Link-down reports by outcome",
            link_failures_total.clone(),
        );

        let errors_total = Family::<ErrorLabels, Counter>::default();
        registry.register(
            "ringguard_errors_total",
            "Total handler errors by type",
            errors_total.clone(),
        );

        let switches_connected = Gauge::default();
        registry.register(
            "ringguard_switches_connected",
            "Number of registered switches",
            switches_connected.clone(),
        );

        let active_ports = Family::<SwitchLabels, Gauge>::default();
        registry.register(
            "ringguard_active_ports",
            "Tracked enabled ring ports per switch",
            active_ports.clone(),
        );

        let learned_macs = Family::<SwitchLabels, Gauge>::default();
        registry.register(
            "ringguard_learned_macs",
            "Learned source addresses per switch",
            learned_macs.clone(),
        );

        let poll_rounds_total = Counter::default();
        registry.register(
            "ringguard_poll_rounds_total",
            "Total port description poll rounds",
            poll_rounds_total.clone(),
        );

        // 100us to ~3s
        let recovery_duration_seconds = Histogram::new(exponential_buckets(0.0001, 2.0, 15));
        registry.register(
            "ringguard_recovery_duration_seconds",
            "Time to compute and send a reroute batch",
            recovery_duration_seconds.clone(),
        );

        Self {
            registry,
            events_total,
            commands_sent_total,
            link_failures_total,
            errors_total,
            switches_connected,
            active_ports,
            learned_macs,
            poll_rounds_total,
            recovery_duration_seconds,
        }
    }

    /// Record an inbound event
    pub fn record_event(&self, kind: &str) {
        self.events_total
            .get_or_create(&EventLabels {
                kind: kind.to_string(),
            })
            .inc();
    }

    /// Record a command accepted by the transport
    pub fn record_command(&self, kind: &str) {
        self.commands_sent_total
            .get_or_create(&CommandLabels {
                kind: kind.to_string(),
            })
            .inc();
    }

    /// Record the outcome of a link-down report
    pub fn record_link_failure(&self, outcome: &str) {
        self.link_failures_total
            .get_or_create(&LinkFailureLabels {
                outcome: outcome.to_string(),
            })
            .inc();
    }

    /// Record error by type
    pub fn record_error(&self, error_type: &str) {
        self.errors_total
            .get_or_create(&ErrorLabels {
                error_type: error_type.to_string(),
            })
            .inc();
    }

    pub fn set_switches(&self, count: usize) {
        self.switches_connected.set(count as i64);
    }

    pub fn set_active_ports(&self, switch: &str, count: usize) {
        self.active_ports
            .get_or_create(&SwitchLabels {
                switch: switch.to_string(),
            })
            .set(count as i64);
    }

    pub fn set_learned_macs(&self, switch: &str, count: usize) {
        self.learned_macs
            .get_or_create(&SwitchLabels {
                switch: switch.to_string(),
            })
            .set(count as i64);
    }

    pub fn record_poll_round(&self) {
        self.poll_rounds_total.inc();
    }

    pub fn record_recovery_duration(&self, duration: Duration) {
        self.recovery_duration_seconds.observe(duration.as_secs_f64());
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
