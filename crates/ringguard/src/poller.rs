//! Periodic port description polling.

use crate::metrics::MetricsRegistry;
use crate::registry::SwitchRegistry;
use flowrules::Command;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// Background task that asks every registered switch for its port descriptions.
pub struct StatsPoller {
    registry: Arc<SwitchRegistry>,
    period: Duration,
    metrics: Option<Arc<MetricsRegistry>>,
    stop_signal: Arc<Notify>,
}

impl StatsPoller {
    pub fn new(
        registry: Arc<SwitchRegistry>,
        period: Duration,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            registry,
            period,
            metrics,
            stop_signal: Arc::new(Notify::new()),
        }
    }

    /// Send one round of requests. Returns how many switches accepted one.
    ///
    /// A failed send is logged and does not affect the other switches.
    pub async fn poll_once(&self) -> usize {
        let mut sent = 0;

        for entry in self.registry.entries() {
            match entry.handle().send(Command::PortDescStatsRequest).await {
                Ok(()) => {
                    sent += 1;
                    if let Some(ref m) = self.metrics {
                        m.record_command("port_desc_stats_request");
                    }
                }
                Err(e) => {
                    warn!(switch = %entry.id(), error = %e, "Failed to request port descriptions");
                    if let Some(ref m) = self.metrics {
                        m.record_error(e.kind());
                    }
                }
            }
        }

        if let Some(ref m) = self.metrics {
            m.record_poll_round();
        }
        debug!(switches = sent, "Port description poll sent");
        sent
    }

    /// Spawn the polling loop. The first round goes out immediately.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let poller = self.clone();

        tokio::spawn(async move {
            let mut ticker = interval(poller.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period = ?poller.period, "Stats poller started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        poller.poll_once().await;
                    }
                    _ = poller.stop_signal.notified() => {
                        info!("Stats poller stopping");
                        break;
                    }
                }
            }
        })
    }

    /// Stop the polling loop
    pub fn stop(&self) {
        self.stop_signal.notify_one();
    }
}
