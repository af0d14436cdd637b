//! Process wiring: dispatcher, poller, transport bridge and metrics.

use crate::controller::Controller;
use crate::http_server::MetricsServer;
use crate::metrics::MetricsRegistry;
use crate::poller::StatsPoller;
use crate::proxy::TransportBridge;
use crate::types::{ControllerConfig, Event, OutboundCommand};
use common::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Ring controller process
pub struct RingServer {
    config: ControllerConfig,
}

impl RingServer {
    pub fn new(config: ControllerConfig) -> Self {
        Self { config }
    }

    /// Run until the transport agent disconnects, a task ends, or ctrl-c
    pub async fn run(self) -> Result<()> {
        info!("Starting ring controller");

        let (event_tx, event_rx) = mpsc::channel::<Event>(self.config.event_channel_size);
        let (command_tx, command_rx) =
            mpsc::channel::<OutboundCommand>(self.config.command_channel_size);

        let metrics = if self.config.metrics_enabled {
            info!("Metrics enabled on {}", self.config.metrics_listen_addr);
            Some(Arc::new(MetricsRegistry::new()))
        } else {
            info!("Metrics disabled");
            None
        };

        let controller = Arc::new(Controller::new(self.config.topology.clone(), metrics.clone()));
        let poller = Arc::new(StatsPoller::new(
            controller.registry(),
            self.config.poll_interval,
            metrics.clone(),
        ));
        let bridge = TransportBridge::new(
            self.config.transport_socket.clone(),
            event_tx,
            command_tx,
            command_rx,
        );

        let metrics_handle = if let Some(ref registry) = metrics {
            let server =
                MetricsServer::new(registry.clone(), self.config.metrics_listen_addr.clone());
            Some(tokio::spawn(async move {
                if let Err(e) = server.run().await {
                    warn!(error = %e, "Metrics server error");
                }
            }))
        } else {
            None
        };

        let bridge_handle = tokio::spawn(async move {
            if let Err(e) = bridge.run().await {
                warn!(error = %e, "Transport bridge error");
            }
        });

        let dispatch = controller.clone();
        let dispatch_handle = tokio::spawn(async move {
            dispatch.run(event_rx).await;
        });

        let poller_handle = poller.start();

        info!("All tasks spawned, controller running");

        tokio::select! {
            _ = bridge_handle => {
                info!("Transport bridge completed");
            }
            _ = dispatch_handle => {
                info!("Dispatch loop completed");
            }
            _ = async {
                if let Some(handle) = metrics_handle {
                    handle.await
                } else {
                    std::future::pending::<()>().await;
                    Ok(())
                }
            } => {
                info!("Metrics server completed");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, shutting down");
            }
        }

        poller.stop();
        if let Err(e) = poller_handle.await {
            warn!(error = %e, "Stats poller task failed");
        }

        info!("Ring controller stopped");
        Ok(())
    }
}
