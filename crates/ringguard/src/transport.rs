//! Command delivery to switches.

use crate::types::OutboundCommand;
use async_trait::async_trait;
use common::{Error, Result};
use flowrules::{Command, SwitchId};
use tokio::sync::mpsc;
use tracing::trace;

/// The only conduit for sending commands to one switch.
///
/// Sends are fire-and-forget: success means the transport accepted the
/// command, not that the switch applied it.
#[async_trait]
pub trait SwitchHandle: Send + Sync {
    /// Send one command to the switch
    async fn send(&self, command: Command) -> Result<()>;
}

/// Handle that forwards commands to the transport bridge over a channel.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    switch_id: SwitchId,
    tx: mpsc::Sender<OutboundCommand>,
}

impl ChannelHandle {
    pub fn new(switch_id: SwitchId, tx: mpsc::Sender<OutboundCommand>) -> Self {
        Self { switch_id, tx }
    }
}

#[async_trait]
impl SwitchHandle for ChannelHandle {
    async fn send(&self, command: Command) -> Result<()> {
        trace!(switch = %self.switch_id, kind = command.kind(), "Queueing command");
        self.tx
            .send(OutboundCommand {
                switch_id: self.switch_id,
                command,
            })
            .await
            .map_err(|e| Error::transport(format!("{}: {}", self.switch_id, e)))
    }
}
