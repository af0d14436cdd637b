//! JSON-lines bridge to the external transport agent.

use crate::transport::ChannelHandle;
use crate::types::{AgentMessage, Event, OutboundCommand};
use common::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Transport agent bridge
pub struct TransportBridge {
    socket_path: String,
    event_tx: mpsc::Sender<Event>,
    command_tx: mpsc::Sender<OutboundCommand>,
    command_rx: mpsc::Receiver<OutboundCommand>,
}

impl TransportBridge {
    /// `command_tx` feeds `command_rx`; handles created for connecting
    /// switches send through it.
    pub fn new(
        socket_path: String,
        event_tx: mpsc::Sender<Event>,
        command_tx: mpsc::Sender<OutboundCommand>,
        command_rx: mpsc::Receiver<OutboundCommand>,
    ) -> Self {
        Self {
            socket_path,
            event_tx,
            command_tx,
            command_rx,
        }
    }

    /// Bind the socket, accept the agent and relay until it disconnects
    pub async fn run(mut self) -> Result<()> {
        if Path::new(&self.socket_path).exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!(socket = %self.socket_path, "Transport listener started");

        let (stream, _) = listener.accept().await?;
        info!("Transport agent connected");

        self.handle_connection(stream).await
    }

    /// Convert a decoded agent message into a dispatcher event
    pub fn to_event(&self, msg: AgentMessage) -> Event {
        event_from(msg, &self.command_tx)
    }

    /// Relay until the agent disconnects. Inbound lines and outbound commands
    /// are served by independent loops, so a full event channel never stops
    /// commands from draining.
    pub(crate) async fn handle_connection(&mut self, stream: UnixStream) -> Result<()> {
        let (reader, writer) = stream.into_split();
        let Self {
            event_tx,
            command_tx,
            command_rx,
            ..
        } = self;

        tokio::select! {
            result = read_events(reader, event_tx, command_tx) => result,
            result = write_commands(writer, command_rx) => result,
        }
    }
}

fn event_from(msg: AgentMessage, command_tx: &mpsc::Sender<OutboundCommand>) -> Event {
    match msg {
        AgentMessage::SwitchConnected { switch_id, ports } => Event::SwitchConnected {
            switch_id,
            handle: Arc::new(ChannelHandle::new(switch_id, command_tx.clone())),
            ports,
        },
        AgentMessage::PortDescStatsReply { switch_id, ports } => {
            Event::PortDescStatsReply { switch_id, ports }
        }
        AgentMessage::PortStatus {
            switch_id,
            reason,
            port,
        } => Event::PortStatus {
            switch_id,
            reason,
            port,
        },
        AgentMessage::PacketIn(packet) => Event::PacketIn(packet),
    }
}

async fn read_events(
    reader: OwnedReadHalf,
    event_tx: &mpsc::Sender<Event>,
    command_tx: &mpsc::Sender<OutboundCommand>,
) -> Result<()> {
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                info!("Transport agent disconnected");
                return Ok(());
            }
            Ok(_) => match serde_json::from_str::<AgentMessage>(line.trim()) {
                Ok(msg) => {
                    let event = event_from(msg, command_tx);
                    debug!(switch = %event.switch_id(), event = event.kind(), "Received event");
                    if event_tx.send(event).await.is_err() {
                        return Err(Error::transport("event channel closed"));
                    }
                }
                Err(e) => {
                    warn!(error = %e, line = %line.trim(), "Failed to parse agent message");
                }
            },
            Err(e) => {
                error!(error = %e, "Failed to read from transport agent");
                return Ok(());
            }
        }
    }
}

async fn write_commands(
    mut writer: OwnedWriteHalf,
    command_rx: &mut mpsc::Receiver<OutboundCommand>,
) -> Result<()> {
    while let Some(outbound) = command_rx.recv().await {
        let json = serde_json::to_string(&outbound)?;
        debug!(switch = %outbound.switch_id, kind = outbound.command.kind(), "Sending command");

        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    warn!("Command channel closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use crate::transport::SwitchHandle;
    use crate::types::Topology;
    use flowrules::{SwitchId, compiler};
    use std::time::Duration;

    fn bridge() -> (TransportBridge, mpsc::Receiver<Event>) {
        let (event_tx, event_rx) = mpsc::channel(16);
        let (command_tx, command_rx) = mpsc::channel(16);
        (
            TransportBridge::new("/tmp/unused.sock".to_string(), event_tx, command_tx, command_rx),
            event_rx,
        )
    }

    #[tokio::test]
    async fn test_relays_events_and_commands() {
        let (mut bridge, mut events) = bridge();
        let (ours, theirs) = UnixStream::pair().unwrap();

        let task = tokio::spawn(async move { bridge.handle_connection(ours).await });

        let (agent_read, mut agent_write) = theirs.into_split();
        let mut agent_read = BufReader::new(agent_read);

        agent_write
            .write_all(b"not json\n{\"type\":\"switch_connected\",\"switch_id\":4}\n")
            .await
            .unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.switch_id(), SwitchId(4));
        let handle = match event {
            Event::SwitchConnected { handle, ports, .. } => {
                assert!(ports.is_empty());
                handle
            }
            other => panic!("unexpected event {:?}", other),
        };

        handle.send(compiler::table_miss()).await.unwrap();

        let mut line = String::new();
        agent_read.read_line(&mut line).await.unwrap();
        let outbound: OutboundCommand = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(outbound.switch_id, SwitchId(4));
        assert_eq!(outbound.command, compiler::table_miss());

        drop(agent_write);
        drop(agent_read);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_connect_burst_at_minimum_channel_capacity() {
        let (mut bridge, events) = bridge();
        let controller = Arc::new(Controller::new(Topology::default(), None));
        let dispatcher = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.run(events).await })
        };

        let (ours, theirs) = UnixStream::pair().unwrap();
        let task = tokio::spawn(async move { bridge.handle_connection(ours).await });
        let (agent_read, mut agent_write) = theirs.into_split();

        let burst = tokio::spawn(async move {
            for id in 1..=64u64 {
                let line = format!("{{\"type\":\"switch_connected\",\"switch_id\":{}}}\n", id);
                agent_write.write_all(line.as_bytes()).await.unwrap();
            }
            agent_write
        });

        // s1 and s5 carry a host (7 baseline rules), the rest get 5
        let expected = 62 * 5 + 2 * 7;
        let mut lines = BufReader::new(agent_read).lines();
        let received = tokio::time::timeout(Duration::from_secs(10), async {
            let mut count = 0;
            while count < expected {
                match lines.next_line().await.unwrap() {
                    Some(_) => count += 1,
                    None => break,
                }
            }
            count
        })
        .await
        .expect("commands stopped flowing");

        assert_eq!(received, expected);
        assert_eq!(controller.registry().len(), 64);

        drop(burst.await.unwrap());
        drop(lines);
        task.await.unwrap().unwrap();
        dispatcher.await.unwrap();
    }

    #[tokio::test]
    async fn test_to_event_keeps_payload() {
        let (bridge, _events) = bridge();
        let msg: AgentMessage = serde_json::from_str(
            r#"{"type":"packet_in","switch_id":2,"eth_type":2054,
                "src":"00:00:00:00:00:01","dst":"ff:ff:ff:ff:ff:ff",
                "in_port":1,"payload":[1,2,3]}"#,
        )
        .unwrap();

        match bridge.to_event(msg) {
            Event::PacketIn(p) => {
                assert_eq!(p.payload, vec![1, 2, 3]);
                assert_eq!(p.buffer_id, None);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
