//! Websocket link to the simulator.
//!
//! [`SimLink::connect`] opens the websocket, queues the `initial_params`
//! handshake and spawns two tasks:
//!
//! * **reader** – decodes every text frame with [`protocol::decode`] and
//!   forwards it on a bounded channel. Malformed frames are logged and
//!   dropped. When the socket closes or errors, a final
//!   [`Inbound::Disconnected`] is delivered and the task ends.
//! * **writer** – drains an unbounded command channel in submission order and
//!   writes each command as one text frame. No batching, no reordering.

use critter_types::{Command, CritterError};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::protocol::{self, Inbound};

/// Capacity of the inbound channel between the reader task and the loop.
const INBOUND_CAPACITY: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A live connection to the simulator.
pub struct SimLink {
    /// Decoded simulator messages, in arrival order.
    pub inbound: mpsc::Receiver<Inbound>,
    /// Commands to write to the simulator, in submission order.
    pub commands: mpsc::UnboundedSender<Command>,
    tasks: LinkTasks,
}

/// Join handles of the reader and writer tasks.
pub struct LinkTasks {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl SimLink {
    /// Connect to `url` and send `initial_params` as the first frame.
    ///
    /// # Errors
    ///
    /// Returns [`CritterError::Transport`] if the websocket handshake fails.
    pub async fn connect(
        url: &str,
        initial_params: &serde_json::Value,
    ) -> Result<Self, CritterError> {
        info!(url, "connecting to simulator");
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| CritterError::Transport(format!("failed to connect to {url}: {e}")))?;
        info!(url, "connected to simulator");

        let (sink, stream) = ws.split();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::channel(INBOUND_CAPACITY);

        let params = serde_json::to_string(initial_params)
            .map_err(|e| CritterError::Config(format!("agent parameters are not JSON: {e}")))?;
        debug!(params = %params, "queueing initial parameters");
        cmd_tx
            .send(Command::initial_params(params))
            .map_err(|_| CritterError::Transport("command channel closed".to_string()))?;

        let writer = tokio::spawn(write_loop(sink, cmd_rx, in_tx.clone()));
        let reader = tokio::spawn(read_loop(stream, in_tx));

        Ok(Self {
            inbound: in_rx,
            commands: cmd_tx,
            tasks: LinkTasks { reader, writer },
        })
    }

    /// Split the link so the channels can be handed to the control loop while
    /// the caller keeps the tasks for [`LinkTasks::close`].
    pub fn into_parts(
        self,
    ) -> (
        mpsc::Receiver<Inbound>,
        mpsc::UnboundedSender<Command>,
        LinkTasks,
    ) {
        (self.inbound, self.commands, self.tasks)
    }
}

impl LinkTasks {
    /// Wait for the writer to flush every queued command and close the
    /// socket, then stop the reader.
    ///
    /// Every clone of the command sender must have been dropped, otherwise the
    /// writer never finishes.
    pub async fn close(self) {
        if let Err(e) = self.writer.await {
            warn!(error = %e, "writer task ended abnormally");
        }
        self.reader.abort();
        info!("simulator link closed");
    }
}

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    inbound: mpsc::Sender<Inbound>,
) {
    while let Some(command) = commands.recv().await {
        let text = match protocol::encode(&command) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "dropping unencodable command");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(text.into())).await {
            error!(error = %e, "failed to write command to simulator");
            let _ = inbound
                .send(Inbound::Disconnected(format!("write failed: {e}")))
                .await;
            return;
        }
    }
    if let Err(e) = sink.close().await {
        debug!(error = %e, "websocket close handshake failed");
    }
}

async fn read_loop(mut stream: SplitStream<WsStream>, inbound: mpsc::Sender<Inbound>) {
    let reason = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => match protocol::decode(text.as_str()) {
                Ok(msg) => {
                    if inbound.send(msg).await.is_err() {
                        // The control loop is gone; nobody is listening.
                        return;
                    }
                }
                Err(e) => warn!(error = %e, "dropping malformed simulator frame"),
            },
            Some(Ok(Message::Close(frame))) => break format!("closed by simulator: {frame:?}"),
            Some(Ok(_)) => {}
            Some(Err(e)) => break format!("websocket error: {e}"),
            None => break "stream ended".to_string(),
        }
    };
    warn!(reason = %reason, "simulator link lost");
    let _ = inbound.send(Inbound::Disconnected(reason)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_to_closed_port_is_a_transport_fault() {
        // Port 9 (discard) is essentially never bound on test machines.
        let result = SimLink::connect("ws://127.0.0.1:9/", &serde_json::json!({})).await;
        assert!(matches!(result, Err(CritterError::Transport(_))));
    }

    #[tokio::test]
    async fn handshake_then_frames_flow_both_ways() {
        use critter_types::Action;
        use tokio::net::TcpListener;
        use tokio_tungstenite::accept_async;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();

            let mut received = Vec::new();
            for _ in 0..3 {
                match ws.next().await {
                    Some(Ok(Message::Text(t))) => received.push(t.as_str().to_string()),
                    other => panic!("unexpected frame: {other:?}"),
                }
            }
            let ready = r#"{"Type":"sim_control","Content":"connection_ready"}"#;
            ws.send(Message::Text(ready.to_string().into())).await.unwrap();
            ws.close(None).await.unwrap();
            received
        });

        let link = SimLink::connect(&format!("ws://{addr}/"), &serde_json::json!({"rays": 11}))
            .await
            .unwrap();
        let (mut inbound, commands, tasks) = link.into_parts();
        commands.send(Command::action(Action::Forward)).unwrap();
        commands.send(Command::action(Action::Stop)).unwrap();

        assert_eq!(
            inbound.recv().await,
            Some(Inbound::Control(critter_types::ControlSignal::Ready))
        );
        assert!(matches!(inbound.recv().await, Some(Inbound::Disconnected(_))));

        let received = server.await.unwrap();
        assert!(received[0].contains("initial_params"));
        assert!(received[0].contains("rays"));
        assert_eq!(received[1], r#"{"type":"action","content":"mf"}"#);
        assert_eq!(received[2], r#"{"type":"action","content":"stop"}"#);

        drop(commands);
        tasks.close().await;
    }
}
