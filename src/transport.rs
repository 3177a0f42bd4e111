use anyhow::{Result, anyhow};
use futures_util::StreamExt;
use log::debug;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tokio_tungstenite::connect_async;

use crate::transport_actor::{TransportActor, TransportMessage, TransportResponse};

/// How long a command may wait for its reply.
pub(crate) const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the transport actor speaking CDP over a WebSocket.
#[derive(Debug)]
pub(crate) struct Transport {
    tx: mpsc::Sender<TransportMessage>,
}

impl Transport {
    pub(crate) async fn new(ws_url: &str) -> Result<Self> {
        let (ws_stream, _) = connect_async(ws_url).await?;
        let (ws_sink, ws_stream) = ws_stream.split();
        let (tx, rx) = mpsc::channel::<TransportMessage>(100);

        let actor = TransportActor {
            pending_requests: HashMap::new(),
            event_listeners: HashMap::new(),
            ws_sink,
            command_rx: rx,
        };
        tokio::spawn(actor.run(ws_stream));
        debug!("Connected to {ws_url}");

        Ok(Self { tx })
    }

    /// Sends a browser-level command and awaits its response.
    pub(crate) async fn send(&self, command: Value) -> Result<TransportResponse> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(TransportMessage::Request(command, response_tx))
            .await
            .map_err(|_| anyhow!("Transport actor dropped"))?;
        wait_reply(response_rx).await
    }

    /// Registers interest in the target message answering `msg_id`.
    ///
    /// Register before sending the command, then pass the receiver to [`wait_reply`].
    pub(crate) async fn get_target_msg(
        &self,
        msg_id: usize,
    ) -> Result<oneshot::Receiver<Result<TransportResponse>>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(TransportMessage::ListenTargetMessage(
                msg_id as u64,
                response_tx,
            ))
            .await
            .map_err(|_| anyhow!("Transport actor dropped"))?;
        Ok(response_rx)
    }

    /// Registers a one-shot listener for `method` emitted by the given session.
    pub(crate) async fn listen_for_event(
        &self,
        session_id: &str,
        method: &str,
    ) -> Result<oneshot::Receiver<Value>> {
        let (event_tx, event_rx) = oneshot::channel();
        self.tx
            .send(TransportMessage::ListenEvent {
                session_id: session_id.to_string(),
                method: method.to_string(),
                tx: event_tx,
            })
            .await
            .map_err(|_| anyhow!("Transport actor dropped"))?;
        Ok(event_rx)
    }

    /// Asks the browser to close and waits for the actor to stop.
    pub(crate) async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(TransportMessage::Shutdown(ack_tx)).await.is_ok() {
            let _ = time::timeout(SHUTDOWN_TIMEOUT, ack_rx).await;
        }
    }

    /// Best-effort shutdown usable from synchronous code such as `Drop`.
    pub(crate) fn shutdown_nowait(&self) {
        let (ack_tx, _) = oneshot::channel();
        let _ = self.tx.try_send(TransportMessage::Shutdown(ack_tx));
    }
}

pub(crate) async fn wait_reply(
    rx: oneshot::Receiver<Result<TransportResponse>>,
) -> Result<TransportResponse> {
    time::timeout(COMMAND_TIMEOUT, rx)
        .await
        .map_err(|_| anyhow!("Timeout while waiting for response"))?
        .map_err(|_| anyhow!("Response channel closed"))?
}
