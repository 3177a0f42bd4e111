use anyhow::{Result, anyhow};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

use crate::general_utils::next_id;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type ReplySender = oneshot::Sender<Result<TransportResponse>>;

/// Messages sent to the transport actor.
#[derive(Debug)]
pub(crate) enum TransportMessage {
    /// A browser-level command with a response sender.
    Request(Value, ReplySender),
    /// Listener for the target message answering the given ID.
    ListenTargetMessage(u64, ReplySender),
    /// One-shot listener for an event emitted by a target session.
    ListenEvent {
        session_id: String,
        method: String,
        tx: oneshot::Sender<Value>,
    },
    /// Closes the browser and stops the actor, acknowledging once done.
    Shutdown(oneshot::Sender<()>),
}

/// Responses produced by the transport actor.
#[derive(Debug)]
pub(crate) enum TransportResponse {
    Response(Response),
    Target(TargetMessage),
}

/// A browser-level CDP response.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Response {
    pub(crate) id: u64,
    #[serde(default)]
    pub(crate) result: Value,
}

/// A `Target.receivedMessageFromTarget` notification.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TargetMessage {
    pub(crate) params: Value,
}

/// Owns the WebSocket sink and routes replies and events back to their waiters.
pub(crate) struct TransportActor {
    pub(crate) pending_requests: HashMap<u64, ReplySender>,
    pub(crate) event_listeners: HashMap<(String, String), Vec<oneshot::Sender<Value>>>,
    pub(crate) ws_sink: SplitSink<WsStream, Message>,
    pub(crate) command_rx: mpsc::Receiver<TransportMessage>,
}

impl TransportActor {
    pub(crate) async fn run(mut self, mut ws_stream: SplitStream<WsStream>) {
        loop {
            tokio::select! {
                Some(msg) = ws_stream.next() => {
                    match msg {
                        Ok(Message::Text(text)) => self.dispatch(&text),
                        Ok(Message::Close(_)) | Err(_) => break,
                        _ => {}
                    }
                }
                Some(msg) = self.command_rx.recv() => {
                    if let Some(ack) = self.handle_command(msg).await {
                        let _ = ack.send(());
                        break;
                    }
                }
                else => break,
            }
        }
        debug!("Transport actor stopped");
    }

    /// Returns the acknowledgement channel when the command was a shutdown.
    async fn handle_command(&mut self, msg: TransportMessage) -> Option<oneshot::Sender<()>> {
        match msg {
            TransportMessage::Request(cmd, tx) => {
                let Some(id) = cmd["id"].as_u64() else {
                    let _ = tx.send(Err(anyhow!("Command has no id")));
                    return None;
                };
                let text = cmd.to_string();
                trace!("-> {text}");
                if self.ws_sink.send(Message::Text(text)).await.is_ok() {
                    self.pending_requests.insert(id, tx);
                } else {
                    let _ = tx.send(Err(anyhow!("WebSocket send failed")));
                }
                None
            }
            TransportMessage::ListenTargetMessage(id, tx) => {
                self.pending_requests.insert(id, tx);
                None
            }
            TransportMessage::ListenEvent {
                session_id,
                method,
                tx,
            } => {
                self.event_listeners
                    .entry((session_id, method))
                    .or_default()
                    .push(tx);
                None
            }
            TransportMessage::Shutdown(ack) => {
                let _ = self
                    .ws_sink
                    .send(Message::Text(
                        json!({ "id": next_id(), "method": "Browser.close", "params": {} })
                            .to_string(),
                    ))
                    .await;
                let _ = self.ws_sink.close().await;
                Some(ack)
            }
        }
    }

    fn dispatch(&mut self, text: &str) {
        trace!("<- {text}");
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return;
        };

        if let Some(id) = value.get("id").and_then(|i| i.as_u64()) {
            if let Some(sender) = self.pending_requests.remove(&id) {
                let reply = match value.get("error") {
                    Some(err) => Err(anyhow!(
                        "CDP error: {}",
                        err["message"].as_str().unwrap_or("unknown error")
                    )),
                    None => serde_json::from_value::<Response>(value)
                        .map(TransportResponse::Response)
                        .map_err(Into::into),
                };
                let _ = sender.send(reply);
            }
            return;
        }

        if value["method"] != "Target.receivedMessageFromTarget" {
            return;
        }
        let Ok(target_msg) = serde_json::from_value::<TargetMessage>(value) else {
            return;
        };
        let Some(inner) = target_msg
            .params
            .get("message")
            .and_then(|v| v.as_str())
            .and_then(|s| serde_json::from_str::<Value>(s).ok())
        else {
            return;
        };

        if let Some(id) = inner.get("id").and_then(|i| i.as_u64()) {
            if let Some(sender) = self.pending_requests.remove(&id) {
                let _ = sender.send(Ok(TransportResponse::Target(target_msg)));
            }
        } else if let Some(method) = inner.get("method").and_then(|m| m.as_str()) {
            let session_id = target_msg.params["sessionId"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            if let Some(listeners) = self
                .event_listeners
                .remove(&(session_id, method.to_string()))
            {
                for tx in listeners {
                    let _ = tx.send(inner["params"].clone());
                }
            }
        }
    }
}
