use anyhow::{Result, anyhow};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::transport::{Transport, wait_reply};
use crate::transport_actor::{TargetMessage, TransportResponse};

static GLOBAL_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Returns a unique incremental ID for request messages.
pub(crate) fn next_id() -> usize {
    GLOBAL_ID_COUNTER.fetch_add(1, Ordering::SeqCst) + 1
}

/// Parses the JSON message string carried by a `TargetMessage`.
pub(crate) fn serde_msg(msg: &TargetMessage) -> Result<Value> {
    let str_msg = msg.params["message"]
        .as_str()
        .ok_or_else(|| anyhow!("Invalid message format"))?;
    Ok(serde_json::from_str(str_msg)?)
}

/// Turns a CDP reply carrying an `error` object into an error.
pub(crate) fn check_cdp_error(data: Value) -> Result<Value> {
    if let Some(err) = data.get("error") {
        let message = err["message"].as_str().unwrap_or("unknown error");
        return match err.get("data").and_then(|d| d.as_str()) {
            Some(detail) => Err(anyhow!("CDP error: {message} ({detail})")),
            None => Err(anyhow!("CDP error: {message}")),
        };
    }
    Ok(data)
}

/// Sends a message to a target and waits for the corresponding response.
pub(crate) async fn send_and_get_msg(
    transport: Arc<Transport>,
    msg_id: usize,
    session_id: &str,
    msg: String,
) -> Result<TargetMessage> {
    // Listen before sending so a fast reply cannot slip past.
    let reply_rx = transport.get_target_msg(msg_id).await?;
    transport
        .send(json!({
            "id": next_id(),
            "method": "Target.sendMessageToTarget",
            "params": { "sessionId": session_id, "message": msg }
        }))
        .await?;

    match wait_reply(reply_rx).await? {
        TransportResponse::Target(res) => Ok(res),
        other => Err(anyhow!("Unexpected response: {:?}", other)),
    }
}
