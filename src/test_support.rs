//! In-process stand-in for a browser's DevTools endpoint.

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use crate::image_info::encode_png;
use crate::tab::Tab;
use crate::transport::Transport;

/// Answers one command: `Ok(result)` or `Err(cdp error message)`.
pub(crate) type Handler = dyn Fn(&str, &Value) -> Result<Value, String> + Send + Sync;

pub(crate) struct FakeBrowser {
    pub(crate) ws_url: String,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl FakeBrowser {
    /// Starts an endpoint answering browser-level and session commands with
    /// `handler`. Session traffic is wrapped the way Chrome does it, and a
    /// successful `Page.navigate` is followed by `Page.loadEventFired`.
    pub(crate) async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        let handler: Arc<Handler> = Arc::new(handler);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let recorded = calls.clone();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            while let Some(Ok(Message::Text(text))) = ws.next().await {
                let cmd: Value = serde_json::from_str(&text).unwrap();
                let replies = answer(&cmd, handler.as_ref(), &recorded);
                for reply in replies {
                    if ws.send(Message::Text(reply.to_string())).await.is_err() {
                        return;
                    }
                }
            }
        });

        Self {
            ws_url: format!("ws://{addr}"),
            calls,
        }
    }

    /// Starts an endpoint serving the page described by [`default_handler`].
    pub(crate) async fn with_defaults() -> Self {
        Self::start(default_handler).await
    }

    pub(crate) async fn transport(&self) -> Arc<Transport> {
        Arc::new(Transport::new(&self.ws_url).await.unwrap())
    }

    pub(crate) async fn tab(&self) -> Tab {
        Tab::new(self.transport().await).await.unwrap()
    }

    /// Params of every command received with this method, in order.
    pub(crate) fn params_of(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Waits up to a second for a command with this method to arrive.
    pub(crate) async fn wait_for_call(&self, method: &str) -> bool {
        for _ in 0..50 {
            if !self.params_of(method).is_empty() {
                return true;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        false
    }

    pub(crate) fn methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(m, _)| m.clone())
            .collect()
    }
}

fn answer(cmd: &Value, handler: &Handler, calls: &Mutex<Vec<(String, Value)>>) -> Vec<Value> {
    let id = cmd["id"].clone();
    let method = cmd["method"].as_str().unwrap_or_default();

    if method != "Target.sendMessageToTarget" {
        calls
            .lock()
            .unwrap()
            .push((method.to_string(), cmd["params"].clone()));
        return vec![reply(id, handler(method, &cmd["params"]))];
    }

    let session = cmd["params"]["sessionId"].clone();
    let inner: Value = serde_json::from_str(cmd["params"]["message"].as_str().unwrap()).unwrap();
    let inner_method = inner["method"].as_str().unwrap_or_default();
    calls
        .lock()
        .unwrap()
        .push((inner_method.to_string(), inner["params"].clone()));

    let outcome = handler(inner_method, &inner["params"]);
    let navigated = inner_method == "Page.navigate"
        && matches!(&outcome, Ok(res) if res.get("errorText").is_none());

    let wrap = |message: Value| {
        json!({
            "method": "Target.receivedMessageFromTarget",
            "params": { "sessionId": session, "message": message.to_string() }
        })
    };
    let mut replies = vec![
        json!({ "id": id, "result": {} }),
        wrap(reply(inner["id"].clone(), outcome)),
    ];
    if navigated {
        replies.push(wrap(
            json!({ "method": "Page.loadEventFired", "params": { "timestamp": 1.5 } }),
        ));
    }
    replies
}

fn reply(id: Value, outcome: Result<Value, String>) -> Value {
    match outcome {
        Ok(result) => json!({ "id": id, "result": result }),
        Err(message) => json!({ "id": id, "error": { "code": -32000, "message": message } }),
    }
}

/// A page 600px tall in the viewport, 640x2000 CSS pixels of content.
pub(crate) fn default_handler(method: &str, _params: &Value) -> Result<Value, String> {
    Ok(match method {
        "Target.createTarget" => json!({ "targetId": "T1" }),
        "Target.attachToTarget" => json!({ "sessionId": "S1" }),
        "Page.navigate" => json!({ "frameId": "F1", "loaderId": "L1" }),
        "Runtime.evaluate" => json!({
            "result": {
                "type": "object",
                "value": { "width": 800, "height": 600, "deviceScaleFactor": 1 }
            }
        }),
        "Page.getLayoutMetrics" => json!({
            "contentSize": { "x": 0, "y": 0, "width": 1280, "height": 4000 },
            "cssContentSize": { "x": 0, "y": 0, "width": 640, "height": 1999.5 }
        }),
        "Page.captureScreenshot" => json!({
            "data": BASE64_STANDARD.encode(encode_png(640, 2000))
        }),
        _ => json!({}),
    })
}
