use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use crate::general_utils::{self, next_id, send_and_get_msg};
use crate::transport::Transport;
use crate::transport_actor::TransportResponse;
use crate::types::{PageDimensions, ScreenshotOptions, Viewport};

/// How long navigation may take to reach the load event.
const LOAD_TIMEOUT: Duration = Duration::from_secs(30);

const MEASURE_JS: &str = r#"({
    width: document.documentElement.clientWidth,
    height: document.documentElement.clientHeight,
    deviceScaleFactor: window.devicePixelRatio
})"#;

/// Represents a CDP browser tab (target) session.
#[derive(Debug)]
pub struct Tab {
    pub(crate) transport: Arc<Transport>,
    pub(crate) session_id: String,
    pub(crate) target_id: String,
}

impl Tab {
    pub(crate) async fn new(transport: Arc<Transport>) -> Result<Self> {
        let TransportResponse::Response(res_create) = transport
            .send(json!({ "id": next_id(), "method": "Target.createTarget", "params": { "url": "about:blank" } }))
            .await? else { return Err(anyhow!("Invalid response type")); };

        let target_id = res_create.result["targetId"]
            .as_str()
            .context("No targetId")?
            .to_string();

        let TransportResponse::Response(res_attach) = transport
            .send(json!({ "id": next_id(), "method": "Target.attachToTarget", "params": { "targetId": target_id } }))
            .await? else { return Err(anyhow!("Invalid response type")); };

        let session_id = res_attach.result["sessionId"]
            .as_str()
            .context("No sessionId")?
            .to_string();

        debug!("Opened tab {target_id}");
        Ok(Self {
            transport,
            session_id,
            target_id,
        })
    }

    /// Sends a command to this tab's session and returns the parsed reply.
    pub(crate) async fn send_cmd(&self, method: &str, params: Value) -> Result<Value> {
        let msg_id = next_id();
        let msg = json!({
            "id": msg_id,
            "method": method,
            "params": params
        })
        .to_string();
        let res = send_and_get_msg(self.transport.clone(), msg_id, &self.session_id, msg).await?;
        general_utils::check_cdp_error(general_utils::serde_msg(&res)?)
            .with_context(|| format!("{method} failed"))
    }

    /// Navigates to `url` and waits for the load event.
    pub async fn goto(&self, url: &str) -> Result<&Self> {
        self.send_cmd("Page.enable", json!({})).await?;

        // Register before navigating so the event cannot be missed.
        let event_rx = self
            .transport
            .listen_for_event(&self.session_id, "Page.loadEventFired")
            .await?;

        let res = self
            .send_cmd("Page.navigate", json!({ "url": url }))
            .await?;
        if let Some(error_text) = res["result"]["errorText"].as_str() {
            bail!("Navigation to {url} failed: {error_text}");
        }

        time::timeout(LOAD_TIMEOUT, event_rx)
            .await
            .map_err(|_| anyhow!("Timeout waiting for event Page.loadEventFired"))?
            .map_err(|_| anyhow!("Event channel closed"))?;

        debug!("Loaded {url}");
        Ok(self)
    }

    /// Evaluates `expression` in the page and returns its value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self
            .send_cmd(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true
                }),
            )
            .await?;

        if let Some(details) = result["result"].get("exceptionDetails") {
            let text = details["exception"]["description"]
                .as_str()
                .or_else(|| details["text"].as_str())
                .unwrap_or("unknown exception");
            bail!("Evaluation failed: {text}");
        }
        Ok(result["result"]["result"]["value"].clone())
    }

    /// Reads the client size and device pixel ratio the page reports.
    pub async fn measure(&self) -> Result<PageDimensions> {
        let value = self.evaluate(MEASURE_JS).await?;
        serde_json::from_value(value).context("Unexpected page dimensions")
    }

    pub async fn set_viewport(&self, viewport: &Viewport) -> Result<&Self> {
        self.send_cmd(
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": viewport.width,
                "height": viewport.height,
                "deviceScaleFactor": viewport.device_scale_factor,
                "mobile": false,
                "screenOrientation": { "type": "portraitPrimary", "angle": 0 }
            }),
        )
        .await?;
        Ok(self)
    }

    /// Captures a PNG screenshot and returns it base64 encoded.
    pub async fn screenshot(&self, opts: ScreenshotOptions) -> Result<String> {
        let mut params = json!({
            "format": "png",
            "fromSurface": true,
            "captureBeyondViewport": opts.full_page,
        });

        if opts.full_page {
            let metrics = self.send_cmd("Page.getLayoutMetrics", json!({})).await?;
            let (width, height) = content_size(&metrics["result"])?;
            params["clip"] = json!({
                "x": 0,
                "y": 0,
                "width": width,
                "height": height,
                "scale": 1
            });
        }

        self.activate().await?;
        let result = self.send_cmd("Page.captureScreenshot", params).await?;

        result["result"]["data"]
            .as_str()
            .map(|s| s.to_string())
            .context("No image data received")
    }

    /// Brings the tab to the foreground.
    pub async fn activate(&self) -> Result<&Self> {
        let TransportResponse::Response(_) = self
            .transport
            .send(json!({ "id": next_id(), "method": "Target.activateTarget", "params": { "targetId": self.target_id } }))
            .await? else { return Err(anyhow!("Invalid response type")); };
        Ok(self)
    }
}

/// Scrollable content size in CSS pixels from a `Page.getLayoutMetrics` result.
fn content_size(metrics: &Value) -> Result<(f64, f64)> {
    // `cssContentSize` is in CSS pixels; older browsers only send `contentSize`.
    let size = metrics
        .get("cssContentSize")
        .or_else(|| metrics.get("contentSize"))
        .context("No content size in layout metrics")?;
    let width = size["width"].as_f64().context("No content width")?;
    let height = size["height"].as_f64().context("No content height")?;
    Ok((width.ceil(), height.ceil()))
}
