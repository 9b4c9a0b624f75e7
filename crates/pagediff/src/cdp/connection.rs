use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};

use super::ClipRect;

/// How long the network must stay quiet before it counts as idle.
const NETWORK_SETTLE: Duration = Duration::from_millis(100);

/// A CDP event received from the browser.
struct CdpEvent {
    method: String,
    params: Value,
}

/// Per-target WebSocket CDP connection.
///
/// Reads are inline (no background task) since each connection is single-owner.
pub struct CdpConnection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: u64,
    event_buffer: Vec<CdpEvent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutMetrics {
    css_content_size: ContentSize,
}

#[derive(Deserialize)]
struct ContentSize {
    width: f64,
    height: f64,
}

impl CdpConnection {
    /// Connect to a CDP WebSocket URL (browser or per-target).
    pub async fn connect(url: &str) -> Result<Self> {
        debug!(url, "connecting CDP WebSocket");
        let (ws, _) = connect_async(url)
            .await
            .with_context(|| format!("Failed to connect to {url}"))?;
        debug!(url, "CDP WebSocket connected");

        Ok(Self {
            ws,
            next_id: 1,
            event_buffer: Vec::new(),
        })
    }

    /// Send a CDP command and wait for the matching response (by id).
    /// Events received while waiting are buffered for later retrieval.
    pub async fn call(&mut self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let msg = json!({
            "id": id,
            "method": method,
            "params": params,
        });

        self.ws
            .send(Message::Text(msg.to_string().into()))
            .await
            .with_context(|| format!("Failed to send CDP command {method}"))?;

        loop {
            let parsed = self.read_message().await?;

            if parsed.get("id").and_then(|v| v.as_u64()) == Some(id) {
                if let Some(error) = parsed.get("error") {
                    bail!(
                        "CDP error for {method}: {}",
                        serde_json::to_string(error).unwrap_or_default()
                    );
                }
                return Ok(parsed.get("result").cloned().unwrap_or(Value::Null));
            }

            if let Some(event) = Self::as_event(&parsed) {
                self.event_buffer.push(event);
            }
        }
    }

    /// Wait for a specific CDP event (by method name).
    /// Checks the buffer first, then reads from WebSocket.
    pub async fn wait_event(&mut self, method: &str) -> Result<Value> {
        if let Some(idx) = self.event_buffer.iter().position(|e| e.method == method) {
            return Ok(self.event_buffer.remove(idx).params);
        }

        loop {
            let event = self.read_event().await?;
            if event.method == method {
                return Ok(event.params);
            }
            self.event_buffer.push(event);
        }
    }

    /// Wait for a lifecycle event such as `Page.loadEventFired`.
    ///
    /// Hitting `limit` is not an error: some pages never fire their load
    /// event, and the caller's overall capture timeout still applies.
    pub async fn wait_lifecycle(&mut self, method: &str, limit: Duration) -> Result<()> {
        debug!(
            method,
            buffered_events = self.event_buffer.len(),
            "waiting for lifecycle event"
        );
        match tokio::time::timeout(limit, self.wait_event(method)).await {
            Ok(Ok(_)) => {
                debug!(method, "lifecycle event received");
                Ok(())
            }
            Ok(Err(e)) => Err(e).with_context(|| format!("Error waiting for {method}")),
            Err(_) => {
                warn!(
                    method,
                    limit_ms = limit.as_millis() as u64,
                    "lifecycle event timed out, proceeding anyway"
                );
                Ok(())
            }
        }
    }

    /// Wait until all in-flight network requests have completed and no new
    /// requests arrive for 100ms. Gives up after `limit` and proceeds.
    ///
    /// Requires `Network.enable` to have been called beforehand.
    pub async fn wait_network_idle(&mut self, limit: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + limit;
        let mut pending: HashSet<String> = HashSet::new();

        for event in &self.event_buffer {
            Self::track_network(&event.method, &event.params, &mut pending);
        }
        trace!(
            buffered_events = self.event_buffer.len(),
            pending = pending.len(),
            "network idle: initial state"
        );

        loop {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                debug!(pending = pending.len(), "network idle: deadline hit");
                return Ok(());
            }

            let read_timeout = if pending.is_empty() {
                NETWORK_SETTLE.min(deadline - now)
            } else {
                deadline - now
            };

            match tokio::time::timeout(read_timeout, self.read_event()).await {
                Err(_) => {
                    trace!(pending = pending.len(), "network idle: settled");
                    return Ok(());
                }
                Ok(event) => {
                    let event = event?;
                    Self::track_network(&event.method, &event.params, &mut pending);
                    self.event_buffer.push(event);
                }
            }
        }
    }

    /// Navigate to a URL. Clears the event buffer first so lifecycle events
    /// from an earlier navigation on this tab are not mistaken for new ones.
    ///
    /// Fails when Chrome reports a navigation error (DNS, refused
    /// connection, bad scheme, ...).
    pub async fn navigate(&mut self, url: &str) -> Result<()> {
        let stale = self.event_buffer.len();
        self.event_buffer.clear();
        debug!(url, stale_events_cleared = stale, "navigating");
        let result = self
            .call("Page.navigate", json!({"url": url}))
            .await
            .context("Failed to navigate")?;
        if let Some(error_text) = result.get("errorText").and_then(|v| v.as_str()) {
            bail!("navigation failed: {error_text}");
        }
        debug!(url, frame_id = ?result.get("frameId"), "navigation started");
        Ok(())
    }

    /// Full scrollable size of the current document, in CSS pixels.
    pub async fn content_size(&mut self) -> Result<(f64, f64)> {
        let result = self
            .call("Page.getLayoutMetrics", json!({}))
            .await
            .context("Failed to get layout metrics")?;
        let metrics: LayoutMetrics =
            serde_json::from_value(result).context("Failed to parse layout metrics")?;
        Ok((metrics.css_content_size.width, metrics.css_content_size.height))
    }

    /// Capture the given clip region, rendering beyond the viewport, and
    /// return PNG bytes.
    pub async fn capture_screenshot(&mut self, clip: &ClipRect) -> Result<Vec<u8>> {
        let result = self
            .call(
                "Page.captureScreenshot",
                json!({
                    "format": "png",
                    "captureBeyondViewport": true,
                    "clip": {
                        "x": clip.x,
                        "y": clip.y,
                        "width": clip.w,
                        "height": clip.h,
                        "scale": 1,
                    },
                }),
            )
            .await
            .context("Failed to capture screenshot")?;

        let b64_data = result["data"]
            .as_str()
            .context("No screenshot data in response")?;

        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(b64_data)
            .context("Failed to decode base64 screenshot")
    }

    /// Set the emulated viewport size.
    pub async fn set_viewport(&mut self, width: u32, height: u32) -> Result<()> {
        self.call(
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": width,
                "height": height,
                "deviceScaleFactor": 1,
                "mobile": false,
            }),
        )
        .await
        .context("Failed to set device metrics")?;
        Ok(())
    }

    /// Enable the Page and Network CDP domains for this connection.
    pub async fn enable_domains(&mut self) -> Result<()> {
        self.call("Page.enable", json!({}))
            .await
            .context("Failed to enable Page domain")?;
        self.call("Network.enable", json!({}))
            .await
            .context("Failed to enable Network domain")?;
        Ok(())
    }

    /// Read the next text frame and parse it as JSON.
    async fn read_message(&mut self) -> Result<Value> {
        loop {
            let raw = self
                .ws
                .next()
                .await
                .context("WebSocket closed while waiting for message")?
                .context("WebSocket error")?;

            let Message::Text(text) = raw else {
                continue; // Skip binary/ping/pong frames
            };

            return serde_json::from_str(&text).context("Failed to parse CDP message");
        }
    }

    /// Read the next CDP event, skipping stale command responses.
    async fn read_event(&mut self) -> Result<CdpEvent> {
        loop {
            let parsed = self.read_message().await?;
            if let Some(event) = Self::as_event(&parsed) {
                return Ok(event);
            }
        }
    }

    fn as_event(parsed: &Value) -> Option<CdpEvent> {
        let method = parsed.get("method").and_then(|v| v.as_str())?;
        Some(CdpEvent {
            method: method.to_string(),
            params: parsed.get("params").cloned().unwrap_or(Value::Null),
        })
    }

    /// Update pending request set based on a CDP Network event.
    fn track_network(method: &str, params: &Value, pending: &mut HashSet<String>) {
        let Some(id) = params.get("requestId").and_then(|v| v.as_str()) else {
            return;
        };
        match method {
            "Network.requestWillBeSent" => {
                pending.insert(id.to_string());
            }
            "Network.loadingFinished" | "Network.loadingFailed" => {
                pending.remove(id);
            }
            _ => {}
        }
    }
}
