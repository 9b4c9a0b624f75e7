use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{Instrument, debug, debug_span, warn};

use super::timing::CaptureTimings;
use super::{Browser, Launcher};
use crate::cdp::{CdpConnection, Chrome, ClipRect};
use crate::config::{CaptureSettings, WaitUntil};
use crate::error::ComparisonError;

/// Upper bound on waiting for the readiness event; the page is captured
/// anyway once it passes.
const LIFECYCLE_LIMIT: Duration = Duration::from_secs(10);

/// Upper bound on waiting for the network to go idle.
const NETWORK_IDLE_LIMIT: Duration = Duration::from_secs(10);

/// Launches (or connects to) Chrome once per comparison.
#[derive(Clone, Debug)]
pub struct ChromeLauncher {
    settings: CaptureSettings,
}

impl ChromeLauncher {
    pub fn new(settings: CaptureSettings) -> Self {
        Self { settings }
    }
}

impl Launcher for ChromeLauncher {
    type Browser = ChromeBrowser;

    fn capture_timeout(&self) -> Duration {
        self.settings.timeout
    }

    async fn launch(&self) -> Result<ChromeBrowser, ComparisonError> {
        ChromeBrowser::open(self.settings.clone())
            .await
            .map_err(|e| ComparisonError::Resource(format!("{e:#}")))
    }
}

/// A Chrome instance with a single tab, reused for every capture.
pub struct ChromeBrowser {
    chrome: Chrome,
    conn: CdpConnection,
    target_id: String,
    settings: CaptureSettings,
}

impl ChromeBrowser {
    async fn open(settings: CaptureSettings) -> Result<Self> {
        let mut chrome = match &settings.chrome_url {
            Some(url) => Chrome::connect(url)
                .await
                .with_context(|| format!("Failed to connect to remote Chrome at {url}"))?,
            None => Chrome::launch().await.context("Failed to launch Chrome")?,
        };

        let (target_id, ws_url) = chrome.create_tab().await?;
        match open_tab(&ws_url, &settings).await {
            Ok(conn) => {
                debug!(target_id = %target_id, "browser ready");
                Ok(Self {
                    chrome,
                    conn,
                    target_id,
                    settings,
                })
            }
            Err(e) => {
                if let Err(close_err) = chrome.close_tab(&target_id).await {
                    warn!(error = %format!("{close_err:#}"), "failed to close tab");
                }
                if let Err(shutdown_err) = chrome.shutdown().await {
                    warn!(error = %format!("{shutdown_err:#}"), "failed to shut down Chrome");
                }
                Err(e)
            }
        }
    }

    /// Capture stages:
    /// 1. Navigate
    /// 2. Wait for the readiness event (and network idle, if configured)
    /// 3. Settle delay
    /// 4. Measure full document size
    /// 5. Screenshot the whole document
    async fn capture_page(&mut self, url: &str) -> Result<Vec<u8>> {
        let conn = &mut self.conn;
        let wait_until = self.settings.wait_until;
        let t0 = Instant::now();

        debug!(url, "1/5 navigate");
        conn.navigate(url).await?;
        let t1 = Instant::now();

        debug!(?wait_until, "2/5 wait_ready");
        conn.wait_lifecycle(wait_until.event(), LIFECYCLE_LIMIT).await?;
        if wait_until == WaitUntil::NetworkIdle {
            conn.wait_network_idle(NETWORK_IDLE_LIMIT).await?;
        }
        let t2 = Instant::now();

        debug!(settle_ms = self.settings.settle.as_millis() as u64, "3/5 settle");
        if !self.settings.settle.is_zero() {
            tokio::time::sleep(self.settings.settle).await;
        }
        let t3 = Instant::now();

        debug!("4/5 layout");
        let (width, height) = conn.content_size().await?;
        let clip = ClipRect::full_page(width, height);
        let t4 = Instant::now();
        debug!(w = clip.w, h = clip.h, "4/5 content size");

        debug!("5/5 screenshot");
        let png = conn.capture_screenshot(&clip).await?;
        let t5 = Instant::now();
        debug!(bytes = png.len(), "5/5 screenshot done");

        CaptureTimings {
            navigate: t1 - t0,
            ready: t2 - t1,
            settle: t3 - t2,
            layout: t4 - t3,
            screenshot: t5 - t4,
            total: t5 - t0,
        }
        .log(url);

        Ok(png)
    }
}

impl Browser for ChromeBrowser {
    async fn capture(&mut self, url: &str) -> Result<Vec<u8>, ComparisonError> {
        let span = debug_span!("capture", url);
        self.capture_page(url).instrument(span).await.map_err(|e| {
            warn!(url, error = %format!("{e:#}"), "capture failed");
            ComparisonError::Capture {
                url: url.to_string(),
                message: format!("{e:#}"),
            }
        })
    }

    async fn close(self) -> Result<()> {
        let Self {
            mut chrome,
            conn,
            target_id,
            ..
        } = self;
        // Drop the WebSocket connection before closing the tab.
        drop(conn);
        let tab = chrome.close_tab(&target_id).await;
        let process = chrome.shutdown().await;
        tab.and(process)
    }
}

/// Connect to a fresh tab and prepare it for capturing.
async fn open_tab(ws_url: &str, settings: &CaptureSettings) -> Result<CdpConnection> {
    let mut conn = CdpConnection::connect(ws_url).await?;
    conn.enable_domains().await?;
    conn.set_viewport(settings.viewport_width, settings.viewport_height)
        .await?;
    Ok(conn)
}
