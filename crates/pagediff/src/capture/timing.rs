use std::time::Duration;

use tracing::debug;

/// Per-stage timing breakdown for a single page capture.
#[derive(Clone, Copy, Debug, Default)]
pub struct CaptureTimings {
    pub navigate: Duration,
    pub ready: Duration,
    pub settle: Duration,
    pub layout: Duration,
    pub screenshot: Duration,
    pub total: Duration,
}

impl CaptureTimings {
    pub fn log(&self, url: &str) {
        debug!(
            url,
            navigate_ms = self.navigate.as_millis() as u64,
            ready_ms = self.ready.as_millis() as u64,
            settle_ms = self.settle.as_millis() as u64,
            layout_ms = self.layout.as_millis() as u64,
            screenshot_ms = self.screenshot.as_millis() as u64,
            total_ms = self.total.as_millis() as u64,
            "capture timings"
        );
    }
}
