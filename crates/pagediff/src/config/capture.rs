use std::time::Duration;

use anyhow::{Result, bail};
use serde::Deserialize;

/// Page readiness signal awaited before the screenshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitUntil {
    /// `load` event: all subresources fetched.
    Load,
    /// `DOMContentLoaded`: HTML parsed, subresources may still be loading.
    DomContentLoaded,
    /// `load`, then no in-flight requests for 100ms.
    NetworkIdle,
}

impl WaitUntil {
    /// CDP event signalling this readiness level.
    pub fn event(self) -> &'static str {
        match self {
            Self::DomContentLoaded => "Page.domContentEventFired",
            Self::Load | Self::NetworkIdle => "Page.loadEventFired",
        }
    }
}

/// Configuration for page capture.
///
/// Fields are `Option`: `None` means "use the mode default".
/// Serves both TOML deserialization (`[capture]`) and CLI argument parsing.
#[derive(Clone, Debug, Default, clap::Args, Deserialize)]
pub struct CaptureConfig {
    /// Viewport width in CSS pixels
    #[arg(long)]
    #[serde(default)]
    pub viewport_width: Option<u32>,

    /// Viewport height in CSS pixels
    #[arg(long)]
    #[serde(default)]
    pub viewport_height: Option<u32>,

    /// Readiness signal to wait for after navigation
    #[arg(long, value_enum)]
    #[serde(default)]
    pub wait_until: Option<WaitUntil>,

    /// Extra delay after the page is ready, in milliseconds
    #[arg(long)]
    #[serde(default)]
    pub settle_ms: Option<u64>,

    /// Per-page capture timeout, in milliseconds
    #[arg(long)]
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Connect to a remote Chrome instead of launching a local one.
    /// Value is `http://host:port` (e.g. `http://localhost:9222`).
    #[arg(long)]
    #[serde(default)]
    pub chrome_url: Option<String>,
}

impl CaptureConfig {
    /// Overlay non-None fields from `other` onto self.
    pub fn merge(&mut self, other: &CaptureConfig) {
        if other.viewport_width.is_some() {
            self.viewport_width = other.viewport_width;
        }
        if other.viewport_height.is_some() {
            self.viewport_height = other.viewport_height;
        }
        if other.wait_until.is_some() {
            self.wait_until = other.wait_until;
        }
        if other.settle_ms.is_some() {
            self.settle_ms = other.settle_ms;
        }
        if other.timeout_ms.is_some() {
            self.timeout_ms = other.timeout_ms;
        }
        if other.chrome_url.is_some() {
            self.chrome_url = other.chrome_url.clone();
        }
    }

    /// Fill unset fields from `base` and validate the result.
    pub fn resolve(&self, base: CaptureSettings) -> Result<CaptureSettings> {
        let settings = CaptureSettings {
            viewport_width: self.viewport_width.unwrap_or(base.viewport_width),
            viewport_height: self.viewport_height.unwrap_or(base.viewport_height),
            wait_until: self.wait_until.unwrap_or(base.wait_until),
            settle: self.settle_ms.map(Duration::from_millis).unwrap_or(base.settle),
            timeout: self.timeout_ms.map(Duration::from_millis).unwrap_or(base.timeout),
            chrome_url: self.chrome_url.clone().or(base.chrome_url),
        };
        settings.validate()?;
        Ok(settings)
    }
}

/// Fully resolved capture parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureSettings {
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub wait_until: WaitUntil,
    pub settle: Duration,
    /// Bounds one page capture: navigation, waiting and screenshot.
    pub timeout: Duration,
    pub chrome_url: Option<String>,
}

impl CaptureSettings {
    const VIEWPORT_WIDTH: u32 = 1280;
    const VIEWPORT_HEIGHT: u32 = 720;
    const TIMEOUT: Duration = Duration::from_secs(30);

    /// CLI defaults: wait for the network to go quiet, no extra delay.
    pub fn one_shot() -> Self {
        Self {
            viewport_width: Self::VIEWPORT_WIDTH,
            viewport_height: Self::VIEWPORT_HEIGHT,
            wait_until: WaitUntil::NetworkIdle,
            settle: Duration::ZERO,
            timeout: Self::TIMEOUT,
            chrome_url: None,
        }
    }

    /// Service defaults: DOMContentLoaded plus a one second settle.
    pub fn service() -> Self {
        Self {
            wait_until: WaitUntil::DomContentLoaded,
            settle: Duration::from_millis(1000),
            ..Self::one_shot()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.viewport_width == 0 || self.viewport_height == 0 {
            bail!(
                "Viewport has invalid dimensions ({}x{}). Both width and height must be > 0",
                self.viewport_width,
                self.viewport_height,
            );
        }
        if self.timeout.is_zero() {
            bail!("Capture timeout must be > 0");
        }
        Ok(())
    }
}
