pub mod pipeline;
pub mod timing;

use std::future::Future;
use std::time::Duration;

use crate::error::ComparisonError;

pub use self::pipeline::{ChromeBrowser, ChromeLauncher};
pub use self::timing::CaptureTimings;

/// A launched browser able to screenshot pages.
pub trait Browser: Send + Sized {
    /// Navigate to `url` and return a full-page PNG screenshot.
    fn capture(
        &mut self,
        url: &str,
    ) -> impl Future<Output = Result<Vec<u8>, ComparisonError>> + Send;

    /// Release the browser. Called exactly once per launch, whether the
    /// captures succeeded or not.
    fn close(self) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Acquires a fresh browser for each comparison.
pub trait Launcher: Send + Sync + 'static {
    type Browser: Browser;

    /// Upper bound on one `Browser::capture`, enforced by the caller.
    fn capture_timeout(&self) -> Duration;

    fn launch(&self) -> impl Future<Output = Result<Self::Browser, ComparisonError>> + Send;
}
