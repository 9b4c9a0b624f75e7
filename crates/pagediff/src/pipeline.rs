use std::time::{Duration, Instant};

use tracing::{Instrument, debug, info, info_span, warn};

use crate::capture::{Browser, Launcher};
use crate::compare::buffer::BufferError;
use crate::compare::{self, CompareOptions, ComparisonResult, PixelBuffer};
use crate::config::validate_threshold;
use crate::error::ComparisonError;

/// Two pages to compare and how strictly.
#[derive(Clone, Debug)]
pub struct ComparisonRequest {
    pub url1: String,
    pub url2: String,
    pub options: CompareOptions,
}

impl ComparisonRequest {
    pub fn new(url1: impl Into<String>, url2: impl Into<String>, options: CompareOptions) -> Self {
        Self {
            url1: url1.into(),
            url2: url2.into(),
            options,
        }
    }

    /// Reject input that would make launching a browser pointless.
    pub fn validate(&self) -> Result<(), ComparisonError> {
        if self.url1.trim().is_empty() || self.url2.trim().is_empty() {
            return Err(ComparisonError::Validation("Missing url1 or url2".into()));
        }
        validate_threshold(self.options.threshold).map_err(ComparisonError::Validation)?;
        Ok(())
    }
}

/// Both raw captures plus the comparison computed from them.
#[derive(Debug)]
pub struct Comparison {
    pub screenshot1: Vec<u8>,
    pub screenshot2: Vec<u8>,
    /// PNG of `result.diff_image`; empty when the normalized size is 0x0.
    pub diff_png: Vec<u8>,
    pub result: ComparisonResult,
}

impl Comparison {
    /// Capture both pages with one browser, release it, then diff.
    ///
    /// The browser is closed on every path once launched. A close failure is
    /// logged and never replaces the comparison outcome.
    pub async fn run<L: Launcher>(
        launcher: &L,
        request: &ComparisonRequest,
    ) -> Result<Self, ComparisonError> {
        Self::run_with_progress(launcher, request, |_, _| {}).await
    }

    /// Like [`Comparison::run`], calling `on_capture(n, png)` as soon as
    /// page `n` (1 or 2) has been captured.
    pub async fn run_with_progress<L, F>(
        launcher: &L,
        request: &ComparisonRequest,
        on_capture: F,
    ) -> Result<Self, ComparisonError>
    where
        L: Launcher,
        F: FnMut(u8, &[u8]) + Send,
    {
        request.validate()?;
        let span = info_span!("compare", url1 = %request.url1, url2 = %request.url2);
        Self::run_validated(launcher, request, on_capture)
            .instrument(span)
            .await
    }

    async fn run_validated<L, F>(
        launcher: &L,
        request: &ComparisonRequest,
        mut on_capture: F,
    ) -> Result<Self, ComparisonError>
    where
        L: Launcher,
        F: FnMut(u8, &[u8]) + Send,
    {
        let start = Instant::now();
        let limit = launcher.capture_timeout();

        let mut browser = launcher.launch().await?;
        debug!("browser launched");
        let captured = async {
            let first = capture_within(&mut browser, &request.url1, limit).await?;
            on_capture(1, &first);
            let second = capture_within(&mut browser, &request.url2, limit).await?;
            on_capture(2, &second);
            Ok::<_, ComparisonError>((first, second))
        }
        .await;
        if let Err(e) = browser.close().await {
            warn!(error = %format!("{e:#}"), "failed to close browser");
        }
        let (screenshot1, screenshot2) = captured?;

        let png1 = screenshot1.clone();
        let png2 = screenshot2.clone();
        let options = request.options.clone();
        let (result, diff_png) = tokio::task::spawn_blocking(move || {
            let result = compare::compare_png(&png1, &png2, &options)?;
            let diff_png = encode_diff(&result.diff_image)?;
            Ok::<_, ComparisonError>((result, diff_png))
        })
        .await
        .map_err(|e| ComparisonError::Task(e.to_string()))??;

        info!(
            mismatched = result.mismatched_pixels,
            total = result.total_pixels,
            percentage = result.mismatch_percentage,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "comparison complete"
        );

        Ok(Self {
            screenshot1,
            screenshot2,
            diff_png,
            result,
        })
    }
}

fn encode_diff(diff: &PixelBuffer) -> Result<Vec<u8>, ComparisonError> {
    match diff.to_png() {
        Ok(png) => Ok(png),
        Err(BufferError::Empty(dims)) => {
            debug!(%dims, "empty diff image, nothing to encode");
            Ok(Vec::new())
        }
        Err(e) => Err(ComparisonError::Encode(e)),
    }
}

/// Capture one page, failing with a capture error once `limit` passes.
async fn capture_within<B: Browser>(
    browser: &mut B,
    url: &str,
    limit: Duration,
) -> Result<Vec<u8>, ComparisonError> {
    match tokio::time::timeout(limit, browser.capture(url)).await {
        Ok(Ok(png)) => {
            debug!(url, bytes = png.len(), "captured page");
            Ok(png)
        }
        Ok(Err(e)) => Err(e),
        Err(_) => {
            warn!(url, timeout_ms = limit.as_millis() as u64, "capture timed out");
            Err(ComparisonError::Capture {
                url: url.to_string(),
                message: format!("timed out after {}ms", limit.as_millis()),
            })
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted stand-ins for Chrome, shared by pipeline and server tests.

    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::capture::{Browser, Launcher};
    use crate::compare::PixelBuffer;
    use crate::error::ComparisonError;

    pub fn solid_png(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
        PixelBuffer::filled(w, h, rgba).to_png().unwrap()
    }

    #[derive(Default)]
    pub struct Counters {
        pub launched: AtomicUsize,
        pub closed: AtomicUsize,
        pub captured: AtomicUsize,
    }

    /// Serves canned bytes per URL. URLs without an entry fail to capture;
    /// capturing `hang_on` never completes.
    #[derive(Clone)]
    pub struct FakeLauncher {
        pub pages: Arc<HashMap<String, Vec<u8>>>,
        pub counters: Arc<Counters>,
        pub fail_launch: bool,
        pub fail_close: bool,
        pub hang_on: Option<String>,
        pub timeout: Duration,
    }

    impl Default for FakeLauncher {
        fn default() -> Self {
            Self {
                pages: Arc::default(),
                counters: Arc::default(),
                fail_launch: false,
                fail_close: false,
                hang_on: None,
                timeout: Duration::from_secs(30),
            }
        }
    }

    impl FakeLauncher {
        pub fn with_pages(pages: &[(&str, Vec<u8>)]) -> Self {
            let pages = pages
                .iter()
                .map(|(url, png)| (url.to_string(), png.clone()))
                .collect();
            Self {
                pages: Arc::new(pages),
                ..Self::default()
            }
        }

        pub fn launched(&self) -> usize {
            self.counters.launched.load(Ordering::SeqCst)
        }

        pub fn closed(&self) -> usize {
            self.counters.closed.load(Ordering::SeqCst)
        }

        pub fn captured(&self) -> usize {
            self.counters.captured.load(Ordering::SeqCst)
        }
    }

    pub struct FakeBrowser {
        pages: Arc<HashMap<String, Vec<u8>>>,
        counters: Arc<Counters>,
        fail_close: bool,
        hang_on: Option<String>,
    }

    impl Launcher for FakeLauncher {
        type Browser = FakeBrowser;

        fn capture_timeout(&self) -> Duration {
            self.timeout
        }

        async fn launch(&self) -> Result<FakeBrowser, ComparisonError> {
            if self.fail_launch {
                return Err(ComparisonError::Resource("no chrome here".into()));
            }
            self.counters.launched.fetch_add(1, Ordering::SeqCst);
            Ok(FakeBrowser {
                pages: Arc::clone(&self.pages),
                counters: Arc::clone(&self.counters),
                fail_close: self.fail_close,
                hang_on: self.hang_on.clone(),
            })
        }
    }

    impl Browser for FakeBrowser {
        async fn capture(&mut self, url: &str) -> Result<Vec<u8>, ComparisonError> {
            self.counters.captured.fetch_add(1, Ordering::SeqCst);
            if self.hang_on.as_deref() == Some(url) {
                std::future::pending::<()>().await;
            }
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| ComparisonError::Capture {
                    url: url.to_string(),
                    message: "net::ERR_NAME_NOT_RESOLVED".into(),
                })
        }

        async fn close(self) -> anyhow::Result<()> {
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                anyhow::bail!("tab already gone");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeLauncher, solid_png};
    use super::*;
    use crate::compare::Dimensions;

    const WHITE: [u8; 4] = [255, 255, 255, 255];
    const BLACK: [u8; 4] = [0, 0, 0, 255];

    fn request(url1: &str, url2: &str) -> ComparisonRequest {
        ComparisonRequest::new(url1, url2, CompareOptions::default())
    }

    #[tokio::test]
    async fn identical_pages_match() {
        let png = solid_png(2, 2, WHITE);
        let launcher = FakeLauncher::with_pages(&[("a", png.clone()), ("b", png)]);
        let comparison = Comparison::run(&launcher, &request("a", "b")).await.unwrap();
        assert_eq!(comparison.result.mismatched_pixels, 0);
        assert_eq!(comparison.result.total_pixels, 4);
        assert_eq!(comparison.result.mismatch_percentage, 0.0);
        assert_eq!(launcher.launched(), 1);
        assert_eq!(launcher.closed(), 1);
    }

    #[tokio::test]
    async fn raw_captures_are_returned() {
        let a = solid_png(2, 2, WHITE);
        let b = solid_png(2, 2, BLACK);
        let launcher = FakeLauncher::with_pages(&[("a", a.clone()), ("b", b.clone())]);
        let comparison = Comparison::run(&launcher, &request("a", "b")).await.unwrap();
        assert_eq!(comparison.screenshot1, a);
        assert_eq!(comparison.screenshot2, b);
        assert_eq!(comparison.result.mismatched_pixels, 4);
        assert_eq!(comparison.result.mismatch_percentage, 100.0);
        let diff = PixelBuffer::from_png(&comparison.diff_png).unwrap();
        assert_eq!(diff.pixel(0, 0), [255, 0, 0, 255]);
    }

    #[tokio::test]
    async fn different_sizes_are_normalized() {
        let launcher = FakeLauncher::with_pages(&[
            ("a", solid_png(4, 3, WHITE)),
            ("b", solid_png(3, 4, WHITE)),
        ]);
        let result = Comparison::run(&launcher, &request("a", "b"))
            .await
            .unwrap()
            .result;
        assert_eq!(result.dimensions.normalized, Dimensions::new(3, 3));
        assert_eq!(result.total_pixels, 9);
    }

    #[test]
    fn empty_diff_encodes_to_nothing() {
        assert!(encode_diff(&PixelBuffer::blank(0, 3)).unwrap().is_empty());
        assert!(!encode_diff(&PixelBuffer::blank(1, 1)).unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_url_fails_before_launch() {
        let launcher = FakeLauncher::default();
        let err = Comparison::run(&launcher, &request("", "b"))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Missing url1 or url2");
        assert_eq!(launcher.launched(), 0);
    }

    #[tokio::test]
    async fn bad_threshold_fails_before_launch() {
        let launcher = FakeLauncher::default();
        let req = ComparisonRequest::new("a", "b", CompareOptions::with_threshold(1.5));
        let err = Comparison::run(&launcher, &req).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(launcher.launched(), 0);
    }

    #[tokio::test]
    async fn capture_failure_still_closes_browser() {
        let launcher = FakeLauncher::with_pages(&[("a", solid_png(2, 2, WHITE))]);
        let err = Comparison::run(&launcher, &request("a", "missing"))
            .await
            .unwrap_err();
        match err {
            ComparisonError::Capture { url, .. } => assert_eq!(url, "missing"),
            other => panic!("expected capture error, got {other:?}"),
        }
        assert_eq!(launcher.closed(), 1);
    }

    #[tokio::test]
    async fn first_capture_failure_skips_second() {
        let launcher = FakeLauncher::with_pages(&[("b", solid_png(2, 2, WHITE))]);
        let err = Comparison::run(&launcher, &request("missing", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, ComparisonError::Capture { .. }));
        assert_eq!(launcher.captured(), 1);
        assert_eq!(launcher.closed(), 1);
    }

    #[tokio::test]
    async fn undecodable_capture_still_closes_browser() {
        let launcher = FakeLauncher::with_pages(&[
            ("a", solid_png(2, 2, WHITE)),
            ("b", b"not a png".to_vec()),
        ]);
        let err = Comparison::run(&launcher, &request("a", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, ComparisonError::Decode { image: 2, .. }));
        assert_eq!(launcher.closed(), 1);
    }

    #[tokio::test]
    async fn close_failure_does_not_mask_result() {
        let png = solid_png(2, 2, WHITE);
        let launcher = FakeLauncher {
            fail_close: true,
            ..FakeLauncher::with_pages(&[("a", png.clone()), ("b", png)])
        };
        let comparison = Comparison::run(&launcher, &request("a", "b")).await.unwrap();
        assert_eq!(comparison.result.mismatched_pixels, 0);
        assert_eq!(launcher.closed(), 1);
    }

    #[tokio::test]
    async fn launch_failure_is_a_resource_error() {
        let launcher = FakeLauncher {
            fail_launch: true,
            ..FakeLauncher::default()
        };
        let err = Comparison::run(&launcher, &request("a", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, ComparisonError::Resource(_)));
        assert_eq!(launcher.closed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_capture_times_out_and_closes_browser() {
        let launcher = FakeLauncher {
            hang_on: Some("slow".into()),
            timeout: Duration::from_secs(5),
            ..FakeLauncher::with_pages(&[("a", solid_png(2, 2, WHITE))])
        };
        let err = Comparison::run(&launcher, &request("a", "slow"))
            .await
            .unwrap_err();
        match err {
            ComparisonError::Capture { url, message } => {
                assert_eq!(url, "slow");
                assert!(message.contains("timed out"), "{message}");
            }
            other => panic!("expected capture error, got {other:?}"),
        }
        assert_eq!(launcher.captured(), 2);
        assert_eq!(launcher.closed(), 1);
    }

    #[tokio::test]
    async fn each_capture_is_reported_in_order() {
        let a = solid_png(2, 2, WHITE);
        let b = solid_png(3, 3, BLACK);
        let launcher = FakeLauncher::with_pages(&[("a", a.clone()), ("b", b.clone())]);
        let mut seen = Vec::new();
        Comparison::run_with_progress(&launcher, &request("a", "b"), |n, png| {
            seen.push((n, png.to_vec()))
        })
        .await
        .unwrap();
        assert_eq!(seen, vec![(1, a), (2, b)]);
    }

    #[tokio::test]
    async fn failed_capture_is_not_reported() {
        let launcher = FakeLauncher::with_pages(&[("a", solid_png(2, 2, WHITE))]);
        let mut seen = Vec::new();
        let err = Comparison::run_with_progress(&launcher, &request("a", "missing"), |n, _| {
            seen.push(n)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ComparisonError::Capture { .. }));
        assert_eq!(seen, vec![1]);
    }
}
