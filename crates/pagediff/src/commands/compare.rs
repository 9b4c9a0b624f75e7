use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

use crate::capture::ChromeLauncher;
use crate::config::ResolvedRunConfig;
use crate::pipeline::{Comparison, ComparisonRequest};
use crate::report::terminal;
use crate::store;

/// `pagediff compare`: capture both pages, write the three PNGs, print the summary.
///
/// Each screenshot is written and reported as soon as it is captured.
pub async fn compare(config: ResolvedRunConfig) -> Result<()> {
    let start = Instant::now();
    let launcher = ChromeLauncher::new(config.capture);
    let request = ComparisonRequest::new(config.url1, config.url2, config.options);
    let out_dir = config.out_dir.as_path();

    let mut write_error = None;
    let comparison = Comparison::run_with_progress(&launcher, &request, |n, png| {
        if write_error.is_some() {
            return;
        }
        match store::write_screenshot(out_dir, n, png) {
            Ok(path) => terminal::print_captured(&path),
            Err(e) => write_error = Some(e),
        }
    })
    .await
    .context("Comparison failed")?;
    if let Some(e) = write_error {
        return Err(e);
    }
    let diff = store::write_diff(out_dir, &comparison.diff_png)?;

    terminal::print_dimensions(&comparison.result.dimensions);
    terminal::print_saved(diff.as_deref());
    terminal::print_summary(&comparison.result);
    terminal::print_done();

    info!(elapsed = %terminal::format_duration(start.elapsed()), "run finished");
    Ok(())
}
