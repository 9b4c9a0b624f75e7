pub mod buffer;
pub mod diff;
pub mod normalize;
pub mod report;

pub use self::buffer::{Dimensions, PixelBuffer};
pub use self::diff::{CompareOptions, DiffError};
pub use self::report::{ComparisonDimensions, ComparisonResult};

use crate::error::ComparisonError;

/// Normalize both images to their shared size, diff them, and build the report.
///
/// Runs synchronously; call via `spawn_blocking` from async code.
pub fn compare_images(
    image1: &PixelBuffer,
    image2: &PixelBuffer,
    options: &CompareOptions,
) -> Result<ComparisonResult, DiffError> {
    let (left, right, normalized) = normalize::normalize(image1, image2);
    let output = diff::compare(&left, &right, options)?;
    Ok(report::build_report(
        image1.dimensions(),
        image2.dimensions(),
        normalized,
        output.mismatched_pixels,
        output.diff,
    ))
}

/// Decode two PNG captures and compare them.
pub fn compare_png(
    png1: &[u8],
    png2: &[u8],
    options: &CompareOptions,
) -> Result<ComparisonResult, ComparisonError> {
    let image1 = PixelBuffer::from_png(png1)
        .map_err(|source| ComparisonError::Decode { image: 1, source })?;
    let image2 = PixelBuffer::from_png(png2)
        .map_err(|source| ComparisonError::Decode { image: 2, source })?;
    Ok(compare_images(&image1, &image2, options)?)
}
