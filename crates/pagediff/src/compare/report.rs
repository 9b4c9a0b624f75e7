use serde::Serialize;

use super::buffer::{Dimensions, PixelBuffer};

/// Original and normalized sizes of one comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ComparisonDimensions {
    pub image1: Dimensions,
    pub image2: Dimensions,
    pub normalized: Dimensions,
}

/// Outcome of comparing two captures.
#[derive(Clone, Debug)]
pub struct ComparisonResult {
    pub mismatched_pixels: u64,
    pub total_pixels: u64,
    /// Percentage of mismatched pixels, rounded to 2 decimals.
    pub mismatch_percentage: f64,
    pub dimensions: ComparisonDimensions,
    pub diff_image: PixelBuffer,
}

pub fn build_report(
    image1: Dimensions,
    image2: Dimensions,
    normalized: Dimensions,
    mismatched_pixels: u64,
    diff_image: PixelBuffer,
) -> ComparisonResult {
    let total_pixels = normalized.pixel_count();
    debug_assert!(mismatched_pixels <= total_pixels);

    ComparisonResult {
        mismatched_pixels,
        total_pixels,
        mismatch_percentage: mismatch_percentage(mismatched_pixels, total_pixels),
        dimensions: ComparisonDimensions {
            image1,
            image2,
            normalized,
        },
        diff_image,
    }
}

/// `mismatched / total * 100` to 2 decimals; 0 when there are no pixels.
pub fn mismatch_percentage(mismatched: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(mismatched as f64 / total as f64 * 100.0)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_is_rounded_to_two_decimals() {
        assert_eq!(mismatch_percentage(1, 3), 33.33);
        assert_eq!(mismatch_percentage(2, 3), 66.67);
        assert_eq!(mismatch_percentage(1, 8), 12.5);
        assert_eq!(mismatch_percentage(4, 4), 100.0);
        assert_eq!(mismatch_percentage(0, 4), 0.0);
    }

    #[test]
    fn zero_pixels_yield_zero_percent() {
        assert_eq!(mismatch_percentage(0, 0), 0.0);
        let report = build_report(
            Dimensions::new(0, 10),
            Dimensions::new(5, 5),
            Dimensions::new(0, 5),
            0,
            PixelBuffer::blank(0, 5),
        );
        assert_eq!(report.total_pixels, 0);
        assert_eq!(report.mismatch_percentage, 0.0);
        assert_eq!(report.mismatched_pixels, 0);
    }

    #[test]
    fn report_carries_all_dimensions() {
        let report = build_report(
            Dimensions::new(4, 3),
            Dimensions::new(3, 4),
            Dimensions::new(3, 3),
            3,
            PixelBuffer::blank(3, 3),
        );
        assert_eq!(report.total_pixels, 9);
        assert_eq!(report.mismatch_percentage, 33.33);
        assert_eq!(report.dimensions.image1, Dimensions::new(4, 3));
        assert_eq!(report.dimensions.image2, Dimensions::new(3, 4));
        assert_eq!(report.dimensions.normalized, Dimensions::new(3, 3));
        assert_eq!(report.mismatched_pixels, 3);
    }

    #[test]
    fn percentage_stays_within_bounds() {
        for total in 1..50u64 {
            for mismatched in 0..=total {
                let p = mismatch_percentage(mismatched, total);
                assert!((0.0..=100.0).contains(&p), "{mismatched}/{total} -> {p}");
            }
        }
    }
}
