use thiserror::Error;

use super::buffer::{Dimensions, PixelBuffer};

/// Maximum possible delta in YIQ color space (black vs white).
const MAX_YIQ_POSSIBLE_DELTA: f64 = 35215.0;

#[derive(Debug, Error, PartialEq)]
pub enum DiffError {
    #[error("dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: Dimensions, right: Dimensions },

    #[error("threshold must be between 0.0 and 1.0, got {0}")]
    Threshold(f64),
}

/// Comparator settings. `Default` matches the service defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct CompareOptions {
    /// Sensitivity in `[0, 1]`: 0 = strict, 1 = lenient.
    pub threshold: f64,
    /// Count anti-aliased pixels as mismatches instead of skipping them.
    pub include_aa: bool,
    /// Opacity of the grayscale backdrop drawn for matching pixels.
    pub alpha: f64,
    pub aa_color: [u8; 3],
    pub diff_color: [u8; 3],
    /// Used instead of `diff_color` where the second image is darker.
    pub diff_color_alt: Option<[u8; 3]>,
    /// Draw mismatches only, over a transparent background.
    pub diff_mask: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            include_aa: false,
            alpha: 0.1,
            aa_color: [255, 255, 0],
            diff_color: [255, 0, 0],
            diff_color_alt: None,
            diff_mask: false,
        }
    }
}

impl CompareOptions {
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    /// Largest squared YIQ distance still considered a match.
    fn max_delta(&self) -> f64 {
        MAX_YIQ_POSSIBLE_DELTA * self.threshold * self.threshold
    }
}

pub struct DiffOutput {
    pub diff: PixelBuffer,
    pub mismatched_pixels: u64,
}

/// Per-pixel perceptual comparison of two equally sized buffers.
///
/// Color distance is the YIQ-weighted metric from Kotsarenko & Ramos,
/// "Measuring perceived color difference using YIQ NTSC transmission color
/// space in mobile applications". Pixels above the threshold that look like
/// anti-aliasing in either image are painted `aa_color` and not counted
/// (unless `include_aa`). Anti-aliasing detection ignores the threshold, so
/// raising the threshold can only shrink the mismatch count.
pub fn compare(
    left: &PixelBuffer,
    right: &PixelBuffer,
    options: &CompareOptions,
) -> Result<DiffOutput, DiffError> {
    if left.dimensions() != right.dimensions() {
        return Err(DiffError::DimensionMismatch {
            left: left.dimensions(),
            right: right.dimensions(),
        });
    }
    if !(0.0..=1.0).contains(&options.threshold) {
        return Err(DiffError::Threshold(options.threshold));
    }

    let Dimensions { width, height } = left.dimensions();
    let mut diff = PixelBuffer::blank(width, height);

    // Fast path: nothing can differ.
    if left.as_bytes() == right.as_bytes() {
        if !options.diff_mask {
            for y in 0..height {
                for x in 0..width {
                    diff.set_pixel(x, y, gray_pixel(left.pixel(x, y), options.alpha));
                }
            }
        }
        return Ok(DiffOutput {
            diff,
            mismatched_pixels: 0,
        });
    }

    let max_delta = options.max_delta();
    let mut mismatched_pixels: u64 = 0;

    for y in 0..height {
        for x in 0..width {
            let delta = color_delta(left.pixel(x, y), right.pixel(x, y), false);

            if delta.abs() > max_delta {
                let anti_aliased = !options.include_aa
                    && (antialiased(left, x, y, right) || antialiased(right, x, y, left));
                if anti_aliased {
                    if !options.diff_mask {
                        diff.set_pixel(x, y, opaque(options.aa_color));
                    }
                } else {
                    let color = match options.diff_color_alt {
                        Some(alt) if delta < 0.0 => alt,
                        _ => options.diff_color,
                    };
                    diff.set_pixel(x, y, opaque(color));
                    mismatched_pixels += 1;
                }
            } else if !options.diff_mask {
                diff.set_pixel(x, y, gray_pixel(left.pixel(x, y), options.alpha));
            }
        }
    }

    Ok(DiffOutput {
        diff,
        mismatched_pixels,
    })
}

/// Squared YIQ distance between two pixels, negative when `p1` is brighter.
/// With `y_only`, returns the signed brightness difference instead.
fn color_delta(p1: [u8; 4], p2: [u8; 4], y_only: bool) -> f64 {
    if p1 == p2 {
        return 0.0;
    }

    let (r1, g1, b1) = blend_over_white(p1);
    let (r2, g2, b2) = blend_over_white(p2);

    let y1 = rgb_to_y(r1, g1, b1);
    let y2 = rgb_to_y(r2, g2, b2);
    let y = y1 - y2;

    if y_only {
        return y;
    }

    let i = rgb_to_i(r1, g1, b1) - rgb_to_i(r2, g2, b2);
    let q = rgb_to_q(r1, g1, b1) - rgb_to_q(r2, g2, b2);

    let delta = 0.5053 * y * y + 0.299 * i * i + 0.1957 * q * q;
    if y1 > y2 { -delta } else { delta }
}

/// Whether `(x1, y1)` in `img` looks like an anti-aliased edge pixel.
///
/// It must have both a brighter and a darker neighbour, at most two equal
/// neighbours, and one of those extreme neighbours must sit inside a flat
/// region in both images.
fn antialiased(img: &PixelBuffer, x1: u32, y1: u32, other: &PixelBuffer) -> bool {
    let x0 = x1.saturating_sub(1);
    let y0 = y1.saturating_sub(1);
    let x2 = (x1 + 1).min(img.width() - 1);
    let y2 = (y1 + 1).min(img.height() - 1);
    let center = img.pixel(x1, y1);

    let mut zeroes = u32::from(x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2);
    let mut min = 0.0;
    let mut max = 0.0;
    let mut min_at = None;
    let mut max_at = None;

    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }
            let delta = color_delta(center, img.pixel(x, y), true);
            if delta == 0.0 {
                zeroes += 1;
                if zeroes > 2 {
                    return false;
                }
            } else if delta < min {
                min = delta;
                min_at = Some((x, y));
            } else if delta > max {
                max = delta;
                max_at = Some((x, y));
            }
        }
    }

    let (Some((min_x, min_y)), Some((max_x, max_y))) = (min_at, max_at) else {
        return false;
    };

    (has_many_siblings(img, min_x, min_y) && has_many_siblings(other, min_x, min_y))
        || (has_many_siblings(img, max_x, max_y) && has_many_siblings(other, max_x, max_y))
}

/// Whether `(x1, y1)` has 3+ neighbours of exactly the same color.
fn has_many_siblings(img: &PixelBuffer, x1: u32, y1: u32) -> bool {
    let x0 = x1.saturating_sub(1);
    let y0 = y1.saturating_sub(1);
    let x2 = (x1 + 1).min(img.width() - 1);
    let y2 = (y1 + 1).min(img.height() - 1);
    let center = img.pixel(x1, y1);

    let mut zeroes = u32::from(x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2);
    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }
            if img.pixel(x, y) == center {
                zeroes += 1;
            }
            if zeroes > 2 {
                return true;
            }
        }
    }
    false
}

fn blend_over_white(p: [u8; 4]) -> (f64, f64, f64) {
    let (r, g, b) = (p[0] as f64, p[1] as f64, p[2] as f64);
    if p[3] < 255 {
        let a = p[3] as f64 / 255.0;
        (blend(r, a), blend(g, a), blend(b, a))
    } else {
        (r, g, b)
    }
}

fn blend(c: f64, a: f64) -> f64 {
    255.0 + (c - 255.0) * a
}

fn rgb_to_y(r: f64, g: f64, b: f64) -> f64 {
    r * 0.29889531 + g * 0.58662247 + b * 0.11448223
}

fn rgb_to_i(r: f64, g: f64, b: f64) -> f64 {
    r * 0.59597799 - g * 0.27417610 - b * 0.32180189
}

fn rgb_to_q(r: f64, g: f64, b: f64) -> f64 {
    r * 0.21147017 - g * 0.52261711 + b * 0.31114694
}

/// Luma of `p`, faded toward white.
fn gray_pixel(p: [u8; 4], alpha: f64) -> [u8; 4] {
    let luma = rgb_to_y(p[0] as f64, p[1] as f64, p[2] as f64);
    let v = blend(luma, alpha * p[3] as f64 / 255.0) as u8;
    [v, v, v, 255]
}

fn opaque([r, g, b]: [u8; 3]) -> [u8; 4] {
    [r, g, b, 255]
}
