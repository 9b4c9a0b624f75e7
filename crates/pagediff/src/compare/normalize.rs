use thiserror::Error;

use super::buffer::{Dimensions, PixelBuffer};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot crop {source_dims} image to {target}: target exceeds source")]
pub struct CropError {
    pub source_dims: Dimensions,
    pub target: Dimensions,
}

/// Shared minimal size of two images: `min(w1, w2) x min(h1, h2)`.
pub fn target_dimensions(a: Dimensions, b: Dimensions) -> Dimensions {
    Dimensions::new(a.width.min(b.width), a.height.min(b.height))
}

/// Keep the top-left `target_width x target_height` region of `buffer`.
///
/// A true crop: every kept pixel is copied byte for byte, nothing is
/// resampled. A zero target yields an empty buffer.
pub fn crop(
    buffer: &PixelBuffer,
    target_width: u32,
    target_height: u32,
) -> Result<PixelBuffer, CropError> {
    let target = Dimensions::new(target_width, target_height);
    if target_width > buffer.width() || target_height > buffer.height() {
        return Err(CropError {
            source_dims: buffer.dimensions(),
            target,
        });
    }
    Ok(copy_region(buffer, target))
}

/// Crop both buffers to their shared minimal size.
pub fn normalize(a: &PixelBuffer, b: &PixelBuffer) -> (PixelBuffer, PixelBuffer, Dimensions) {
    let target = target_dimensions(a.dimensions(), b.dimensions());
    (copy_region(a, target), copy_region(b, target), target)
}

/// `target` must fit inside `buffer`.
fn copy_region(buffer: &PixelBuffer, target: Dimensions) -> PixelBuffer {
    if target == buffer.dimensions() {
        return buffer.clone();
    }
    let mut out = PixelBuffer::blank(target.width, target.height);
    for y in 0..target.height {
        out.row_mut(y).copy_from_slice(buffer.row_prefix(y, target.width));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Buffer where each pixel encodes its own coordinates.
    fn coordinate_buffer(w: u32, h: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::blank(w, h);
        for y in 0..h {
            for x in 0..w {
                buf.set_pixel(x, y, [x as u8, y as u8, (x ^ y) as u8, 255]);
            }
        }
        buf
    }

    #[test]
    fn crop_keeps_top_left_pixels_exactly() {
        let src = coordinate_buffer(7, 5);
        for (tw, th) in [(7, 5), (3, 2), (1, 5), (7, 1), (4, 4)] {
            let out = crop(&src, tw, th).unwrap();
            assert_eq!(out.dimensions(), Dimensions::new(tw, th));
            assert_eq!(out.as_bytes().len(), (tw * th * 4) as usize);
            for y in 0..th {
                for x in 0..tw {
                    assert_eq!(out.pixel(x, y), src.pixel(x, y), "pixel ({x},{y})");
                }
            }
        }
    }

    #[test]
    fn crop_to_zero_is_empty() {
        let src = coordinate_buffer(4, 4);
        let out = crop(&src, 0, 4).unwrap();
        assert!(out.as_bytes().is_empty());
        let out = crop(&src, 4, 0).unwrap();
        assert_eq!(out.pixel_count(), 0);
    }

    #[test]
    fn crop_larger_than_source_is_rejected() {
        let src = coordinate_buffer(4, 4);
        let err = crop(&src, 5, 2).unwrap_err();
        assert_eq!(err.target, Dimensions::new(5, 2));
        assert_eq!(err.source_dims, Dimensions::new(4, 4));
    }

    #[test]
    fn normalize_uses_shared_minimum() {
        let a = coordinate_buffer(4, 3);
        let b = coordinate_buffer(3, 4);
        let (na, nb, target) = normalize(&a, &b);
        assert_eq!(target, Dimensions::new(3, 3));
        assert_eq!(na.dimensions(), target);
        assert_eq!(nb.dimensions(), target);
        assert_eq!(target.pixel_count(), 9);
        assert_eq!(na, nb);
    }

    #[test]
    fn normalize_with_zero_width_side() {
        let a = PixelBuffer::blank(0, 10);
        let b = coordinate_buffer(5, 5);
        let (na, nb, target) = normalize(&a, &b);
        assert_eq!(target, Dimensions::new(0, 5));
        assert!(na.as_bytes().is_empty());
        assert!(nb.as_bytes().is_empty());
    }
}
