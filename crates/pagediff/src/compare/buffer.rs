use image::{ImageFormat, RgbaImage};
use serde::Serialize;
use thiserror::Error;

/// Bytes per RGBA pixel.
pub const CHANNELS: usize = 4;

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("pixel data is {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    LengthMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("failed to decode PNG: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode PNG: {0}")]
    Encode(#[source] image::ImageError),

    #[error("cannot encode an empty {0} image as PNG")]
    Empty(Dimensions),
}

/// Width and height of a raster, in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A decoded raster: tightly packed RGBA, row-major, 4 bytes per pixel.
///
/// All `(width * y + x) * 4` arithmetic lives in [`PixelBuffer::offset`];
/// the normalizer and comparator go through it instead of indexing by hand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA bytes. Fails unless `pixels.len() == width * height * 4`.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, BufferError> {
        let expected = byte_len(width, height);
        if pixels.len() != expected {
            return Err(BufferError::LengthMismatch {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Zero-filled (transparent black) buffer.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; byte_len(width, height)],
        }
    }

    /// Buffer with every pixel set to `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity(byte_len(width, height));
        for _ in 0..(width as usize * height as usize) {
            pixels.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Decode PNG bytes into RGBA8, whatever the source color type.
    pub fn from_png(png: &[u8]) -> Result<Self, BufferError> {
        let decoded = image::load_from_memory_with_format(png, ImageFormat::Png)
            .map_err(BufferError::Decode)?
            .to_rgba8();
        Ok(Self::from(decoded))
    }

    /// Encode as PNG. PNG has no zero-sized images, so empty buffers error.
    pub fn to_png(&self) -> Result<Vec<u8>, BufferError> {
        if self.dimensions().is_empty() {
            return Err(BufferError::Empty(self.dimensions()));
        }
        let img = RgbaImage::from_raw(self.width, self.height, self.pixels.clone()).ok_or(
            BufferError::LengthMismatch {
                width: self.width,
                height: self.height,
                expected: byte_len(self.width, self.height),
                actual: self.pixels.len(),
            },
        )?;
        let mut out = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)
            .map_err(BufferError::Encode)?;
        Ok(out)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    pub fn pixel_count(&self) -> u64 {
        self.dimensions().pixel_count()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Byte offset of pixel `(x, y)`. Callers must stay inside the buffer.
    #[inline]
    pub fn offset(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        (self.width as usize * y as usize + x as usize) * CHANNELS
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.offset(x, y);
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let i = self.offset(x, y);
        self.pixels[i..i + CHANNELS].copy_from_slice(&rgba);
    }

    /// The first `width` pixels of row `y`, as bytes.
    pub fn row_prefix(&self, y: u32, width: u32) -> &[u8] {
        debug_assert!(width <= self.width);
        let start = (self.width as usize * y as usize) * CHANNELS;
        &self.pixels[start..start + width as usize * CHANNELS]
    }

    pub(crate) fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.width as usize * CHANNELS;
        let start = stride * y as usize;
        &mut self.pixels[start..start + stride]
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
        }
    }
}

fn byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * CHANNELS
}
